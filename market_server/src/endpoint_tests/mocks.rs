use market_common::Money;
use market_engine::{
    db_types::{FullOrder, NewOrder, NewProduct, Order, OrderNumber, OrderStatusChange, Product, SettlementRecord},
    traits::{
        CatalogManagement,
        MarketplaceDatabase,
        MarketplaceError,
        OrderManagement,
        OrderQueryFilter,
        SettlementOutcome,
    },
};
use mockall::mock;

mock! {
    pub MarketDb {}
    impl Clone for MarketDb {
        fn clone(&self) -> Self;
    }
    impl OrderManagement for MarketDb {
        async fn fetch_order(&self, order_id: i64) -> Result<Option<FullOrder>, MarketplaceError>;
        async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<FullOrder>, MarketplaceError>;
        async fn fetch_order_by_reference(&self, reference: &str) -> Result<Option<FullOrder>, MarketplaceError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError>;
    }
    impl CatalogManagement for MarketDb {
        async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;
        async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;
        async fn update_product_price(&self, product_id: i64, unit_price: Money) -> Result<Product, MarketplaceError>;
    }
    impl MarketplaceDatabase for MarketDb {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, MarketplaceError>;
        async fn attach_payment_reference(&self, order_id: i64, reference: &str) -> Result<Order, MarketplaceError>;
        async fn settle_payment_success<'a>(
            &self,
            reference: &str,
            amount: Money,
            currency: Option<&'a str>,
        ) -> Result<SettlementOutcome, MarketplaceError>;
        async fn settle_payment_failure(&self, reference: &str, reason: &str) -> Result<SettlementOutcome, MarketplaceError>;
        async fn apply_status_change(&self, change: OrderStatusChange) -> Result<FullOrder, MarketplaceError>;
        async fn fetch_settlement_records(&self, reference: &str) -> Result<Vec<SettlementRecord>, MarketplaceError>;
        async fn fetch_unresolved_faults(&self) -> Result<Vec<SettlementRecord>, MarketplaceError>;
        async fn resolve_fault(&self, journal_id: i64) -> Result<SettlementRecord, MarketplaceError>;
    }
}
