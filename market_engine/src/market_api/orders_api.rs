//! Read access to orders, and the operator queue of settlement faults.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{FullOrder, Order, OrderNumber, SettlementRecord},
    market_api::errors::OrderFlowError,
    traits::{MarketplaceDatabase, OrderQueryFilter},
};

#[derive(Clone)]
pub struct OrdersApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrdersApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrdersApi ({:?})", self.db)
    }
}

impl<B> OrdersApi<B>
where B: MarketplaceDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches the order with the given internal id, along with its line items and notes.
    pub async fn fetch_order(&self, order_id: i64) -> Result<Option<FullOrder>, OrderFlowError> {
        Ok(self.db.fetch_order(order_id).await?)
    }

    pub async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<FullOrder>, OrderFlowError> {
        Ok(self.db.fetch_order_by_number(order_number).await?)
    }

    pub async fn fetch_order_by_reference(&self, reference: &str) -> Result<Option<FullOrder>, OrderFlowError> {
        Ok(self.db.fetch_order_by_reference(reference).await?)
    }

    /// All orders placed by `buyer_id`, oldest first.
    pub async fn orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        let query = OrderQueryFilter::default().with_buyer_id(buyer_id);
        Ok(self.db.search_orders(query).await?)
    }

    /// All orders placed with `seller_id`, oldest first.
    pub async fn orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        let query = OrderQueryFilter::default().with_seller_id(seller_id);
        Ok(self.db.search_orders(query).await?)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        trace!("🔄️ Searching orders: {query:?}");
        Ok(self.db.search_orders(query).await?)
    }

    /// The settlement journal for a payment reference, oldest entry first.
    pub async fn settlement_history(&self, reference: &str) -> Result<Vec<SettlementRecord>, OrderFlowError> {
        Ok(self.db.fetch_settlement_records(reference).await?)
    }

    /// Settlement faults that still need an operator.
    pub async fn unresolved_faults(&self) -> Result<Vec<SettlementRecord>, OrderFlowError> {
        Ok(self.db.fetch_unresolved_faults().await?)
    }

    /// Marks a settlement fault as dealt with (typically after the buyer has been refunded).
    pub async fn resolve_fault(&self, journal_id: i64) -> Result<SettlementRecord, OrderFlowError> {
        let record = self.db.resolve_fault(journal_id).await?;
        info!("🔄️ Settlement fault #{journal_id} for payment {} resolved", record.payment_reference);
        Ok(record)
    }
}
