use crate::{
    db_types::{FullOrder, Order, OrderNumber},
    traits::{MarketplaceError, OrderQueryFilter},
};

/// Read-only access to orders, their line items and their note logs.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches the order with the given internal id. If no order exists, `None` is returned.
    async fn fetch_order(&self, order_id: i64) -> Result<Option<FullOrder>, MarketplaceError>;

    /// Fetches the order with the given order number. If no order exists, `None` is returned.
    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<FullOrder>, MarketplaceError>;

    /// Fetches the order carrying the given payment gateway reference, if any.
    async fn fetch_order_by_reference(&self, reference: &str) -> Result<Option<FullOrder>, MarketplaceError>;

    /// Fetches orders according to the criteria in `query`. Results are ordered by creation time, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError>;
}
