use market_common::{Money, MoneyError};
use thiserror::Error;

use crate::{
    db_types::{FullOrder, NewOrder, Order, OrderStatusChange, SettlementRecord},
    traits::{CatalogManagement, OrderManagement, SettlementOutcome},
};

/// This trait defines the highest level of behaviour for backends supporting the marketplace order engine.
///
/// This behaviour includes:
/// * Storing newly priced orders, including issuing a unique order number.
/// * Attaching the payment gateway reference to an order.
/// * Settling payment events exactly once per payment reference.
/// * Applying seller-driven status changes under an optimistic version check.
/// * Maintaining the settlement journal, and the queue of settlement faults that need an operator.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + OrderManagement + CatalogManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a new, fully priced order, and in a single atomic transaction:
    /// * allocates the next order number for the day,
    /// * stores the order with `status = pending` and `payment_status = pending`,
    /// * stores the line item snapshots.
    ///
    /// Returns the stored order with its items.
    async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, MarketplaceError>;

    /// Sets the payment reference on the order. The reference can only be set once.
    ///
    /// ## Failure modes:
    /// - If the order does not exist, `OrderNotFound` is returned.
    /// - If the order already carries a payment reference, `PaymentAlreadyInitiated` is returned.
    async fn attach_payment_reference(&self, order_id: i64, reference: &str) -> Result<Order, MarketplaceError>;

    /// Applies a successful payment to the order carrying `reference`. In a single atomic transaction:
    /// * the payment status is moved to `paid`, but only from `pending` or `failed` (compare-and-swap),
    /// * the amount (and currency, when given) must match the order total,
    /// * the order status is moved from `pending` to `processing`, as allowed by [`crate::transitions`],
    /// * every line item's product has its `available_quantity` decremented by the ordered quantity.
    ///
    /// If any step fails, nothing is applied, and the failure is recorded in the settlement journal as a fault.
    /// A redelivery of an already-settled payment changes nothing and yields [`SettlementOutcome::Duplicate`].
    ///
    /// Only infrastructure failures are returned as errors. Business outcomes, including faults, are returned in
    /// [`SettlementOutcome`].
    async fn settle_payment_success(
        &self,
        reference: &str,
        amount: Money,
        currency: Option<&str>,
    ) -> Result<SettlementOutcome, MarketplaceError>;

    /// Applies a payment failure to the order carrying `reference`. The payment status moves from `pending` to
    /// `failed`. The order status and stock levels are untouched, so the buyer may retry payment.
    ///
    /// A repeated failure yields [`SettlementOutcome::Duplicate`], and a failure that arrives after the order was paid
    /// yields [`SettlementOutcome::Stale`].
    async fn settle_payment_failure(&self, reference: &str, reason: &str)
        -> Result<SettlementOutcome, MarketplaceError>;

    /// Applies a validated, seller-driven status change. The write only succeeds if the order's version still equals
    /// `change.expected_version`. Otherwise `VersionConflict` is returned and nothing is written.
    ///
    /// If the change carries a note, it is appended to the order's note log in the same transaction.
    async fn apply_status_change(&self, change: OrderStatusChange) -> Result<FullOrder, MarketplaceError>;

    /// Fetches every settlement journal entry for the given payment reference, oldest first.
    async fn fetch_settlement_records(&self, reference: &str) -> Result<Vec<SettlementRecord>, MarketplaceError>;

    /// Fetches all settlement faults that have not been marked as resolved, oldest first.
    async fn fetch_unresolved_faults(&self) -> Result<Vec<SettlementRecord>, MarketplaceError>;

    /// Marks the settlement fault with the given journal id as resolved.
    async fn resolve_fault(&self, journal_id: i64) -> Result<SettlementRecord, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Order {order_id} was modified by someone else (expected version {expected_version}). Please retry.")]
    VersionConflict { order_id: i64, expected_version: i64 },
    #[error("A payment has already been initiated for order {0}")]
    PaymentAlreadyInitiated(i64),
    #[error("Settlement journal entry {0} does not exist or is not a fault")]
    FaultNotFound(i64),
    #[error("Invalid data. {0}")]
    InvalidData(String),
    #[error("Monetary calculation failed. {0}")]
    AmountError(#[from] MoneyError),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
