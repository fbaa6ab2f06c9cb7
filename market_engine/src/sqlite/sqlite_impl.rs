//! `SqliteDatabase` is a concrete implementation of a marketplace order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use market_common::Money;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{counters, db_url, new_pool, notes, orders, products, settlements};
use crate::{
    db_types::{
        FullOrder,
        NewOrder,
        NewProduct,
        NewSettlementRecord,
        Order,
        OrderNumber,
        OrderStatusChange,
        OrderStatusType,
        PaymentStatusType,
        Product,
        SettlementOutcomeType,
        SettlementRecord,
    },
    transitions::check_transition,
    traits::{
        CatalogManagement,
        MarketplaceDatabase,
        MarketplaceError,
        OrderManagement,
        OrderQueryFilter,
        SettlementFault,
        SettlementOutcome,
    },
};

/// Journal event kind for successful payments.
pub const PAYMENT_SUCCEEDED: &str = "payment_succeeded";
/// Journal event kind for failed payments.
pub const PAYMENT_FAILED: &str = "payment_failed";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

/// Why a claimed payment could not be applied. The transaction is rolled back and the fault journaled.
struct Rejection {
    kind: SettlementOutcomeType,
    detail: String,
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order_number = counters::next_order_number(order.created_at, &mut tx).await?;
        let order = orders::insert_order(order_number, order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", order.order.order_number, order.order.id);
        Ok(order)
    }

    async fn attach_payment_reference(&self, order_id: i64, reference: &str) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        match orders::attach_payment_reference(order_id, reference, &mut tx).await? {
            Some(order) => {
                tx.commit().await?;
                debug!("🗃️ Payment reference {reference} attached to order {}", order.order_number);
                Ok(order)
            },
            None => {
                let existing = orders::fetch_order(order_id, &mut tx).await?;
                tx.rollback().await?;
                match existing {
                    Some(_) => Err(MarketplaceError::PaymentAlreadyInitiated(order_id)),
                    None => Err(MarketplaceError::OrderNotFound(order_id)),
                }
            },
        }
    }

    async fn settle_payment_success(
        &self,
        reference: &str,
        amount: Money,
        currency: Option<&str>,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        // Claiming the payment is the first statement, so concurrent deliveries of the same event queue up here.
        let claimed = orders::swap_payment_status(
            reference,
            &[PaymentStatusType::Pending, PaymentStatusType::Failed],
            PaymentStatusType::Paid,
            &mut tx,
        )
        .await?;
        let Some(order) = claimed else {
            let existing = orders::fetch_order_by_reference(reference, &mut tx).await?;
            tx.rollback().await?;
            return match existing {
                Some(order) if order.payment_status == PaymentStatusType::Paid => {
                    info!("🗃️ Payment {reference} for order {} was already settled. Nothing to do.", order.order_number);
                    self.journal_no_op(reference, PAYMENT_SUCCEEDED, SettlementOutcomeType::Duplicate, &order).await
                },
                Some(order) => {
                    warn!(
                        "🗃️ Payment {reference} succeeded, but order {} has payment status {}. Ignoring.",
                        order.order_number, order.payment_status
                    );
                    self.journal_no_op(reference, PAYMENT_SUCCEEDED, SettlementOutcomeType::Stale, &order).await
                },
                None => {
                    let detail = format!("No order carries payment reference {reference}");
                    self.record_fault(reference, PAYMENT_SUCCEEDED, None, SettlementOutcomeType::OrderNotFound, detail)
                        .await
                },
            };
        };
        match apply_settlement(&order, amount, currency, &mut tx).await? {
            Ok(order) => {
                let record = NewSettlementRecord::new(reference, PAYMENT_SUCCEEDED, SettlementOutcomeType::Settled)
                    .with_order_id(order.id)
                    .with_detail(format!("{amount} {}", order.currency));
                settlements::insert_record(record, &mut tx).await?;
                let full_order = orders::into_full_order(order, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Order {} settled for payment {reference}", full_order.order.order_number);
                Ok(SettlementOutcome::Settled(full_order))
            },
            Err(rejection) => {
                tx.rollback().await?;
                self.record_fault(reference, PAYMENT_SUCCEEDED, Some(order.id), rejection.kind, rejection.detail).await
            },
        }
    }

    async fn settle_payment_failure(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let claimed = orders::swap_payment_status(
            reference,
            &[PaymentStatusType::Pending],
            PaymentStatusType::Failed,
            &mut tx,
        )
        .await?;
        let Some(order) = claimed else {
            let existing = orders::fetch_order_by_reference(reference, &mut tx).await?;
            tx.rollback().await?;
            return match existing {
                Some(order) if order.payment_status == PaymentStatusType::Failed => {
                    info!("🗃️ Failure of payment {reference} was already recorded. Nothing to do.");
                    self.journal_no_op(reference, PAYMENT_FAILED, SettlementOutcomeType::Duplicate, &order).await
                },
                Some(order) => {
                    warn!(
                        "🗃️ Late failure notice for payment {reference}. Order {} is already {}. Ignoring.",
                        order.order_number, order.payment_status
                    );
                    self.journal_no_op(reference, PAYMENT_FAILED, SettlementOutcomeType::Stale, &order).await
                },
                None => {
                    let detail = format!("No order carries payment reference {reference}");
                    self.record_fault(reference, PAYMENT_FAILED, None, SettlementOutcomeType::OrderNotFound, detail)
                        .await
                },
            };
        };
        let record = NewSettlementRecord::new(reference, PAYMENT_FAILED, SettlementOutcomeType::PaymentFailed)
            .with_order_id(order.id)
            .with_detail(reason);
        settlements::insert_record(record, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payment {reference} for order {} failed: {reason}", order.order_number);
        Ok(SettlementOutcome::PaymentFailed { order, reason: reason.to_string() })
    }

    async fn apply_status_change(&self, change: OrderStatusChange) -> Result<FullOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::update_status_if_version(&change, &mut tx).await? else {
            let exists = orders::fetch_order(change.order_id, &mut tx).await?.is_some();
            tx.rollback().await?;
            return if exists {
                Err(MarketplaceError::VersionConflict {
                    order_id: change.order_id,
                    expected_version: change.expected_version,
                })
            } else {
                Err(MarketplaceError::OrderNotFound(change.order_id))
            };
        };
        if let Some(note) = change.note {
            notes::append_note(order.id, note, &mut tx).await?;
        }
        let order = orders::into_full_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} is now {} (version {})", order.order.order_number, order.order.status, order.order.version);
        Ok(order)
    }

    async fn fetch_settlement_records(&self, reference: &str) -> Result<Vec<SettlementRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let records = settlements::fetch_records_for_reference(reference, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_unresolved_faults(&self) -> Result<Vec<SettlementRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let faults = settlements::fetch_unresolved_faults(&mut conn).await?;
        Ok(faults)
    }

    async fn resolve_fault(&self, journal_id: i64) -> Result<SettlementRecord, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let record = settlements::resolve_fault(journal_id, &mut conn).await?;
        info!("🗃️ Settlement fault #{journal_id} ({}) marked as resolved", record.outcome);
        Ok(record)
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Applies the effects of a claimed payment: amount check, `pending -> processing`, and stock decrements.
///
/// The outer `Result` carries infrastructure errors. The inner one says whether the settlement may be committed, and
/// holds the updated order if so.
async fn apply_settlement(
    order: &Order,
    amount: Money,
    currency: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Result<Order, Rejection>, MarketplaceError> {
    let currency_matches = currency.map(|c| c.eq_ignore_ascii_case(&order.currency)).unwrap_or(true);
    if amount != order.total_amount || !currency_matches {
        let detail = format!(
            "Received {amount} {}, but order {} is for {} {}",
            currency.unwrap_or(&order.currency),
            order.order_number,
            order.total_amount,
            order.currency
        );
        return Ok(Err(Rejection { kind: SettlementOutcomeType::AmountMismatch, detail }));
    }
    if let Err(e) = check_transition(order.status, OrderStatusType::Processing) {
        let detail = format!("Order {}: {e}", order.order_number);
        return Ok(Err(Rejection { kind: SettlementOutcomeType::IllegalTransition, detail }));
    }
    let updated = orders::update_order_status(order.id, OrderStatusType::Processing, &mut *conn).await?;
    let items = orders::fetch_items_for_order(order.id, &mut *conn).await?;
    for item in items {
        if products::decrement_stock(item.product_id, item.quantity, &mut *conn).await?.is_none() {
            let available = products::fetch_product(item.product_id, &mut *conn).await?.map(|p| p.available_quantity);
            let detail = match available {
                Some(available) => format!(
                    "Order {} needs {} of product {} ({}), but only {available} are available",
                    order.order_number, item.quantity, item.product_id, item.name
                ),
                None => format!(
                    "Order {} needs {} of product {} ({}), which is no longer in the catalog",
                    order.order_number, item.quantity, item.product_id, item.name
                ),
            };
            return Ok(Err(Rejection { kind: SettlementOutcomeType::Overbooked, detail }));
        }
    }
    Ok(Ok(updated))
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), MarketplaceError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketplaceError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    async fn journal_no_op(
        &self,
        reference: &str,
        kind: &str,
        outcome: SettlementOutcomeType,
        order: &Order,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let record = NewSettlementRecord::new(reference, kind, outcome).with_order_id(order.id);
        settlements::insert_record(record, &mut conn).await?;
        let reference = reference.to_string();
        let (order_id, payment_status) = (order.id, order.payment_status);
        match outcome {
            SettlementOutcomeType::Stale => Ok(SettlementOutcome::Stale { reference, order_id, payment_status }),
            _ => Ok(SettlementOutcome::Duplicate { reference, order_id, payment_status }),
        }
    }

    async fn record_fault(
        &self,
        reference: &str,
        kind: &str,
        order_id: Option<i64>,
        outcome: SettlementOutcomeType,
        detail: String,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let mut record = NewSettlementRecord::new(reference, kind, outcome).with_detail(detail.clone());
        if let Some(id) = order_id {
            record = record.with_order_id(id);
        }
        let record = settlements::insert_record(record, &mut conn).await?;
        match outcome {
            SettlementOutcomeType::Overbooked => {
                error!("🗃️ OVERBOOKED. Payment {reference} was not applied and needs a refund. {detail}")
            },
            _ => warn!("🗃️ Payment event {kind} for {reference} could not be applied ({outcome}). {detail}"),
        }
        Ok(SettlementOutcome::Fault(SettlementFault {
            journal_id: record.id,
            reference: reference.to_string(),
            order_id,
            kind: outcome,
            detail,
        }))
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<FullOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order(order_id, &mut conn).await? {
            Some(order) => Ok(Some(orders::into_full_order(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<FullOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order_by_number(order_number, &mut conn).await? {
            Some(order) => Ok(Some(orders::into_full_order(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_order_by_reference(&self, reference: &str) -> Result<Option<FullOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order_by_reference(reference, &mut conn).await? {
            Some(order) => Ok(Some(orders::into_full_order(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn update_product_price(&self, product_id: i64, unit_price: Money) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::update_price(product_id, unit_price, &mut conn).await
    }
}
