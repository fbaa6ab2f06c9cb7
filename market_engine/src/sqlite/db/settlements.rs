use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewSettlementRecord, SettlementRecord},
    traits::MarketplaceError,
};

const FAULT_OUTCOMES: &str = "('order_not_found', 'overbooked', 'amount_mismatch', 'illegal_transition')";

/// Appends an entry to the settlement journal.
pub async fn insert_record(
    record: NewSettlementRecord,
    conn: &mut SqliteConnection,
) -> Result<SettlementRecord, MarketplaceError> {
    let record: SettlementRecord = sqlx::query_as(
        r#"
            INSERT INTO settlement_journal (payment_reference, order_id, event_kind, outcome, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(record.payment_reference)
    .bind(record.order_id)
    .bind(record.event_kind)
    .bind(record.outcome)
    .bind(record.detail)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Journaled {} for payment {} (#{})", record.outcome, record.payment_reference, record.id);
    Ok(record)
}

pub async fn fetch_records_for_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<SettlementRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM settlement_journal WHERE payment_reference = $1 ORDER BY id ASC")
        .bind(reference)
        .fetch_all(conn)
        .await
}

pub async fn fetch_unresolved_faults(conn: &mut SqliteConnection) -> Result<Vec<SettlementRecord>, sqlx::Error> {
    let sql =
        format!("SELECT * FROM settlement_journal WHERE resolved = FALSE AND outcome IN {FAULT_OUTCOMES} ORDER BY id ASC");
    sqlx::query_as(&sql).fetch_all(conn).await
}

/// Marks a fault as resolved. Returns `FaultNotFound` if the entry does not exist, is not a fault, or was already
/// resolved.
pub async fn resolve_fault(journal_id: i64, conn: &mut SqliteConnection) -> Result<SettlementRecord, MarketplaceError> {
    let sql = format!(
        "UPDATE settlement_journal SET resolved = TRUE, resolved_at = $1 WHERE id = $2 AND resolved = FALSE AND \
         outcome IN {FAULT_OUTCOMES} RETURNING *"
    );
    let record: Option<SettlementRecord> =
        sqlx::query_as(&sql).bind(Utc::now()).bind(journal_id).fetch_optional(conn).await?;
    record.ok_or(MarketplaceError::FaultNotFound(journal_id))
}
