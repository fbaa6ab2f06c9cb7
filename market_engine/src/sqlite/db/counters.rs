use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{db_types::OrderNumber, traits::MarketplaceError};

/// Issues the next order number for the calendar day of `now`.
///
/// The per-day counter is bumped with a single upsert, so two concurrent callers can never be handed the same
/// sequence number. Call this as the first statement of the order creation transaction.
pub async fn next_order_number(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderNumber, MarketplaceError> {
    let day = now.format("%Y%m%d").to_string();
    let seq: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO order_counters (day, last_seq) VALUES ($1, 1)
            ON CONFLICT (day) DO UPDATE SET last_seq = last_seq + 1
            RETURNING last_seq;
        "#,
    )
    .bind(&day)
    .fetch_one(conn)
    .await?;
    let number = OrderNumber::new(&day, seq);
    trace!("🗃️ Issued order number {number}");
    Ok(number)
}
