use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrderNote, OrderNote},
    traits::MarketplaceError,
};

/// Appends a note to an order's note log. Notes are never updated or deleted (the schema enforces this with
/// triggers).
pub async fn append_note(
    order_id: i64,
    note: NewOrderNote,
    conn: &mut SqliteConnection,
) -> Result<OrderNote, MarketplaceError> {
    let note = sqlx::query_as(
        r#"
            INSERT INTO order_notes (order_id, author, note, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(note.author)
    .bind(note.note)
    .bind(chrono::Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(note)
}

pub async fn fetch_notes_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderNote>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_notes WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}
