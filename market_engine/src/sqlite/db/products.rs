use chrono::Utc;
use log::trace;
use market_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::MarketplaceError,
};

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let now = Utc::now();
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (seller_id, name, unit_price, available_quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(product.seller_id)
    .bind(product.name)
    .bind(product.unit_price)
    .bind(product.available_quantity)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn update_price(
    product_id: i64,
    unit_price: Money,
    conn: &mut SqliteConnection,
) -> Result<Product, MarketplaceError> {
    let product: Option<Product> =
        sqlx::query_as("UPDATE products SET unit_price = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(unit_price)
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    product.ok_or(MarketplaceError::ProductNotFound(product_id))
}

/// Decrements the available quantity of a product, but only if enough stock is available. The quantity is never
/// allowed to go below zero, and is never clamped.
///
/// Returns the new available quantity, or `None` if there was not enough stock (or the product does not exist), in
/// which case nothing was changed.
pub async fn decrement_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, sqlx::Error> {
    let remaining: Option<i64> = sqlx::query_scalar(
        r#"
            UPDATE products SET available_quantity = available_quantity - $1, updated_at = $2
            WHERE id = $3 AND available_quantity >= $1
            RETURNING available_quantity;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Stock decrement of {quantity} for product {product_id}: remaining = {remaining:?}");
    Ok(remaining)
}
