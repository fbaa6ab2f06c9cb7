use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        FullOrder,
        NewOrder,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusChange,
        OrderStatusType,
        PaymentStatusType,
    },
    sqlite::db::notes,
    traits::{MarketplaceError, OrderQueryFilter},
};

/// Inserts a new order and its line items using the given connection. This is not atomic. Embed this call inside a
/// transaction, and pass `&mut *tx` as the connection argument.
///
/// The order is always created with `status = pending` and `payment_status = pending`.
pub async fn insert_order(
    order_number: OrderNumber,
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<FullOrder, MarketplaceError> {
    let NewOrder { buyer_id, seller_id, currency, items, total_amount, shipping, created_at } = order;
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                buyer_id,
                seller_id,
                total_amount,
                currency,
                status,
                payment_status,
                shipping_address,
                shipping_contact_name,
                shipping_contact_phone,
                shipping_instructions,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'pending', 'pending', $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(order_number)
    .bind(buyer_id)
    .bind(seller_id)
    .bind(total_amount)
    .bind(currency)
    .bind(shipping.address)
    .bind(shipping.contact_name)
    .bind(shipping.contact_phone)
    .bind(shipping.instructions)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await?;
    let mut stored_items = Vec::with_capacity(items.len());
    for (line_no, item) in items.into_iter().enumerate() {
        #[allow(clippy::cast_possible_wrap)]
        let line_no = line_no as i64 + 1;
        let stored: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, line_no, product_id, name, unit_price, quantity, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *;
            "#,
        )
        .bind(order.id)
        .bind(line_no)
        .bind(item.product_id)
        .bind(item.name)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.subtotal)
        .fetch_one(&mut *conn)
        .await?;
        stored_items.push(stored);
    }
    debug!("🗃️ Order {} inserted with id {} and {} items", order.order_number, order.id, stored_items.len());
    Ok(FullOrder { order, items: stored_items, notes: vec![] })
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn fetch_order_by_number(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_order_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1").bind(reference).fetch_optional(conn).await
}

pub async fn fetch_items_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY line_no ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Loads the line items and note log for `order`.
pub async fn into_full_order(order: Order, conn: &mut SqliteConnection) -> Result<FullOrder, sqlx::Error> {
    let items = fetch_items_for_order(order.id, &mut *conn).await?;
    let notes = notes::fetch_notes_for_order(order.id, &mut *conn).await?;
    Ok(FullOrder { order, items, notes })
}

/// Sets the payment reference on an order that does not have one yet. Returns `None` if no such order exists.
pub async fn attach_payment_reference(
    order_id: i64,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET payment_reference = $1, version = version + 1, updated_at = $2
            WHERE id = $3 AND payment_reference IS NULL
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

/// Compare-and-swap of the payment status on the order carrying `reference`.
///
/// The status is moved to `new_status` only if it is currently one of `from`. Returns the updated order, or `None` if
/// no order matched (either because the reference is unknown, or because the payment status was not in `from`).
pub async fn swap_payment_status(
    reference: &str,
    from: &[PaymentStatusType],
    new_status: PaymentStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET payment_status = ");
    builder.push_bind(new_status);
    builder.push(", version = version + 1, updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE payment_reference = ");
    builder.push_bind(reference);
    builder.push(" AND payment_status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(*status);
    }
    statuses.push_unseparated(") RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Order>().fetch_optional(conn).await
}

/// Sets the order status unconditionally. Callers are responsible for validating the transition first.
pub async fn update_order_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, version = version + 1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(status)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::OrderNotFound(order_id))
}

/// Writes a status change, guarded by the expected version. Returns `None` if the order does not exist or its
/// version has moved on.
pub async fn update_status_if_version(
    change: &OrderStatusChange,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET version = version + 1, updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(", status = ");
    builder.push_bind(change.new_status);
    if let Some(estimate) = change.estimated_delivery {
        builder.push(", estimated_delivery = ");
        builder.push_bind(estimate);
    }
    if let Some(delivered_at) = change.delivered_at {
        builder.push(", delivered_at = ");
        builder.push_bind(delivered_at);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(change.order_id);
    builder.push(" AND version = ");
    builder.push_bind(change.expected_version);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Order>().fetch_optional(conn).await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(seller_id) = query.seller_id {
        where_clause.push("seller_id = ");
        where_clause.push_bind_unseparated(seller_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(payment_status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(payment_status);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}
