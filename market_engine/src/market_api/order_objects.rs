use std::collections::HashMap;

use chrono::{DateTime, Utc};
use market_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        FullOrder,
        LineRequest,
        NewOrder,
        NewOrderItem,
        OrderNote,
        OrderNumber,
        OrderStatusType,
        PaymentStatusType,
        Product,
        ShippingInfo,
    },
    market_api::errors::OrderFlowError,
};

/// What the checkout caller gets back. The payment token is passed to the buyer's client to complete payment with the
/// gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub order_id: i64,
    pub order_number: OrderNumber,
    pub payment_token: String,
}

/// Optional data that accompanies a seller's status update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateExtras {
    /// Required when moving to `shipped`. Ignored otherwise.
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Appended to the order's note log.
    pub notes: Option<String>,
}

impl StatusUpdateExtras {
    pub fn with_estimated_delivery(mut self, estimate: DateTime<Utc>) -> Self {
        self.estimated_delivery = Some(estimate);
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// The status fields of an order after a seller update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub order_id: i64,
    pub order_number: OrderNumber,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Vec<OrderNote>,
    /// `false` when the request was an idempotent repeat (e.g. cancelling an already canceled order).
    pub changed: bool,
}

impl OrderStatusUpdate {
    pub fn new(order: FullOrder, changed: bool) -> Self {
        let FullOrder { order, notes, .. } = order;
        Self {
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            estimated_delivery: order.estimated_delivery,
            delivered_at: order.delivered_at,
            notes,
            changed,
        }
    }
}

/// Prices a checkout against catalog snapshots.
///
/// `products` must contain every product referenced in `lines`. The caller is expected to have validated the shape of
/// the request already (non-empty, positive quantities). The stock check is against the total quantity requested per
/// product, so splitting a product over several lines cannot get around it. Names and unit prices are copied into the
/// line items, and every subtotal and the total are calculated with checked integer arithmetic.
pub fn price_order(
    buyer_id: &str,
    seller_id: &str,
    lines: &[LineRequest],
    products: &HashMap<i64, Product>,
    shipping: ShippingInfo,
    currency: &str,
    now: DateTime<Utc>,
) -> Result<NewOrder, OrderFlowError> {
    let mut requested = HashMap::<i64, i64>::new();
    for line in lines {
        let total = requested.entry(line.product_id).or_insert(0);
        *total = total.checked_add(line.quantity).ok_or(OrderFlowError::InvalidQuantity {
            product_id: line.product_id,
            quantity: line.quantity,
        })?;
    }
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = products.get(&line.product_id).ok_or(OrderFlowError::ProductNotFound(line.product_id))?;
        if product.seller_id != seller_id {
            return Err(OrderFlowError::SellerMismatch { product_id: product.id, seller_id: seller_id.to_string() });
        }
        let wanted = requested.get(&product.id).copied().unwrap_or(line.quantity);
        if wanted > product.available_quantity {
            return Err(OrderFlowError::OutOfStock {
                product_id: product.id,
                requested: wanted,
                available: product.available_quantity,
            });
        }
        let subtotal = product.unit_price.checked_mul(line.quantity)?;
        items.push(NewOrderItem {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity: line.quantity,
            subtotal,
        });
    }
    let total_amount = Money::checked_sum(items.iter().map(|i| i.subtotal))?;
    Ok(NewOrder {
        buyer_id: buyer_id.to_string(),
        seller_id: seller_id.to_string(),
        currency: currency.to_string(),
        items,
        total_amount,
        shipping,
        created_at: now,
    })
}
