use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use market_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The fulfilment status of an order. Legal moves between these states are defined in [`crate::transitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created and is awaiting payment.
    Pending,
    /// Payment has been received and the seller is preparing the order.
    Processing,
    /// The seller has dispatched the order.
    Shipped,
    /// The buyer has received the order. Terminal.
    Delivered,
    /// The order was canceled. Terminal.
    Canceled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Processing => write!(f, "processing"),
            OrderStatusType::Shipped => write!(f, "shipped"),
            OrderStatusType::Delivered => write!(f, "delivered"),
            OrderStatusType::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   PaymentStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatusType {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl Display for PaymentStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatusType::Pending => write!(f, "pending"),
            PaymentStatusType::Paid => write!(f, "paid"),
            PaymentStatusType::Refunded => write!(f, "refunded"),
            PaymentStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------      OrderNumber      ---------------------------------------------------------
/// The human-facing order identifier, e.g. `ORD-20240612-0007`. Issued once at creation and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    /// Builds an order number from a calendar day and that day's sequence number.
    pub fn new(day: &str, seq: i64) -> Self {
        Self(format!("ORD-{day}-{seq:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

//--------------------------------------      ShippingInfo     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShippingInfo {
    #[sqlx(rename = "shipping_address")]
    pub address: String,
    #[sqlx(rename = "shipping_contact_name")]
    pub contact_name: String,
    #[sqlx(rename = "shipping_contact_phone")]
    pub contact_phone: String,
    #[sqlx(rename = "shipping_instructions")]
    #[serde(default)]
    pub instructions: Option<String>,
}

impl ShippingInfo {
    pub fn new<S: Into<String>>(address: S, contact_name: S, contact_phone: S) -> Self {
        Self {
            address: address.into(),
            contact_name: contact_name.into(),
            contact_phone: contact_phone.into(),
            instructions: None,
        }
    }

    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Returns the name of the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.address.trim().is_empty() {
            Some("shipping.address")
        } else if self.contact_name.trim().is_empty() {
            Some("shipping.contact_name")
        } else if self.contact_phone.trim().is_empty() {
            Some("shipping.contact_phone")
        } else {
            None
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub buyer_id: String,
    pub seller_id: String,
    pub total_amount: Money,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub payment_reference: Option<String>,
    #[sqlx(flatten)]
    pub shipping: ShippingInfo,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// Incremented on every change to the order row. Used for optimistic concurrency control.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
/// A line item snapshot. Name and unit price are copied from the catalog when the order is created.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub line_no: i64,
    pub product_id: i64,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

//--------------------------------------       OrderNote       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderNote {
    pub id: i64,
    pub order_id: i64,
    pub author: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       FullOrder       ---------------------------------------------------------
/// An order together with its line items and note log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub notes: Vec<OrderNote>,
}

impl FullOrder {
    /// `true` if the stored total equals the sum of the stored line subtotals, and each subtotal equals
    /// `unit_price × quantity`.
    pub fn totals_are_consistent(&self) -> bool {
        let lines_ok = self.items.iter().all(|i| i.unit_price.checked_mul(i.quantity).ok() == Some(i.subtotal));
        let sum = Money::checked_sum(self.items.iter().map(|i| i.subtotal)).ok();
        lines_ok && sum == Some(self.order.total_amount)
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

/// A fully priced order, ready to be stored. The order number is allocated by the database when it is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub buyer_id: String,
    pub seller_id: String,
    pub currency: String,
    pub items: Vec<NewOrderItem>,
    pub total_amount: Money,
    pub shipping: ShippingInfo,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      LineRequest      ---------------------------------------------------------
/// A requested line in a checkout: which product, and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub seller_id: String,
    pub name: String,
    pub unit_price: Money,
    pub available_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub seller_id: String,
    pub name: String,
    pub unit_price: Money,
    pub available_quantity: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(seller_id: S, name: S, unit_price: Money, available_quantity: i64) -> Self {
        Self { seller_id: seller_id.into(), name: name.into(), unit_price, available_quantity }
    }
}

//--------------------------------------  OrderStatusChange    ---------------------------------------------------------
/// A validated, human-driven status change, ready to be written with an optimistic version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusChange {
    pub order_id: i64,
    /// The version of the order that the change was validated against.
    pub expected_version: i64,
    pub new_status: OrderStatusType,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub note: Option<NewOrderNote>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderNote {
    pub author: String,
    pub note: String,
}

//--------------------------------------  SettlementOutcomeType --------------------------------------------------------
/// What happened to a payment event. Stored in the `settlement_journal` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcomeType {
    /// First successful settlement. Payment marked paid, order processing, stock decremented.
    Settled,
    /// First application of a payment failure.
    PaymentFailed,
    /// A redelivery of an event that has already been applied.
    Duplicate,
    /// A failure notification that arrived after the order was already paid.
    Stale,
    OrderNotFound,
    /// Settling would have pushed a product's available quantity below zero.
    Overbooked,
    AmountMismatch,
    IllegalTransition,
}

impl SettlementOutcomeType {
    /// Faults are outcomes that need an operator to follow up.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::OrderNotFound | Self::Overbooked | Self::AmountMismatch | Self::IllegalTransition)
    }
}

impl Display for SettlementOutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Settled => "settled",
            Self::PaymentFailed => "payment_failed",
            Self::Duplicate => "duplicate",
            Self::Stale => "stale",
            Self::OrderNotFound => "order_not_found",
            Self::Overbooked => "overbooked",
            Self::AmountMismatch => "amount_mismatch",
            Self::IllegalTransition => "illegal_transition",
        };
        f.write_str(s)
    }
}

//--------------------------------------   SettlementRecord    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: i64,
    pub payment_reference: String,
    pub order_id: Option<i64>,
    pub event_kind: String,
    pub outcome: SettlementOutcomeType,
    pub detail: Option<String>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSettlementRecord {
    pub payment_reference: String,
    pub order_id: Option<i64>,
    pub event_kind: String,
    pub outcome: SettlementOutcomeType,
    pub detail: Option<String>,
}

impl NewSettlementRecord {
    pub fn new<S: Into<String>>(reference: S, kind: S, outcome: SettlementOutcomeType) -> Self {
        Self { payment_reference: reference.into(), order_id: None, event_kind: kind.into(), outcome, detail: None }
    }

    pub fn with_order_id(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
