use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{FullOrder, Order, OrderStatusType, PaymentStatusType, SettlementOutcomeType};

//--------------------------------------   SettlementOutcome   ---------------------------------------------------------
/// The result of applying one payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The payment was applied for the first time. The order is now paid and processing, and stock has been
    /// decremented.
    Settled(FullOrder),
    /// A payment failure was applied for the first time.
    PaymentFailed { order: Order, reason: String },
    /// The event had already been applied. Nothing changed.
    Duplicate { reference: String, order_id: i64, payment_status: PaymentStatusType },
    /// A failure notification arrived after the payment had already succeeded (or been refunded). Nothing changed.
    Stale { reference: String, order_id: i64, payment_status: PaymentStatusType },
    /// The event could not be applied and has been recorded for manual follow-up. Nothing changed.
    Fault(SettlementFault),
    /// The event kind is not one the order flow acts on.
    Ignored { kind: String },
}

impl SettlementOutcome {
    /// The journal outcome for this result. `Ignored` events are not journaled.
    pub fn outcome_type(&self) -> Option<SettlementOutcomeType> {
        match self {
            Self::Settled(_) => Some(SettlementOutcomeType::Settled),
            Self::PaymentFailed { .. } => Some(SettlementOutcomeType::PaymentFailed),
            Self::Duplicate { .. } => Some(SettlementOutcomeType::Duplicate),
            Self::Stale { .. } => Some(SettlementOutcomeType::Stale),
            Self::Fault(f) => Some(f.kind),
            Self::Ignored { .. } => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

impl Display for SettlementOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settled(order) => write!(f, "Order {} settled", order.order.order_number),
            Self::PaymentFailed { order, .. } => write!(f, "Payment failure recorded for order {}", order.order_number),
            Self::Duplicate { reference, .. } => write!(f, "Event for {reference} was already processed"),
            Self::Stale { reference, .. } => write!(f, "Stale event for {reference} ignored"),
            Self::Fault(fault) => write!(f, "Event for {} recorded for follow-up ({})", fault.reference, fault.kind),
            Self::Ignored { kind } => write!(f, "Event type {kind} ignored"),
        }
    }
}

//--------------------------------------    SettlementFault    ---------------------------------------------------------
/// A payment event that could not be applied. Faults are journaled and stay on the operator queue until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFault {
    pub journal_id: i64,
    pub reference: String,
    pub order_id: Option<i64>,
    pub kind: SettlementOutcomeType,
    pub detail: String,
}

//--------------------------------------   OrderQueryFilter    ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub buyer_id: Option<String>,
    pub seller_id: Option<String>,
    pub status: Option<Vec<OrderStatusType>>,
    pub payment_status: Option<PaymentStatusType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.buyer_id.is_none()
            && self.seller_id.is_none()
            && self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
            && self.payment_status.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn with_buyer_id<S: Into<String>>(mut self, buyer_id: S) -> Self {
        self.buyer_id = Some(buyer_id.into());
        self
    }

    pub fn with_seller_id<S: Into<String>>(mut self, seller_id: S) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatusType) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}
