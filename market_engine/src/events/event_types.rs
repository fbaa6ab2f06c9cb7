use serde::{Deserialize, Serialize};

use crate::{
    db_types::{FullOrder, Order, OrderStatusType},
    traits::SettlementFault,
};

/// Emitted once an order has been stored and its payment intent issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: FullOrder,
}

impl OrderCreatedEvent {
    pub fn new(order: FullOrder) -> Self {
        Self { order }
    }
}

/// Emitted exactly once per order, when a successful payment is first settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: FullOrder,
}

impl OrderPaidEvent {
    pub fn new(order: FullOrder) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order: Order,
    pub reason: String,
}

impl PaymentFailedEvent {
    pub fn new(order: Order, reason: String) -> Self {
        Self { order, reason }
    }
}

/// Emitted after a seller-driven status change has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: FullOrder,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: FullOrder, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

/// Emitted when a payment event could not be applied and has been queued for an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFaultEvent {
    pub fault: SettlementFault,
}

impl SettlementFaultEvent {
    pub fn new(fault: SettlementFault) -> Self {
        Self { fault }
    }
}
