//! # Order status transitions
//!
//! The single authority on which order status changes are legal. Both the seller-driven status update and the
//! payment settlement flow consult this table, so the two can never disagree on what is allowed.
//!
//! | From \ To  | pending | processing | shipped | delivered | canceled |
//! |------------|---------|------------|---------|-----------|----------|
//! | pending    |         | ✓          |         |           | ✓        |
//! | processing |         |            | ✓       |           | ✓        |
//! | shipped    |         |            |         | ✓         | ✓        |
//! | delivered  |         |            |         |           |          |
//! | canceled   |         |            |         |           |          |
use thiserror::Error;

use crate::db_types::OrderStatusType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("An order cannot move from {from} to {to}")]
pub struct IllegalTransition {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
}

/// The states that `current` may legally move to.
pub fn legal_next_states(current: OrderStatusType) -> &'static [OrderStatusType] {
    use OrderStatusType::*;
    match current {
        Pending => &[Processing, Canceled],
        Processing => &[Shipped, Canceled],
        Shipped => &[Delivered, Canceled],
        Delivered | Canceled => &[],
    }
}

pub fn is_legal_transition(current: OrderStatusType, next: OrderStatusType) -> bool {
    legal_next_states(current).contains(&next)
}

/// Like [`is_legal_transition`], but returns an error naming both states when the move is not allowed.
pub fn check_transition(current: OrderStatusType, next: OrderStatusType) -> Result<(), IllegalTransition> {
    if is_legal_transition(current, next) {
        Ok(())
    } else {
        Err(IllegalTransition { from: current, to: next })
    }
}
