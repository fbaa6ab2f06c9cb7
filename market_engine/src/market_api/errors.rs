use market_common::MoneyError;
use thiserror::Error;

use crate::{
    db_types::{OrderNumber, OrderStatusType},
    gateway::GatewayError,
    transitions::IllegalTransition,
    traits::MarketplaceError,
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {product_id} is not sold by {seller_id}")]
    SellerMismatch { product_id: i64, seller_id: String },
    #[error("Product {product_id} is out of stock. {requested} requested, but only {available} available")]
    OutOfStock { product_id: i64, requested: i64, available: i64 },
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Invalid quantity {quantity} for product {product_id}. Quantities must be greater than zero")]
    InvalidQuantity { product_id: i64, quantity: i64 },
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    #[error("Order {order_number} cannot be paid for while it is {status}")]
    NotPayable { order_number: OrderNumber, status: OrderStatusType },
    #[error("Order {0} was modified by someone else. Please reload it and try again")]
    Conflict(i64),
    #[error("A payment has already been initiated for order {0}")]
    PaymentAlreadyInitiated(i64),
    #[error("The payment provider is unavailable. Please try again later. {0}")]
    GatewayUnavailable(String),
    #[error("The payment provider refused the request. {0}")]
    GatewayFailure(String),
    #[error("Settlement fault {0} does not exist or has already been resolved")]
    FaultNotFound(i64),
    #[error("Order total could not be calculated. {0}")]
    AmountOverflow(#[from] MoneyError),
    #[error("Order {0} failed its total consistency check")]
    InconsistentTotals(OrderNumber),
}

impl OrderFlowError {
    /// A stable, machine-readable name for the error, suitable for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "InternalError",
            Self::Forbidden(_) => "Forbidden",
            Self::OrderNotFound(_) => "NotFound",
            Self::ProductNotFound(_) => "ProductNotFound",
            Self::SellerMismatch { .. } => "ValidationError",
            Self::OutOfStock { .. } => "OutOfStock",
            Self::EmptyOrder => "ValidationError",
            Self::InvalidQuantity { .. } => "ValidationError",
            Self::MissingField(_) => "MissingField",
            Self::IllegalTransition(_) => "IllegalTransition",
            Self::NotPayable { .. } => "NotPayable",
            Self::Conflict(_) => "Conflict",
            Self::PaymentAlreadyInitiated(_) => "PaymentAlreadyInitiated",
            Self::GatewayUnavailable(_) => "GatewayUnavailable",
            Self::GatewayFailure(_) => "GatewayFailure",
            Self::FaultNotFound(_) => "NotFound",
            Self::AmountOverflow(_) => "ValidationError",
            Self::InconsistentTotals(_) => "InternalError",
        }
    }

    /// `true` if the same request may succeed when repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::GatewayUnavailable(_))
    }
}

impl From<MarketplaceError> for OrderFlowError {
    fn from(e: MarketplaceError) -> Self {
        match e {
            MarketplaceError::OrderNotFound(id) => Self::OrderNotFound(id),
            MarketplaceError::ProductNotFound(id) => Self::ProductNotFound(id),
            MarketplaceError::VersionConflict { order_id, .. } => Self::Conflict(order_id),
            MarketplaceError::PaymentAlreadyInitiated(id) => Self::PaymentAlreadyInitiated(id),
            MarketplaceError::FaultNotFound(id) => Self::FaultNotFound(id),
            MarketplaceError::AmountError(e) => Self::AmountOverflow(e),
            MarketplaceError::DatabaseError(s) => Self::DatabaseError(s),
            MarketplaceError::InvalidData(s) => Self::DatabaseError(s),
        }
    }
}

impl From<GatewayError> for OrderFlowError {
    fn from(e: GatewayError) -> Self {
        if e.is_retryable() {
            Self::GatewayUnavailable(e.to_string())
        } else {
            Self::GatewayFailure(e.to_string())
        }
    }
}
