use std::str::FromStr;

use chrono::{DateTime, Utc};
use market_engine::{
    db_types::{LineRequest, Order, OrderStatusType, PaymentStatusType, ShippingInfo},
    order_objects::StatusUpdateExtras,
    traits::{OrderQueryFilter, SettlementOutcome},
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// The body of a checkout request. The buyer is whoever the access token belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub seller_id: String,
    pub items: Vec<LineRequest>,
    pub shipping: ShippingInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    /// Parsed at the boundary so that unknown values are reported as `InvalidStatus` rather than a JSON error.
    pub status: String,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StatusUpdateRequest {
    pub fn into_parts(self) -> Result<(OrderStatusType, StatusUpdateExtras), ServerError> {
        let status = OrderStatusType::from_str(self.status.trim())
            .map_err(|_| ServerError::InvalidStatus(self.status.clone()))?;
        let extras = StatusUpdateExtras { estimated_delivery: self.estimated_delivery, notes: self.notes };
        Ok((status, extras))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MyOrders {
    pub as_buyer: Vec<Order>,
    pub as_seller: Vec<Order>,
}

/// Query string for the admin order search. `status` is a comma-separated list, e.g. `?status=pending,processing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub buyer_id: Option<String>,
    pub seller_id: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter {
            buyer_id: params.buyer_id,
            seller_id: params.seller_id,
            since: params.since,
            until: params.until,
            ..Default::default()
        };
        if let Some(statuses) = params.status {
            for s in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status = OrderStatusType::from_str(s).map_err(|_| ServerError::InvalidStatus(s.to_string()))?;
                filter = filter.with_status(status);
            }
        }
        if let Some(s) = params.payment_status {
            let status =
                PaymentStatusType::from_str(s.trim()).map_err(|_| ServerError::InvalidStatus(s.to_string()))?;
            filter = filter.with_payment_status(status);
        }
        Ok(filter)
    }
}

/// What the payment webhook tells the gateway. It only ever reports receipt; the outcome is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    pub outcome: String,
    pub message: String,
}

impl From<&SettlementOutcome> for WebhookAck {
    fn from(outcome: &SettlementOutcome) -> Self {
        let kind = outcome.outcome_type().map(|t| t.to_string()).unwrap_or_else(|| "ignored".to_string());
        Self { success: true, outcome: kind, message: outcome.to_string() }
    }
}
