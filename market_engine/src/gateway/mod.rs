//! # Payment gateway client
//!
//! The engine talks to the external payment processor through the [`PaymentGateway`] trait. It needs exactly two
//! things from it: a payment intent for a new order, and verified, decoded webhook events.
//!
//! [`HttpPaymentGateway`] is the production implementation.
mod config;
mod errors;
mod gateway_event;
mod http_gateway;
mod signature;

pub use config::GatewayConfig;
pub use errors::GatewayError;
pub use gateway_event::{GatewayEvent, PAYMENT_FAILED_KIND, PAYMENT_SUCCEEDED_KIND};
pub use http_gateway::HttpPaymentGateway;
use market_common::Money;
use serde::{Deserialize, Serialize};
pub use signature::WebhookVerifier;

/// Identifies the order a payment intent belongs to. Sent to the gateway so that its events can be traced back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub order_id: i64,
    pub order_number: String,
    pub buyer_id: String,
    pub seller_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// The gateway's id for the intent. This becomes the order's payment reference.
    pub id: String,
    /// Handed to the buyer's client so it can complete the payment with the gateway directly.
    pub client_secret: String,
}

#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Asks the gateway to start collecting `amount` for an order.
    ///
    /// Connection failures, timeouts and 5xx responses are reported as [`GatewayError::Unavailable`], which callers
    /// should treat as retryable.
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Verifies the signature on a webhook delivery and decodes the event it carries.
    fn verify_event(&self, raw_payload: &[u8], signature: &str) -> Result<GatewayEvent, GatewayError>;
}
