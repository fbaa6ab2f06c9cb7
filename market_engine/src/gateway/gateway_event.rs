use market_common::Money;
use serde::Deserialize;
use serde_json::Value;

use crate::gateway::GatewayError;

pub const PAYMENT_SUCCEEDED_KIND: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED_KIND: &str = "payment_intent.payment_failed";

/// A verified payment event, decoded once at the webhook boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    PaymentSucceeded { reference: String, amount: Money, currency: Option<String> },
    PaymentFailed { reference: String, reason: String },
    /// Any event kind the order flow does not act on. The raw payload is kept for logging.
    Unknown { kind: String, raw: Value },
}

impl GatewayEvent {
    pub fn payment_succeeded<S: Into<String>>(reference: S, amount: Money) -> Self {
        Self::PaymentSucceeded { reference: reference.into(), amount, currency: None }
    }

    pub fn payment_failed<S: Into<String>>(reference: S, reason: S) -> Self {
        Self::PaymentFailed { reference: reference.into(), reason: reason.into() }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::PaymentSucceeded { .. } => PAYMENT_SUCCEEDED_KIND,
            Self::PaymentFailed { .. } => PAYMENT_FAILED_KIND,
            Self::Unknown { kind, .. } => kind.as_str(),
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::PaymentSucceeded { reference, .. } | Self::PaymentFailed { reference, .. } => Some(reference),
            Self::Unknown { .. } => None,
        }
    }

    /// Decodes a gateway webhook payload of the form
    /// `{"type": "...", "data": {"object": {"id": "pi_...", "amount": 2000, "currency": "usd", ...}}}`.
    pub fn from_payload(payload: &[u8]) -> Result<Self, GatewayError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            data: Value,
        }
        #[derive(Deserialize)]
        struct Succeeded {
            id: String,
            amount: i64,
            currency: Option<String>,
        }
        #[derive(Deserialize)]
        struct Failed {
            id: String,
            last_payment_error: Option<PaymentError>,
        }
        #[derive(Deserialize)]
        struct PaymentError {
            message: Option<String>,
        }

        let raw: Value = serde_json::from_slice(payload).map_err(|e| GatewayError::MalformedEvent(e.to_string()))?;
        let envelope: Envelope =
            serde_json::from_value(raw.clone()).map_err(|e| GatewayError::MalformedEvent(e.to_string()))?;
        let object = envelope.data.get("object").cloned().unwrap_or(Value::Null);
        match envelope.kind.as_str() {
            PAYMENT_SUCCEEDED_KIND => {
                let o: Succeeded = serde_json::from_value(object)
                    .map_err(|e| GatewayError::MalformedEvent(format!("{PAYMENT_SUCCEEDED_KIND}: {e}")))?;
                let currency = o.currency.map(|c| c.to_ascii_lowercase());
                Ok(Self::PaymentSucceeded { reference: o.id, amount: Money::from(o.amount), currency })
            },
            PAYMENT_FAILED_KIND => {
                let o: Failed = serde_json::from_value(object)
                    .map_err(|e| GatewayError::MalformedEvent(format!("{PAYMENT_FAILED_KIND}: {e}")))?;
                let reason = o
                    .last_payment_error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "The payment was declined".to_string());
                Ok(Self::PaymentFailed { reference: o.id, reason })
            },
            _ => Ok(Self::Unknown { kind: envelope.kind, raw }),
        }
    }
}
