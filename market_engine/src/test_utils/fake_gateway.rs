use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use market_common::{Money, Secret};
use serde_json::json;

use crate::gateway::{
    GatewayError,
    GatewayEvent,
    IntentMetadata,
    PaymentGateway,
    PaymentIntent,
    WebhookVerifier,
    PAYMENT_FAILED_KIND,
    PAYMENT_SUCCEEDED_KIND,
};

pub const FAKE_WEBHOOK_SECRET: &str = "whsec_fake_gateway_secret";

#[derive(Default)]
struct FakeGatewayState {
    offline: AtomicBool,
    counter: AtomicU64,
    requests: Mutex<Vec<(Money, String, IntentMetadata)>>,
}

/// An in-memory payment gateway. It issues predictable intent ids, can be taken offline, and signs webhook payloads
/// with [`FAKE_WEBHOOK_SECRET`].
#[derive(Clone)]
pub struct FakeGateway {
    verifier: WebhookVerifier,
    state: Arc<FakeGatewayState>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        let verifier = WebhookVerifier::new(Secret::new(FAKE_WEBHOOK_SECRET.to_string()), Duration::from_secs(300));
        Self { verifier, state: Arc::new(FakeGatewayState::default()) }
    }

    /// While offline, every intent request fails with [`GatewayError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// The number of intents that have been issued successfully.
    pub fn intents_created(&self) -> u64 {
        self.state.counter.load(Ordering::SeqCst)
    }

    /// Every successful intent request: amount, currency and metadata.
    pub fn requests(&self) -> Vec<(Money, String, IntentMetadata)> {
        self.state.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// A signature header for `payload`, timestamped now.
    pub fn sign(&self, payload: &[u8]) -> String {
        self.verifier.sign(payload, chrono::Utc::now().timestamp()).expect("HMAC accepts any key length")
    }

    pub fn succeeded_payload(reference: &str, amount: Money) -> Vec<u8> {
        json!({
            "id": format!("evt_{}", rand::random::<u32>()),
            "type": PAYMENT_SUCCEEDED_KIND,
            "data": { "object": { "id": reference, "amount": amount.value(), "currency": "usd" } }
        })
        .to_string()
        .into_bytes()
    }

    pub fn failed_payload(reference: &str, reason: &str) -> Vec<u8> {
        json!({
            "id": format!("evt_{}", rand::random::<u32>()),
            "type": PAYMENT_FAILED_KIND,
            "data": { "object": { "id": reference, "last_payment_error": { "message": reason } } }
        })
        .to_string()
        .into_bytes()
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, GatewayError> {
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("Connection refused (fake gateway is offline)".into()));
        }
        let n = self.state.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut requests) = self.state.requests.lock() {
            requests.push((amount, currency.to_string(), metadata.clone()));
        }
        let id = format!("pi_test_{}_{n}", metadata.order_id);
        let client_secret = format!("{id}_secret_{:016x}", rand::random::<u64>());
        Ok(PaymentIntent { id, client_secret })
    }

    fn verify_event(&self, raw_payload: &[u8], signature: &str) -> Result<GatewayEvent, GatewayError> {
        self.verifier.verify(raw_payload, signature)?;
        GatewayEvent::from_payload(raw_payload)
    }
}
