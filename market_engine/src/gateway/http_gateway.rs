use std::sync::Arc;

use log::*;
use market_common::Money;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    StatusCode,
};
use serde::Deserialize;

use crate::gateway::{
    GatewayConfig,
    GatewayError,
    GatewayEvent,
    IntentMetadata,
    PaymentGateway,
    PaymentIntent,
    WebhookVerifier,
};

/// A [`PaymentGateway`] backed by a Stripe-style REST API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    api_url: String,
    client: Arc<Client>,
    verifier: WebhookVerifier,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| GatewayError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        let verifier = WebhookVerifier::new(config.webhook_secret, config.signature_tolerance);
        Ok(Self { api_url: config.api_url, client: Arc::new(client), verifier })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }
}

impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, GatewayError> {
        #[derive(Deserialize)]
        struct IntentResponse {
            id: String,
            client_secret: String,
        }
        let url = self.url("/v1/payment_intents");
        let order_id = metadata.order_id.to_string();
        let params = [
            ("amount", amount.value().to_string()),
            ("currency", currency.to_ascii_lowercase()),
            ("metadata[order_id]", order_id),
            ("metadata[order_number]", metadata.order_number.clone()),
            ("metadata[buyer_id]", metadata.buyer_id.clone()),
            ("metadata[seller_id]", metadata.seller_id.clone()),
        ];
        debug!("💳️ Requesting payment intent for order {} ({amount} {currency})", metadata.order_number);
        let response = self
            .client
            .post(url)
            // A retried checkout for the same order must not create a second intent
            .header("Idempotency-Key", metadata.order_number.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            let intent = response.json::<IntentResponse>().await.map_err(|e| GatewayError::JsonError(e.to_string()))?;
            info!("💳️ Payment intent {} created for order {}", intent.id, metadata.order_number);
            Ok(PaymentIntent { id: intent.id, client_secret: intent.client_secret })
        } else {
            let message = response.text().await.unwrap_or_default();
            warn!("💳️ Payment intent request for order {} failed. {status}. {message}", metadata.order_number);
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(GatewayError::Unavailable(format!("{status}. {message}")))
            } else {
                Err(GatewayError::Rejected { status: status.as_u16(), message })
            }
        }
    }

    fn verify_event(&self, raw_payload: &[u8], signature: &str) -> Result<GatewayEvent, GatewayError> {
        self.verifier.verify(raw_payload, signature)?;
        GatewayEvent::from_payload(raw_payload)
    }
}
