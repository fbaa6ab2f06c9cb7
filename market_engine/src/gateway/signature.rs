//! Webhook signature verification.
//!
//! The gateway signs each delivery with a header of the form `t=<unix timestamp>,v1=<hex signature>`, where the
//! signature is `HMAC-SHA256(secret, "<timestamp>.<raw body>")`. More than one `v1` entry may be present while the
//! gateway is rolling its secret. Any one of them matching is enough.
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use market_common::Secret;
use sha2::Sha256;

use crate::gateway::GatewayError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Secret<String>,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: Secret<String>, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Checks `header` against `payload`, using the current time for the replay check.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), GatewayError> {
        self.verify_at(payload, header, Utc::now())
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: DateTime<Utc>) -> Result<(), GatewayError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => timestamp = Some(v),
                Some(("v1", v)) => signatures.push(v),
                _ => {},
            }
        }
        let timestamp = timestamp.ok_or_else(|| GatewayError::InvalidSignature("No timestamp".into()))?;
        if signatures.is_empty() {
            return Err(GatewayError::InvalidSignature("No v1 signature".into()));
        }
        let ts = timestamp
            .parse::<i64>()
            .map_err(|_| GatewayError::InvalidSignature(format!("Invalid timestamp: {timestamp}")))?;
        let age = now.timestamp().abs_diff(ts);
        if age > self.tolerance.as_secs() {
            return Err(GatewayError::InvalidSignature(format!("Timestamp is {age}s away from the local clock")));
        }
        let mac = self.mac_for(timestamp, payload)?;
        let matched = signatures
            .into_iter()
            .filter_map(|s| hex::decode(s).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());
        if matched {
            trace!("💳️ Webhook signature verified");
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature("Signature does not match".into()))
        }
    }

    /// Produces a signature header for `payload`, as the gateway would. Used for testing and tooling.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, GatewayError> {
        let ts = timestamp.to_string();
        let mac = self.mac_for(&ts, payload)?;
        Ok(format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn mac_for(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, GatewayError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.reveal().as_bytes())
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}
