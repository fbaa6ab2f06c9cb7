use std::time::Duration;

use log::*;
use market_common::Secret;

const DEFAULT_API_URL: &str = "https://api.stripe.com";
const DEFAULT_SIGNATURE_TOLERANCE: u64 = 300;
const DEFAULT_TIMEOUT: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway's REST API, without a trailing slash.
    pub api_url: String,
    pub api_key: Secret<String>,
    /// Shared secret used to sign webhook deliveries.
    pub webhook_secret: Secret<String>,
    /// How far a webhook timestamp may be from the local clock before the delivery is rejected as a replay.
    pub signature_tolerance: Duration,
    /// Upper bound on any single call to the gateway API.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: Secret::default(),
            webhook_secret: Secret::default(),
            signature_tolerance: Duration::from_secs(DEFAULT_SIGNATURE_TOLERANCE),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MKT_GATEWAY_API_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("💳️ MKT_GATEWAY_API_URL not set, using {DEFAULT_API_URL} as default");
                DEFAULT_API_URL.to_string()
            });
        let api_key = Secret::new(std::env::var("MKT_GATEWAY_API_KEY").unwrap_or_else(|_| {
            warn!("💳️ MKT_GATEWAY_API_KEY not set, using (probably useless) default");
            "sk_test_0000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("MKT_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            error!(
                "💳️ MKT_GATEWAY_WEBHOOK_SECRET not set. Webhook deliveries will only verify if they are signed with \
                 the (insecure) default secret."
            );
            "whsec_0000000000".to_string()
        }));
        let tolerance = env_secs("MKT_GATEWAY_SIGNATURE_TOLERANCE", DEFAULT_SIGNATURE_TOLERANCE);
        let signature_tolerance = Duration::from_secs(tolerance);
        let timeout = Duration::from_secs(env_secs("MKT_GATEWAY_TIMEOUT", DEFAULT_TIMEOUT));
        Self { api_url, api_key, webhook_secret, signature_tolerance, timeout }
    }
}

fn env_secs(var: &str, default: u64) -> u64 {
    match std::env::var(var).ok().map(|s| s.parse::<u64>()) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!("💳️ {var} is not a valid number of seconds ({e}). Using {default}s instead.");
            default
        },
        None => default,
    }
}
