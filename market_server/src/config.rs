use std::env;

use log::*;
use market_common::{parse_boolean_flag, Secret};
use market_engine::{GatewayConfig, DEFAULT_CURRENCY};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::errors::ServerError;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8360;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;
const DEFAULT_SIGNATURE_HEADER: &str = "Stripe-Signature";
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// The currency every order is priced in. All catalog prices are in this currency's minor units.
    pub currency: String,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    /// The header the payment gateway puts its webhook signature in.
    pub signature_header: String,
    /// Capacity of each event hook's channel.
    pub event_buffer_size: usize,
    /// Run the database migrations at startup.
    pub auto_migrate: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            currency: DEFAULT_CURRENCY.to_string(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            auto_migrate: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = parse_env("MKT_PORT", DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let db_max_connections = parse_env("MKT_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
        let currency = env::var("MKT_CURRENCY")
            .map(|s| s.trim().to_ascii_lowercase())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let signature_header = env::var("MKT_SIGNATURE_HEADER")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());
        let event_buffer_size = parse_env("MKT_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let auto_migrate = parse_boolean_flag(env::var("MKT_AUTO_MIGRATE").ok(), true);
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            currency,
            auth,
            gateway,
            signature_header,
            event_buffer_size,
            auto_migrate,
        }
    }
}

fn parse_env<T>(var: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The shared secret used to sign and verify access tokens (HS256).
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since no externally issued token will validate. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("MKT_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [MKT_JWT_SECRET]")))?;
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "MKT_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub signature_header: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { signature_header: config.signature_header.clone() }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { signature_header: DEFAULT_SIGNATURE_HEADER.to_string() }
    }
}
