//! Access tokens for the marketplace API.
//!
//! Users authenticate elsewhere. Requests to `/api` carry a short-lived HS256 JWT in the `Authorization` header, which
//! names the user (`sub`) and the roles they act in. The [`crate::middleware::JwtMiddlewareFactory`] validates the
//! token and places the [`JwtClaims`] in the request extensions, where handlers and the ACL middleware pick them up.
use std::{
    fmt::Display,
    future::{ready, Ready},
    time::Duration,
};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "buyer"),
            Role::Seller => write!(f, "seller"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: String,
    pub roles: Vec<Role>,
    /// Expiry, in seconds since the Unix epoch
    pub exp: i64,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(sub: S, roles: &[Role], valid_for: Duration) -> Self {
        let exp = Utc::now().timestamp().saturating_add(valid_for.as_secs() as i64);
        Self { sub: sub.into(), roles: roles.to_vec(), exp }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::NotAuthenticated)))
    }
}

/// Checks access tokens against the server's signing secret.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::ValidationError(e.to_string()),
            _ => AuthError::PoorlyFormattedToken(e.to_string()),
        })?;
        trace!("🔐️ Access token validated for {}", data.claims.sub);
        Ok(data.claims)
    }
}

/// Issues access tokens. Token issuance belongs to the identity service, so this is only used by operator tooling and
/// tests.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key }
    }

    /// Issue a new access token for `sub` with the given roles. The token is valid for a day unless `duration` says
    /// otherwise.
    pub fn issue_token(&self, sub: &str, roles: &[Role], duration: Option<Duration>) -> Result<String, AuthError> {
        let claims = JwtClaims::new(sub, roles, duration.unwrap_or(DEFAULT_TOKEN_LIFETIME));
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key).map_err(|e| AuthError::TokenCreation(e.to_string()))
    }
}
