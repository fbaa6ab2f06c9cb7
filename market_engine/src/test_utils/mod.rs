//! Helpers for tests that need a real database or a payment gateway.
mod fake_gateway;
pub mod prepare_env;

pub use fake_gateway::{FakeGateway, FAKE_WEBHOOK_SECRET};
