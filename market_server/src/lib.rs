//! # Marketplace order server
//! This crate hosts the HTTP surface of the marketplace order engine. It is responsible for:
//! * Accepting checkouts from buyers and handing back the payment token for the gateway.
//! * Receiving payment webhook deliveries, verifying their signatures and passing them on for settlement.
//! * Letting sellers move their orders through the fulfilment states.
//! * Giving operators access to the settlement fault queue.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Routes that require a bearer token. See [routes](routes/index.html).
//! * `/webhook/payments`: The webhook route for payment gateway events.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
