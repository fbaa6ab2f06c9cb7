//! # Marketplace order engine public API
//!
//! * [`order_flow_api`] is the order lifecycle engine: checkout, payment settlement and seller status updates.
//! * [`orders_api`] provides read access to orders and the settlement fault queue.
//!
//! The other submodules hold the request and response types, and the errors.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs, and
//! for the order flow, a payment gateway.
//!
//! ```rust,ignore
//! use market_engine::{events::EventProducers, HttpPaymentGateway, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let gateway = HttpPaymentGateway::new(GatewayConfig::new_from_env_or_default())?;
//! let api = OrderFlowApi::new(db, gateway, EventProducers::default());
//! let checkout = api.create_order("buyer-1", "seller-7", &items, shipping).await?;
//! ```
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod orders_api;
