//! Marketplace Order Engine
//!
//! This library contains the order lifecycle and payment settlement logic for the marketplace. Buyers check out
//! against a seller's catalog, pay through an external payment gateway, and the gateway's asynchronous webhook events
//! settle the order exactly once.
//!
//! The library is divided into these main sections:
//! 1. Database management ([`mod@traits`] and the SQLite backend). You should never need to access the database
//!    directly. Instead, use the public API. The exception is the data types used in the database. These are defined
//!    in the [`mod@db_types`] module and are public.
//! 2. The public API ([`OrderFlowApi`] and [`OrdersApi`]). Backends need to implement the traits in [`mod@traits`] in
//!    order to back the API.
//! 3. The payment gateway client ([`mod@gateway`]), which creates payment intents and verifies webhook deliveries.
//! 4. The status transition table ([`mod@transitions`]), which both seller updates and settlement go through.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when certain actions
//! occur. For example, when a payment settles an order for the first time, an `OrderPaidEvent` is emitted.
pub mod db_types;
pub mod events;
pub mod gateway;
mod market_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;
pub mod transitions;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use gateway::{GatewayConfig, GatewayError, GatewayEvent, HttpPaymentGateway, PaymentGateway};
pub use market_api::{
    errors::OrderFlowError,
    order_flow_api::{OrderFlowApi, DEFAULT_CURRENCY},
    order_objects,
    orders_api::OrdersApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use traits::{CatalogManagement, MarketplaceDatabase, MarketplaceError, OrderManagement};
