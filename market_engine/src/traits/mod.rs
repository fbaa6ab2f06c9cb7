//! #  Database management and control.
//!
//! This module defines the interface contracts that database *backends* must fulfil in order to back the marketplace
//! order engine.
//!
//! ## Orders and settlement
//! An order is created in a single atomic step (order number allocation, line item snapshots and the order row
//! itself). Later, payment events from the gateway are applied to the order through the settlement methods of
//! [`MarketplaceDatabase`]. These must apply the payment status change, the `pending -> processing` status change and
//! every stock decrement as one unit of work, and must be idempotent with respect to the payment reference.
//!
//! ## Traits
//! * [`MarketplaceDatabase`] defines the highest level of behaviour for backends: creating orders, settling payments
//!   and applying seller status changes.
//! * [`OrderManagement`] provides read-only queries over orders, their line items and note logs.
//! * [`CatalogManagement`] provides the minimal product catalog access that the order flow needs.
mod catalog_management;
mod data_objects;
mod marketplace_database;
mod order_management;

pub use catalog_management::CatalogManagement;
pub use data_objects::{OrderQueryFilter, SettlementFault, SettlementOutcome};
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use order_management::OrderManagement;
