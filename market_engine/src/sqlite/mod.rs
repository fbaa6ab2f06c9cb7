//! SQLite backend for the marketplace order engine.
//!
//! [`SqliteDatabase`] implements every trait in [`crate::traits`]. The [`db`] module holds the low-level query
//! functions it is built from.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
