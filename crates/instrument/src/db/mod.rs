//! Database layer for instrument storage.
//!
//! PostgreSQL-backed implementation of the `InstrumentStore` trait, plus
//! pool setup and schema migration.

pub mod models;
pub mod postgres;

pub use models::{InstrumentOverlayRow, InstrumentProductRow, InstrumentRow};
pub use postgres::{connect, run_migrations, PostgresInstrumentStore};
