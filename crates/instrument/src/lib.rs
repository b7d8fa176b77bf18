//! # Data Instrument Crate
//!
//! Repository and query layer for data instruments: the tradable contracts
//! (and continuous or virtual series) that belong to a data product.
//!
//! ## Key Components
//!
//! - **Domain Types**: `Instrument`, `NewInstrument`, `InstrumentWithOverlay`, `InstrumentWithProduct`
//! - **Traits**: `InstrumentStore` for storage abstraction over an ambient transaction
//! - **Filtering**: `InstrumentFilter` with a fixed allow-list of fields
//! - **Rolling**: `RollingSetResolver` selects the dated contracts of a month universe
//! - **In-Memory Store**: Default implementation for testing and development
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   Data Instrument Crate                   │
//! │  ┌──────────────────┐  ┌────────────────────────────────┐ │
//! │  │  Domain Types    │  │  InstrumentStore               │ │
//! │  │  Instrument      │  │  InstrumentFilter              │ │
//! │  │  Overlay groups  │  │  RollingSetResolver            │ │
//! │  └──────────────────┘  └────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │   InMemoryInstrumentStore │ PostgresInstrumentStore (db)  │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod filter;
pub mod months;
pub mod resolver;
pub mod store;
pub mod types;

#[cfg(feature = "postgres")]
pub mod db;

pub use config::MonthMatch;
pub use error::{InstrumentError, InstrumentResult};
pub use filter::{FilterField, FilterValue, InstrumentFilter, Predicate, ValueKind};
pub use months::MonthUniverse;
pub use resolver::{RollingSet, RollingSetResolver};
pub use store::{at_most_one, InMemoryInstrumentStore, InMemoryTx, InstrumentStore};
pub use types::{
    DataBlockStatus, DownloadJobStatus, IngestionJobStatus, Instrument, InstrumentId,
    InstrumentWithOverlay, InstrumentWithProduct, NewInstrument, ProductId, ProductInfo,
    ProductRecord,
};

#[cfg(feature = "postgres")]
pub use db::{PostgresInstrumentStore, connect, run_migrations};
