//! Observability infrastructure for the data instrument core
//!
//! This crate provides structured logging via tracing.
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("data-instrument", LogFormat::Pretty)?;
//! ```

pub mod logging;

pub use logging::{init_from_config, init_logging, init_test_logging, LogFormat};
