//! # Observability
//!
//! Structured logging helpers. The client logs through `tracing` and never
//! installs a subscriber on its own.

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
