//! Infrastructure concerns shared across the crate
//!
//! Tracing initialisation and the centralised log messages.

pub mod log_messages;
pub mod telemetry;

pub use telemetry::init_tracing;
