//! Application wiring
//!
//! Builds the cache store, upstream client and proxy service from
//! [`Settings`](crate::config::Settings) and runs the HTTP server.

pub mod app;

pub use app::Application;
