//! HTTP surface
//!
//! An axum router over a [`RelayService`](crate::relay::RelayService),
//! plus the listener that serves it and drains open event streams on
//! shutdown.

pub mod auth;
pub mod config;
pub mod listener;
pub mod rate_limit;
pub mod routes;

pub use config::{ConfigError, RelayConfig};
pub use listener::RelayServer;
pub use rate_limit::RateLimiter;
pub use routes::{router, AppState};
