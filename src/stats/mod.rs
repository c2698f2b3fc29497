//! Statistics and metrics for the relay

pub mod metrics;

pub use metrics::{ClientStats, HubStats, RoomStats};
