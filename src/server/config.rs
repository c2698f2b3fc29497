//! Server configuration

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::hub::{HubConfig, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAILBOX_CAPACITY};
use crate::server::rate_limit::{RateLimiter, DEFAULT_REQUESTS_PER_SECOND};
use crate::store::memory::DEFAULT_MAX_EVENTS_PER_ROOM;

/// Prefix of the environment variables read by [`RelayConfig::load`]
pub const ENV_PREFIX: &str = "RELAY";

/// Error loading or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Environment could not be read or parsed
    Load(config::ConfigError),
    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(e) => write!(f, "Failed to load configuration: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Load(e)
    }
}

/// Relay server configuration
///
/// Every field can be set from the environment as `RELAY_<FIELD>`, e.g.
/// `RELAY_PORT=9000` or `RELAY_SECRET_KEY=...`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// IP address to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Shared secret required on the push endpoint (None = no check)
    pub secret_key: Option<String>,

    /// Pending messages per listener before it starts missing events
    pub mailbox_capacity: usize,

    /// Seconds between heartbeat frames
    pub heartbeat_interval_secs: u64,

    /// Events kept per room by the in-memory store
    pub max_events_per_room: usize,

    /// Seconds between hub statistics log lines (0 = disabled)
    pub stats_interval_secs: u64,

    /// Requests per second allowed per client IP and endpoint (0 = unlimited)
    pub rate_limit_per_second: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            secret_key: None,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
            max_events_per_room: DEFAULT_MAX_EVENTS_PER_ROOM,
            stats_interval_secs: 60,
            rate_limit_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

impl RelayConfig {
    /// Load configuration from the environment
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Unset variables keep their defaults.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: RelayConfig = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox_capacity must be at least 1".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_secs must be at least 1".into(),
            ));
        }
        if self.max_events_per_room == 0 {
            return Err(ConfigError::Invalid(
                "max_events_per_room must be at least 1".into(),
            ));
        }
        if matches!(&self.secret_key, Some(key) if key.is_empty()) {
            return Err(ConfigError::Invalid("secret_key must not be empty".into()));
        }
        Ok(())
    }

    /// Socket address to bind to
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            ConfigError::Invalid(format!("host is not an IP address: {}", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.host = addr.ip().to_string();
        self.port = addr.port();
        self
    }

    /// Require a shared secret on the push endpoint
    pub fn secret_key(mut self, secret: impl Into<String>) -> Self {
        self.secret_key = Some(secret.into());
        self
    }

    /// Set the per-listener mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the heartbeat interval (whole seconds)
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_secs = interval.as_secs();
        self
    }

    /// Set the per-room event history limit
    pub fn max_events_per_room(mut self, max: usize) -> Self {
        self.max_events_per_room = max;
        self
    }

    /// Set the per-client request rate (0 = unlimited)
    pub fn rate_limit_per_second(mut self, limit: u32) -> Self {
        self.rate_limit_per_second = limit;
        self
    }

    /// Request limiter for this configuration, if enabled
    pub fn rate_limiter(&self) -> Option<RateLimiter> {
        let limit = self.rate_limit_per_second;
        (limit > 0).then(|| RateLimiter::per_second(limit))
    }

    /// Interval for periodic statistics logging, if enabled
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }

    /// Hub settings derived from this configuration
    pub fn hub_config(&self) -> HubConfig {
        HubConfig::default()
            .mailbox_capacity(self.mailbox_capacity)
            .heartbeat_interval(Duration::from_secs(self.heartbeat_interval_secs))
    }
}
