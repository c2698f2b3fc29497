//! Hub configuration

use std::time::Duration;

/// Default mailbox capacity per client
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Shortest heartbeat interval the hub will run with
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Pending messages a client may hold before enqueues fail
    pub mailbox_capacity: usize,

    /// Interval between heartbeat frames; a heartbeat that cannot be
    /// enqueued disconnects the client
    pub heartbeat_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl HubConfig {
    /// Set the mailbox capacity (at least 1)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Set the heartbeat interval (at least [`MIN_HEARTBEAT_INTERVAL`])
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(MIN_HEARTBEAT_INTERVAL);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.mailbox_capacity, 64);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(25));
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .mailbox_capacity(8)
            .heartbeat_interval(Duration::from_millis(500));

        assert_eq!(config.mailbox_capacity, 8);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_heartbeat_interval_has_floor() {
        let config = HubConfig::default().heartbeat_interval(Duration::ZERO);
        assert_eq!(config.heartbeat_interval, MIN_HEARTBEAT_INTERVAL);
    }

    #[test]
    fn test_mailbox_capacity_has_floor() {
        let config = HubConfig::default().mailbox_capacity(0);
        assert_eq!(config.mailbox_capacity, 1);
    }
}
