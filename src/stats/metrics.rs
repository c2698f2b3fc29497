//! Statistics snapshots for the hub, its rooms and clients

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::client::ClientPhase;
use crate::hub::{ClientId, RoomId};

/// Per-client statistics
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    /// Client id
    pub client_id: ClientId,
    /// Lifecycle phase at snapshot time
    pub phase: ClientPhase,
    /// Wall-clock connection time
    pub connected_at: DateTime<Utc>,
    /// Time since the client was created
    #[serde(rename = "uptime_ms", serialize_with = "as_millis")]
    pub uptime: Duration,
    /// Time since the last frame was written
    #[serde(rename = "idle_ms", serialize_with = "as_millis")]
    pub idle: Duration,
    /// Frames written to the transport (excluding the handshake)
    pub frames_sent: u64,
    /// Bytes written to the transport (excluding the handshake)
    pub bytes_sent: u64,
    /// Messages that could not be enqueued
    pub dropped: u64,
    /// Messages waiting in the mailbox
    pub pending: usize,
}

/// Per-room statistics
#[derive(Debug, Clone, Serialize)]
pub struct RoomStats {
    /// Room id
    pub room_id: RoomId,
    /// Time since the room entry was created
    #[serde(rename = "age_ms", serialize_with = "as_millis")]
    pub age: Duration,
    /// Connected clients
    pub clients: Vec<ClientStats>,
}

impl RoomStats {
    /// Number of connected clients
    pub fn connections(&self) -> usize {
        self.clients.len()
    }
}

/// Hub-wide statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubStats {
    /// Rooms currently registered
    pub rooms: usize,
    /// Clients currently registered
    pub connections: usize,
    /// Subscriptions accepted since start
    pub total_subscriptions: u64,
    /// Publish and broadcast calls since start
    pub messages_published: u64,
    /// Successful mailbox enqueues since start
    pub deliveries: u64,
    /// Enqueues skipped because a mailbox was full
    pub skipped: u64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of attempted deliveries that were skipped
    pub fn skip_ratio(&self) -> f64 {
        let attempts = self.deliveries + self.skipped;
        if attempts > 0 {
            self.skipped as f64 / attempts as f64
        } else {
            0.0
        }
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_stats_new() {
        let stats = HubStats::new();
        assert_eq!(stats.rooms, 0);
        assert_eq!(stats.connections, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn test_skip_ratio() {
        let mut stats = HubStats::new();
        assert_eq!(stats.skip_ratio(), 0.0);

        stats.deliveries = 3;
        stats.skipped = 1;
        assert!((stats.skip_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_durations_serialize_as_millis() {
        let stats = RoomStats {
            room_id: RoomId::new("lobby"),
            age: Duration::from_millis(1500),
            clients: Vec::new(),
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["age_ms"], 1500);
        assert_eq!(json["room_id"], "lobby");
        assert_eq!(stats.connections(), 0);
    }
}
