//! Identifier and message types for hub routing
//!
//! This module defines the keys used to address rooms and clients, and the
//! message that is fanned out to subscribers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a room
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Create a room id from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new random room id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier for a client, unique within its room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Create a client id from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new random client id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A unit of delivery
///
/// Cheap to clone relative to the fan-out width: the payload is cloned once
/// per subscriber mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// Event type tag (`event:` line)
    pub event: Option<String>,
    /// Message id (`id:` line)
    pub id: Option<String>,
    /// Payload, may contain embedded newlines
    pub data: String,
    /// Reconnection hint in milliseconds (`retry:` line)
    pub retry: Option<u64>,
}

impl Message {
    /// Create a message with only a payload
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event: None,
            id: None,
            data: data.into(),
            retry: None,
        }
    }

    /// Set the event type tag
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the message id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the retry hint
    pub fn with_retry(mut self, millis: u64) -> Self {
        self.retry = Some(millis);
        self
    }

    /// Keep-alive message enqueued by a client's heartbeat task
    pub fn heartbeat() -> Self {
        Self::new(format!("heartbeat {}", chrono::Utc::now().timestamp())).with_event("heartbeat")
    }

    /// Check whether this is a heartbeat message
    pub fn is_heartbeat(&self) -> bool {
        self.event.as_deref() == Some("heartbeat")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = RoomId::generate();
        let b = RoomId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);

        assert_ne!(ClientId::generate(), ClientId::generate());
    }

    #[test]
    fn test_message_builder() {
        let msg = Message::new("payload").with_event("message").with_id("7").with_retry(3000);

        assert_eq!(msg.event.as_deref(), Some("message"));
        assert_eq!(msg.id.as_deref(), Some("7"));
        assert_eq!(msg.data, "payload");
        assert_eq!(msg.retry, Some(3000));
        assert!(!msg.is_heartbeat());
    }

    #[test]
    fn test_heartbeat_message() {
        let msg = Message::heartbeat();
        assert!(msg.is_heartbeat());
        assert!(msg.data.starts_with("heartbeat "));
    }

    #[test]
    fn test_room_id_serializes_as_string() {
        let id = RoomId::new("lobby");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"lobby\"");
    }
}
