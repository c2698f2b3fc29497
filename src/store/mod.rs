//! Event history and room directory
//!
//! The hub only knows about rooms that currently have listeners. These two
//! collaborators hold the longer-lived records: the rooms that were created
//! and the events that were pushed into them.
//!
//! Both are traits so the relay can run against any backend; in-memory
//! implementations live in [`memory`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hub::RoomId;

pub mod memory;

pub use memory::{InMemoryEventStore, InMemoryRoomDirectory};

/// Default number of events per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: usize = 100;

/// Error type for store operations
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Room is not known to the directory
    RoomNotFound(RoomId),
    /// Backend failure
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::RoomNotFound(room) => write!(f, "Room not found: {}", room),
            StoreError::Backend(msg) => write!(f, "Store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// A room record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub avatar: String,
}

/// Multi-valued string map, as used for headers and query parameters
pub type MultiMap = BTreeMap<String, Vec<String>>;

/// An inbound request captured for relaying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by the event store; 0 until saved
    pub id: i64,
    pub method: String,
    #[serde(rename = "header")]
    pub headers: MultiMap,
    pub query_params: MultiMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Create an unsaved event for a request method
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: 0,
            method: method.into(),
            headers: MultiMap::new(),
            query_params: MultiMap::new(),
            body: None,
            created_at: Utc::now(),
        }
    }

    /// Append a header value
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Append a query parameter value
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Decode a raw request body
    ///
    /// Empty bodies are dropped, JSON bodies are kept as structured values
    /// and anything else is stored as a (lossy UTF-8) string.
    pub fn body_from_bytes(raw: &[u8]) -> Option<serde_json::Value> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match serde_json::from_slice(raw) {
            Ok(value) => Some(value),
            Err(_) => Some(serde_json::Value::String(
                String::from_utf8_lossy(raw).into_owned(),
            )),
        }
    }
}

/// Filter for listing rooms
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomFilter {
    /// Case-insensitive substring of the room name
    pub name: Option<String>,
}

impl RoomFilter {
    pub fn matches(&self, room: &RoomInfo) -> bool {
        match &self.name {
            Some(name) => room.name.to_lowercase().contains(&name.to_lowercase()),
            None => true,
        }
    }
}

/// Page request for event history
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl Pagination {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
        }
    }

    /// 1-based page number
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, defaulted and capped
    pub fn size(&self) -> usize {
        match self.size {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(size) => size.min(MAX_PAGE_SIZE),
        }
    }

    /// Number of events to skip
    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.size())
    }
}

/// One page of stored events, newest first
#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub page: usize,
    pub size: usize,
    pub has_more: bool,
}

/// Persistent history of relayed events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist an event, assigning its id and creation time
    ///
    /// Any id already set on `event` is overwritten.
    async fn save(&self, room: &RoomId, event: &mut Event) -> Result<(), StoreError>;

    /// List events newest first; the flag is true when older events remain
    async fn list(
        &self,
        room: &RoomId,
        page: Pagination,
    ) -> Result<(Vec<Event>, bool), StoreError>;
}

/// Registry of created rooms
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn save_room(&self, room: RoomInfo) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &RoomId) -> Result<RoomInfo, StoreError>;

    async fn list(&self, filter: &RoomFilter) -> Result<Vec<RoomInfo>, StoreError>;

    async fn delete_by_id(&self, id: &RoomId) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_bounds() {
        let p = Pagination::default();
        assert_eq!((p.page(), p.size(), p.offset()), (1, 20, 0));

        let p = Pagination::new(0, 500);
        assert_eq!((p.page(), p.size()), (1, 100));

        let p = Pagination::new(3, 10);
        assert_eq!(p.offset(), 20);

        let p = Pagination::new(2, 0);
        assert_eq!(p.size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_body_from_bytes() {
        assert_eq!(Event::body_from_bytes(b""), None);
        assert_eq!(Event::body_from_bytes(b"  \n"), None);
        assert_eq!(
            Event::body_from_bytes(br#"{"a":1}"#),
            Some(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            Event::body_from_bytes(b"plain text"),
            Some(serde_json::Value::String("plain text".into()))
        );
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::new("POST")
            .with_header("Content-Type", "application/json")
            .with_query("ref", "main");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["method"], "POST");
        assert_eq!(json["header"]["Content-Type"][0], "application/json");
        assert_eq!(json["query_params"]["ref"][0], "main");
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_room_filter() {
        let room = RoomInfo {
            id: RoomId::new("r"),
            name: "Deploy Hooks".into(),
            avatar: String::new(),
        };

        assert!(RoomFilter::default().matches(&room));
        assert!(RoomFilter { name: Some("deploy".into()) }.matches(&room));
        assert!(!RoomFilter { name: Some("billing".into()) }.matches(&room));
    }
}
