//! In-memory store implementations
//!
//! Nothing survives a restart. Each map sits behind a single lock so that
//! id assignment and append happen together under concurrent writers.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::hub::RoomId;

use super::{Event, EventStore, Pagination, RoomDirectory, RoomFilter, RoomInfo, StoreError};

/// Default number of events retained per room
pub const DEFAULT_MAX_EVENTS_PER_ROOM: usize = 1000;

struct EventLog {
    next_id: i64,
    rooms: HashMap<RoomId, VecDeque<Event>>,
}

/// Event store keeping a bounded history per room
pub struct InMemoryEventStore {
    log: Mutex<EventLog>,
    max_per_room: usize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS_PER_ROOM)
    }

    /// Create a store that keeps at most `max_per_room` events per room
    pub fn with_capacity(max_per_room: usize) -> Self {
        Self {
            log: Mutex::new(EventLog {
                next_id: 1,
                rooms: HashMap::new(),
            }),
            max_per_room: max_per_room.max(1),
        }
    }

    /// Number of events currently retained for a room
    pub async fn len(&self, room: &RoomId) -> usize {
        let log = self.log.lock().await;
        log.rooms.get(room).map(VecDeque::len).unwrap_or(0)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save(&self, room: &RoomId, event: &mut Event) -> Result<(), StoreError> {
        let mut log = self.log.lock().await;

        event.id = log.next_id;
        log.next_id += 1;
        event.created_at = Utc::now();

        let max = self.max_per_room;
        let history = log.rooms.entry(room.clone()).or_default();
        history.push_back(event.clone());
        while history.len() > max {
            history.pop_front();
        }

        Ok(())
    }

    async fn list(
        &self,
        room: &RoomId,
        page: Pagination,
    ) -> Result<(Vec<Event>, bool), StoreError> {
        let log = self.log.lock().await;
        let Some(history) = log.rooms.get(room) else {
            return Ok((Vec::new(), false));
        };

        let offset = page.offset();
        let size = page.size();
        let events: Vec<Event> = history.iter().rev().skip(offset).take(size).cloned().collect();
        let has_more = history.len() > offset.saturating_add(size);

        Ok((events, has_more))
    }
}

/// Room directory backed by a map
#[derive(Default)]
pub struct InMemoryRoomDirectory {
    rooms: RwLock<HashMap<RoomId, RoomInfo>>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn save_room(&self, room: RoomInfo) -> Result<(), StoreError> {
        self.rooms.write().await.insert(room.id.clone(), room);
        Ok(())
    }

    async fn find_by_id(&self, id: &RoomId) -> Result<RoomInfo, StoreError> {
        self.rooms
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::RoomNotFound(id.clone()))
    }

    async fn list(&self, filter: &RoomFilter) -> Result<Vec<RoomInfo>, StoreError> {
        let rooms = self.rooms.read().await;
        let mut list: Vec<RoomInfo> =
            rooms.values().filter(|r| filter.matches(r)).cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn delete_by_id(&self, id: &RoomId) -> Result<(), StoreError> {
        match self.rooms.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::RoomNotFound(id.clone())),
        }
    }
}
