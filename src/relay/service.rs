//! Relay service
//!
//! Glue between the stores and the hub: room creation, listening, pushing
//! events and reading back history.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::Result;
use crate::hub::{ClientId, Hub, HubError, Message, RoomId};
use crate::store::{
    Event, EventPage, EventStore, InMemoryEventStore, InMemoryRoomDirectory, Pagination,
    RoomDirectory, RoomFilter, RoomInfo, StoreError,
};
use crate::transport::Transport;

use super::sanitize::sanitize;

/// Event type tag on relayed messages
pub const RELAY_EVENT: &str = "message";

/// Path a subscriber opens to listen to a room
pub fn room_link(room: &RoomId) -> String {
    format!("/api/v1/rooms/{}/events", room)
}

/// Outcome of relaying one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayReport {
    /// Id assigned by the event store
    pub event_id: i64,
    /// Clients the message was enqueued for
    pub delivered: usize,
    /// Clients whose mailbox was full
    pub skipped: usize,
}

/// Room-scoped relay on top of the hub and its stores
pub struct RelayService {
    hub: Arc<Hub>,
    events: Arc<dyn EventStore>,
    rooms: Arc<dyn RoomDirectory>,
}

impl RelayService {
    pub fn new(hub: Arc<Hub>, events: Arc<dyn EventStore>, rooms: Arc<dyn RoomDirectory>) -> Self {
        Self { hub, events, rooms }
    }

    /// Create a service backed by in-memory stores
    pub fn in_memory(hub: Arc<Hub>, max_events_per_room: usize) -> Self {
        Self::new(
            hub,
            Arc::new(InMemoryEventStore::with_capacity(max_events_per_room)),
            Arc::new(InMemoryRoomDirectory::new()),
        )
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Create a room and return it with its listen link
    pub async fn create_room(&self, name: &str, avatar: &str) -> Result<(RoomInfo, String)> {
        let room = RoomInfo {
            id: RoomId::generate(),
            name: name.to_string(),
            avatar: avatar.to_string(),
        };

        self.rooms.save_room(room.clone()).await?;
        self.hub.create_room(&room.id).await;

        let link = room_link(&room.id);
        tracing::info!(room = %room.id, name = %room.name, "Room registered");
        Ok((room, link))
    }

    pub async fn list_rooms(&self, filter: &RoomFilter) -> Result<Vec<RoomInfo>> {
        Ok(self.rooms.list(filter).await?)
    }

    /// Open a stream on `transport` for a new listener of `room`
    pub async fn listen<T: Transport>(
        &self,
        room: &RoomId,
        transport: T,
        parent: &CancellationToken,
    ) -> Result<Client> {
        self.ensure_room(room).await?;

        let client = self
            .hub
            .subscribe(room, ClientId::generate(), transport, parent)
            .await?;
        Ok(client)
    }

    /// Persist an event and fan it out to the room's listeners
    ///
    /// Credentials are stripped first. A store failure does not stop the
    /// live fan-out but is still returned to the caller. A room with no
    /// listeners reports zero deliveries.
    pub async fn relay(&self, room: &RoomId, mut event: Event) -> Result<RelayReport> {
        self.ensure_room(room).await?;
        sanitize(&mut event);

        let stored = self.events.save(room, &mut event).await;
        if let Err(e) = &stored {
            tracing::error!(room = %room, error = %e, "Failed to persist event");
        }

        let mut msg = Message::new(serde_json::to_string(&event)?).with_event(RELAY_EVENT);
        if stored.is_ok() {
            msg = msg.with_id(event.id.to_string());
        }

        let (delivered, skipped) = match self.hub.publish(room, msg).await {
            Ok(delivered) => (delivered, 0),
            Err(HubError::RoomNotFound(_)) => (0, 0),
            Err(HubError::MailboxFull { delivered, skipped }) => (delivered, skipped.len()),
            Err(e) => return Err(e.into()),
        };
        stored?;

        tracing::debug!(
            room = %room,
            event_id = event.id,
            delivered = delivered,
            skipped = skipped,
            "Event relayed"
        );

        Ok(RelayReport {
            event_id: event.id,
            delivered,
            skipped,
        })
    }

    /// Stored events for a room, newest first
    pub async fn list_events(&self, room: &RoomId, page: Pagination) -> Result<EventPage> {
        self.ensure_room(room).await?;

        let (events, has_more) = self.events.list(room, page).await?;
        Ok(EventPage {
            events,
            page: page.page(),
            size: page.size(),
            has_more,
        })
    }

    /// A room is known if the directory has it or the hub currently holds it
    async fn ensure_room(&self, room: &RoomId) -> Result<()> {
        match self.rooms.find_by_id(room).await {
            Ok(_) => Ok(()),
            Err(StoreError::RoomNotFound(_)) if self.hub.has_room(room).await => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
