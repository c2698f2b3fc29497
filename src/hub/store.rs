//! Hub implementation
//!
//! The central registry that tracks rooms and their clients and fans
//! published messages out to client mailboxes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::client::{heartbeat, writer, Client, ClientPhase};
use crate::stats::{HubStats, RoomStats};
use crate::transport::Transport;
use crate::wire::{HANDSHAKE_FRAME, STREAM_HEADERS};

use super::config::HubConfig;
use super::error::{HubError, SkippedClient};
use super::message::{ClientId, Message, RoomId};
use super::room::Room;

/// Central registry for all rooms and their subscribers
///
/// A single `RwLock` guards the whole map. Fan-out only holds the read lock
/// long enough to snapshot its targets; mailbox enqueues happen after the
/// lock is released.
pub struct Hub {
    /// Map of room id to room entry
    rooms: RwLock<HashMap<RoomId, Room>>,

    /// Configuration
    config: HubConfig,

    total_subscriptions: AtomicU64,
    messages_published: AtomicU64,
    deliveries: AtomicU64,
    skipped: AtomicU64,
}

impl Hub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            total_subscriptions: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Create a room
    ///
    /// No-op if the room already exists.
    pub async fn create_room(&self, room: &RoomId) {
        let mut rooms = self.rooms.write().await;

        if !rooms.contains_key(room) {
            rooms.insert(room.clone(), Room::new());
            tracing::info!(room = %room, "Room created");
        }
    }

    /// Subscribe a client to a room
    ///
    /// Writes the stream headers and handshake frame to `transport`, registers
    /// the client (creating the room if needed) and starts its writer,
    /// heartbeat and teardown tasks. The client's lifetime is a child of
    /// `parent`: cancelling `parent` disconnects it.
    pub async fn subscribe<T: Transport>(
        self: &Arc<Self>,
        room: &RoomId,
        client_id: ClientId,
        mut transport: T,
        parent: &CancellationToken,
    ) -> Result<Client, HubError> {
        if !transport.supports_streaming() {
            return Err(HubError::StreamingUnsupported);
        }

        if self.is_subscribed(room, &client_id).await {
            return Err(HubError::ClientAlreadySubscribed {
                room: room.clone(),
                client: client_id,
            });
        }

        for (name, value) in STREAM_HEADERS {
            transport.set_header(name, value);
        }
        transport
            .send(Bytes::from_static(HANDSHAKE_FRAME))
            .await
            .map_err(|e| HubError::Handshake(e.to_string()))?;

        let token = parent.child_token();
        let (client, mailbox) = Client::new(
            client_id,
            room.clone(),
            self.config.mailbox_capacity,
            token,
        );

        let connections = {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.entry(room.clone()).or_insert_with(Room::new);

            if !entry.insert(client.clone()) {
                return Err(HubError::ClientAlreadySubscribed {
                    room: room.clone(),
                    client: client.id().clone(),
                });
            }
            entry.len()
        };
        self.total_subscriptions.fetch_add(1, Ordering::Relaxed);

        let writer = tokio::spawn(writer::run(client.clone(), mailbox, transport));
        let heartbeat = tokio::spawn(heartbeat::run(
            client.clone(),
            self.config.heartbeat_interval,
        ));

        let hub = Arc::clone(self);
        let watched = client.clone();
        tokio::spawn(async move {
            watched.cancelled().await;
            watched.advance(ClientPhase::Closing);

            // Join the other tasks so none outlives the client
            let _ = writer.await;
            let _ = heartbeat.await;

            hub.unregister(&watched).await;
            watched.advance(ClientPhase::Closed);
        });

        client.advance(ClientPhase::Streaming);

        tracing::info!(
            room = %room,
            client = %client.id(),
            connections = connections,
            "Client subscribed"
        );

        Ok(client)
    }

    /// Unsubscribe a client
    ///
    /// Removes the client, deletes the room if it became empty and cancels the
    /// client's tasks. Returns false if the client was not registered.
    pub async fn unsubscribe(&self, room: &RoomId, client_id: &ClientId) -> bool {
        let removed = {
            let mut rooms = self.rooms.write().await;
            let Some(entry) = rooms.get_mut(room) else {
                return false;
            };
            let removed = entry.remove(client_id);
            if removed.is_some() && entry.is_empty() {
                rooms.remove(room);
                tracing::debug!(room = %room, "Room removed");
            }
            removed
        };

        match removed {
            Some(client) => {
                client.cancel();
                tracing::info!(room = %room, client = %client_id, "Client unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Remove a client whose cancellation fired
    ///
    /// Only removes the exact instance, so a late teardown cannot evict a newer
    /// client registered under the same id.
    pub(crate) async fn unregister(&self, client: &Client) -> bool {
        let room = client.room();
        let mut rooms = self.rooms.write().await;

        let Some(entry) = rooms.get_mut(room) else {
            return false;
        };
        if !entry.remove_instance(client) {
            return false;
        }
        let remaining = entry.len();
        if remaining == 0 {
            rooms.remove(room);
            tracing::debug!(room = %room, "Room removed");
        }

        tracing::info!(
            room = %room,
            client = %client.id(),
            remaining = remaining,
            "Client disconnected"
        );
        true
    }

    /// Publish a message to every client in a room
    ///
    /// Delivery is attempted for every client even if some mailboxes are
    /// full. Returns the number of clients the message was enqueued for, or
    /// `MailboxFull` listing the clients that were skipped.
    pub async fn publish(&self, room: &RoomId, msg: Message) -> Result<usize, HubError> {
        let targets: Vec<Client> = {
            let rooms = self.rooms.read().await;
            let entry = rooms
                .get(room)
                .ok_or_else(|| HubError::RoomNotFound(room.clone()))?;
            entry.clients().cloned().collect()
        };

        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.fan_out(&targets, msg)
    }

    /// Publish a message to every client in every room
    pub async fn broadcast(&self, msg: Message) -> Result<usize, HubError> {
        let targets: Vec<Client> = {
            let rooms = self.rooms.read().await;
            rooms
                .values()
                .flat_map(|entry| entry.clients().cloned())
                .collect()
        };

        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.fan_out(&targets, msg)
    }

    fn fan_out(&self, targets: &[Client], msg: Message) -> Result<usize, HubError> {
        let mut delivered = 0;
        let mut skipped = Vec::new();

        for client in targets {
            match client.try_enqueue(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        room = %client.room(),
                        client = %client.id(),
                        "Mailbox full, message skipped"
                    );
                    skipped.push(SkippedClient {
                        room: client.room().clone(),
                        client: client.id().clone(),
                    });
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        room = %client.room(),
                        client = %client.id(),
                        "Client closing, message skipped"
                    );
                }
            }
        }

        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.skipped.fetch_add(skipped.len() as u64, Ordering::Relaxed);

        if skipped.is_empty() {
            Ok(delivered)
        } else {
            Err(HubError::MailboxFull { delivered, skipped })
        }
    }

    async fn is_subscribed(&self, room: &RoomId, client_id: &ClientId) -> bool {
        let rooms = self.rooms.read().await;
        rooms.get(room).is_some_and(|entry| entry.contains(client_id))
    }

    /// Check if a room exists
    pub async fn has_room(&self, room: &RoomId) -> bool {
        self.rooms.read().await.contains_key(room)
    }

    /// Number of clients connected to a room (0 if absent)
    pub async fn room_connections(&self, room: &RoomId) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room).map(Room::len).unwrap_or(0)
    }

    /// Number of clients connected across all rooms
    pub async fn total_connections(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.values().map(Room::len).sum()
    }

    /// Ids of all current rooms, sorted
    pub async fn rooms(&self) -> Vec<RoomId> {
        let rooms = self.rooms.read().await;
        let mut ids: Vec<RoomId> = rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get statistics for a room
    pub async fn room_stats(&self, room: &RoomId) -> Option<RoomStats> {
        let rooms = self.rooms.read().await;
        rooms.get(room).map(|entry| entry.stats(room))
    }

    /// Get hub-wide statistics
    pub async fn stats(&self) -> HubStats {
        let (room_count, connections) = {
            let rooms = self.rooms.read().await;
            (rooms.len(), rooms.values().map(Room::len).sum::<usize>())
        };

        HubStats {
            rooms: room_count,
            connections,
            total_subscriptions: self.total_subscriptions.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
