//! Room entry
//!
//! Per-room state stored in the hub: the set of subscribed clients.

use std::collections::HashMap;
use std::time::Instant;

use crate::client::Client;
use crate::stats::RoomStats;

use super::message::{ClientId, RoomId};

/// Entry for a single room in the hub
pub struct Room {
    clients: HashMap<ClientId, Client>,
    created_at: Instant,
}

impl Room {
    pub(super) fn new() -> Self {
        Self {
            clients: HashMap::new(),
            created_at: Instant::now(),
        }
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    /// Iterate over registered clients
    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    /// Register a client; returns false if its id is taken
    pub(super) fn insert(&mut self, client: Client) -> bool {
        if self.clients.contains_key(client.id()) {
            return false;
        }
        self.clients.insert(client.id().clone(), client);
        true
    }

    /// Remove a client by id
    pub(super) fn remove(&mut self, id: &ClientId) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Remove this exact client instance
    ///
    /// A different client registered later under the same id is left alone.
    pub(super) fn remove_instance(&mut self, client: &Client) -> bool {
        match self.clients.get(client.id()) {
            Some(existing) if existing.same(client) => {
                self.clients.remove(client.id());
                true
            }
            _ => false,
        }
    }

    pub(super) fn stats(&self, room_id: &RoomId) -> RoomStats {
        RoomStats {
            room_id: room_id.clone(),
            age: self.created_at.elapsed(),
            clients: self.clients.values().map(Client::stats).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn client(id: &str) -> Client {
        Client::new(ClientId::new(id), RoomId::new("r"), 4, CancellationToken::new()).0
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut room = Room::new();

        assert!(room.insert(client("a")));
        assert!(!room.insert(client("a")));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_remove_instance_ignores_replacement() {
        let mut room = Room::new();
        let old = client("a");
        room.insert(old.clone());
        room.remove(old.id());

        let new = client("a");
        room.insert(new.clone());

        assert!(!room.remove_instance(&old));
        assert!(room.contains(new.id()));
        assert!(room.remove_instance(&new));
        assert!(room.is_empty());
    }

    #[test]
    fn test_stats() {
        let mut room = Room::new();
        room.insert(client("a"));
        room.insert(client("b"));

        let stats = room.stats(&RoomId::new("r"));
        assert_eq!(stats.connections(), 2);
    }
}
