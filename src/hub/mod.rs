//! Room registry and fan-out
//!
//! The hub tracks which clients are subscribed to which room and delivers
//! published messages to every subscriber's mailbox.
//!
//! # Architecture
//!
//! ```text
//!                            Arc<Hub>
//!                 ┌─────────────────────────────┐
//!                 │ rooms: RwLock<HashMap<      │
//!                 │   RoomId, Room {            │
//!                 │     clients: HashMap<       │
//!                 │       ClientId, Client>,    │
//!                 │   }                         │
//!                 │ >>                          │
//!                 └──────────────┬──────────────┘
//!                                │ snapshot under read lock
//!         ┌──────────────────────┼──────────────────────┐
//!         ▼                      ▼                      ▼
//!     [mailbox]              [mailbox]              [mailbox]
//!     try_send               try_send               try_send
//!         │                      │                      │
//!      writer ──► Transport   writer ──► Transport   writer ──► Transport
//! ```
//!
//! # Backpressure
//!
//! Publishing never waits on a subscriber. A full mailbox causes that client
//! to miss the message and is reported back to the publisher; the client's
//! heartbeat later finds the same full mailbox and disconnects it.
//!
//! Rooms exist while they have at least one client. A room created
//! explicitly with [`Hub::create_room`] lives until its last client leaves.

pub mod config;
pub mod error;
pub mod message;
pub mod room;
pub mod store;

pub use config::{
    HubConfig, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAILBOX_CAPACITY, MIN_HEARTBEAT_INTERVAL,
};
pub use error::{HubError, SkippedClient};
pub use message::{ClientId, Message, RoomId};
pub use room::Room;
pub use store::Hub;
