//! Room-based server-sent events relay
//!
//! Requests pushed to a room are recorded and streamed, as event-stream
//! frames, to every listener currently connected to that room.
//!
//! ```text
//!   POST /api/v1/rooms/:id/push           GET /api/v1/rooms/:id/events
//!              │                                     ▲
//!              ▼                                     │ frames
//!        RelayService ──save──► EventStore           │
//!              │                                     │
//!              └──publish──► Hub ──try_send──► Client mailbox ──► writer
//! ```
//!
//! The [`Hub`] can also be used on its own with any [`Transport`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use sse_relay::{ChannelTransport, ClientId, Hub, Message, RoomId};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = Arc::new(Hub::new());
//! let room = RoomId::new("lobby");
//! let (transport, mut frames) = ChannelTransport::new(16);
//!
//! let client = hub
//!     .subscribe(&room, ClientId::generate(), transport, &CancellationToken::new())
//!     .await?;
//! hub.publish(&room, Message::new("hello").with_event("greeting")).await?;
//!
//! while let Some(frame) = frames.recv().await {
//!     print!("{}", String::from_utf8_lossy(&frame));
//! }
//! client.cancel();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod hub;
pub mod relay;
pub mod server;
pub mod stats;
pub mod store;
pub mod transport;
pub mod wire;

pub use client::{Client, ClientPhase};
pub use error::{Error, Result};
pub use hub::{ClientId, Hub, HubConfig, HubError, Message, RoomId};
pub use relay::{RelayReport, RelayService};
pub use server::{RelayConfig, RelayServer};
pub use stats::{ClientStats, HubStats, RoomStats};
pub use store::{Event, EventStore, RoomDirectory, RoomInfo, StoreError};
pub use transport::{ChannelTransport, FrameStream, Transport, WriterTransport};
