//! Per-subscriber client state
//!
//! A [`Client`] is one connected subscriber. It owns a bounded mailbox, a
//! cancellation token and three background tasks:
//!
//! ```text
//!   publish() ──try_send──┐
//!                         ▼
//!   heartbeat ──try_send──► mailbox ──recv──► writer ──encode──► Transport
//!       │                                        │
//!       └──── mailbox full ──► cancel ◄── write error
//!                                │
//!                                ▼
//!                        teardown watcher ──► Hub unregister (once)
//! ```
//!
//! Cloning a `Client` is cheap; all clones observe the same state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::hub::{ClientId, Message, RoomId};
use crate::stats::ClientStats;

pub(crate) mod heartbeat;
pub mod state;
pub(crate) mod writer;

pub use state::ClientPhase;

use state::PhaseCell;

/// Handle to one subscriber's server-side state
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    id: ClientId,
    room: RoomId,
    connected_at: DateTime<Utc>,
    started: Instant,
    /// Milliseconds since `started` at the last successful write
    last_active_ms: AtomicU64,
    mailbox: mpsc::Sender<Message>,
    token: CancellationToken,
    phase: PhaseCell,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    dropped: AtomicU64,
}

impl Client {
    /// Create a client and the receiving end of its mailbox
    pub(crate) fn new(
        id: ClientId,
        room: RoomId,
        mailbox_capacity: usize,
        token: CancellationToken,
    ) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));

        let client = Self {
            inner: Arc::new(ClientInner {
                id,
                room,
                connected_at: Utc::now(),
                started: Instant::now(),
                last_active_ms: AtomicU64::new(0),
                mailbox: tx,
                token,
                phase: PhaseCell::new(),
                frames_sent: AtomicU64::new(0),
                bytes_sent: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        };

        (client, rx)
    }

    /// Client id, unique within its room
    pub fn id(&self) -> &ClientId {
        &self.inner.id
    }

    /// Room this client is subscribed to
    pub fn room(&self) -> &RoomId {
        &self.inner.room
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ClientPhase {
        self.inner.phase.get()
    }

    /// Wall-clock time the client was created
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.inner.connected_at
    }

    /// Time of the last frame written to the transport
    ///
    /// Equal to the creation time until the first message is delivered.
    pub fn last_active(&self) -> Instant {
        let ms = self.inner.last_active_ms.load(Ordering::Relaxed);
        self.inner.started + Duration::from_millis(ms)
    }

    /// Number of messages waiting in the mailbox
    pub fn pending(&self) -> usize {
        self.inner.mailbox.max_capacity() - self.inner.mailbox.capacity()
    }

    /// Token whose cancellation stops all of this client's tasks
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// Request teardown of this client
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    /// Check if teardown has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Wait until teardown is requested
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Wait until the client is unregistered and its tasks have finished
    pub async fn closed(&self) {
        self.inner.phase.wait_for(ClientPhase::Closed).await
    }

    /// Snapshot of delivery counters
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            client_id: self.inner.id.clone(),
            phase: self.phase(),
            connected_at: self.inner.connected_at,
            uptime: self.inner.started.elapsed(),
            idle: self.last_active().elapsed(),
            frames_sent: self.inner.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.inner.bytes_sent.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }

    /// Enqueue a message without waiting
    pub(crate) fn try_enqueue(&self, msg: Message) -> Result<(), TrySendError<Message>> {
        let result = self.inner.mailbox.try_send(msg);
        if result.is_err() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub(crate) fn advance(&self, phase: ClientPhase) -> bool {
        self.inner.phase.advance(phase)
    }

    /// Record a successful write and refresh the last-active time
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.inner.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        let ms = self.inner.started.elapsed().as_millis() as u64;
        self.inner.last_active_ms.store(ms, Ordering::Relaxed);
    }

    /// Check whether two handles refer to the same client instance
    pub(crate) fn same(&self, other: &Client) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Display for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client[{}] room={}", self.inner.id, self.inner.room)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.inner.id)
            .field("room", &self.inner.room)
            .field("phase", &self.phase())
            .finish()
    }
}
