//! Client lifecycle state machine
//!
//! Tracks a subscriber from registration to teardown. Transitions only move
//! forward; a late attempt to go back to an earlier phase is ignored.

use serde::Serialize;
use tokio::sync::watch;

/// Client lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientPhase {
    /// Being registered, handshake not yet written
    Connecting,
    /// Registered, tasks running
    Streaming,
    /// Cancellation fired, tasks shutting down
    Closing,
    /// Unregistered, all tasks finished
    Closed,
}

impl ClientPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientPhase::Connecting => "connecting",
            ClientPhase::Streaming => "streaming",
            ClientPhase::Closing => "closing",
            ClientPhase::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable phase cell
#[derive(Debug)]
pub(crate) struct PhaseCell {
    tx: watch::Sender<ClientPhase>,
}

impl PhaseCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ClientPhase::Connecting);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ClientPhase {
        *self.tx.borrow()
    }

    /// Move to `next` if it is later than the current phase
    ///
    /// Returns true if the phase changed.
    pub(crate) fn advance(&self, next: ClientPhase) -> bool {
        self.tx.send_if_modified(|phase| {
            if next > *phase {
                *phase = next;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the phase reaches `target` or later
    pub(crate) async fn wait_for(&self, target: ClientPhase) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail while borrowed
        let _ = rx.wait_for(|phase| *phase >= target).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_lifecycle() {
        let cell = PhaseCell::new();
        assert_eq!(cell.get(), ClientPhase::Connecting);

        assert!(cell.advance(ClientPhase::Streaming));
        assert_eq!(cell.get(), ClientPhase::Streaming);

        assert!(cell.advance(ClientPhase::Closing));
        assert!(cell.advance(ClientPhase::Closed));
        assert_eq!(cell.get(), ClientPhase::Closed);
    }

    #[test]
    fn test_phase_never_moves_backwards() {
        let cell = PhaseCell::new();
        cell.advance(ClientPhase::Closing);

        assert!(!cell.advance(ClientPhase::Streaming));
        assert!(!cell.advance(ClientPhase::Closing));
        assert_eq!(cell.get(), ClientPhase::Closing);
    }

    #[tokio::test]
    async fn test_wait_for_phase() {
        let cell = std::sync::Arc::new(PhaseCell::new());

        let waiter = {
            let cell = std::sync::Arc::clone(&cell);
            tokio::spawn(async move { cell.wait_for(ClientPhase::Closed).await })
        };

        cell.advance(ClientPhase::Streaming);
        cell.advance(ClientPhase::Closed);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ClientPhase::Streaming.to_string(), "streaming");
    }
}
