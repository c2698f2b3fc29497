//! Hub error types
//!
//! Error types for room registry and fan-out operations.

use super::message::{ClientId, RoomId};

/// A client that did not receive a published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedClient {
    pub room: RoomId,
    pub client: ClientId,
}

impl std::fmt::Display for SkippedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.room, self.client)
    }
}

/// Error type for hub operations
#[derive(Debug, Clone)]
pub enum HubError {
    /// Target room does not exist
    RoomNotFound(RoomId),
    /// Some mailboxes were full; every other client still received the message
    MailboxFull {
        delivered: usize,
        skipped: Vec<SkippedClient>,
    },
    /// Transport cannot flush frames incrementally
    StreamingUnsupported,
    /// Client id already registered in the room
    ClientAlreadySubscribed { room: RoomId, client: ClientId },
    /// Initial frame could not be written
    Handshake(String),
}

impl HubError {
    /// Clients skipped during fan-out, empty for other errors
    pub fn skipped(&self) -> &[SkippedClient] {
        match self {
            HubError::MailboxFull { skipped, .. } => skipped,
            _ => &[],
        }
    }
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::RoomNotFound(room) => write!(f, "Room not found: {}", room),
            HubError::MailboxFull { delivered, skipped } => {
                write!(
                    f,
                    "Mailbox full for {} client(s), delivered to {}:",
                    skipped.len(),
                    delivered
                )?;
                for s in skipped {
                    write!(f, " {}", s)?;
                }
                Ok(())
            }
            HubError::StreamingUnsupported => write!(f, "Streaming is not supported"),
            HubError::ClientAlreadySubscribed { room, client } => {
                write!(f, "Client {} already subscribed to room {}", client, room)
            }
            HubError::Handshake(e) => write!(f, "Stream handshake failed: {}", e),
        }
    }
}

impl std::error::Error for HubError {}
