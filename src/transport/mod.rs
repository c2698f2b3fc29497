//! Stream transports
//!
//! A transport is the sink a client's writer task emits frames to. The hub only
//! accepts transports that deliver each frame to the peer as soon as it is
//! written; anything that buffers a whole response is rejected at subscribe
//! time.

use std::future::Future;
use std::io;

use bytes::Bytes;

pub mod channel;
pub mod writer;

pub use channel::{ChannelTransport, FrameStream};
pub use writer::WriterTransport;

/// Outbound side of a subscriber's long-lived stream
pub trait Transport: Send + 'static {
    /// Whether written frames reach the peer incrementally
    fn supports_streaming(&self) -> bool;

    /// Record a response header. Called before the first frame is sent.
    fn set_header(&mut self, name: &'static str, value: &'static str);

    /// Write one complete frame and flush it
    fn send(&mut self, frame: Bytes) -> impl Future<Output = io::Result<()>> + Send;
}
