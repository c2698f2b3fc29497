//! Channel-backed transport
//!
//! Frames are handed to a bounded channel whose receiving half is exposed as a
//! [`Stream`] of byte chunks, suitable as an HTTP response body. When the body
//! is dropped (peer disconnect) the next send fails with `BrokenPipe`; a
//! [`FrameStream`] can also cancel the client directly on drop.

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::Transport;

type HeaderList = Arc<Mutex<Vec<(&'static str, &'static str)>>>;

/// Default number of encoded frames buffered between the writer and the body
pub const DEFAULT_FRAME_BUFFER: usize = 16;

/// Transport that forwards frames into an in-process channel
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
    headers: HeaderList,
}

impl ChannelTransport {
    /// Create a transport and the stream that yields its frames
    pub fn new(buffer: usize) -> (Self, FrameStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let headers: HeaderList = Arc::new(Mutex::new(Vec::new()));

        let transport = Self {
            tx,
            headers: Arc::clone(&headers),
        };
        let stream = FrameStream {
            rx,
            headers,
            guard: None,
        };

        (transport, stream)
    }
}

impl Transport for ChannelTransport {
    fn supports_streaming(&self) -> bool {
        true
    }

    fn set_header(&mut self, name: &'static str, value: &'static str) {
        if let Ok(mut headers) = self.headers.lock() {
            headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
            headers.push((name, value));
        }
    }

    async fn send(&mut self, frame: Bytes) -> io::Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stream receiver dropped"))
    }
}

/// Receiving half of a [`ChannelTransport`]
pub struct FrameStream {
    rx: mpsc::Receiver<Bytes>,
    headers: HeaderList,
    guard: Option<DropGuard>,
}

impl FrameStream {
    /// Headers recorded by the hub for this stream
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        self.headers
            .lock()
            .map(|headers| headers.clone())
            .unwrap_or_default()
    }

    /// Cancel `token` when this stream is dropped
    pub fn cancel_on_drop(mut self, token: CancellationToken) -> Self {
        self.guard = Some(token.drop_guard());
        self
    }

    /// Receive the next frame
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Stream for FrameStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}
