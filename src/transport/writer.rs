//! Transport over any async byte writer
//!
//! Used for raw sockets and in-memory pipes. Raw writers carry no header
//! block, so recorded headers are only kept for inspection.

use std::io;

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::{BytesCodec, FramedWrite};

use super::Transport;

/// Transport writing frames to an [`AsyncWrite`]
pub struct WriterTransport<W> {
    framed: FramedWrite<W, BytesCodec>,
    headers: Vec<(&'static str, &'static str)>,
}

impl<W> WriterTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            framed: FramedWrite::new(writer, BytesCodec::new()),
            headers: Vec::new(),
        }
    }

    /// Headers recorded by the hub
    pub fn headers(&self) -> &[(&'static str, &'static str)] {
        &self.headers
    }
}

impl<W> Transport for WriterTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn supports_streaming(&self) -> bool {
        true
    }

    fn set_header(&mut self, name: &'static str, value: &'static str) {
        self.headers.push((name, value));
    }

    async fn send(&mut self, frame: Bytes) -> io::Result<()> {
        // `SinkExt::send` flushes after the item is written
        self.framed.send(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_frames_are_flushed_to_writer() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = WriterTransport::new(client);

        transport.send(Bytes::from_static(b": connected\n\n")).await.unwrap();

        let mut buf = [0u8; 13];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b": connected\n\n");
    }

    #[tokio::test]
    async fn test_send_fails_when_peer_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);

        let mut transport = WriterTransport::new(client);
        assert!(transport.send(Bytes::from_static(b"data: x\n\n")).await.is_err());
    }
}
