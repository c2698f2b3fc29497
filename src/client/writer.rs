//! Client writer task
//!
//! Drains the mailbox in FIFO order and writes each message to the transport
//! as its own flushed frame.

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio_util::codec::Encoder;

use crate::hub::Message;
use crate::transport::Transport;
use crate::wire::SseEncoder;

use super::Client;

pub(crate) async fn run<T: Transport>(
    client: Client,
    mut mailbox: mpsc::Receiver<Message>,
    mut transport: T,
) {
    let token = client.cancellation_token().clone();
    let mut encoder = SseEncoder::new();
    let mut buf = BytesMut::with_capacity(512);

    loop {
        let msg = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            msg = mailbox.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        if let Err(e) = encoder.encode(&msg, &mut buf) {
            tracing::warn!(
                client = %client.id(),
                room = %client.room(),
                error = %e,
                "Failed to encode message"
            );
            buf.clear();
            continue;
        }
        let frame = buf.split().freeze();
        let len = frame.len();

        // A stalled peer must not keep the writer alive past cancellation
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = transport.send(frame) => match result {
                Ok(()) => client.record_sent(len),
                Err(e) => {
                    tracing::debug!(
                        client = %client.id(),
                        room = %client.room(),
                        error = %e,
                        "Transport write failed, closing client"
                    );
                    client.cancel();
                    break;
                }
            },
        }
    }

    tracing::trace!(client = %client.id(), "Writer stopped");
}
