//! Event-stream frame encoder
//!
//! Frame layout:
//! ```text
//! event: <tag>\n        (optional)
//! id: <id>\n            (optional)
//! retry: <millis>\n     (optional)
//! data: <line 1>\n
//! data: <line N>\n
//! \n                    (frame boundary)
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::hub::Message;

/// Encoder for event-stream frames
///
/// Holds no state between frames; every call to [`Encoder::encode`] appends
/// exactly one complete frame to the destination buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseEncoder;

impl SseEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl<'a> Encoder<&'a Message> for SseEncoder {
    type Error = std::io::Error;

    fn encode(&mut self, msg: &'a Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(frame_len_hint(msg));

        if let Some(ref event) = msg.event {
            put_field(dst, "event", event);
        }
        if let Some(ref id) = msg.id {
            put_field(dst, "id", id);
        }
        if let Some(retry) = msg.retry {
            dst.put_slice(b"retry: ");
            dst.put_slice(retry.to_string().as_bytes());
            dst.put_u8(b'\n');
        }
        for line in split_lines(&msg.data) {
            dst.put_slice(b"data: ");
            dst.put_slice(line.as_bytes());
            dst.put_u8(b'\n');
        }
        dst.put_u8(b'\n');

        Ok(())
    }
}

/// Encode a single message into a standalone frame
pub fn encode_frame(msg: &Message) -> Bytes {
    let mut buf = BytesMut::new();
    // Encoding into a BytesMut cannot fail
    let _ = SseEncoder.encode(msg, &mut buf);
    buf.freeze()
}

/// Split a payload into data lines
///
/// Splits strictly on `\n`. A trailing newline does not produce a trailing
/// empty line, an empty line in the middle is kept, and an empty payload
/// yields no lines at all.
pub fn split_lines(data: &str) -> impl Iterator<Item = &str> {
    let body = data.strip_suffix('\n').unwrap_or(data);
    let empty = data.is_empty();
    body.split('\n').filter(move |_| !empty)
}

/// Single-line fields must not carry line breaks
fn put_field(dst: &mut BytesMut, name: &str, value: &str) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    for b in value.bytes().filter(|b| *b != b'\n' && *b != b'\r') {
        dst.put_u8(b);
    }
    dst.put_u8(b'\n');
}

fn frame_len_hint(msg: &Message) -> usize {
    let lines = msg.data.bytes().filter(|b| *b == b'\n').count() + 1;
    msg.data.len()
        + lines * 7
        + msg.event.as_ref().map_or(0, |e| e.len() + 8)
        + msg.id.as_ref().map_or(0, |i| i.len() + 5)
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_str(msg: &Message) -> String {
        String::from_utf8(encode_frame(msg).to_vec()).unwrap()
    }

    #[test]
    fn test_multiline_payload() {
        let frame = encode_str(&Message::new("a\nb"));

        assert_eq!(frame, "data: a\ndata: b\n\n");
        let lines: Vec<&str> = frame.trim_end_matches('\n').split('\n').collect();
        assert_eq!(lines, vec!["data: a", "data: b"]);
        assert!(!frame.contains("event:"));
        assert!(!frame.contains("id:"));
    }

    #[test]
    fn test_event_and_id_lines() {
        let msg = Message::new("{\"k\":1}").with_event("message").with_id("42");

        assert_eq!(encode_str(&msg), "event: message\nid: 42\ndata: {\"k\":1}\n\n");
    }

    #[test]
    fn test_retry_line() {
        let msg = Message::new("x").with_retry(1500);
        assert_eq!(encode_str(&msg), "retry: 1500\ndata: x\n\n");
    }

    #[test]
    fn test_trailing_newline_yields_no_empty_data_line() {
        assert_eq!(encode_str(&Message::new("a\n")), "data: a\n\n");
    }

    #[test]
    fn test_embedded_empty_line_is_kept() {
        assert_eq!(encode_str(&Message::new("a\n\nb")), "data: a\ndata: \ndata: b\n\n");
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(encode_str(&Message::new("")), "\n");
        assert_eq!(encode_str(&Message::new("\n")), "data: \n\n");
    }

    #[test]
    fn test_line_breaks_stripped_from_fields() {
        let msg = Message::new("x").with_event("evil\nevent: other").with_id("1\r\n2");
        assert_eq!(encode_str(&msg), "event: evilevent: other\nid: 12\ndata: x\n\n");
    }

    #[test]
    fn test_encoder_appends_whole_frames() {
        let mut encoder = SseEncoder::new();
        let mut buf = BytesMut::new();

        encoder.encode(&Message::new("one"), &mut buf).unwrap();
        encoder.encode(&Message::new("two"), &mut buf).unwrap();

        assert_eq!(&buf[..], b"data: one\n\ndata: two\n\n");
    }
}
