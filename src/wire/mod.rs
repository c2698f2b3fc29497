//! Wire framing for the event stream
//!
//! Messages are written as text frames compatible with standard event-stream
//! consumers (`EventSource` in browsers). Each frame is terminated by a blank
//! line; comment frames (lines starting with `:`) are ignored by consumers and
//! are used to establish the stream.

pub mod encoder;

pub use encoder::{encode_frame, split_lines, SseEncoder};

/// Comment frame written once when a stream is established
pub const HANDSHAKE_FRAME: &[u8] = b": connected\n\n";

/// Content type identifying an event stream
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Response headers required for a long-lived event stream
pub const STREAM_HEADERS: [(&str, &str); 5] = [
    ("Content-Type", CONTENT_TYPE),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
    ("X-Accel-Buffering", "no"),
    ("Access-Control-Allow-Origin", "*"),
];
