//! Publish path
//!
//! ```text
//!   push request ──► sanitize ──► EventStore::save ──► Message ──► Hub::publish
//!                                   (id, time)        event: message
//!                                                     id: <event id>
//!                                                     data: <event json>
//! ```

pub mod sanitize;
pub mod service;

pub use sanitize::{sanitize, SECRET_HEADERS, SECRET_QUERY_PARAMS};
pub use service::{room_link, RelayReport, RelayService, RELAY_EVENT};
