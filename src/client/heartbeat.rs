//! Client heartbeat task
//!
//! Keeps the stream open and reaps subscribers that stopped draining their
//! mailbox: if a heartbeat cannot be enqueued the client is cancelled.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::hub::config::MIN_HEARTBEAT_INTERVAL;
use crate::hub::Message;

use super::Client;

pub(crate) async fn run(client: Client, period: Duration) {
    // A zero period would panic in `interval_at`
    let period = period.max(MIN_HEARTBEAT_INTERVAL);
    let token = client.cancellation_token().clone();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        match client.try_enqueue(Message::heartbeat()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    client = %client.id(),
                    room = %client.room(),
                    pending = client.pending(),
                    "Client unresponsive, closing"
                );
                client.cancel();
                return;
            }
            Err(TrySendError::Closed(_)) => return,
        }
    }
}
