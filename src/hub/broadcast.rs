//! Broadcast engine
//!
//! Fans one sender's text payload out to every other open connection. Delivery
//! is best-effort per recipient: a failure is counted and logged, and the loop
//! moves on to the next member.

use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use uuid::Uuid;

use super::Registry;

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose queue accepted the payload
    pub delivered: usize,
    /// The sender itself plus members no longer `Open`
    pub skipped: usize,
    /// Recipients whose writer had already gone away
    pub failed: usize,
}

/// Deliver `payload` from `sender_id` to every other open member of `registry`
///
/// Never unregisters anyone: a failing recipient's own receive loop notices the
/// broken transport and tears itself down.
pub async fn broadcast(registry: &Registry, sender_id: Uuid, payload: &str) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for recipient in registry.snapshot().await {
        if recipient.id() == sender_id || !recipient.is_open().await {
            report.skipped += 1;
            continue;
        }

        match recipient.deliver(Message::Text(payload.to_owned())) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                debug!("Skipping recipient: {}", e);
                report.failed += 1;
            }
        }
    }

    debug!(
        "Broadcast from {}: delivered={} skipped={} failed={}",
        sender_id, report.delivered, report.skipped, report.failed
    );
    report
}
