//! Delivery Loop: forwards a subscription's snapshots to one client
//! connection until either side ends.

use std::fmt::Display;
use std::time::Duration;

use futures::{Sink, SinkExt};

use crate::subscription::Subscription;

/// Upper bound on flushing and closing the client sink after the loop ends.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a delivery loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The subscription ran dry; every queued snapshot was written.
    FeedEnded,
    /// A write to the client failed.
    ClientGone,
    /// The subscription's cancellation token fired.
    Cancelled,
}

/// Write every snapshot from `subscription` to `sink`, in order.
///
/// Returns once the feed ends, a write fails, or the subscription is
/// cancelled. The producer is always cancelled before returning and the
/// sink is closed, so no upstream resources outlive the loop.
pub async fn deliver<S>(mut subscription: Subscription, sink: S) -> DeliveryOutcome
where
    S: Sink<archytex_core::updates::Updates>,
    S::Error: Display,
{
    let mut sink = std::pin::pin!(sink);
    let cancel = subscription.cancellation_token();
    let user = subscription.user();
    let mut delivered: u64 = 0;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break DeliveryOutcome::Cancelled,
            next = subscription.next() => next,
        };
        let Some(updates) = next else {
            break DeliveryOutcome::FeedEnded;
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break DeliveryOutcome::Cancelled,
            written = sink.send(updates) => written,
        };
        match written {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::debug!(user_id = %user, error = %e, "Client write failed");
                break DeliveryOutcome::ClientGone;
            }
        }
    };

    subscription.cancel();
    if outcome != DeliveryOutcome::ClientGone {
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(user_id = %user, error = %e, "Client close failed"),
            Err(_) => tracing::debug!(user_id = %user, "Client close timed out"),
        }
    }

    tracing::info!(user_id = %user, delivered, outcome = ?outcome, "Delivery loop finished");
    outcome
}
