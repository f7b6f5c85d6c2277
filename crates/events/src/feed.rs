//! Update Feed Adapter.
//!
//! [`UpdateFeed::subscribe`] opens the user's change feed, then spawns one
//! producer task per subscription which:
//!
//! 1. sends a first snapshot of the current state immediately,
//! 2. for every change notification, drains whatever further notifications
//!    are already pending, reads one fresh snapshot and sends it,
//! 3. stops when the upstream feed ends or fails, a snapshot read fails,
//!    the consumer goes away, or the cancellation token fires.
//!
//! The feed is opened before the first snapshot is read, so a mutation that
//! races the subscription is never missed. Snapshots are always read after
//! the notifications they cover, so coalescing can only skip intermediate
//! states, never deliver a stale one after a fresher one. When the channel
//! is full the producer blocks; notifications arriving meanwhile are folded
//! into the next snapshot.

use std::sync::Arc;
use std::time::Duration;

use archytex_core::error::CoreError;
use archytex_core::timeout::{with_timeout, DEFAULT_STORE_TIMEOUT};
use archytex_core::types::UserId;
use archytex_db::{Change, ChangeStream, DocumentStore};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::subscription::Subscription;

/// Default number of snapshots buffered per subscription.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct FeedConfig {
    /// Subscriber channel capacity (at least 1).
    pub channel_capacity: usize,
    /// Deadline for opening the feed and for each snapshot read.
    pub store_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Why a producer task stopped.
#[derive(Debug)]
pub enum FeedExit {
    /// The upstream change feed ended normally.
    FeedEnded,
    /// The subscription's cancellation token fired.
    Cancelled,
    /// The consumer dropped its end of the channel.
    ConsumerGone,
    /// The upstream feed or a snapshot read failed. Not retried.
    Failed(CoreError),
}

/// Factory for per-user live subscriptions.
#[derive(Clone)]
pub struct UpdateFeed {
    store: Arc<dyn DocumentStore>,
    config: FeedConfig,
}

impl UpdateFeed {
    pub fn new(store: Arc<dyn DocumentStore>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> FeedConfig {
        self.config
    }

    /// Open a live subscription for `user`.
    ///
    /// `cancel` stops the producer; pass a child of a wider token to have it
    /// cancelled together with other subscriptions. Errors opening the
    /// upstream feed are returned here; later failures end the stream.
    pub async fn subscribe(
        &self,
        user: UserId,
        cancel: CancellationToken,
    ) -> Result<Subscription, CoreError> {
        let changes = with_timeout(
            self.config.store_timeout,
            "open change feed",
            self.store.watch(user),
        )
        .await?;

        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let producer = Producer {
            store: Arc::clone(&self.store),
            user,
            sender,
            cancel: cancel.clone(),
            store_timeout: self.config.store_timeout,
        };
        let task = tokio::spawn(producer.run(changes));

        tracing::debug!(user_id = %user, "Subscription opened");
        Ok(Subscription::new(user, receiver, cancel, task))
    }
}

/// Pending-notification drain result.
struct Drained {
    count: u64,
    ended: bool,
    error: Option<CoreError>,
}

/// Producer side of one subscription. Owns the only channel sender, so the
/// channel closes exactly when [`Producer::run`] returns.
struct Producer {
    store: Arc<dyn DocumentStore>,
    user: UserId,
    sender: mpsc::Sender<archytex_core::updates::Updates>,
    cancel: CancellationToken,
    store_timeout: Duration,
}

impl Producer {
    async fn run(self, mut changes: ChangeStream) -> FeedExit {
        let exit = self.pump(&mut changes).await;
        // Release the upstream subscription before reporting.
        drop(changes);
        match &exit {
            FeedExit::Failed(e) => {
                tracing::warn!(user_id = %self.user, error = %e, "Update feed failed")
            }
            other => tracing::debug!(user_id = %self.user, exit = ?other, "Update feed stopped"),
        }
        exit
    }

    async fn pump(&self, changes: &mut ChangeStream) -> FeedExit {
        // First update: the client sees current state without waiting for a
        // mutation.
        if let Err(exit) = self.publish().await {
            return exit;
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return FeedExit::Cancelled,
                _ = self.sender.closed() => return FeedExit::ConsumerGone,
                next = changes.next() => next,
            };

            match next {
                None => return FeedExit::FeedEnded,
                Some(Err(e)) => return FeedExit::Failed(e),
                Some(Ok(change)) => {
                    let drained = drain_pending(changes);
                    let coalesced = drained.count + lagged(&change);
                    if coalesced > 0 {
                        tracing::trace!(user_id = %self.user, coalesced, "Coalesced change notifications");
                    }

                    // Whatever was drained is covered by this snapshot.
                    if let Err(exit) = self.publish().await {
                        return exit;
                    }
                    if let Some(e) = drained.error {
                        return FeedExit::Failed(e);
                    }
                    if drained.ended {
                        return FeedExit::FeedEnded;
                    }
                }
            }
        }
    }

    /// Read a fresh snapshot and hand it to the consumer, blocking while the
    /// channel is full.
    async fn publish(&self) -> Result<(), FeedExit> {
        let updates = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FeedExit::Cancelled),
            read = with_timeout(self.store_timeout, "snapshot", self.store.snapshot(self.user)) => {
                read.map_err(FeedExit::Failed)?
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FeedExit::Cancelled),
            sent = self.sender.send(updates) => sent.map_err(|_| FeedExit::ConsumerGone),
        }
    }
}

/// Pull every notification that is ready right now without waiting.
fn drain_pending(changes: &mut ChangeStream) -> Drained {
    let mut drained = Drained {
        count: 0,
        ended: false,
        error: None,
    };
    while let Some(next) = changes.next().now_or_never() {
        match next {
            Some(Ok(change)) => drained.count += 1 + lagged(&change),
            Some(Err(e)) => {
                drained.error = Some(e);
                break;
            }
            None => {
                drained.ended = true;
                break;
            }
        }
    }
    drained
}

fn lagged(change: &Change) -> u64 {
    match change {
        Change::Lagged(n) => *n,
        Change::Mutated(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use archytex_db::MemoryDocumentStore;
    use assert_matches::assert_matches;

    use super::*;

    fn feed(store: Arc<MemoryDocumentStore>, capacity: usize) -> UpdateFeed {
        UpdateFeed::new(
            store,
            FeedConfig {
                channel_capacity: capacity,
                store_timeout: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test]
    async fn first_snapshot_arrives_without_mutation() {
        let store = Arc::new(MemoryDocumentStore::new());
        let user = UserId::new();
        store.create_project(user, "Cabin").await.unwrap();

        let mut sub = feed(store, 4)
            .subscribe(user, CancellationToken::new())
            .await
            .unwrap();

        let first = sub.next().await.unwrap();
        assert_eq!(first.projects.len(), 1);
        assert_eq!(first.projects[0].title, "Cabin");
    }

    #[tokio::test]
    async fn first_snapshot_for_empty_user_is_empty() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut sub = feed(store, 4)
            .subscribe(UserId::new(), CancellationToken::new())
            .await
            .unwrap();

        assert!(sub.next().await.unwrap().projects.is_empty());
    }

    #[tokio::test]
    async fn open_failure_is_returned_to_caller() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_available(false);
        let result = feed(store, 4)
            .subscribe(UserId::new(), CancellationToken::new())
            .await;
        assert_matches!(result, Err(CoreError::DownstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn upstream_end_closes_the_channel() {
        let store = Arc::new(MemoryDocumentStore::new());
        let user = UserId::new();
        let mut sub = feed(Arc::clone(&store), 4)
            .subscribe(user, CancellationToken::new())
            .await
            .unwrap();
        sub.next().await.unwrap();

        store.close_feed(user).await;

        assert!(sub.next().await.is_none());
        assert_matches!(sub.close().await, FeedExit::FeedEnded);
    }

    #[tokio::test]
    async fn snapshot_failure_ends_the_stream_without_retry() {
        let store = Arc::new(MemoryDocumentStore::new());
        let user = UserId::new();
        let mut sub = feed(Arc::clone(&store), 4)
            .subscribe(user, CancellationToken::new())
            .await
            .unwrap();
        sub.next().await.unwrap();

        // Notification goes out, then the snapshot read fails.
        store.create_project(user, "Cabin").await.unwrap();
        store.set_available(false);

        assert!(sub.next().await.is_none());
        assert_matches!(sub.close().await, FeedExit::Failed(_));
    }

    #[tokio::test]
    async fn cancellation_releases_the_upstream_watcher() {
        let store = Arc::new(MemoryDocumentStore::new());
        let user = UserId::new();
        let cancel = CancellationToken::new();
        let sub = feed(Arc::clone(&store), 4)
            .subscribe(user, cancel.clone())
            .await
            .unwrap();
        assert_eq!(store.active_watchers(user).await, 1);

        cancel.cancel();
        assert_matches!(sub.close().await, FeedExit::Cancelled);
        assert_eq!(store.active_watchers(user).await, 0);
    }

    #[tokio::test]
    async fn dropping_the_subscription_stops_the_producer() {
        let store = Arc::new(MemoryDocumentStore::new());
        let user = UserId::new();
        let sub = feed(Arc::clone(&store), 4)
            .subscribe(user, CancellationToken::new())
            .await
            .unwrap();
        drop(sub);

        tokio::time::timeout(Duration::from_secs(1), async {
            while store.active_watchers(user).await > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("watcher released after drop");
    }
}
