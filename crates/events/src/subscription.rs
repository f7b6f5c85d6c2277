//! Consumer half of a live subscription.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use archytex_core::types::UserId;
use archytex_core::updates::Updates;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::feed::FeedExit;

/// A live stream of [`Updates`] for one user.
///
/// Snapshots arrive over a bounded channel that only the producer task
/// closes; `None` from [`next`](Self::next) is the normal end-of-feed
/// signal. Dropping the subscription cancels the producer and with it the
/// upstream change-feed subscription.
pub struct Subscription {
    user: UserId,
    receiver: mpsc::Receiver<Updates>,
    cancel: CancellationToken,
    task: Option<JoinHandle<FeedExit>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("user", &self.user)
            .field("pending", &self.pending())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Subscription {
    pub(crate) fn new(
        user: UserId,
        receiver: mpsc::Receiver<Updates>,
        cancel: CancellationToken,
        task: JoinHandle<FeedExit>,
    ) -> Self {
        Self {
            user,
            receiver,
            cancel,
            task: Some(task),
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    /// Wait for the next snapshot. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Updates> {
        self.receiver.recv().await
    }

    /// Take a snapshot that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<Updates> {
        self.receiver.try_recv().ok()
    }

    /// Number of snapshots queued and not yet consumed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Channel capacity; [`pending`](Self::pending) never exceeds it.
    pub fn capacity(&self) -> usize {
        self.receiver.max_capacity()
    }

    /// Ask the producer to stop. Already queued snapshots stay readable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the producer and wait until it has released the upstream feed.
    pub async fn close(mut self) -> FeedExit {
        self.cancel.cancel();
        self.receiver.close();
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                tracing::error!(user_id = %self.user, error = %e, "Feed task panicked");
                FeedExit::Cancelled
            }),
            None => FeedExit::Cancelled,
        }
    }
}

impl Stream for Subscription {
    type Item = Updates;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Updates>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(capacity: usize) -> (mpsc::Sender<Updates>, Subscription) {
        let (sender, receiver) = mpsc::channel(capacity);
        let task = tokio::spawn(async { FeedExit::FeedEnded });
        let sub = Subscription::new(UserId::new(), receiver, CancellationToken::new(), task);
        (sender, sub)
    }

    #[tokio::test]
    async fn debug_shows_user_and_backlog() {
        let (sender, sub) = detached(4);
        sender.send(Updates::default()).await.unwrap();

        let rendered = format!("{sub:?}");
        assert!(rendered.starts_with("Subscription"));
        assert!(rendered.contains(&format!("{:?}", sub.user())));
        assert!(rendered.contains("pending: 1"));
        assert!(rendered.contains("cancelled: false"));
    }

    #[tokio::test]
    async fn drop_cancels_the_producer_token() {
        let (_sender, sub) = detached(4);
        let token = sub.cancellation_token();

        drop(sub);

        assert!(token.is_cancelled());
    }
}
