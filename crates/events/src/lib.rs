//! Archytex live update pipeline.
//!
//! - [`UpdateFeed`] -- opens a user-scoped change feed and turns each
//!   notification into a fresh [`Updates`](archytex_core::updates::Updates)
//!   snapshot.
//! - [`Subscription`] -- the bounded channel carrying those snapshots to one
//!   consumer, plus the cancellation handle for its producer task.
//! - [`deliver`] -- the delivery loop writing snapshots, in order, to a
//!   client sink until the feed ends, the client goes away, or the
//!   subscription is cancelled.

pub mod delivery;
pub mod feed;
pub mod subscription;

pub use delivery::{deliver, DeliveryOutcome};
pub use feed::{FeedConfig, FeedExit, UpdateFeed};
pub use subscription::Subscription;
