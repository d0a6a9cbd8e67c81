//! # Live Feed — standing subscription to the upstream alert collection
//!
//! The upstream real-time store pushes the *entire current contents* of the
//! alert collection on every change, not deltas. `AlertFeed` is the fan-out
//! point those snapshots flow through; consumers hold a [`FeedSubscription`]
//! guard for the lifetime of their session, and the guard releases the
//! subscription on every exit path (explicit `cancel()` or drop).
//!
//! Transport reconnect/retry belongs to the adapter pushing into the feed;
//! this layer only routes snapshots and connection errors to subscribers.

use crate::types::Snapshot;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum subscribers on one feed.
const MAX_SUBSCRIBERS: usize = 64;

/// Snapshot delivery callback.
pub type SnapshotFn = Arc<dyn Fn(&Snapshot) + Send + Sync>;
/// Connection error callback.
pub type FeedErrorFn = Arc<dyn Fn(&str) + Send + Sync>;

struct FeedSubscriber {
    id: u64,
    name: String,
    on_snapshot: SnapshotFn,
    on_error: FeedErrorFn,
}

/// Fan-out point for feed deliveries, keyed by the upstream collection name.
pub struct AlertFeed {
    collection: String,
    subscribers: RwLock<Vec<FeedSubscriber>>,
    next_sub_id: AtomicU64,
    snapshots_delivered: AtomicU64,
    errors_delivered: AtomicU64,
}

impl AlertFeed {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.into(),
            subscribers: RwLock::new(Vec::new()),
            next_sub_id: AtomicU64::new(1),
            snapshots_delivered: AtomicU64::new(0),
            errors_delivered: AtomicU64::new(0),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Register a subscriber. The returned guard owns the registration:
    /// dropping it (or calling `cancel()`) unsubscribes exactly once.
    pub fn subscribe(
        self: &Arc<Self>,
        name: &str,
        on_snapshot: SnapshotFn,
        on_error: FeedErrorFn,
    ) -> FeedSubscription {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscribers.write();
        if subs.len() >= MAX_SUBSCRIBERS {
            warn!(name = %name, "Max feed subscribers reached, dropping oldest");
            subs.remove(0);
        }
        subs.push(FeedSubscriber {
            id,
            name: name.into(),
            on_snapshot,
            on_error,
        });
        info!(collection = %self.collection, name = %name, "Feed subscription established");
        FeedSubscription {
            feed: self.clone(),
            id,
            cancelled: AtomicBool::new(false),
        }
    }

    fn unsubscribe(&self, sub_id: u64) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|s| s.id != sub_id);
        let removed = subs.len() < before;
        if removed {
            debug!(collection = %self.collection, id = sub_id, "Feed subscription cancelled");
        }
        removed
    }

    /// Deliver a full snapshot to every subscriber. An empty snapshot is a
    /// valid state (no alerts upstream) and is delivered like any other.
    pub fn publish_snapshot(&self, snapshot: &Snapshot) {
        self.snapshots_delivered.fetch_add(1, Ordering::Relaxed);
        let subs = self.subscribers.read();
        debug!(
            collection = %self.collection,
            records = snapshot.len(),
            subscribers = subs.len(),
            "Snapshot delivered"
        );
        for sub in subs.iter() {
            (sub.on_snapshot)(snapshot);
        }
    }

    /// Deliver a transport failure to every subscriber.
    pub fn publish_error(&self, message: &str) {
        self.errors_delivered.fetch_add(1, Ordering::Relaxed);
        let subs = self.subscribers.read();
        for sub in subs.iter() {
            (sub.on_error)(message);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
    pub fn snapshots_delivered(&self) -> u64 {
        self.snapshots_delivered.load(Ordering::Relaxed)
    }
    pub fn errors_delivered(&self) -> u64 {
        self.errors_delivered.load(Ordering::Relaxed)
    }
}

/// Scoped handle to one standing subscription. Exists so teardown cannot be
/// forgotten: the registration is released when the owning session ends,
/// whether through `cancel()` or drop.
pub struct FeedSubscription {
    feed: Arc<AlertFeed>,
    id: u64,
    cancelled: AtomicBool,
}

impl FeedSubscription {
    /// Cancel the subscription. Idempotent; only the first call releases.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.feed.unsubscribe(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
