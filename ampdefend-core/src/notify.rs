//! # Dedup/Notify Tracker — at-most-once forwarding per session
//!
//! Remembers which alert identifiers have already been handed to the webhook
//! sender during this session. The set grows monotonically and never
//! shrinks; only a process restart resets it. It is owned by the pipeline
//! and threaded through its constructor rather than living in static state.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct NotifiedTracker {
    notified: RwLock<HashSet<String>>,
    total_seen: AtomicU64,
    total_claimed: AtomicU64,
    duplicates_suppressed: AtomicU64,
}

impl NotifiedTracker {
    pub fn new() -> Self {
        Self {
            notified: RwLock::new(HashSet::new()),
            total_seen: AtomicU64::new(0),
            total_claimed: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
        }
    }

    /// Return the identifiers not yet forwarded, inserting them in the same
    /// call. Insertion happens with the claim, before the caller's send
    /// attempt, so a failed delivery is never retried on the next snapshot:
    /// the contract is at-most-one attempt per identifier.
    pub fn claim<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut notified = self.notified.write();
        let mut fresh = Vec::new();
        for id in ids {
            self.total_seen.fetch_add(1, Ordering::Relaxed);
            if notified.insert(id.to_string()) {
                fresh.push(id.to_string());
            } else {
                self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.total_claimed.fetch_add(fresh.len() as u64, Ordering::Relaxed);
        fresh
    }

    /// Insert identifiers without claiming them, so they never notify.
    /// Used to swallow the initial backlog when backlog sends are disabled.
    pub fn seed<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let mut notified = self.notified.write();
        for id in ids {
            notified.insert(id.to_string());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.notified.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.notified.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.read().is_empty()
    }

    pub fn total_claimed(&self) -> u64 {
        self.total_claimed.load(Ordering::Relaxed)
    }
    pub fn duplicates_suppressed(&self) -> u64 {
        self.duplicates_suppressed.load(Ordering::Relaxed)
    }
}

impl Default for NotifiedTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_at_most_once() {
        let tracker = NotifiedTracker::new();
        let first = tracker.claim(["a", "b", "c"]);
        assert_eq!(first, ["a", "b", "c"]);

        // same identifiers on every later snapshot: never claimed again
        let second = tracker.claim(["a", "b", "c"]);
        assert!(second.is_empty());
        assert_eq!(tracker.duplicates_suppressed(), 3);
        assert_eq!(tracker.total_claimed(), 3);
    }

    #[test]
    fn test_claim_mixes_new_and_seen() {
        let tracker = NotifiedTracker::new();
        tracker.claim(["a"]);
        let fresh = tracker.claim(["a", "b"]);
        assert_eq!(fresh, ["b"]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_seed_suppresses_without_claiming() {
        let tracker = NotifiedTracker::new();
        tracker.seed(["old-1", "old-2"]);
        assert!(tracker.contains("old-1"));
        assert_eq!(tracker.total_claimed(), 0);

        let fresh = tracker.claim(["old-1", "old-2", "new-1"]);
        assert_eq!(fresh, ["new-1"]);
    }
}
