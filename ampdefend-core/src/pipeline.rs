//! # Ingest Pipeline — snapshot processing and state ownership
//!
//! One `IngestPipeline` owns the whole downstream of the live feed: the
//! dedup tracker, the webhook sender, the alert store, and the derived
//! metrics. Each delivered snapshot flows claim → dispatch → recompute →
//! aggregate; user operations (read/dismiss/clear) hit the same store and
//! interleave safely with recomputation because flags live in their own
//! keyed map.
//!
//! The pipeline holds exactly one standing feed subscription, established
//! through [`IngestPipeline::attach`]; the caller keeps the returned guard
//! for the lifetime of the session and cancels it on teardown.

use crate::alerts::{Alert, AlertStore};
use crate::feed::{AlertFeed, FeedSubscription};
use crate::metrics::{MetricsAggregator, SystemMetrics};
use crate::notify::NotifiedTracker;
use crate::types::{Snapshot, ThreatRecord};
use crate::webhook::WebhookSender;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Feed connection state the dashboard surfaces. `loading` starts true and
/// clears on the first delivery, success or failure; `error` is set on
/// transport failures and cleared by any successful snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self { loading: true, error: None }
    }
}

pub struct IngestPipeline {
    tracker: NotifiedTracker,
    sender: WebhookSender,
    store: AlertStore,
    aggregator: MetricsAggregator,
    notify_backlog: bool,
    first_snapshot_seen: AtomicBool,
    /// Raw threat view for the dashboard, newest upload first.
    threats: RwLock<Vec<(String, ThreatRecord)>>,
    metrics: RwLock<SystemMetrics>,
    status: RwLock<FeedStatus>,
    snapshots_processed: AtomicU64,
    feed_errors: AtomicU64,
}

impl IngestPipeline {
    pub fn new(
        sender: WebhookSender,
        aggregator: MetricsAggregator,
        notify_backlog: bool,
    ) -> Self {
        let metrics = RwLock::new(aggregator.aggregate(&Snapshot::new()));
        Self {
            tracker: NotifiedTracker::new(),
            sender,
            store: AlertStore::new(),
            aggregator,
            notify_backlog,
            first_snapshot_seen: AtomicBool::new(false),
            threats: RwLock::new(Vec::new()),
            metrics,
            status: RwLock::new(FeedStatus::default()),
            snapshots_processed: AtomicU64::new(0),
            feed_errors: AtomicU64::new(0),
        }
    }

    /// Establish the single standing subscription for this pipeline. The
    /// returned guard is the owner's teardown handle; dropping it releases
    /// the subscription.
    pub fn attach(self: &Arc<Self>, feed: &Arc<AlertFeed>) -> FeedSubscription {
        let on_snapshot: crate::feed::SnapshotFn = {
            let pipeline = self.clone();
            Arc::new(move |snapshot: &Snapshot| pipeline.handle_snapshot(snapshot))
        };
        let on_error: crate::feed::FeedErrorFn = {
            let pipeline = self.clone();
            Arc::new(move |message: &str| pipeline.handle_feed_error(message))
        };
        feed.subscribe("ingest-pipeline", on_snapshot, on_error)
    }

    /// Process one full snapshot of the alert collection.
    pub fn handle_snapshot(&self, snapshot: &Snapshot) {
        // First delivery decides the backlog policy: either every
        // pre-existing identifier notifies, or the set is seeded silently.
        if !self.first_snapshot_seen.swap(true, Ordering::Relaxed)
            && !self.notify_backlog
            && !snapshot.is_empty()
        {
            self.tracker.seed(snapshot.keys().map(String::as_str));
            info!(suppressed = snapshot.len(), "Initial backlog seeded without notification");
        }

        let fresh = self.tracker.claim(snapshot.keys().map(String::as_str));
        for id in &fresh {
            if let Some(record) = snapshot.get(id) {
                self.sender.dispatch(id, record);
            }
        }
        if !fresh.is_empty() {
            info!(new = fresh.len(), total = snapshot.len(), "New alerts forwarded to webhook");
        }

        // newest upload first; identifier order breaks ties (stable sort)
        let mut threats: Vec<(String, ThreatRecord)> =
            snapshot.iter().map(|(id, r)| (id.clone(), r.clone())).collect();
        threats.sort_by(|a, b| b.1.uploaded_time().cmp(&a.1.uploaded_time()));
        *self.threats.write() = threats;

        self.store.recompute(snapshot);
        *self.metrics.write() = self.aggregator.aggregate(snapshot);

        {
            let mut status = self.status.write();
            status.loading = false;
            status.error = None;
        }
        self.snapshots_processed.fetch_add(1, Ordering::Relaxed);
        debug!(records = snapshot.len(), "Snapshot processed");
    }

    /// Surface a transport failure. No application-level retry: reconnection
    /// is the transport adapter's concern.
    pub fn handle_feed_error(&self, message: &str) {
        self.feed_errors.fetch_add(1, Ordering::Relaxed);
        error!(error = %message, "Feed connection error");
        let mut status = self.status.write();
        status.loading = false;
        status.error = Some(message.to_string());
    }

    // ── Read surface ─────────────────────────────────────────────────────

    /// Visible alerts, newest first, dismissed entries filtered out.
    pub fn alerts(&self) -> Vec<Alert> {
        self.store.alerts()
    }

    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    /// Raw threat records, newest upload first.
    pub fn threats(&self) -> Vec<(String, ThreatRecord)> {
        self.threats.read().clone()
    }

    pub fn metrics(&self) -> SystemMetrics {
        self.metrics.read().clone()
    }

    pub fn status(&self) -> FeedStatus {
        self.status.read().clone()
    }

    // ── User operations ──────────────────────────────────────────────────

    pub fn mark_as_read(&self, id: &str) {
        self.store.mark_as_read(id);
    }

    pub fn mark_all_as_read(&self) {
        self.store.mark_all_as_read();
    }

    pub fn dismiss_alert(&self, id: &str) {
        self.store.dismiss(id);
    }

    pub fn clear_all(&self) {
        self.store.clear_all();
    }

    // ── Stats ────────────────────────────────────────────────────────────

    pub fn snapshots_processed(&self) -> u64 {
        self.snapshots_processed.load(Ordering::Relaxed)
    }
    pub fn feed_errors(&self) -> u64 {
        self.feed_errors.load(Ordering::Relaxed)
    }
    pub fn tracker(&self) -> &NotifiedTracker {
        &self.tracker
    }
    pub fn sender(&self) -> &WebhookSender {
        &self.sender
    }
    pub fn store(&self) -> &AlertStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Severity, SystemStatus};

    fn pipeline(notify_backlog: bool) -> Arc<IngestPipeline> {
        // port 9 is discard; dispatched sends just fail quietly in the log
        let sender = WebhookSender::new("http://127.0.0.1:9/webhook").with_timeout(1);
        let aggregator = MetricsAggregator::new(12, SystemStatus::Online);
        Arc::new(IngestPipeline::new(sender, aggregator, notify_backlog))
    }

    fn record(severity: Severity, uploaded_at: &str, blocked: bool) -> ThreatRecord {
        ThreatRecord {
            alert_type: Some("ssh_bruteforce".into()),
            severity: Some(severity),
            uploaded_at: Some(uploaded_at.into()),
            ip_blocked: blocked.then(|| "198.51.100.4".to_string()),
            ..Default::default()
        }
    }

    fn snapshot_of(entries: &[(&str, ThreatRecord)]) -> Snapshot {
        entries.iter().map(|(id, r)| (id.to_string(), r.clone())).collect()
    }

    #[tokio::test]
    async fn test_initial_backlog_is_forwarded() {
        let pipeline = pipeline(true);
        let snapshot = snapshot_of(&[
            ("t1", record(Severity::High, "2025-06-01T10:00:00Z", false)),
            ("t2", record(Severity::Low, "2025-06-01T10:01:00Z", false)),
            ("t3", record(Severity::Critical, "2025-06-01T10:02:00Z", true)),
        ]);
        pipeline.handle_snapshot(&snapshot);

        // all three pre-existing identifiers count as new on first delivery
        assert_eq!(pipeline.sender().attempts(), 3);
        assert_eq!(pipeline.tracker().total_claimed(), 3);
    }

    #[tokio::test]
    async fn test_at_most_once_across_snapshots() {
        let pipeline = pipeline(true);
        let snapshot = snapshot_of(&[
            ("t1", record(Severity::High, "2025-06-01T10:00:00Z", false)),
            ("t2", record(Severity::High, "2025-06-01T10:01:00Z", false)),
        ]);
        pipeline.handle_snapshot(&snapshot);
        pipeline.handle_snapshot(&snapshot);
        pipeline.handle_snapshot(&snapshot);
        assert_eq!(pipeline.sender().attempts(), 2);

        // a later arrival notifies exactly once
        let mut grown = snapshot.clone();
        grown.insert("t3".into(), record(Severity::Medium, "2025-06-01T11:00:00Z", false));
        pipeline.handle_snapshot(&grown);
        pipeline.handle_snapshot(&grown);
        assert_eq!(pipeline.sender().attempts(), 3);
        assert_eq!(pipeline.tracker().duplicates_suppressed(), 9);
    }

    #[tokio::test]
    async fn test_backlog_suppression_when_disabled() {
        let pipeline = pipeline(false);
        let snapshot = snapshot_of(&[
            ("t1", record(Severity::High, "2025-06-01T10:00:00Z", false)),
            ("t2", record(Severity::High, "2025-06-01T10:01:00Z", false)),
        ]);
        pipeline.handle_snapshot(&snapshot);
        assert_eq!(pipeline.sender().attempts(), 0);

        // only post-startup arrivals notify
        let mut grown = snapshot.clone();
        grown.insert("t3".into(), record(Severity::High, "2025-06-01T11:00:00Z", false));
        pipeline.handle_snapshot(&grown);
        assert_eq!(pipeline.sender().attempts(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_updates_metrics_and_status() {
        let pipeline = pipeline(true);
        assert!(pipeline.status().loading);

        let snapshot = snapshot_of(&[
            ("t1", record(Severity::High, "2025-06-01T10:00:00Z", true)),
            ("t2", record(Severity::Low, "2025-06-01T10:01:00Z", false)),
        ]);
        pipeline.handle_snapshot(&snapshot);

        let metrics = pipeline.metrics();
        assert_eq!(metrics.threats_detected, 2);
        assert_eq!(metrics.blocked_ips, 1);
        let status = pipeline.status();
        assert!(!status.loading);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn test_feed_error_then_recovery() {
        let pipeline = pipeline(true);
        pipeline.handle_feed_error("Database connection failed");
        let status = pipeline.status();
        assert!(!status.loading);
        assert_eq!(status.error.as_deref(), Some("Database connection failed"));
        assert_eq!(pipeline.feed_errors(), 1);

        // any successful snapshot, even empty, clears the error
        pipeline.handle_snapshot(&Snapshot::new());
        assert!(pipeline.status().error.is_none());
    }

    #[tokio::test]
    async fn test_threat_view_is_newest_first() {
        let pipeline = pipeline(true);
        let snapshot = snapshot_of(&[
            ("old", record(Severity::Low, "2025-06-01T08:00:00Z", false)),
            ("new", record(Severity::Low, "2025-06-01T12:00:00Z", false)),
        ]);
        pipeline.handle_snapshot(&snapshot);
        let threats = pipeline.threats();
        assert_eq!(threats[0].0, "new");
        assert_eq!(threats[1].0, "old");
    }

    #[tokio::test]
    async fn test_user_flags_survive_snapshot_interleaving() {
        let pipeline = pipeline(true);
        let snapshot = snapshot_of(&[("t1", record(Severity::High, "2025-06-01T10:00:00Z", false))]);
        pipeline.handle_snapshot(&snapshot);
        pipeline.mark_as_read("alert-t1");
        pipeline.handle_snapshot(&snapshot);

        let alerts = pipeline.alerts();
        assert!(alerts.iter().find(|a| a.id == "alert-t1").unwrap().read);
    }

    #[tokio::test]
    async fn test_attach_is_single_subscription() {
        let feed = Arc::new(AlertFeed::new("alerts"));
        let pipeline = pipeline(true);
        let subscription = pipeline.attach(&feed);
        assert_eq!(feed.subscriber_count(), 1);

        feed.publish_snapshot(&snapshot_of(&[(
            "t1",
            record(Severity::High, "2025-06-01T10:00:00Z", false),
        )]));
        feed.publish_snapshot(&Snapshot::new());
        // snapshots reuse the one subscription rather than re-subscribing
        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(pipeline.snapshots_processed(), 2);

        subscription.cancel();
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish_snapshot(&Snapshot::new());
        assert_eq!(pipeline.snapshots_processed(), 2);
    }
}
