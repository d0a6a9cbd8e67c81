//! End-to-end integration tests for AMPDefend
//!
//! These tests exercise real multi-component scenarios:
//! - Snapshot delivery → dedup → webhook forwarding over live HTTP
//! - Relay endpoint round-trip and failure collapse
//! - HTTP snapshot ingest into the live feed
//! - Read/dismiss lifecycle across live recomputations

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ampdefend_core::feed::AlertFeed;
use ampdefend_core::io_adapters::{relay_router, IngestAdapter, RelayState};
use ampdefend_core::metrics::MetricsAggregator;
use ampdefend_core::pipeline::IngestPipeline;
use ampdefend_core::types::{Severity, Snapshot, SystemStatus, ThreatRecord};
use ampdefend_core::webhook::WebhookSender;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

type Captured = Arc<Mutex<Vec<Value>>>;

/// Loopback listener standing in for the automation endpoint: records every
/// JSON body it receives and answers with a fixed status.
async fn spawn_capture_server(status: StatusCode) -> (SocketAddr, Captured) {
    async fn handle(
        State((captured, status)): State<(Captured, StatusCode)>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        captured.lock().unwrap().push(body);
        status
    }

    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/hook", post(handle))
        .with_state((captured.clone(), status));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, captured)
}

async fn spawn_router(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Fire-and-forget sends land asynchronously; poll with a bounded wait.
async fn wait_for_captures(captured: &Captured, n: usize) {
    for _ in 0..150 {
        if captured.lock().unwrap().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {} captured webhook deliveries", n);
}

fn threat(severity: Severity, uploaded_at: &str, blocked: bool) -> ThreatRecord {
    ThreatRecord {
        alert_type: Some("ssh_bruteforce".into()),
        severity: Some(severity),
        public_ip: Some("203.0.113.9".into()),
        device_id: Some("honeypot-01".into()),
        raw_message: Some("SSH brute force attempt".into()),
        uploaded_at: Some(uploaded_at.into()),
        ip_blocked: blocked.then(|| "203.0.113.9".to_string()),
        city: Some("Lyon".into()),
        country: Some("FR".into()),
        vpn_likelihood: Some(72.0),
        ..Default::default()
    }
}

fn pipeline_with_webhook(url: &str, notify_backlog: bool) -> Arc<IngestPipeline> {
    Arc::new(IngestPipeline::new(
        WebhookSender::new(url).with_timeout(2),
        MetricsAggregator::new(12, SystemStatus::Online),
        notify_backlog,
    ))
}

// ── Scenario 1: Snapshot → Dedup → Webhook Forwarding ────────────────────

#[tokio::test]
async fn test_initial_backlog_forwards_every_identifier() {
    let (addr, captured) = spawn_capture_server(StatusCode::OK).await;
    let pipeline = pipeline_with_webhook(&format!("http://{}/hook", addr), true);
    let feed = Arc::new(AlertFeed::new("alerts"));
    let _subscription = pipeline.attach(&feed);

    // three pre-existing records on first delivery: all three notify
    let mut snapshot = Snapshot::new();
    snapshot.insert("t1".into(), threat(Severity::High, "2025-06-01T10:00:00Z", false));
    snapshot.insert("t2".into(), threat(Severity::Low, "2025-06-01T10:01:00Z", false));
    snapshot.insert("t3".into(), threat(Severity::Critical, "2025-06-01T10:02:00Z", true));
    feed.publish_snapshot(&snapshot);

    wait_for_captures(&captured, 3).await;
    let bodies = captured.lock().unwrap().clone();
    assert_eq!(bodies.len(), 3);
    for body in &bodies {
        let alerts = body["alerts"].as_object().unwrap();
        assert_eq!(alerts.len(), 1);
        let alert = alerts.values().next().unwrap().as_object().unwrap();
        assert_eq!(alert.len(), 14, "payload must carry the fixed field set");
    }
}

#[tokio::test]
async fn test_at_most_once_across_repeated_snapshots() {
    let (addr, captured) = spawn_capture_server(StatusCode::OK).await;
    let pipeline = pipeline_with_webhook(&format!("http://{}/hook", addr), true);
    let feed = Arc::new(AlertFeed::new("alerts"));
    let _subscription = pipeline.attach(&feed);

    let mut snapshot = Snapshot::new();
    snapshot.insert("t1".into(), threat(Severity::High, "2025-06-01T10:00:00Z", false));
    snapshot.insert("t2".into(), threat(Severity::High, "2025-06-01T10:01:00Z", false));
    feed.publish_snapshot(&snapshot);
    wait_for_captures(&captured, 2).await;

    // the same identifiers reappear in every later snapshot: no new sends
    feed.publish_snapshot(&snapshot);
    feed.publish_snapshot(&snapshot);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(captured.lock().unwrap().len(), 2);
    assert_eq!(pipeline.sender().attempts(), 2);

    // one genuinely new arrival notifies exactly once
    snapshot.insert("t9".into(), threat(Severity::Medium, "2025-06-01T11:00:00Z", false));
    feed.publish_snapshot(&snapshot);
    wait_for_captures(&captured, 3).await;
    assert_eq!(pipeline.sender().attempts(), 3);
}

#[tokio::test]
async fn test_webhook_failures_never_block_alert_updates() {
    // unreachable endpoint: every delivery fails, the pipeline keeps going
    let pipeline = pipeline_with_webhook("http://127.0.0.1:9/hook", true);
    let feed = Arc::new(AlertFeed::new("alerts"));
    let _subscription = pipeline.attach(&feed);

    let mut snapshot = Snapshot::new();
    snapshot.insert("t1".into(), threat(Severity::Critical, "2025-06-01T10:00:00Z", true));
    feed.publish_snapshot(&snapshot);

    assert_eq!(pipeline.alerts().len(), 3); // threat + two synthetic notices
    assert_eq!(pipeline.metrics().threats_detected, 1);
    assert!(pipeline.status().error.is_none());

    // the failed identifier is already claimed: no retry on later snapshots
    feed.publish_snapshot(&snapshot);
    assert_eq!(pipeline.sender().attempts(), 1);
}

// ── Scenario 2: Relay Endpoint Round-Trip ────────────────────────────────

#[tokio::test]
async fn test_relay_round_trip() {
    let (upstream, captured) = spawn_capture_server(StatusCode::OK).await;
    let relay = RelayState::new(&format!("http://{}/hook", upstream));
    let addr = spawn_router(relay_router(relay.clone())).await;

    let body = json!({
        "id": "abc123",
        "alert_type": "ssh_bruteforce",
        "city": "Lyon",
        "country": "FR",
        "device_id": "honeypot-01",
        "ip_blocked": "203.0.113.9",
        "loc": "45.76,4.83",
        "org": "AS64500 ExampleNet",
        "public_ip": "203.0.113.9",
        "raw_message": "SSH brute force attempt",
        "region": "ARA",
        "severity": "critical",
        "timestamp": "2025-06-01T10:00:00Z",
        "timezone": "Europe/Paris",
        "uploaded_at": "2025-06-01T10:00:05Z",
    });
    let resp = reqwest::Client::new()
        .post(format!("http://{}/api/webhook", addr))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "success": true }));

    wait_for_captures(&captured, 1).await;
    let forwarded = captured.lock().unwrap()[0].clone();
    let alert = &forwarded["alerts"]["abc123"];
    assert_eq!(alert.as_object().unwrap().len(), 14);
    assert_eq!(alert["alert_type"], "ssh_bruteforce");
    assert_eq!(alert["severity"], "critical");
    assert_eq!(alert["uploaded_at"], "2025-06-01T10:00:05Z");
    assert_eq!(relay.relayed(), 1);
}

#[tokio::test]
async fn test_relay_collapses_upstream_failures_to_generic_500() {
    // upstream answers 502: relay reports the one generic failure shape
    let (upstream, _captured) = spawn_capture_server(StatusCode::BAD_GATEWAY).await;
    let relay = RelayState::new(&format!("http://{}/hook", upstream));
    let addr = spawn_router(relay_router(relay.clone())).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/api/webhook", addr))
        .json(&json!({ "id": "abc123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "error": "Webhook failed" }));

    // unreachable upstream: same collapse, no distinct error code
    let dead_relay = RelayState::new("http://127.0.0.1:9/hook");
    let dead_addr = spawn_router(relay_router(dead_relay)).await;
    let resp = client
        .post(format!("http://{}/api/webhook", dead_addr))
        .json(&json!({ "id": "abc123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "error": "Webhook failed" }));
    assert_eq!(relay.failed(), 1);

    // malformed body: same generic collapse
    let resp = client
        .post(format!("http://{}/api/webhook", dead_addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "error": "Webhook failed" }));
}

// ── Scenario 3: HTTP Snapshot Ingest ─────────────────────────────────────

#[tokio::test]
async fn test_http_ingest_feeds_pipeline() {
    let pipeline = pipeline_with_webhook("http://127.0.0.1:9/hook", true);
    let feed = Arc::new(AlertFeed::new("alerts"));
    let _subscription = pipeline.attach(&feed);
    let adapter = IngestAdapter::new("127.0.0.1:0".parse().unwrap());
    let addr = spawn_router(adapter.router(feed.clone())).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/feed/alerts", addr);

    let resp = client
        .post(&url)
        .json(&json!({
            "t1": {
                "alert_type": "port_scan",
                "severity": "high",
                "uploaded_at": "2025-06-01T10:00:00Z",
                "ip_blocked": "198.51.100.7",
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(pipeline.snapshots_processed(), 1);
    assert_eq!(pipeline.metrics().threats_detected, 1);
    assert_eq!(pipeline.metrics().blocked_ips, 1);
    assert!(pipeline.alerts().iter().any(|a| a.id == "alert-t1"));
    assert!(!pipeline.status().loading);

    // malformed push: rejected, surfaced as a user-visible feed error
    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        pipeline.status().error.as_deref(),
        Some("Failed to fetch real-time data")
    );
    assert_eq!(adapter.pushes_rejected(), 1);

    // empty push: valid empty collection, clears the error state
    let resp = client.post(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(pipeline.status().error.is_none());
    assert_eq!(pipeline.metrics().threats_detected, 0);
    assert_eq!(adapter.snapshots_received(), 2);
}

// ── Scenario 4: Lifecycle Across Live Recomputations ─────────────────────

#[tokio::test]
async fn test_lifecycle_flags_survive_live_recomputation() {
    let pipeline = pipeline_with_webhook("http://127.0.0.1:9/hook", true);
    let feed = Arc::new(AlertFeed::new("alerts"));
    let _subscription = pipeline.attach(&feed);

    let mut snapshot = Snapshot::new();
    snapshot.insert("t1".into(), threat(Severity::High, "2025-06-01T10:00:00Z", false));
    snapshot.insert("t2".into(), threat(Severity::Critical, "2025-06-01T10:01:00Z", true));
    feed.publish_snapshot(&snapshot);

    pipeline.mark_as_read("alert-t1");
    pipeline.dismiss_alert("alert-t2");

    // the next live snapshot recomputes everything but the user flags
    feed.publish_snapshot(&snapshot);
    let alerts = pipeline.alerts();
    assert!(alerts.iter().find(|a| a.id == "alert-t1").unwrap().read);
    assert!(alerts.iter().all(|a| a.id != "alert-t2"));

    // clear_all drops the history: the rebuild starts from scratch
    pipeline.clear_all();
    feed.publish_snapshot(&snapshot);
    let alerts = pipeline.alerts();
    assert!(alerts.iter().any(|a| a.id == "alert-t2"));
    assert!(alerts.iter().all(|a| !a.read && !a.dismissed));
    assert_eq!(pipeline.unread_count(), 4);
}
