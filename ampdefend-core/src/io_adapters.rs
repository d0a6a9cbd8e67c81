//! # I/O Adapters — HTTP surfaces in front of the pipeline
//!
//! Two inbound surfaces:
//!
//! - [`IngestAdapter`] — the upstream real-time store pushes the *full*
//!   current contents of the alert collection here; each push becomes one
//!   snapshot delivery on the [`AlertFeed`].
//! - [`relay_router`] — the same-origin webhook relay: accepts one
//!   flattened record, re-wraps it into the nested payload shape, and
//!   forwards it to the real automation endpoint. Any upstream failure
//!   collapses to a single generic 500.

use crate::error::DefendResult;
use crate::feed::AlertFeed;
use crate::types::Snapshot;
use crate::webhook::{WebhookAlert, WebhookPayload};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

// ── Snapshot Ingest Adapter ──────────────────────────────────────────────

/// Accepts full-collection pushes from the upstream store and republishes
/// them as feed snapshots. An empty or `null` body is a valid empty
/// collection; malformed JSON is surfaced to subscribers as a feed error.
pub struct IngestAdapter {
    bind_addr: SocketAddr,
    received: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

#[derive(Clone)]
struct IngestState {
    feed: Arc<AlertFeed>,
    received: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

/// Parse a pushed collection body. Absence of the collection (empty body or
/// JSON `null`) is an empty snapshot, not an error.
pub fn parse_snapshot(body: &[u8]) -> Result<Snapshot, serde_json::Error> {
    if body.is_empty() {
        return Ok(Snapshot::new());
    }
    let parsed: Option<Snapshot> = serde_json::from_slice(body)?;
    Ok(parsed.unwrap_or_default())
}

async fn handle_push(State(state): State<IngestState>, body: Bytes) -> (StatusCode, &'static str) {
    match parse_snapshot(&body) {
        Ok(snapshot) => {
            state.received.fetch_add(1, Ordering::Relaxed);
            state.feed.publish_snapshot(&snapshot);
            (StatusCode::OK, "OK")
        }
        Err(e) => {
            state.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Rejected malformed feed push");
            state.feed.publish_error("Failed to fetch real-time data");
            (StatusCode::BAD_REQUEST, "invalid snapshot")
        }
    }
}

impl IngestAdapter {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind_addr: bind,
            received: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Router serving `POST /feed/<collection>`.
    pub fn router(&self, feed: Arc<AlertFeed>) -> Router {
        let state = IngestState {
            feed: feed.clone(),
            received: self.received.clone(),
            rejected: self.rejected.clone(),
        };
        Router::new()
            .route(&format!("/feed/{}", feed.collection()), post(handle_push))
            .with_state(state)
    }

    /// Start the ingest HTTP server in a background task.
    pub fn start(&self, feed: Arc<AlertFeed>) -> DefendResult<()> {
        let addr = self.bind_addr;
        let app = self.router(feed);
        info!(bind = %addr, "Snapshot ingest adapter starting");

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, "Failed to bind ingest listener");
                    return;
                }
            };
            info!(bind = %addr, "Snapshot ingest adapter listening");
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Ingest server error");
            }
        });

        Ok(())
    }

    pub fn snapshots_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
    pub fn pushes_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

// ── Webhook Relay Endpoint ───────────────────────────────────────────────

/// Flattened record accepted by the relay: identifier plus the fourteen
/// forwarded fields. Input is passed through without validation; missing
/// fields default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayRecord {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub fields: WebhookAlert,
}

#[derive(Clone)]
pub struct RelayState {
    client: reqwest::Client,
    webhook_url: String,
    relayed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl RelayState {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            relayed: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

async fn handle_relay(
    State(state): State<RelayState>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    // malformed bodies collapse to the same generic failure as upstream
    // errors; the relay distinguishes nothing
    let record: RelayRecord = match serde_json::from_slice(&body) {
        Ok(record) => record,
        Err(e) => {
            state.failed.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Relay received malformed body");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Webhook failed" })));
        }
    };
    let payload = WebhookPayload::wrap(&record.id, record.fields);
    match state.client.post(&state.webhook_url).json(&payload).send().await {
        Ok(resp) if resp.status().is_success() => {
            state.relayed.fetch_add(1, Ordering::Relaxed);
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Ok(resp) => {
            state.failed.fetch_add(1, Ordering::Relaxed);
            warn!(status = %resp.status(), "Relay upstream response not OK");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Webhook failed" })))
        }
        Err(e) => {
            state.failed.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Relay upstream request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Webhook failed" })))
        }
    }
}

/// Router serving `POST /api/webhook`. Mounted on the dashboard bind so the
/// relay stays same-origin with the UI that calls it.
pub fn relay_router(state: RelayState) -> Router {
    Router::new().route("/api/webhook", post(handle_relay)).with_state(state)
}
