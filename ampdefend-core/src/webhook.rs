//! # Webhook Sender — fire-and-forget alert forwarding
//!
//! Serializes the fixed fourteen-field payload for one alert and POSTs it to
//! the automation endpoint. Delivery is best-effort: the snapshot path never
//! awaits the outcome, non-2xx responses and transport failures are logged
//! and swallowed, and a dropped delivery gets no second attempt.

use crate::types::ThreatRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The fixed field set forwarded for every alert. Fields absent on the
/// record are sent as empty strings, never omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookAlert {
    pub alert_type: String,
    pub city: String,
    pub country: String,
    pub device_id: String,
    pub ip_blocked: String,
    pub loc: String,
    pub org: String,
    pub public_ip: String,
    pub raw_message: String,
    pub region: String,
    pub severity: String,
    pub timestamp: String,
    pub timezone: String,
    pub uploaded_at: String,
}

impl WebhookAlert {
    pub fn from_record(record: &ThreatRecord) -> Self {
        Self {
            alert_type: record.alert_type.clone().unwrap_or_default(),
            city: record.city.clone().unwrap_or_default(),
            country: record.country.clone().unwrap_or_default(),
            device_id: record.device_id.clone().unwrap_or_default(),
            ip_blocked: record.ip_blocked.clone().unwrap_or_default(),
            loc: record.loc.clone().unwrap_or_default(),
            org: record.org.clone().unwrap_or_default(),
            public_ip: record.public_ip.clone().unwrap_or_default(),
            raw_message: record.raw_message.clone().unwrap_or_default(),
            region: record.region.clone().unwrap_or_default(),
            severity: record.severity.map(|s| s.as_str().to_string()).unwrap_or_default(),
            timestamp: record.timestamp.clone().unwrap_or_default(),
            timezone: record.timezone.clone().unwrap_or_default(),
            uploaded_at: record.uploaded_at.clone().unwrap_or_default(),
        }
    }
}

/// Wire shape expected by the automation endpoint: a single top-level
/// `alerts` mapping from identifier to the fourteen fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub alerts: HashMap<String, WebhookAlert>,
}

impl WebhookPayload {
    pub fn single(id: &str, record: &ThreatRecord) -> Self {
        let mut alerts = HashMap::new();
        alerts.insert(id.to_string(), WebhookAlert::from_record(record));
        Self { alerts }
    }

    pub fn wrap(id: &str, alert: WebhookAlert) -> Self {
        let mut alerts = HashMap::new();
        alerts.insert(id.to_string(), alert);
        Self { alerts }
    }
}

/// Forwards alerts to the configured automation endpoint.
pub struct WebhookSender {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    attempts: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl WebhookSender {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
            attempts: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs.max(1));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fire-and-forget: spawns the POST and returns immediately. The caller
    /// sees nothing beyond the attempt counter; outcomes only reach the log.
    /// Requires a running tokio runtime.
    pub fn dispatch(&self, id: &str, record: &ThreatRecord) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let payload = WebhookPayload::single(id, record);
        let client = self.client.clone();
        let url = self.url.clone();
        let timeout = self.timeout;
        let delivered = self.delivered.clone();
        let failed = self.failed.clone();
        let id = id.to_string();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).timeout(timeout).send().await {
                Ok(resp) if resp.status().is_success() => {
                    delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(id = %id, "Alert forwarded to webhook");
                }
                Ok(resp) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!(id = %id, status = %resp.status(), "Webhook response not OK");
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!(id = %id, error = %e, "Webhook delivery failed");
                }
            }
        });
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
