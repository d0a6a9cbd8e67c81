//! # Config Loader — Loads and validates TOML configuration
//!
//! Reads `ampdefend.toml` (or a custom path) and deserializes into typed
//! config structs. Missing files fall back to defaults so the service can
//! start with nothing but environment overrides.

use crate::types::SystemStatus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable that overrides the configured webhook target.
pub const WEBHOOK_URL_ENV: &str = "AMPDEFEND_WEBHOOK_URL";

/// Default automation endpoint, matching the local n8n test hook the
/// dashboards were developed against.
pub const DEFAULT_WEBHOOK_URL: &str =
    "http://localhost:5678/webhook-test/ec07343d-c58e-4591-b0d5-abe742db1d1c";

/// Top-level AMPDefend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefendConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { log_level: "info".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Name of the upstream collection the subscription is keyed by.
    pub collection: String,
    /// Bind address for the HTTP snapshot ingest adapter.
    pub ingest_bind: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            collection: "alerts".into(),
            ingest_bind: "127.0.0.1:9810".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Automation endpoint for alert forwarding. `AMPDEFEND_WEBHOOK_URL`
    /// overrides this at startup.
    pub url: String,
    /// Per-request timeout for webhook POSTs.
    pub timeout_secs: u64,
    /// Whether every identifier present in the first snapshot is forwarded.
    /// `false` seeds the dedup tracker from the initial backlog without
    /// sending, so only arrivals after startup notify downstream.
    pub notify_backlog: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WEBHOOK_URL.into(),
            timeout_secs: 5,
            notify_backlog: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Bind address for the dashboard API and the relay endpoint.
    pub api_bind: String,
    /// Deployed honeypot count shown on the dashboard. Static placeholder:
    /// the feed carries no fleet inventory to derive it from.
    pub active_honeypots: u32,
    /// Reported service status. Static placeholder, same reason.
    pub system_status: SystemStatus,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_bind: "127.0.0.1:9800".into(),
            active_honeypots: 12,
            system_status: SystemStatus::Online,
        }
    }
}

impl DefendConfig {
    /// Load config from a TOML file path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;
        let config: DefendConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        info!(
            path = %path.display(),
            collection = %config.feed.collection,
            notify_backlog = config.webhook.notify_backlog,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Save current config to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// Webhook target after applying the environment override.
    pub fn resolved_webhook_url(&self) -> String {
        match std::env::var(WEBHOOK_URL_ENV) {
            Ok(url) if !url.is_empty() => url,
            _ => self.webhook.url.clone(),
        }
    }
}
