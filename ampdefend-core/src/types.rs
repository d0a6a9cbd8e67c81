//! Shared types for the alert ingestion pipeline.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Threat severity as reported by the honeypot feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Overall service health shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Online,
    Offline,
    Maintenance,
}

impl Default for SystemStatus {
    fn default() -> Self {
        SystemStatus::Online
    }
}

/// A single honeypot-detected security event from the upstream feed.
///
/// Identifiers are assigned by the upstream store and live in the snapshot
/// key, not on the record. Every field is optional free-form input; the
/// pipeline reads records but never mutates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    #[serde(default)]
    pub alert_type: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Set to the blocked address when the honeypot auto-blocked the source.
    #[serde(default)]
    pub ip_blocked: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub raw_message: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub loc: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub vpn_likelihood: Option<f64>,
}

impl ThreatRecord {
    /// `ip_blocked` truthiness: present and non-empty.
    pub fn is_blocked(&self) -> bool {
        self.ip_blocked.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Parsed `uploaded_at`, when the feed sent a recognizable timestamp.
    pub fn uploaded_time(&self) -> Option<DateTime<Utc>> {
        parse_feed_timestamp(self.uploaded_at.as_deref()?)
    }
}

/// Complete contents of the feed's alert collection at one point in time,
/// keyed by upstream identifier. An absent collection is an empty snapshot,
/// not an error. `BTreeMap` keeps iteration deterministic so recomputed
/// orderings are stable across snapshots.
pub type Snapshot = BTreeMap<String, ThreatRecord>;

/// Parse the ISO-ish date strings the feed produces. RFC 3339 first, then
/// the space-separated form some honeypot agents upload.
pub fn parse_feed_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}
