//! # Alert Lifecycle Store — stateful presentation alerts
//!
//! Derives the alert list the dashboard consumes from the raw threat
//! snapshot: high/critical threats become alerts, two synthetic
//! system/maintenance notices are appended, and the combined list is kept
//! newest-first. User-applied read/dismiss state lives in a keyed flag store
//! separate from the derived view, so a full recomputation never loses a
//! user action: the view is rebuilt from the feed, the flags are not.
//!
//! `dismiss` hides an alert but keeps its flag history for later snapshots;
//! `clear_all` drops both the view and the flag history, so subsequent
//! snapshots rebuild from scratch.

use crate::types::{Severity, Snapshot, ThreatRecord};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed identifiers for the synthetic notices.
pub const DEPLOYMENT_NOTICE_ID: &str = "system-1";
pub const MAINTENANCE_NOTICE_ID: &str = "system-2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Threat,
    System,
    Maintenance,
    Info,
}

/// A presentation-level alert: a threat record or synthetic notice plus the
/// user-facing lifecycle flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub dismissed: bool,
    pub action_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct AlertFlags {
    read: bool,
    dismissed: bool,
}

/// Build a threat-derived alert. Only high/critical records qualify.
fn threat_alert(id: &str, record: &ThreatRecord) -> Option<Alert> {
    let severity = record.severity?;
    if severity < Severity::High {
        return None;
    }
    let alert_type = record.alert_type.as_deref().unwrap_or("unknown");
    let title = format!("{} Detected", alert_type.replace('_', " ").to_uppercase());
    let message = format!(
        "{} - Activity from {} ({}, {}) targeting {}. VPN likelihood: {}%",
        record.raw_message.as_deref().unwrap_or_default(),
        record.public_ip.as_deref().unwrap_or_default(),
        record.city.as_deref().unwrap_or_default(),
        record.country.as_deref().unwrap_or_default(),
        record.device_id.as_deref().unwrap_or_default(),
        record.vpn_likelihood.unwrap_or(0.0),
    );
    Some(Alert {
        id: format!("alert-{}", id),
        kind: AlertKind::Threat,
        severity,
        title,
        message,
        timestamp: record.uploaded_time().unwrap_or_else(Utc::now),
        read: false,
        dismissed: false,
        action_required: record.is_blocked(),
        source_ip: record.public_ip.clone(),
        target_device: record.device_id.clone(),
        threat_type: record.alert_type.clone(),
    })
}

/// The two synthetic notices every recomputation appends, carrying relative
/// timestamps (30 and 60 minutes before the recomputation).
fn synthetic_alerts(now: DateTime<Utc>) -> Vec<Alert> {
    vec![
        Alert {
            id: DEPLOYMENT_NOTICE_ID.into(),
            kind: AlertKind::System,
            severity: Severity::Medium,
            title: "Honeypot Deployment".into(),
            message: "New honeypot device successfully deployed to network segment 192.168.1.0/24"
                .into(),
            timestamp: now - Duration::minutes(30),
            read: false,
            dismissed: false,
            action_required: false,
            source_ip: None,
            target_device: None,
            threat_type: None,
        },
        Alert {
            id: MAINTENANCE_NOTICE_ID.into(),
            kind: AlertKind::Maintenance,
            severity: Severity::Low,
            title: "Scheduled Maintenance".into(),
            message: "System maintenance scheduled for tonight at 2:00 AM EST. Expected downtime: 30 minutes."
                .into(),
            timestamp: now - Duration::hours(1),
            read: false,
            dismissed: false,
            action_required: false,
            source_ip: None,
            target_device: None,
            threat_type: None,
        },
    ]
}

pub struct AlertStore {
    /// Derived, sorted view. Includes dismissed entries; consumers see the
    /// filtered list through `alerts()`.
    view: RwLock<Vec<Alert>>,
    /// User-applied state keyed by alert identifier. Survives recomputation.
    flags: RwLock<HashMap<String, AlertFlags>>,
    recomputes: AtomicU64,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            view: RwLock::new(Vec::new()),
            flags: RwLock::new(HashMap::new()),
            recomputes: AtomicU64::new(0),
        }
    }

    /// Rebuild the derived view from the snapshot: filter to high/critical,
    /// synthesize, append the synthetic notices, stable-sort newest-first,
    /// then apply the stored flags. Every field except the flags is taken
    /// from the fresh computation.
    pub fn recompute(&self, snapshot: &Snapshot) {
        let now = Utc::now();
        let mut fresh: Vec<Alert> = snapshot
            .iter()
            .filter_map(|(id, record)| threat_alert(id, record))
            .collect();
        fresh.extend(synthetic_alerts(now));
        // stable: entries with equal timestamps keep their input order
        fresh.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        {
            let flags = self.flags.read();
            for alert in &mut fresh {
                if let Some(f) = flags.get(&alert.id) {
                    alert.read = f.read;
                    alert.dismissed = f.dismissed;
                }
            }
        }

        *self.view.write() = fresh;
        self.recomputes.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark one alert read. Unknown identifiers are a silent no-op.
    pub fn mark_as_read(&self, id: &str) {
        {
            let mut view = self.view.write();
            match view.iter_mut().find(|a| a.id == id) {
                Some(alert) => alert.read = true,
                None => return,
            }
        }
        self.flags.write().entry(id.to_string()).or_default().read = true;
    }

    /// Mark every non-dismissed alert read.
    pub fn mark_all_as_read(&self) {
        let mut touched = Vec::new();
        {
            let mut view = self.view.write();
            for alert in view.iter_mut().filter(|a| !a.dismissed) {
                alert.read = true;
                touched.push(alert.id.clone());
            }
        }
        let mut flags = self.flags.write();
        for id in touched {
            flags.entry(id).or_default().read = true;
        }
    }

    /// Hide one alert. The entry stays in the internal view and its flag
    /// history is kept, so later recomputations still see it dismissed.
    /// Unknown identifiers are a silent no-op.
    pub fn dismiss(&self, id: &str) {
        {
            let mut view = self.view.write();
            match view.iter_mut().find(|a| a.id == id) {
                Some(alert) => alert.dismissed = true,
                None => return,
            }
        }
        self.flags.write().entry(id.to_string()).or_default().dismissed = true;
    }

    /// Discard the entire internal list, flag history included. Later
    /// snapshots rebuild every alert with fresh flags.
    pub fn clear_all(&self) {
        self.view.write().clear();
        self.flags.write().clear();
    }

    /// The externally visible list: everything not dismissed, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.view.read().iter().filter(|a| !a.dismissed).cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.view.read().iter().filter(|a| !a.read && !a.dismissed).count()
    }

    /// Internal list length, dismissed entries included.
    pub fn total_count(&self) -> usize {
        self.view.read().len()
    }

    pub fn recomputes(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}
