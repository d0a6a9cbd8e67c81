//! # Metrics Aggregator — dashboard counters from the current snapshot
//!
//! Pure derivation: threats detected and blocked-IP counts come from the
//! snapshot, `last_updated` is stamped at computation time. The honeypot
//! fleet size and the service status are config-sourced placeholders; the
//! feed carries nothing to derive them from.

use crate::types::{Snapshot, SystemStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub active_honeypots: u32,
    pub threats_detected: u64,
    pub blocked_ips: u64,
    pub system_status: SystemStatus,
    pub last_updated: DateTime<Utc>,
}

impl SystemMetrics {
    /// Pre-snapshot baseline: zero counters against the configured fleet.
    pub fn baseline(active_honeypots: u32, status: SystemStatus) -> Self {
        Self {
            active_honeypots,
            threats_detected: 0,
            blocked_ips: 0,
            system_status: status,
            last_updated: Utc::now(),
        }
    }
}

pub struct MetricsAggregator {
    active_honeypots: u32,
    system_status: SystemStatus,
}

impl MetricsAggregator {
    pub fn new(active_honeypots: u32, system_status: SystemStatus) -> Self {
        Self { active_honeypots, system_status }
    }

    pub fn aggregate(&self, snapshot: &Snapshot) -> SystemMetrics {
        SystemMetrics {
            active_honeypots: self.active_honeypots,
            threats_detected: snapshot.len() as u64,
            blocked_ips: snapshot.values().filter(|r| r.is_blocked()).count() as u64,
            system_status: self.system_status,
            last_updated: Utc::now(),
        }
    }
}
