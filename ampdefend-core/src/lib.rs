//! # AMPDefend Core — Honeypot Alert Ingestion & Notification Pipeline
//!
//! The library behind the AMPDefend monitoring service. It consumes full
//! point-in-time snapshots of the upstream honeypot alert collection and
//! drives everything downstream of them:
//!
//! - **Live feed** (`feed`) — one standing subscription to the alert
//!   collection, with scoped acquisition and guaranteed release
//! - **Dedup/notify tracker** (`notify`) — at-most-once webhook forwarding
//!   per alert identifier for the lifetime of the session
//! - **Webhook sender** (`webhook`) — fire-and-forget delivery of the fixed
//!   fourteen-field alert payload to the automation endpoint
//! - **Alert lifecycle store** (`alerts`) — derived presentation alerts with
//!   read/dismiss state that survives recomputation
//! - **Metrics aggregator** (`metrics`) — dashboard counters from the
//!   current snapshot
//! - **I/O adapters** (`io_adapters`) — HTTP ingest of snapshots and the
//!   same-origin webhook relay endpoint
//!
//! Map rendering, charts, authentication, and billing are out of scope; the
//! presentation layer reads the alert list and counters through
//! `pipeline::IngestPipeline`.

pub mod alerts;
pub mod config;
pub mod error;
pub mod feed;
pub mod io_adapters;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod types;
pub mod webhook;

pub use config::DefendConfig;
pub use error::{DefendError, DefendResult};
pub use pipeline::IngestPipeline;
