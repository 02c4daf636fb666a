//! # smrtlink-doctor
//!
//! A health and job monitor for one or more SMRT Link servers.
//!
//! This crate polls each configured server's REST API on a fixed interval
//! (server status, system version, alarms and job listings per job type),
//! maps the raw JSON into domain entities and keeps the latest snapshot per
//! resource. A failing or slow server never blocks the others, and a failed
//! poll never erases the last good data.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Coordinator                          │
//! │   per system:  Poller(status)  Poller(alarms)  Poller(jobs)  │
//! │                     │               │              │         │
//! │                     ▼               ▼              ▼         │
//! │                ResourceSlot    ResourceSlot   ResourceSlot   │
//! └─────────────────────┬────────────────────────────────────────┘
//!                       │ fetch
//!                       ▼
//!   SystemStatusClient ──▶ TransportClient (HttpTransport) ──▶ GET <base>/<path>
//!          │
//!          ▼
//!   data::mapper ──▶ ServerStatus | ServiceJob | Alarm | JobEvent
//! ```
//!
//! - **[`transport`]**: JSON-over-HTTP GET with a per-request timeout
//! - **[`client`]**: Typed operations for one server, plus the
//!   best-effort / all-or-nothing request combinators
//! - **[`data`]**: Domain entities, JSON mapping and job summaries
//! - **[`poll`]**: Interval-driven pollers and per-resource state slots
//! - **[`coordinator`]**: Many systems, each with its own pollers
//! - **[`config`]**: File and environment configuration
//! - **[`report`]**: Status lines and JSON export
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch the default system (smrtlink-alpha:8081)
//! smrtlink-doctor
//!
//! # Watch two systems every 10 seconds
//! smrtlink-doctor --system alpha:8081 --system beta:9091 --interval 10s
//!
//! # One-shot export of everything to JSON
//! smrtlink-doctor --config doctor.toml --export state.json
//!
//! # A job and its events
//! smrtlink-doctor --system alpha:8081 --job 1234
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use smrtlink_doctor::{HttpTransport, RemoteEndpoint, SystemStatusClient};
//! use smrtlink_doctor::data::summary::summarize;
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(HttpTransport::builder().build().unwrap());
//! let client = SystemStatusClient::new(RemoteEndpoint::new("smrtlink-alpha", 8081), transport);
//!
//! let jobs = client.get_jobs_by_type("pbsmrtpipe").await.unwrap();
//! let summary = summarize(&jobs);
//! println!("{} failed of {}", summary.num_failed, summary.total);
//! # });
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod endpoint;
pub mod error;
pub mod poll;
pub mod report;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use client::SystemStatusClient;
pub use config::AppConfig;
pub use coordinator::{Coordinator, MonitoredSystemState, SystemHealth, WatchedSystem};
pub use data::{
    Alarm, JobEvent, JobState, JobSummary, ServerStatus, ServiceJob, ServiceJobWithEvents,
    TotalPolicy,
};
pub use endpoint::RemoteEndpoint;
pub use error::{ClientError, MappingError, TransportError};
pub use transport::{HttpTransport, TransportClient};
