//! Domain model, JSON mapping and job aggregation.
//!
//! ## Submodules
//!
//! - [`model`]: Domain entities ([`ServerStatus`], [`ServiceJob`], [`JobEvent`], [`Alarm`])
//! - [`mapper`]: Total functions from raw JSON payloads to entities
//! - [`summary`]: Counts by state and time-windowed job views
//! - [`duration`]: Interval parsing and uptime / run time formatting
//!
//! ## Data Flow
//!
//! ```text
//! serde_json::Value (raw REST payload)
//!        │
//!        ▼
//! mapper::map_*()
//!        │
//!        ├──▶ ServerStatus / Alarm / JobEvent
//!        │
//!        └──▶ Vec<ServiceJob> ──▶ summary::summarize() / select_recent_by_state()
//! ```

pub mod duration;
pub mod mapper;
pub mod model;
pub mod summary;

pub use model::{
    Alarm, JobEvent, JobState, Manifest, ServerStatus, ServiceJob, ServiceJobWithEvents,
    UNKNOWN_SMRT_LINK_VERSION, UNKNOWN_SYSTEM_VERSION,
};
pub use summary::{JobSummary, TotalPolicy};
