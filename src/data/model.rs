//! Domain entities produced by the mapper.
//!
//! All entities are immutable snapshots: each poll cycle replaces the prior
//! value wholesale.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback for a system version that could not be resolved.
pub const UNKNOWN_SYSTEM_VERSION: &str = "Unknown";

/// Fallback for a job whose `smrtlinkVersion` is absent.
pub const UNKNOWN_SMRT_LINK_VERSION: &str = "UNKNOWN";

/// Server status as reported by `GET status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub instance_id: String,
    pub uuid: String,
    pub service_version: String,
    /// Filled in from the manifest listing by
    /// [`get_versions`](crate::client::SystemStatusClient::get_versions).
    pub system_version: Option<String>,
    pub uptime_millis: u64,
    pub status_code: String,
    pub message: String,
}

impl ServerStatus {
    /// Attach a resolved system version.
    pub fn with_system_version(mut self, version: impl Into<String>) -> Self {
        self.system_version = Some(version.into());
        self
    }

    /// `"<message> from Version:<serviceVersion>"`, the dashboard status line.
    pub fn summary_line(&self) -> String {
        format!("{} from Version:{}", self.message, self.service_version)
    }
}

/// Job state. Unknown server-defined states are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Created,
    Running,
    Successful,
    Failed,
    Other(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Created => "CREATED",
            JobState::Running => "RUNNING",
            JobState::Successful => "SUCCESSFUL",
            JobState::Failed => "FAILED",
            JobState::Other(s) => s,
        }
    }
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s {
            "CREATED" => JobState::Created,
            "RUNNING" => JobState::Running,
            "SUCCESSFUL" => JobState::Successful,
            "FAILED" => JobState::Failed,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        JobState::from(s.as_str())
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record from the job manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceJob {
    pub id: i64,
    pub name: String,
    pub job_type_id: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `updated_at - created_at`, never negative.
    pub run_time_secs: f64,
    /// `"UNKNOWN"` when the server did not report one.
    pub smrt_link_version: String,
    pub created_by: Option<String>,
    pub path: Option<String>,
    pub error_message: Option<String>,
}

/// A job lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: i64,
    pub state: JobState,
    pub event_id: String,
    pub event_type_id: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// A system alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub name: String,
    pub state: String,
    pub updated_at: DateTime<Utc>,
    pub message: Option<String>,
}

/// One entry of `GET services/manifests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub version: String,
}

/// A job correlated with its event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceJobWithEvents {
    pub job: ServiceJob,
    pub events: Vec<JobEvent>,
}

impl ServiceJobWithEvents {
    /// Events ordered by `created_at`; ties keep feed order.
    pub fn events_chronological(&self) -> Vec<JobEvent> {
        let mut events = self.events.clone();
        events.sort_by_key(|e| e.created_at);
        events
    }
}
