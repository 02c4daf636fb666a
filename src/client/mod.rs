//! Per-system REST operations.
//!
//! [`SystemStatusClient`] wraps one [`RemoteEndpoint`] and a shared
//! [`TransportClient`]. Single-request operations map their payload with
//! [`crate::data::mapper`]; composed operations use the combinators in
//! [`compose`] so that their failure semantics are visible at the call site.
//!
//! ## REST surface
//!
//! | Operation | Path |
//! |---|---|
//! | status | `status` |
//! | system version | `services/manifests` |
//! | jobs by type | `secondary-analysis/job-manager/jobs/{jobType}` |
//! | job by id | `secondary-analysis/job-manager/jobs/import-dataset/{jobId}` |
//! | job events | `secondary-analysis/job-manager/jobs/import-dataset/{jobId}/events` |
//! | alarms | `smrt-base/alarms` |

pub mod compose;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::data::mapper;
use crate::data::{
    Alarm, JobEvent, ServerStatus, ServiceJob, ServiceJobWithEvents, UNKNOWN_SYSTEM_VERSION,
};
use crate::endpoint::RemoteEndpoint;
use crate::error::ClientError;
use crate::transport::TransportClient;

use compose::{all_or_nothing, best_effort};

/// Manifest id that carries the SMRT Link system version.
pub const SMRTLINK_MANIFEST_ID: &str = "smrtlink";

/// Job type namespace used for job-by-id lookups, whatever the job's real
/// type is. The server resolves ids across types under this path.
pub const JOB_LOOKUP_NAMESPACE: &str = "import-dataset";

const JOBS_ROOT: &str = "secondary-analysis/job-manager/jobs";

pub fn status_path() -> &'static str {
    "status"
}

pub fn manifests_path() -> &'static str {
    "services/manifests"
}

pub fn alarms_path() -> &'static str {
    "smrt-base/alarms"
}

pub fn jobs_path(job_type: &str) -> String {
    format!("{}/{}", JOBS_ROOT, job_type)
}

pub fn job_path(job_id: i64) -> String {
    format!("{}/{}/{}", JOBS_ROOT, JOB_LOOKUP_NAMESPACE, job_id)
}

pub fn job_events_path(job_id: i64) -> String {
    format!("{}/events", job_path(job_id))
}

/// Endpoint-relative path of a job's detail page.
pub fn job_page_path(job_id: i64) -> String {
    format!("{}/{}", JOBS_ROOT, job_id)
}

/// Client for one monitored SMRT Link system.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use smrtlink_doctor::{HttpTransport, RemoteEndpoint, SystemStatusClient};
///
/// # tokio_test::block_on(async {
/// let transport = Arc::new(HttpTransport::builder().timeout_millis(5_000).build().unwrap());
/// let client = SystemStatusClient::new(RemoteEndpoint::new("smrtlink-alpha", 8081), transport);
///
/// let status = client.get_versions().await.unwrap();
/// println!("{} (system {:?})", status.summary_line(), status.system_version);
/// # });
/// ```
#[derive(Clone)]
pub struct SystemStatusClient {
    endpoint: RemoteEndpoint,
    transport: Arc<dyn TransportClient>,
}

impl SystemStatusClient {
    pub fn new(endpoint: RemoteEndpoint, transport: Arc<dyn TransportClient>) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Endpoint-relative path of a job's detail page.
    pub fn job_url(&self, job_id: i64) -> String {
        job_page_path(job_id)
    }

    async fn fetch(&self, path: &str) -> Result<Value, ClientError> {
        let value = self.transport.get(&self.endpoint, path).await?;
        Ok(value)
    }

    pub async fn get_status(&self) -> Result<ServerStatus, ClientError> {
        let json = self.fetch(status_path()).await?;
        Ok(mapper::map_status(&json))
    }

    /// Look up the `smrtlink` manifest version.
    ///
    /// Resolves to `"Unknown"` when the listing has no such entry; fails
    /// when the listing itself cannot be fetched or mapped.
    pub async fn try_get_system_version(&self) -> Result<String, ClientError> {
        let json = self.fetch(manifests_path()).await?;
        let manifests = mapper::map_manifests(&json)?;

        let version = manifests
            .iter()
            .find(|m| m.id == SMRTLINK_MANIFEST_ID)
            .map(|m| mapper::normalize_version(Some(&m.version), UNKNOWN_SYSTEM_VERSION));

        if version.is_none() {
            debug!(endpoint = %self.endpoint, "no '{}' manifest", SMRTLINK_MANIFEST_ID);
        }
        Ok(version.unwrap_or_else(|| UNKNOWN_SYSTEM_VERSION.to_string()))
    }

    /// Like [`try_get_system_version`](Self::try_get_system_version), but
    /// any failure resolves to `"Unknown"`.
    pub async fn get_system_version(&self) -> String {
        self.try_get_system_version().await.unwrap_or_else(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "system version lookup failed");
            UNKNOWN_SYSTEM_VERSION.to_string()
        })
    }

    /// Status with the system version attached.
    ///
    /// The manifest lookup is best-effort: its failure yields
    /// `system_version == "Unknown"`. A status failure fails the call.
    pub async fn get_versions(&self) -> Result<ServerStatus, ClientError> {
        let (status, version) = best_effort(
            self.get_status(),
            self.try_get_system_version(),
            || UNKNOWN_SYSTEM_VERSION.to_string(),
        )
        .await?;
        Ok(status.with_system_version(version))
    }

    pub async fn get_jobs_by_type(&self, job_type: &str) -> Result<Vec<ServiceJob>, ClientError> {
        let json = self.fetch(&jobs_path(job_type)).await?;
        Ok(mapper::map_jobs(&json)?)
    }

    pub async fn get_alarms(&self) -> Result<Vec<Alarm>, ClientError> {
        let json = self.fetch(alarms_path()).await?;
        Ok(mapper::map_alarms(&json)?)
    }

    pub async fn get_job_by_id(&self, job_id: i64) -> Result<ServiceJob, ClientError> {
        let json = self.fetch(&job_path(job_id)).await?;
        Ok(mapper::map_job(&json)?)
    }

    /// Events for a job, in feed order.
    pub async fn get_job_events(&self, job_id: i64) -> Result<Vec<JobEvent>, ClientError> {
        let json = self.fetch(&job_events_path(job_id)).await?;
        Ok(mapper::map_events(&json)?)
    }

    /// A job and its events. Either request failing fails the call.
    pub async fn get_service_job_with_events(
        &self,
        job_id: i64,
    ) -> Result<ServiceJobWithEvents, ClientError> {
        let (job, events) = all_or_nothing(
            ("job lookup", self.get_job_by_id(job_id)),
            ("job events", self.get_job_events(job_id)),
        )
        .await?;
        Ok(ServiceJobWithEvents { job, events })
    }
}

impl fmt::Debug for SystemStatusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemStatusClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
