//! Monitoring of several SMRT Link systems at once.
//!
//! The [`Coordinator`] owns one set of pollers per endpoint (status, alarms
//! and one per watched job type). Each poller writes only its own slot, so a
//! stalled or failing system never holds up another. Readers get owned
//! copies through [`Coordinator::current_state_of`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::client::SystemStatusClient;
use crate::data::{Alarm, ServerStatus, ServiceJob};
use crate::endpoint::RemoteEndpoint;
use crate::poll::{
    AlarmsResource, JobsResource, PollSettings, Poller, ResourceSlot, ResourceView, StatusResource,
};
use crate::transport::TransportClient;

/// What to monitor on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedSystem {
    pub endpoint: RemoteEndpoint,
    pub interval: Duration,
    pub job_types: Vec<String>,
}

/// Reachability of a system, judged by its status poll alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemHealth {
    /// No status poll has completed yet.
    Unknown,
    Up,
    Down,
}

impl SystemHealth {
    pub fn label(&self) -> &'static str {
        match self {
            SystemHealth::Unknown => "UNKNOWN",
            SystemHealth::Up => "UP",
            SystemHealth::Down => "DOWN",
        }
    }
}

/// Point-in-time copy of everything known about one system.
#[derive(Debug, Clone)]
pub struct MonitoredSystemState {
    pub endpoint: RemoteEndpoint,
    pub status: ResourceView<ServerStatus>,
    pub alarms: ResourceView<Vec<Alarm>>,
    pub jobs: BTreeMap<String, ResourceView<Vec<ServiceJob>>>,
}

impl MonitoredSystemState {
    pub fn health(&self) -> SystemHealth {
        if self.status.is_failing() {
            SystemHealth::Down
        } else if self.status.has_succeeded() {
            SystemHealth::Up
        } else {
            SystemHealth::Unknown
        }
    }

    /// Whether every resource has completed at least one poll.
    pub fn is_settled(&self) -> bool {
        fn done<T>(view: &ResourceView<T>) -> bool {
            view.has_succeeded() || view.is_failing()
        }
        done(&self.status) && done(&self.alarms) && self.jobs.values().all(done)
    }

    /// Latest good job listing for a job type.
    pub fn jobs_of(&self, job_type: &str) -> Option<&[ServiceJob]> {
        self.jobs
            .get(job_type)
            .and_then(|view| view.value())
            .map(Vec::as_slice)
    }
}

#[derive(Debug)]
struct Slots {
    status: Arc<ResourceSlot<ServerStatus>>,
    alarms: Arc<ResourceSlot<Vec<Alarm>>>,
    jobs: BTreeMap<String, Arc<ResourceSlot<Vec<ServiceJob>>>>,
}

#[derive(Debug, Default)]
struct Pollers {
    status: Option<Poller<ServerStatus>>,
    alarms: Option<Poller<Vec<Alarm>>>,
    jobs: BTreeMap<String, Poller<Vec<ServiceJob>>>,
}

impl Pollers {
    fn stop(&mut self) {
        if let Some(p) = self.status.take() {
            p.stop();
        }
        if let Some(p) = self.alarms.take() {
            p.stop();
        }
        for (_, p) in std::mem::take(&mut self.jobs) {
            p.stop();
        }
    }
}

#[derive(Debug)]
struct MonitoredSystem {
    client: SystemStatusClient,
    settings: PollSettings,
    slots: Slots,
    pollers: Pollers,
}

impl MonitoredSystem {
    fn new(client: SystemStatusClient, settings: PollSettings) -> Self {
        Self {
            client,
            settings,
            slots: Slots {
                status: Arc::new(ResourceSlot::new()),
                alarms: Arc::new(ResourceSlot::new()),
                jobs: BTreeMap::new(),
            },
            pollers: Pollers::default(),
        }
    }

    fn add_job_type(&mut self, job_type: &str) -> bool {
        if self.slots.jobs.contains_key(job_type) {
            return false;
        }
        self.slots
            .jobs
            .insert(job_type.to_string(), Arc::new(ResourceSlot::new()));
        true
    }

    fn start(&mut self) {
        if self.pollers.status.is_none() {
            self.pollers.status = Some(Poller::spawn(
                StatusResource(self.client.clone()),
                Arc::clone(&self.slots.status),
                self.settings,
            ));
        }
        if self.pollers.alarms.is_none() {
            self.pollers.alarms = Some(Poller::spawn(
                AlarmsResource(self.client.clone()),
                Arc::clone(&self.slots.alarms),
                self.settings,
            ));
        }
        let job_types: Vec<String> = self.slots.jobs.keys().cloned().collect();
        for job_type in job_types {
            self.start_jobs(&job_type);
        }
    }

    fn start_jobs(&mut self, job_type: &str) {
        if self.pollers.jobs.contains_key(job_type) {
            return;
        }
        let Some(slot) = self.slots.jobs.get(job_type) else {
            return;
        };
        let poller = Poller::spawn(
            JobsResource {
                client: self.client.clone(),
                job_type: job_type.to_string(),
            },
            Arc::clone(slot),
            self.settings,
        );
        self.pollers.jobs.insert(job_type.to_string(), poller);
    }

    fn state(&self) -> MonitoredSystemState {
        MonitoredSystemState {
            endpoint: self.client.endpoint().clone(),
            status: self.slots.status.view(),
            alarms: self.slots.alarms.view(),
            jobs: self
                .slots
                .jobs
                .iter()
                .map(|(job_type, slot)| (job_type.clone(), slot.view()))
                .collect(),
        }
    }
}

/// Owns the monitored systems and their pollers.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use smrtlink_doctor::{Coordinator, HttpTransport, RemoteEndpoint, WatchedSystem};
///
/// # tokio_test::block_on(async {
/// let transport = Arc::new(HttpTransport::builder().build().unwrap());
/// let mut coordinator = Coordinator::new(transport, Duration::from_secs(10));
/// coordinator.add_system(WatchedSystem {
///     endpoint: RemoteEndpoint::new("smrtlink-alpha", 8081),
///     interval: Duration::from_secs(10),
///     job_types: vec!["pbsmrtpipe".to_string()],
/// });
/// coordinator.start();
///
/// tokio::time::sleep(Duration::from_secs(1)).await;
/// for state in coordinator.current_states() {
///     println!("{} is {}", state.endpoint, state.health().label());
/// }
/// coordinator.stop();
/// # });
/// ```
pub struct Coordinator {
    transport: Arc<dyn TransportClient>,
    systems: BTreeMap<RemoteEndpoint, MonitoredSystem>,
    deadline: Duration,
    running: bool,
}

impl Coordinator {
    /// `deadline` bounds every single poll, whatever the transport does.
    pub fn new(transport: Arc<dyn TransportClient>, deadline: Duration) -> Self {
        Self {
            transport,
            systems: BTreeMap::new(),
            deadline,
            running: false,
        }
    }

    /// Build a coordinator for a fixed list of systems.
    pub fn with_systems(
        transport: Arc<dyn TransportClient>,
        deadline: Duration,
        systems: impl IntoIterator<Item = WatchedSystem>,
    ) -> Self {
        let mut coordinator = Self::new(transport, deadline);
        for system in systems {
            coordinator.add_system(system);
        }
        coordinator
    }

    /// Add a system. Returns `false` if the endpoint is already monitored.
    ///
    /// If the coordinator is running, polling starts right away.
    pub fn add_system(&mut self, target: WatchedSystem) -> bool {
        if self.systems.contains_key(&target.endpoint) {
            return false;
        }

        let client = SystemStatusClient::new(target.endpoint.clone(), Arc::clone(&self.transport));
        let settings = PollSettings::every(target.interval).with_deadline(self.deadline);
        let mut system = MonitoredSystem::new(client, settings);
        for job_type in &target.job_types {
            system.add_job_type(job_type);
        }
        if self.running {
            system.start();
        }

        info!(endpoint = %target.endpoint, interval = ?target.interval, "monitoring system");
        self.systems.insert(target.endpoint, system);
        true
    }

    /// Stop and forget a system. Returns `false` if it was not monitored.
    pub fn remove_system(&mut self, endpoint: &RemoteEndpoint) -> bool {
        match self.systems.remove(endpoint) {
            Some(mut system) => {
                system.pollers.stop();
                info!(endpoint = %endpoint, "stopped monitoring system");
                true
            }
            None => false,
        }
    }

    /// Start watching a job type on a system. Returns `false` if the system
    /// is unknown.
    pub fn watch_jobs(&mut self, endpoint: &RemoteEndpoint, job_type: &str) -> bool {
        let running = self.running;
        let Some(system) = self.systems.get_mut(endpoint) else {
            return false;
        };
        if system.add_job_type(job_type) {
            info!(endpoint = %endpoint, job_type, "watching job type");
        }
        if running {
            system.start_jobs(job_type);
        }
        true
    }

    /// Start polling every system. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        for system in self.systems.values_mut() {
            system.start();
        }
        self.running = true;
    }

    /// Stop every poller. Latest snapshots stay readable.
    pub fn stop(&mut self) {
        for system in self.systems.values_mut() {
            system.pollers.stop();
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &RemoteEndpoint> {
        self.systems.keys()
    }

    pub fn client(&self, endpoint: &RemoteEndpoint) -> Option<&SystemStatusClient> {
        self.systems.get(endpoint).map(|s| &s.client)
    }

    pub fn current_state_of(&self, endpoint: &RemoteEndpoint) -> Option<MonitoredSystemState> {
        self.systems.get(endpoint).map(MonitoredSystem::state)
    }

    /// States of all systems, ordered by endpoint.
    pub fn current_states(&self) -> Vec<MonitoredSystemState> {
        self.systems.values().map(MonitoredSystem::state).collect()
    }

    /// Job types watched on a system.
    pub fn watched_job_types(&self, endpoint: &RemoteEndpoint) -> BTreeSet<String> {
        self.systems
            .get(endpoint)
            .map(|s| s.slots.jobs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::jobs_path;
    use crate::error::TransportError;
    use crate::poll::PollPhase;
    use crate::testing::{job_json, status_json, ScriptedTransport};
    use serde_json::json;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn alpha() -> RemoteEndpoint {
        RemoteEndpoint::new("alpha", 8081)
    }

    fn beta() -> RemoteEndpoint {
        RemoteEndpoint::new("beta", 8081)
    }

    fn watched(endpoint: RemoteEndpoint, job_types: &[&str]) -> WatchedSystem {
        WatchedSystem {
            endpoint,
            interval: INTERVAL,
            job_types: job_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn script_healthy(transport: &ScriptedTransport, endpoint: &RemoteEndpoint) {
        transport.respond(endpoint, "status", status_json(endpoint.host()));
        transport.respond(
            endpoint,
            "services/manifests",
            json!([{"id": "smrtlink", "version": "5.0.0"}]),
        );
        transport.respond(endpoint, "smrt-base/alarms", json!([]));
        transport.respond(
            endpoint,
            &jobs_path("pbsmrtpipe"),
            json!([
                job_json(1, "FAILED", "2017-03-08T08:00:00Z"),
                job_json(2, "SUCCESSFUL", "2017-03-08T09:00:00Z")
            ]),
        );
    }

    async fn advance(d: Duration) {
        tokio::time::sleep(d).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn coordinator(transport: &Arc<ScriptedTransport>) -> Coordinator {
        Coordinator::new(transport.clone(), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_before_start_is_unknown() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut coordinator = coordinator(&transport);
        assert!(coordinator.add_system(watched(alpha(), &["pbsmrtpipe"])));
        assert!(!coordinator.add_system(watched(alpha(), &[])));

        let state = coordinator.current_state_of(&alpha()).unwrap();
        assert_eq!(state.health(), SystemHealth::Unknown);
        assert_eq!(state.status.phase, PollPhase::Idle);
        assert!(state.jobs.contains_key("pbsmrtpipe"));
        assert!(coordinator.current_state_of(&beta()).is_none());
        assert_eq!(
            coordinator.client(&alpha()).map(|c| c.job_url(7)),
            Some("secondary-analysis/job-manager/jobs/7".to_string())
        );
        assert!(coordinator.client(&beta()).is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_all_resources() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport, &alpha());

        let mut coordinator = Coordinator::with_systems(
            transport.clone(),
            Duration::from_secs(30),
            [watched(alpha(), &["pbsmrtpipe"])],
        );
        coordinator.start();
        advance(Duration::from_millis(1)).await;

        let state = coordinator.current_state_of(&alpha()).unwrap();
        assert!(state.is_settled());
        assert_eq!(state.health(), SystemHealth::Up);
        assert_eq!(
            state.status.value().unwrap().system_version.as_deref(),
            Some("5.0.0")
        );
        assert_eq!(state.alarms.value().map(Vec::len), Some(0));
        assert_eq!(state.jobs_of("pbsmrtpipe").map(<[ServiceJob]>::len), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated_per_system_and_resource() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport, &alpha());
        script_healthy(&transport, &beta());

        let mut coordinator = coordinator(&transport);
        coordinator.add_system(watched(alpha(), &["pbsmrtpipe"]));
        coordinator.add_system(watched(beta(), &["pbsmrtpipe"]));
        coordinator.start();
        advance(Duration::from_millis(1)).await;

        // Beta's status endpoint goes down; its job listing keeps working.
        transport.fail(&beta(), "status", TransportError::NetworkUnreachable("refused".into()));
        advance(INTERVAL).await;

        let alpha_state = coordinator.current_state_of(&alpha()).unwrap();
        let beta_state = coordinator.current_state_of(&beta()).unwrap();
        assert_eq!(alpha_state.health(), SystemHealth::Up);
        assert_eq!(beta_state.health(), SystemHealth::Down);
        // Last known status is still visible alongside the error.
        assert!(beta_state.status.value().is_some());
        assert_eq!(beta_state.jobs["pbsmrtpipe"].phase, PollPhase::Success);
        assert_eq!(beta_state.jobs_of("pbsmrtpipe").map(<[ServiceJob]>::len), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_system_does_not_delay_others() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport, &alpha());
        transport.respond_after(&beta(), "status", status_json("beta"), Duration::from_secs(3600));

        let mut coordinator = coordinator(&transport);
        coordinator.add_system(watched(alpha(), &[]));
        coordinator.add_system(watched(beta(), &[]));
        coordinator.start();
        advance(Duration::from_millis(1)).await;

        assert_eq!(
            coordinator.current_state_of(&alpha()).unwrap().health(),
            SystemHealth::Up
        );
        let beta_state = coordinator.current_state_of(&beta()).unwrap();
        assert_eq!(beta_state.status.phase, PollPhase::Polling);
        assert_eq!(beta_state.health(), SystemHealth::Unknown);

        // The 30s deadline turns the stall into a failure.
        advance(Duration::from_secs(31)).await;
        assert_eq!(
            coordinator.current_state_of(&beta()).unwrap().health(),
            SystemHealth::Down
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_jobs_lazily() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport, &alpha());
        transport.respond(&alpha(), &jobs_path("merge-datasets"), json!([]));

        let mut coordinator = coordinator(&transport);
        coordinator.add_system(watched(alpha(), &[]));
        coordinator.start();
        advance(Duration::from_millis(1)).await;
        assert!(coordinator.current_state_of(&alpha()).unwrap().jobs.is_empty());

        assert!(coordinator.watch_jobs(&alpha(), "merge-datasets"));
        assert!(!coordinator.watch_jobs(&beta(), "merge-datasets"));
        advance(Duration::from_millis(1)).await;

        let state = coordinator.current_state_of(&alpha()).unwrap();
        assert_eq!(state.jobs_of("merge-datasets").map(<[ServiceJob]>::len), Some(0));
        assert_eq!(
            coordinator.watched_job_types(&alpha()).into_iter().collect::<Vec<_>>(),
            vec!["merge-datasets".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_polling_and_keeps_snapshots() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport, &alpha());

        let mut coordinator = coordinator(&transport);
        coordinator.add_system(watched(alpha(), &["pbsmrtpipe"]));
        coordinator.start();
        advance(Duration::from_millis(1)).await;
        let calls = transport.calls();

        coordinator.stop();
        assert!(!coordinator.is_running());
        advance(INTERVAL * 5).await;
        assert_eq!(transport.calls(), calls);

        let state = coordinator.current_state_of(&alpha()).unwrap();
        assert_eq!(state.status.phase, PollPhase::Idle);
        assert_eq!(state.health(), SystemHealth::Up);
        assert_eq!(state.jobs_of("pbsmrtpipe").map(<[ServiceJob]>::len), Some(2));

        // Restart resumes polling.
        coordinator.start();
        advance(Duration::from_millis(1)).await;
        assert!(transport.calls() > calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_system() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport, &alpha());

        let mut coordinator = coordinator(&transport);
        coordinator.add_system(watched(alpha(), &[]));
        coordinator.start();
        advance(Duration::from_millis(1)).await;

        assert!(coordinator.remove_system(&alpha()));
        assert!(!coordinator.remove_system(&alpha()));
        let calls = transport.calls();
        advance(INTERVAL * 2).await;
        assert_eq!(transport.calls(), calls);
        assert!(coordinator.endpoints().next().is_none());
    }
}
