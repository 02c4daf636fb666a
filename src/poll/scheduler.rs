//! Interval-driven polling of one resource.
//!
//! A [`Poller`] owns a background task that ticks on a fixed interval. Each
//! tick issues a ticket from the resource's [`ResourceSlot`] and spawns the
//! fetch as its own task, so a slow fetch never delays the next tick; the
//! slot's sequence guard keeps late completions from overwriting newer data.
//!
//! ```text
//!   Idle ──tick──▶ Polling ──ok──▶ Success ──┐
//!    ▲                 │                     │
//!    │                 └──err──▶ Failed ─────┤
//!    └─────────────── next interval ◀────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::slot::{Completion, ResourceSlot, ResourceView};
use crate::client::SystemStatusClient;
use crate::data::{Alarm, ServerStatus, ServiceJob};
use crate::error::{ClientError, TransportError};

/// Something a [`Poller`] can fetch.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    /// Human-readable description, used in logs.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Self::Output, ClientError>;
}

/// Server status with the system version attached.
#[derive(Debug, Clone)]
pub struct StatusResource(pub SystemStatusClient);

#[async_trait]
impl Resource for StatusResource {
    type Output = ServerStatus;

    fn describe(&self) -> String {
        format!("status@{}", self.0.endpoint())
    }

    async fn fetch(&self) -> Result<ServerStatus, ClientError> {
        self.0.get_versions().await
    }
}

#[derive(Debug, Clone)]
pub struct AlarmsResource(pub SystemStatusClient);

#[async_trait]
impl Resource for AlarmsResource {
    type Output = Vec<Alarm>;

    fn describe(&self) -> String {
        format!("alarms@{}", self.0.endpoint())
    }

    async fn fetch(&self) -> Result<Vec<Alarm>, ClientError> {
        self.0.get_alarms().await
    }
}

/// The full job listing for one job type.
#[derive(Debug, Clone)]
pub struct JobsResource {
    pub client: SystemStatusClient,
    pub job_type: String,
}

#[async_trait]
impl Resource for JobsResource {
    type Output = Vec<ServiceJob>;

    fn describe(&self) -> String {
        format!("jobs/{}@{}", self.job_type, self.client.endpoint())
    }

    async fn fetch(&self) -> Result<Vec<ServiceJob>, ClientError> {
        self.client.get_jobs_by_type(&self.job_type).await
    }
}

/// Poll timing for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Upper bound on one fetch, on top of the transport's own timeout.
    pub deadline: Option<Duration>,
}

impl PollSettings {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Handle to a running poll loop.
///
/// Dropping the handle stops the loop, same as calling [`stop`](Self::stop).
#[derive(Debug)]
pub struct Poller<T> {
    slot: Arc<ResourceSlot<T>>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    name: String,
}

impl<T: Send + Sync + 'static> Poller<T> {
    /// Start polling `resource` into `slot`. Must be called inside a tokio
    /// runtime. The first fetch is issued immediately.
    pub fn spawn<R>(resource: R, slot: Arc<ResourceSlot<T>>, settings: PollSettings) -> Self
    where
        R: Resource<Output = T>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let name = resource.describe();
        let resource = Arc::new(resource);

        slot.activate();
        let task = tokio::spawn(run_loop(resource, Arc::clone(&slot), settings, stop_rx));

        Self {
            slot,
            stop_tx,
            task,
            name,
        }
    }

    pub fn view(&self) -> ResourceView<T> {
        self.slot.view()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop future ticks. Fetches already in flight finish, but their
    /// results are discarded.
    pub fn stop(&self) {
        self.slot.deactivate();
        let _ = self.stop_tx.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow() || self.task.is_finished()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.slot.deactivate();
        let _ = self.stop_tx.send(true);
    }
}

async fn run_loop<R: Resource>(
    resource: Arc<R>,
    slot: Arc<ResourceSlot<R::Output>>,
    settings: PollSettings,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(ticket) = slot.begin() else { break };
                debug!(resource = %resource.describe(), sequence = ticket.sequence(), "poll");

                let resource = Arc::clone(&resource);
                let slot = Arc::clone(&slot);
                tokio::spawn(async move {
                    let result = fetch_within(resource.as_ref(), settings.deadline).await;
                    if let Err(ref e) = result {
                        warn!(resource = %resource.describe(), error = %e, "poll failed");
                    }
                    match slot.complete(ticket, result, Utc::now()) {
                        Completion::Applied => {}
                        Completion::Stale => debug!(
                            resource = %resource.describe(),
                            sequence = ticket.sequence(),
                            "stale poll result discarded"
                        ),
                        Completion::Discarded => debug!(
                            resource = %resource.describe(),
                            "poll result discarded after stop"
                        ),
                    }
                });
            }
        }
    }

    debug!(resource = %resource.describe(), "poller stopped");
}

async fn fetch_within<R: Resource>(
    resource: &R,
    deadline: Option<Duration>,
) -> Result<R::Output, ClientError> {
    match deadline {
        Some(deadline) => tokio::time::timeout(deadline, resource.fetch())
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout.into())),
        None => resource.fetch().await,
    }
}
