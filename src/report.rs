//! Plain-text status lines and JSON export of monitored state.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::client::job_page_path;
use crate::coordinator::{MonitoredSystemState, SystemHealth};
use crate::data::duration::{format_run_time, format_uptime};
use crate::data::summary::{select_recent_by_state, summarize_with};
use crate::data::{Alarm, JobState, ServerStatus, ServiceJob, ServiceJobWithEvents, TotalPolicy};
use crate::poll::ResourceView;

/// Output options shared by every report.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub total_policy: TotalPolicy,
    /// Cap on the recent-failures list per job type.
    pub max_failed_jobs: usize,
}

/// Status text for a system, without the health label.
pub fn status_text(state: &MonitoredSystemState) -> String {
    match state.health() {
        SystemHealth::Up => state
            .status
            .value()
            .map(ServerStatus::summary_line)
            .unwrap_or_default(),
        SystemHealth::Down => format!(
            "Failed to get server status from {}",
            state.endpoint.base_url()
        ),
        SystemHealth::Unknown => "No status yet".to_string(),
    }
}

/// One line per system: `host:port  UP  <text>`.
pub fn status_line(state: &MonitoredSystemState) -> String {
    let mut line = format!(
        "{:<28} {:<7} {}",
        state.endpoint.to_string(),
        state.health().label(),
        status_text(state)
    );
    if let Some(status) = state.status.value() {
        if state.health() == SystemHealth::Up {
            line.push_str(&format!(
                " (system {}, uptime {})",
                status.system_version.as_deref().unwrap_or("Unknown"),
                format_uptime(status.uptime_millis)
            ));
        }
    }
    if let Some(failure) = &state.status.last_error {
        if failure.consecutive > 1 {
            line.push_str(&format!(" [{} consecutive failures]", failure.consecutive));
        }
    }
    line
}

/// Indented per-job-type count lines for a system.
pub fn job_lines(state: &MonitoredSystemState, options: &ReportOptions) -> Vec<String> {
    state
        .jobs
        .iter()
        .map(|(job_type, view)| match view.value() {
            Some(jobs) => {
                let s = summarize_with(jobs, options.total_policy);
                let stale = if view.is_failing() { " (stale)" } else { "" };
                format!(
                    "    {:<26} failed {:>4}  successful {:>5}  created {:>4}  running {:>4}  total {:>5}{}",
                    job_type, s.num_failed, s.num_successful, s.num_created, s.num_running, s.total, stale
                )
            }
            None => match &view.last_error {
                Some(failure) => format!("    {:<26} error: {}", job_type, failure.error),
                None => format!("    {:<26} pending", job_type),
            },
        })
        .collect()
}

/// One line per alarm for a system.
pub fn alarm_lines(state: &MonitoredSystemState) -> Vec<String> {
    let Some(alarms) = state.alarms.value() else {
        return Vec::new();
    };
    alarms
        .iter()
        .map(|alarm| match &alarm.message {
            Some(message) => format!("    alarm {} [{}]: {}", alarm.name, alarm.state, message),
            None => format!("    alarm {} [{}]", alarm.name, alarm.state),
        })
        .collect()
}

fn error_json<T>(view: &ResourceView<T>) -> Value {
    match &view.last_error {
        Some(failure) => json!({
            "message": failure.error.to_string(),
            "at": failure.at.to_rfc3339(),
            "consecutive": failure.consecutive,
        }),
        None => Value::Null,
    }
}

fn status_json(status: &ServerStatus) -> Value {
    json!({
        "id": status.instance_id,
        "uuid": status.uuid,
        "version": status.service_version,
        "system_version": status.system_version,
        "status": status.status_code,
        "message": status.message,
        "uptime_millis": status.uptime_millis,
        "uptime": format_uptime(status.uptime_millis),
    })
}

fn alarm_json(alarm: &Alarm) -> Value {
    json!({
        "id": alarm.id,
        "name": alarm.name,
        "state": alarm.state,
        "updated_at": alarm.updated_at.to_rfc3339(),
        "message": alarm.message,
    })
}

fn failed_job_json(state: &MonitoredSystemState, job: &ServiceJob) -> Value {
    json!({
        "id": job.id,
        "name": job.name,
        "created_at": job.created_at.to_rfc3339(),
        "updated_at": job.updated_at.to_rfc3339(),
        "run_time": format_run_time(job.run_time_secs),
        "smrt_link_version": job.smrt_link_version,
        "created_by": job.created_by,
        "error_message": job.error_message,
        "url": state.endpoint.url(&job_page_path(job.id)),
    })
}

/// Everything known about one system as JSON.
pub fn system_json(state: &MonitoredSystemState, options: &ReportOptions) -> Value {
    let jobs: serde_json::Map<String, Value> = state
        .jobs
        .iter()
        .map(|(job_type, view)| {
            let body = match view.value() {
                Some(jobs) => json!({
                    "phase": view.phase,
                    "summary": summarize_with(jobs, options.total_policy),
                    "recent_failures": select_recent_by_state(jobs, &JobState::Failed, options.max_failed_jobs)
                        .iter()
                        .map(|job| failed_job_json(state, job))
                        .collect::<Vec<_>>(),
                    "error": error_json(view),
                }),
                None => json!({
                    "phase": view.phase,
                    "summary": Value::Null,
                    "recent_failures": [],
                    "error": error_json(view),
                }),
            };
            (job_type.clone(), body)
        })
        .collect();

    json!({
        "endpoint": state.endpoint.to_string(),
        "base_url": state.endpoint.base_url(),
        "health": state.health(),
        "status_line": status_text(state),
        "status_phase": state.status.phase,
        "status": state.status.value().map(status_json),
        "status_error": error_json(&state.status),
        "alarms": state.alarms.value().map(|alarms| alarms.iter().map(alarm_json).collect::<Vec<_>>()),
        "alarms_phase": state.alarms.phase,
        "alarms_error": error_json(&state.alarms),
        "jobs": Value::Object(jobs),
    })
}

/// Export document for every monitored system.
pub fn export_json(
    states: &[MonitoredSystemState],
    options: &ReportOptions,
    generated_at: DateTime<Utc>,
) -> Value {
    let up = states.iter().filter(|s| s.health() == SystemHealth::Up).count();
    let down = states.iter().filter(|s| s.health() == SystemHealth::Down).count();

    json!({
        "generated_at": generated_at.to_rfc3339(),
        "summary": {
            "total_systems": states.len(),
            "up": up,
            "down": down,
            "unknown": states.len() - up - down,
        },
        "systems": states.iter().map(|s| system_json(s, options)).collect::<Vec<_>>(),
    })
}

/// A job and its events, events sorted by creation time.
pub fn job_detail_json(detail: &ServiceJobWithEvents) -> Value {
    let job = &detail.job;
    json!({
        "job": {
            "id": job.id,
            "name": job.name,
            "job_type_id": job.job_type_id,
            "state": job.state.as_str(),
            "created_at": job.created_at.to_rfc3339(),
            "updated_at": job.updated_at.to_rfc3339(),
            "run_time": format_run_time(job.run_time_secs),
            "smrt_link_version": job.smrt_link_version,
            "created_by": job.created_by,
            "path": job.path,
            "error_message": job.error_message,
        },
        "events": detail.events_chronological().iter().map(|e| json!({
            "event_id": e.event_id,
            "event_type_id": e.event_type_id,
            "state": e.state.as_str(),
            "created_at": e.created_at.to_rfc3339(),
            "message": e.message,
        })).collect::<Vec<_>>(),
    })
}
