//! Aggregation over job listings.
//!
//! Pure functions only. Time-windowed views take `now` explicitly.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::model::{JobState, ServiceJob};

/// How [`JobSummary::total`] is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalPolicy {
    /// Dashboard-compatible total: running jobs are counted twice.
    #[default]
    Legacy,
    /// Sum of the four distinct buckets.
    Distinct,
}

/// Job counts by state.
///
/// Jobs in states other than the four tracked buckets are not counted
/// anywhere, including `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub num_failed: usize,
    pub num_successful: usize,
    pub num_created: usize,
    pub num_running: usize,
    pub total: usize,
}

/// Summarize with the legacy total.
pub fn summarize(jobs: &[ServiceJob]) -> JobSummary {
    summarize_with(jobs, TotalPolicy::Legacy)
}

pub fn summarize_with(jobs: &[ServiceJob], policy: TotalPolicy) -> JobSummary {
    let count = |state: JobState| jobs.iter().filter(|j| j.state == state).count();

    let num_created = count(JobState::Created);
    let num_running = count(JobState::Running);
    let num_successful = count(JobState::Successful);
    let num_failed = count(JobState::Failed);

    // Legacy double-counts running jobs. Kept for output compatibility.
    let total = match policy {
        TotalPolicy::Legacy => num_created + num_running * 2 + num_successful + num_failed,
        TotalPolicy::Distinct => num_created + num_running + num_successful + num_failed,
    };

    JobSummary {
        num_failed,
        num_successful,
        num_created,
        num_running,
        total,
    }
}

pub fn filter_by_states(jobs: &[ServiceJob], states: &HashSet<JobState>) -> Vec<ServiceJob> {
    jobs.iter()
        .filter(|j| states.contains(&j.state))
        .cloned()
        .collect()
}

/// Jobs created at most `hours_ago` hours before `now` (inclusive).
///
/// Jobs with a `created_at` after `now` have a negative age and are kept.
pub fn filter_by_age_window(
    jobs: &[ServiceJob],
    now: DateTime<Utc>,
    hours_ago: u32,
) -> Vec<ServiceJob> {
    let window = TimeDelta::hours(i64::from(hours_ago));
    jobs.iter()
        .filter(|j| now - j.created_at <= window)
        .cloned()
        .collect()
}

/// The `max_count` highest-id jobs in `state`, ascending by id.
///
/// Sorting is stable, so jobs sharing an id keep their input order.
pub fn select_recent_by_state(
    jobs: &[ServiceJob],
    state: &JobState,
    max_count: usize,
) -> Vec<ServiceJob> {
    let mut selected: Vec<ServiceJob> = jobs.iter().filter(|j| &j.state == state).cloned().collect();
    selected.sort_by_key(|j| j.id);

    let skip = selected.len().saturating_sub(max_count);
    selected.split_off(skip)
}
