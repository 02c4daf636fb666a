//! Per-resource poll state.
//!
//! A [`ResourceSlot`] is written only by the scheduler that owns it and read
//! by anyone through [`ResourceSlot::view`], which hands out an owned copy.
//!
//! Two counters guard against late completions:
//!
//! - every fetch is issued a monotonically increasing sequence number, and a
//!   completion whose sequence is not newer than the last applied one is
//!   discarded;
//! - every stop bumps the slot's epoch, and a completion issued under an
//!   older epoch is discarded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::ClientError;

/// Where a resource is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    /// Not polling: never started, or stopped.
    Idle,
    /// At least one fetch is in flight.
    Polling,
    /// Last applied fetch succeeded.
    Success,
    /// Last applied fetch failed.
    Failed,
}

/// The result of the most recent successful poll.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub value: Arc<T>,
    pub fetched_at: DateTime<Utc>,
    pub sequence: u64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
            sequence: self.sequence,
        }
    }
}

/// The most recent failed poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollFailure {
    pub error: ClientError,
    pub at: DateTime<Utc>,
    pub sequence: u64,
    /// Failures since the last success, including this one.
    pub consecutive: u32,
}

/// Read-only copy of a slot.
#[derive(Debug)]
pub struct ResourceView<T> {
    pub phase: PollPhase,
    pub snapshot: Option<Snapshot<T>>,
    pub last_error: Option<PollFailure>,
}

impl<T> Clone for ResourceView<T> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase,
            snapshot: self.snapshot.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

impl<T> Default for ResourceView<T> {
    fn default() -> Self {
        Self {
            phase: PollPhase::Idle,
            snapshot: None,
            last_error: None,
        }
    }
}

impl<T> ResourceView<T> {
    /// Latest good value, even if newer polls are failing.
    pub fn value(&self) -> Option<&T> {
        self.snapshot.as_ref().map(|s| s.value.as_ref())
    }

    /// Whether the most recent completed poll failed.
    pub fn is_failing(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn has_succeeded(&self) -> bool {
        self.snapshot.is_some()
    }
}

/// Identifies one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    sequence: u64,
}

impl Ticket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer fetch already completed.
    Stale,
    /// The slot was stopped after the fetch was issued.
    Discarded,
}

#[derive(Debug)]
struct SlotInner<T> {
    active: bool,
    epoch: u64,
    issued: u64,
    latest_completed: u64,
    in_flight: usize,
    last_outcome: PollPhase,
    snapshot: Option<Snapshot<T>>,
    last_error: Option<PollFailure>,
}

/// Shared state for one polled resource.
#[derive(Debug)]
pub struct ResourceSlot<T> {
    inner: RwLock<SlotInner<T>>,
}

impl<T> Default for ResourceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SlotInner {
                active: false,
                epoch: 0,
                issued: 0,
                latest_completed: 0,
                in_flight: 0,
                last_outcome: PollPhase::Idle,
                snapshot: None,
                last_error: None,
            }),
        }
    }

    /// Allow fetches to be issued.
    pub fn activate(&self) {
        self.inner.write().active = true;
    }

    /// Stop issuing fetches and invalidate every fetch still in flight.
    ///
    /// The last snapshot and error are kept.
    pub fn deactivate(&self) {
        let mut inner = self.inner.write();
        inner.active = false;
        inner.epoch += 1;
        inner.in_flight = 0;
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().active
    }

    /// Issue a ticket for a new fetch. `None` when the slot is inactive.
    pub fn begin(&self) -> Option<Ticket> {
        let mut inner = self.inner.write();
        if !inner.active {
            return None;
        }
        inner.issued += 1;
        inner.in_flight += 1;
        Some(Ticket {
            epoch: inner.epoch,
            sequence: inner.issued,
        })
    }

    /// Apply a fetch result if it is still current.
    pub fn complete(
        &self,
        ticket: Ticket,
        result: Result<T, ClientError>,
        at: DateTime<Utc>,
    ) -> Completion {
        let mut inner = self.inner.write();
        if ticket.epoch != inner.epoch {
            return Completion::Discarded;
        }
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if ticket.sequence <= inner.latest_completed {
            return Completion::Stale;
        }
        inner.latest_completed = ticket.sequence;

        match result {
            Ok(value) => {
                inner.snapshot = Some(Snapshot {
                    value: Arc::new(value),
                    fetched_at: at,
                    sequence: ticket.sequence,
                });
                inner.last_error = None;
                inner.last_outcome = PollPhase::Success;
            }
            Err(error) => {
                let consecutive = inner.last_error.as_ref().map_or(0, |f| f.consecutive) + 1;
                inner.last_error = Some(PollFailure {
                    error,
                    at,
                    sequence: ticket.sequence,
                    consecutive,
                });
                inner.last_outcome = PollPhase::Failed;
            }
        }
        Completion::Applied
    }

    pub fn view(&self) -> ResourceView<T> {
        let inner = self.inner.read();
        let phase = if !inner.active {
            PollPhase::Idle
        } else if inner.in_flight > 0 {
            PollPhase::Polling
        } else {
            inner.last_outcome
        };
        ResourceView {
            phase,
            snapshot: inner.snapshot.clone(),
            last_error: inner.last_error.clone(),
        }
    }
}
