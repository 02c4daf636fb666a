//! Periodic polling of remote resources.
//!
//! This module provides the [`Resource`] abstraction for anything that can be
//! fetched from a SMRT Link server, the [`Poller`] that drives one resource
//! on a fixed interval, and the [`ResourceSlot`] that holds the latest
//! snapshot and error for it.

mod scheduler;
mod slot;

pub use scheduler::{AlarmsResource, JobsResource, PollSettings, Poller, Resource, StatusResource};
pub use slot::{
    Completion, PollFailure, PollPhase, ResourceSlot, ResourceView, Snapshot, Ticket,
};
