// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job registry: single source of truth for job lifecycle and status.
//!
//! An explicitly constructed service, injected into whatever layer needs it.
//! Status writes come only from the task driving a given job (plus the
//! transition table as a second line of defense); status polling never
//! mutates.

use crate::handoff::PendingHandoff;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use valet_adapters::PlatformDriver;
use valet_core::{JobId, JobSnapshot, JobStatus, Offer};
use valet_storage::WorkingProfile;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition { id: JobId, from: JobStatus, to: JobStatus },
}

/// A driver running on behalf of a job, paired with the working profile it
/// automates against. Tracked so the cleanup coordinator can stop it even
/// when the driving task is parked or gone.
pub(crate) struct LiveDriver {
    pub driver: Arc<dyn PlatformDriver>,
    pub profile: WorkingProfile,
}

pub(crate) struct JobEntry {
    pub status: JobStatus,
    pub message: String,
    /// Authoritative offers (with live driver handles); never serialized
    pub offers: Vec<Offer>,
    /// The at-most-one outstanding interactive request
    pub pending: Option<PendingHandoff>,
    pub drivers: Vec<LiveDriver>,
    /// Set by abandon/shutdown; the driving task unwinds at its next
    /// suspension point
    pub abandoned: bool,
    pub created_at_ms: u64,
}

/// In-memory registry of all jobs in this process.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new job in `Initializing`.
    pub fn create(&self, epoch_ms: u64) -> JobId {
        let id = JobId::new();
        self.jobs.lock().insert(
            id.clone(),
            JobEntry {
                status: JobStatus::Initializing,
                message: "initializing".to_string(),
                offers: Vec::new(),
                pending: None,
                drivers: Vec::new(),
                abandoned: false,
                created_at_ms: epoch_ms,
            },
        );
        debug!(job_id = %id, "job created");
        id
    }

    /// Move a job along the status state machine.
    ///
    /// Only the task driving the job may call this; the transition table
    /// rejects anything outside the allowed edges, including every
    /// transition out of a terminal state.
    pub fn set_status(
        &self,
        id: &JobId,
        status: JobStatus,
        message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.with_entry_mut(id, |entry| {
            if !entry.status.can_transition(status) {
                return Err(RegistryError::InvalidTransition {
                    id: id.clone(),
                    from: entry.status,
                    to: status,
                });
            }
            entry.status = status;
            entry.message = message.into();
            debug!(job_id = %id, status = %status, "status changed");
            Ok(())
        })?
    }

    /// Read-only snapshot for status polling.
    pub fn snapshot(&self, id: &JobId) -> Result<JobSnapshot, RegistryError> {
        self.with_entry(id, |entry| JobSnapshot {
            id: id.clone(),
            status: entry.status,
            message: entry.message.clone(),
            offers: entry.offers.iter().map(Offer::projection).collect(),
            created_at_ms: entry.created_at_ms,
        })
    }

    /// IDs of all jobs not yet in a terminal state.
    pub fn open_jobs(&self) -> Vec<JobId> {
        self.jobs
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Update the progress message without moving the state machine.
    pub(crate) fn set_message(
        &self,
        id: &JobId,
        message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.with_entry_mut(id, |entry| entry.message = message.into())
    }

    pub(crate) fn set_offers(&self, id: &JobId, offers: Vec<Offer>) -> Result<(), RegistryError> {
        self.with_entry_mut(id, |entry| entry.offers = offers)
    }

    pub(crate) fn offers(&self, id: &JobId) -> Result<Vec<Offer>, RegistryError> {
        self.with_entry(id, |entry| entry.offers.clone())
    }

    pub(crate) fn register_driver(
        &self,
        id: &JobId,
        live: LiveDriver,
    ) -> Result<(), RegistryError> {
        self.with_entry_mut(id, |entry| entry.drivers.push(live))
    }

    pub(crate) fn driver_for(
        &self,
        id: &JobId,
        platform: &str,
    ) -> Option<Arc<dyn PlatformDriver>> {
        self.jobs.lock().get(id).and_then(|entry| {
            entry
                .drivers
                .iter()
                .find(|live| live.driver.platform() == platform)
                .map(|live| Arc::clone(&live.driver))
        })
    }

    /// Drain a job's drivers for teardown. Draining makes cleanup run at
    /// most once per driver no matter how many paths race to it.
    pub(crate) fn take_drivers(&self, id: &JobId) -> Vec<LiveDriver> {
        self.jobs
            .lock()
            .get_mut(id)
            .map(|entry| std::mem::take(&mut entry.drivers))
            .unwrap_or_default()
    }

    /// Drop the authoritative offers (and their live handles) for a job.
    pub(crate) fn clear_offers(&self, id: &JobId) {
        if let Some(entry) = self.jobs.lock().get_mut(id) {
            entry.offers.clear();
        }
    }

    /// Flag a job so its driving task unwinds at the next suspension point.
    pub(crate) fn mark_abandoned(&self, id: &JobId) {
        if let Some(entry) = self.jobs.lock().get_mut(id) {
            entry.abandoned = true;
        }
    }

    pub(crate) fn is_abandoned(&self, id: &JobId) -> bool {
        self.jobs.lock().get(id).map(|entry| entry.abandoned).unwrap_or(true)
    }

    pub(crate) fn with_entry<T>(
        &self,
        id: &JobId,
        f: impl FnOnce(&JobEntry) -> T,
    ) -> Result<T, RegistryError> {
        let jobs = self.jobs.lock();
        let entry = jobs.get(id).ok_or_else(|| RegistryError::JobNotFound(id.clone()))?;
        Ok(f(entry))
    }

    pub(crate) fn with_entry_mut<T>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut JobEntry) -> T,
    ) -> Result<T, RegistryError> {
        let mut jobs = self.jobs.lock();
        let entry = jobs.get_mut(id).ok_or_else(|| RegistryError::JobNotFound(id.clone()))?;
        Ok(f(entry))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
