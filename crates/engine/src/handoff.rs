// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive handoff controller: suspend/resume across external requests.
//!
//! One logical workflow spans disjoint external calls (submit a phone number
//! now, submit the OTP minutes later) while the automation session stays
//! alive and parked in between. The driving task parks a one-shot signal in
//! its job entry and suspends; a resume operation validates the job is in
//! the exact expected `Waiting*` state, takes the signal, and releases it
//! with the payload. A console resumer and an HTTP resumer are just two
//! callers of the same resume operations.

use crate::registry::{JobRegistry, RegistryError};
use crate::runtime::BookingReply;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;
use valet_core::{Credential, HandoffKind, JobId, JobStatus, OfferRef};

/// Handoff errors
#[derive(Debug, Error)]
pub enum HandoffError {
    /// Stale, duplicate, or late submission: the job is not waiting for this
    /// kind of input. The job's state is left untouched.
    #[error("job {id} is {actual}, not {expected}")]
    StateMismatch { id: JobId, expected: JobStatus, actual: JobStatus },

    #[error("handoff cancelled")]
    Cancelled,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Input delivered through a resumed handoff.
#[derive(Debug)]
pub(crate) enum HandoffPayload {
    Credentials(Credential),
    Otp(String),
    Choice {
        selection: OfferRef,
        /// Channel carrying the booking result back to the selecting caller
        reply: oneshot::Sender<BookingReply>,
    },
    /// Teardown sentinel: the suspended task unwinds instead of leaking
    Cancelled,
}

impl HandoffPayload {
    fn kind(&self) -> Option<HandoffKind> {
        match self {
            HandoffPayload::Credentials(_) => Some(HandoffKind::Credentials),
            HandoffPayload::Otp(_) => Some(HandoffKind::Otp),
            HandoffPayload::Choice { .. } => Some(HandoffKind::Choice),
            HandoffPayload::Cancelled => None,
        }
    }
}

/// The at-most-one outstanding interactive request of a job.
pub(crate) struct PendingHandoff {
    pub kind: HandoffKind,
    pub tx: oneshot::Sender<HandoffPayload>,
}

impl JobRegistry {
    /// Park the driving task: move the job to the matching `Waiting*` status
    /// and allocate the one-shot signal it will suspend on.
    ///
    /// Only the task driving the job may call this (it performs the status
    /// write). Fails with `Cancelled` when the job was abandoned, so the
    /// task unwinds instead of parking forever.
    pub(crate) fn park(
        &self,
        id: &JobId,
        kind: HandoffKind,
        message: impl Into<String>,
    ) -> Result<oneshot::Receiver<HandoffPayload>, HandoffError> {
        if self.is_abandoned(id) {
            return Err(HandoffError::Cancelled);
        }
        self.set_status(id, JobStatus::for_handoff(kind), message)?;

        let (tx, rx) = oneshot::channel();
        self.with_entry_mut(id, |entry| {
            if entry.pending.is_some() {
                // Single-pending invariant; dropping the old sender wakes
                // any stale waiter with a cancellation.
                warn!(job_id = %id, "replacing pending handoff");
            }
            entry.pending = Some(PendingHandoff { kind, tx });
        })?;
        Ok(rx)
    }

    /// Resume a job waiting for login credentials.
    pub fn resume_credentials(
        &self,
        id: &JobId,
        credential: Credential,
    ) -> Result<(), HandoffError> {
        self.resume(id, HandoffKind::Credentials, HandoffPayload::Credentials(credential))
    }

    /// Resume a job waiting for a one-time password.
    pub fn resume_otp(&self, id: &JobId, otp: impl Into<String>) -> Result<(), HandoffError> {
        self.resume(id, HandoffKind::Otp, HandoffPayload::Otp(otp.into()))
    }

    /// Resume a job waiting for an offer choice.
    pub(crate) fn resume_choice(
        &self,
        id: &JobId,
        selection: OfferRef,
        reply: oneshot::Sender<BookingReply>,
    ) -> Result<(), HandoffError> {
        self.resume(id, HandoffKind::Choice, HandoffPayload::Choice { selection, reply })
    }

    /// Validate state, take the pending signal, release it with the payload.
    ///
    /// A mismatched kind or status rejects the submission without touching
    /// the job: the status write back to `Running` belongs to the woken
    /// driving task, not to the resumer.
    fn resume(
        &self,
        id: &JobId,
        kind: HandoffKind,
        payload: HandoffPayload,
    ) -> Result<(), HandoffError> {
        debug_assert_eq!(payload.kind(), Some(kind));
        let expected = JobStatus::for_handoff(kind);

        let pending = self.with_entry_mut(id, |entry| {
            if entry.status != expected {
                return Err(HandoffError::StateMismatch {
                    id: id.clone(),
                    expected,
                    actual: entry.status,
                });
            }
            match &entry.pending {
                Some(p) if p.kind == kind => {}
                // Status says waiting but the signal is gone or of another
                // kind: a racing resume got there first.
                _ => {
                    return Err(HandoffError::StateMismatch {
                        id: id.clone(),
                        expected,
                        actual: entry.status,
                    })
                }
            }
            Ok(entry.pending.take())
        })??;

        if let Some(p) = pending {
            // Send outside the registry lock; a dropped receiver means the
            // driving task is already gone, which teardown handles.
            if p.tx.send(payload).is_err() {
                warn!(job_id = %id, kind = %kind, "driving task gone before resume");
            }
        }
        Ok(())
    }

    /// Release any pending signal with the cancellation sentinel so a
    /// suspended task observes teardown and unwinds.
    pub(crate) fn cancel_pending(&self, id: &JobId) {
        let pending = self
            .with_entry_mut(id, |entry| entry.pending.take())
            .ok()
            .flatten();
        if let Some(p) = pending {
            let _ = p.tx.send(HandoffPayload::Cancelled);
        }
    }
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
