// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, status state machine, and poll snapshot.

use crate::handoff::HandoffKind;
use crate::offer::OfferProjection;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a search→book job.
    ///
    /// Each job gets a unique ID that callers use to poll status, resume
    /// pending handoffs, and submit an offer selection.
    pub struct JobId("job-");
}

/// Status of a job.
///
/// Transitions are restricted to the edges encoded in [`JobStatus::can_transition`];
/// `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Profiles are being acquired and drivers constructed
    Initializing,
    /// The driving task is actively working (login, search, booking)
    Running,
    /// Parked until the client submits login credentials
    WaitingForCredentials,
    /// Parked until the client submits a one-time password
    WaitingForOtp,
    /// Parked until the client selects one of the ranked offers
    WaitingForChoice,
    /// Booking finished (or nothing left to do); terminal
    Completed,
    /// Unrecoverable failure; terminal
    Error,
}

impl JobStatus {
    /// Check if this status is terminal. No transitions leave a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Check if this status is one of the parked-for-input states.
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            JobStatus::WaitingForCredentials
                | JobStatus::WaitingForOtp
                | JobStatus::WaitingForChoice
        )
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// `Waiting*` states return to `Running` after a valid resume and may be
    /// forced to `Error` at teardown; everything else follows
    /// initializing → running → waiting/terminal.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (*self, next) {
            (Initializing, Running) | (Initializing, Error) => true,
            (Running, WaitingForCredentials)
            | (Running, WaitingForOtp)
            | (Running, WaitingForChoice)
            | (Running, Completed)
            | (Running, Error) => true,
            (s, Running) | (s, Error) if s.is_waiting() => true,
            _ => false,
        }
    }

    /// The parked status that matches a handoff kind.
    pub fn for_handoff(kind: HandoffKind) -> JobStatus {
        match kind {
            HandoffKind::Credentials => JobStatus::WaitingForCredentials,
            HandoffKind::Otp => JobStatus::WaitingForOtp,
            HandoffKind::Choice => JobStatus::WaitingForChoice,
        }
    }
}

crate::simple_display! {
    JobStatus {
        Initializing => "initializing",
        Running => "running",
        WaitingForCredentials => "waiting_for_credentials",
        WaitingForOtp => "waiting_for_otp",
        WaitingForChoice => "waiting_for_choice",
        Completed => "completed",
        Error => "error",
    }
}

/// Read-only view of a job for status polling.
///
/// Offers are the serializable projections only; the authoritative offers
/// (with live driver handles) never leave the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    /// Human-readable progress or failure description
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offers: Vec<OfferProjection>,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
