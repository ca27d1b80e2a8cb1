// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! valet-engine: job orchestration for interactive search→book sessions
//!
//! One tokio task drives one job end-to-end: acquire working profiles,
//! initialize platform drivers (pausing through the handoff controller for
//! login input), fan out searches, rank offers, park until the client picks
//! one, reconcile the pick against the authoritative offers, and book.
//! Cleanup runs on every exit path, including process shutdown.

pub mod aggregate;
pub mod cleanup;
pub mod handoff;
pub mod reconcile;
pub mod registry;
pub mod runtime;

pub use aggregate::{PlatformFailure, SearchOutcome};
pub use handoff::HandoffError;
pub use reconcile::ReconcileError;
pub use registry::{JobRegistry, RegistryError};
pub use runtime::{
    BookingReply, Orchestrator, OrchestratorConfig, OrchestratorError, SearchCreated,
};
