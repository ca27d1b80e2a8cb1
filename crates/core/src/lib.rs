// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! valet-core: Core types for the Valet booking orchestrator

pub mod macros;

pub mod clock;
pub mod handoff;
pub mod id;
pub mod job;
pub mod offer;
pub mod query;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use handoff::{Credential, HandoffKind};
pub use id::short;
pub use job::{JobId, JobSnapshot, JobStatus};
#[cfg(any(test, feature = "test-support"))]
pub use offer::OfferBuilder;
pub use offer::{normalize_price, Offer, OfferHandle, OfferProjection, OfferRef};
pub use query::{SearchQuery, SearchQueryBuilder};
