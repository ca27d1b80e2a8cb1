// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform driver capability contract: {initialize, search, book, stop}.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use valet_core::{Credential, HandoffKind, Offer, SearchQuery};
use valet_storage::WorkingProfile;

/// How a booking attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFailure {
    /// The selected offer expired or disappeared; the job stays resumable
    /// and the client may pick another offer.
    OfferGone,
    /// Anything else; the job is not recoverable.
    Fatal,
}

valet_core::simple_display! {
    BookingFailure {
        OfferGone => "offer no longer valid",
        Fatal => "fatal",
    }
}

/// Driver-scoped errors.
///
/// Failures carry the platform so the aggregator can report them per-platform
/// without flipping the whole job.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{platform}: initialization failed: {reason}")]
    Initialization { platform: String, reason: String },

    #[error("{platform}: search failed: {reason}")]
    Search { platform: String, reason: String },

    #[error("{platform}: booking failed ({failure}): {reason}")]
    Booking { platform: String, failure: BookingFailure, reason: String },

    #[error("{platform}: persisted session is corrupt: {reason}")]
    SessionCorrupted { platform: String, reason: String },

    #[error("{operation} timed out after {}s", timeout.as_secs())]
    Timeout { operation: String, timeout: Duration },

    #[error("handoff cancelled while waiting for {kind}")]
    Cancelled { kind: HandoffKind },
}

impl DriverError {
    /// Whether this is the recoverable "offer no longer valid" booking failure.
    pub fn is_offer_gone(&self) -> bool {
        matches!(self, DriverError::Booking { failure: BookingFailure::OfferGone, .. })
    }
}

/// Result of a successful `book` call: whatever confirmation the platform
/// surfaced before the manual-confirmation point (payment, final order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub platform: String,
    /// Platform-issued booking/order reference, when one is shown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub message: String,
}

/// The driving task's side of the interactive handoff, as seen by a driver.
///
/// A driver calls these mid-`initialize` when the working profile has no
/// valid authenticated state; the call suspends until a separate external
/// request supplies the input. Cancellation at teardown surfaces as
/// [`DriverError::Cancelled`] so the driver unwinds instead of leaking.
#[async_trait]
pub trait InputHandoff: Send + Sync {
    async fn request_credentials(&self) -> Result<Credential, DriverError>;
    async fn request_otp(&self) -> Result<String, DriverError>;
}

/// Capability contract each platform backend implements.
///
/// A driver exclusively owns its automation resources (browser context,
/// process handles); no other component touches them.
#[async_trait]
pub trait PlatformDriver: Send + Sync + std::fmt::Debug {
    /// Platform identifier ("testcab", "swifteats", ...).
    fn platform(&self) -> &str;

    /// Bring up an automated session on the working profile, performing
    /// login through the handoff if the profile has no authenticated state.
    async fn initialize(
        &self,
        profile: &WorkingProfile,
        handoff: &dyn InputHandoff,
    ) -> Result<(), DriverError>;

    /// Search the platform and return every bookable option found.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Offer>, DriverError>;

    /// Carry the given offer up to the manual-confirmation point.
    async fn book(&self, offer: &Offer) -> Result<BookingConfirmation, DriverError>;

    /// Release everything this driver owns.
    ///
    /// Idempotent and safe after partial failure: attempts full teardown and
    /// swallows (but logs) secondary errors during best-effort cleanup.
    async fn stop(&self);
}

/// Constructs drivers per platform; supplied by the embedding application.
pub trait DriverFactory: Send + Sync + 'static {
    /// Platforms this factory can construct drivers for.
    fn platforms(&self) -> Vec<String>;

    /// Construct a fresh driver for one platform.
    fn create(&self, platform: &str) -> Result<Arc<dyn PlatformDriver>, DriverError>;
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
