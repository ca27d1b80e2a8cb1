// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! valet-adapters: platform driver capability contract and test doubles
//!
//! Real drivers (UI automation against a specific platform) are supplied
//! externally; this crate defines the contract they implement and the
//! errors they surface, plus a scripted [`FakeDriver`] for tests.

pub mod driver;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use driver::{
    BookingConfirmation, BookingFailure, DriverError, DriverFactory, InputHandoff,
    PlatformDriver,
};
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeDriver, FakeDriverFactory};
