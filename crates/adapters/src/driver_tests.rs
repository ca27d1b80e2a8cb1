// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn booking_failure_classification() {
    let gone = DriverError::Booking {
        platform: "testcab".to_string(),
        failure: BookingFailure::OfferGone,
        reason: "expired".to_string(),
    };
    assert!(gone.is_offer_gone());

    let fatal = DriverError::Booking {
        platform: "testcab".to_string(),
        failure: BookingFailure::Fatal,
        reason: "payment page crashed".to_string(),
    };
    assert!(!fatal.is_offer_gone());

    let search = DriverError::Search {
        platform: "testcab".to_string(),
        reason: "timeout".to_string(),
    };
    assert!(!search.is_offer_gone());
}

#[test]
fn errors_name_the_platform() {
    let err = DriverError::Initialization {
        platform: "swifteats".to_string(),
        reason: "login page changed".to_string(),
    };
    assert_eq!(err.to_string(), "swifteats: initialization failed: login page changed");
}

#[test]
fn timeout_error_formats_seconds() {
    let err = DriverError::Timeout {
        operation: "search".to_string(),
        timeout: Duration::from_secs(60),
    };
    assert_eq!(err.to_string(), "search timed out after 60s");
}

#[test]
fn cancelled_error_names_the_kind() {
    let err = DriverError::Cancelled { kind: HandoffKind::Otp };
    assert_eq!(err.to_string(), "handoff cancelled while waiting for otp");
}

#[test]
fn confirmation_serializes_without_reference_when_absent() {
    let confirmation = BookingConfirmation {
        platform: "testcab".to_string(),
        reference: None,
        message: "done".to_string(),
    };
    let json = serde_json::to_value(&confirmation).unwrap();
    assert!(json.get("reference").is_none());
}
