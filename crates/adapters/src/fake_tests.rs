// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::InputHandoff;
use tempfile::TempDir;
use valet_core::SearchQuery;
use valet_storage::SessionStore;

/// Handoff stub that answers immediately with canned input.
struct CannedHandoff;

#[async_trait]
impl InputHandoff for CannedHandoff {
    async fn request_credentials(&self) -> Result<Credential, DriverError> {
        Ok(Credential::new("+91-9999999999"))
    }

    async fn request_otp(&self) -> Result<String, DriverError> {
        Ok("123456".to_string())
    }
}

fn query() -> SearchQuery {
    SearchQuery::builder("A", "B").build()
}

#[tokio::test]
async fn scripted_offers_carry_fake_tokens() {
    let driver = FakeDriver::new("testcab")
        .with_offer("Mini", "₹99")
        .with_keyed_offer("Sedan", "₹500", "sed-1");

    let offers = driver.search(&query()).await.unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].name, "Mini");
    assert!(offers[0].key.is_none());
    assert_eq!(offers[1].key.as_deref(), Some("sed-1"));
    assert_eq!(offers[0].handle.downcast_ref::<FakeToken>(), Some(&FakeToken { index: 0 }));
}

#[tokio::test]
async fn scripted_search_failure() {
    let driver = FakeDriver::new("testcab").fail_search("selector drift");
    let err = driver.search(&query()).await.unwrap_err();
    assert!(matches!(err, DriverError::Search { .. }));
}

#[tokio::test]
async fn login_flow_records_handoff_payloads_and_populates_profile() {
    let root = TempDir::new().unwrap();
    let store = SessionStore::new(root.path());
    let profile = store.acquire("testcab", "default").await.unwrap();

    let driver = FakeDriver::new("testcab").require_login();
    driver.initialize(&profile, &CannedHandoff).await.unwrap();

    assert_eq!(driver.received_credentials().unwrap().identity, "+91-9999999999");
    assert_eq!(driver.received_otp().as_deref(), Some("123456"));
    // First-time login populated the persisted path in place.
    assert!(store.profile_dir("testcab", "default").join("auth.json").exists());
}

#[tokio::test]
async fn existing_session_skips_login() {
    let root = TempDir::new().unwrap();
    let store = SessionStore::new(root.path());
    let dir = store.profile_dir("testcab", "default");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("auth.json"), b"{}").await.unwrap();

    let profile = store.acquire("testcab", "default").await.unwrap();
    let driver = FakeDriver::new("testcab").require_login();
    driver.initialize(&profile, &CannedHandoff).await.unwrap();
    assert!(driver.received_credentials().is_none());
    store.release(&profile).await;
}

#[tokio::test]
async fn booking_gone_then_succeeds() {
    let driver = FakeDriver::new("testcab").with_offer("Mini", "₹99").booking_gone_times(1);
    let offers = driver.search(&query()).await.unwrap();

    let err = driver.book(&offers[0]).await.unwrap_err();
    assert!(err.is_offer_gone());

    let confirmation = driver.book(&offers[0]).await.unwrap();
    assert_eq!(confirmation.reference.as_deref(), Some("fake-testcab-0"));
    assert_eq!(driver.bookings(), vec!["Mini", "Mini"]);
}

#[tokio::test]
async fn booking_rejects_foreign_handles() {
    let cab = FakeDriver::new("testcab").with_offer("Mini", "₹99");
    let offers = cab.search(&query()).await.unwrap();

    let mut foreign = offers[0].clone();
    foreign.handle = valet_core::OfferHandle::new("not a fake token");
    let err = cab.book(&foreign).await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::Booking { failure: BookingFailure::Fatal, .. }
    ));
}

#[tokio::test]
async fn stop_is_idempotent_and_counted() {
    let driver = FakeDriver::new("testcab");
    driver.stop().await;
    driver.stop().await;
    assert_eq!(driver.stop_count(), 2);
    assert!(driver.was_stopped());
}

#[tokio::test]
async fn factory_hands_out_registered_drivers() {
    let factory = FakeDriverFactory::new()
        .with_driver(Arc::new(FakeDriver::new("testcab")))
        .with_driver(Arc::new(FakeDriver::new("swifteats")));

    assert_eq!(factory.platforms(), vec!["swifteats", "testcab"]);
    assert!(factory.create("testcab").is_ok());
    let err = factory.create("unknown").unwrap_err();
    assert!(matches!(err, DriverError::Initialization { .. }));
}
