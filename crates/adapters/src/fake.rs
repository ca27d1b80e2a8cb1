// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory driver for orchestration tests.
//!
//! `FakeDriver` plays back a configured script (offers, failures, login
//! demands, delays) and records everything the orchestrator does to it, so
//! tests can assert on handoff payloads, booking attempts, and stop calls.

use crate::driver::{
    BookingConfirmation, BookingFailure, DriverError, DriverFactory, InputHandoff,
    PlatformDriver,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use valet_core::{Credential, Offer, OfferHandle, SearchQuery};
use valet_storage::WorkingProfile;

/// Token the fake attaches to its offers as the opaque driver handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeToken {
    pub index: usize,
}

#[derive(Debug, Clone)]
struct ScriptedOffer {
    name: String,
    price: String,
    key: Option<String>,
}

#[derive(Debug, Default)]
struct Recorded {
    credentials: Option<Credential>,
    otp: Option<String>,
    bookings: Vec<String>,
}

/// A scripted platform driver.
///
/// Build with the fluent configuration methods, wrap in an `Arc`, and hand
/// clones to a [`FakeDriverFactory`]; keep one clone to inspect afterwards.
#[derive(Debug)]
pub struct FakeDriver {
    platform: String,
    offers: Vec<ScriptedOffer>,
    init_failure: Option<String>,
    search_failure: Option<String>,
    require_login: bool,
    search_delay: Option<Duration>,
    booking_gone: AtomicUsize,
    booking_fatal: Option<String>,
    stop_calls: AtomicUsize,
    recorded: Mutex<Recorded>,
}

impl FakeDriver {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            offers: Vec::new(),
            init_failure: None,
            search_failure: None,
            require_login: false,
            search_delay: None,
            booking_gone: AtomicUsize::new(0),
            booking_fatal: None,
            stop_calls: AtomicUsize::new(0),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// Script an offer without a stable identity key.
    pub fn with_offer(mut self, name: impl Into<String>, price: impl Into<String>) -> Self {
        self.offers.push(ScriptedOffer { name: name.into(), price: price.into(), key: None });
        self
    }

    /// Script an offer that carries a stable identity key.
    pub fn with_keyed_offer(
        mut self,
        name: impl Into<String>,
        price: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.offers.push(ScriptedOffer {
            name: name.into(),
            price: price.into(),
            key: Some(key.into()),
        });
        self
    }

    /// Make `initialize` fail.
    pub fn fail_initialize(mut self, reason: impl Into<String>) -> Self {
        self.init_failure = Some(reason.into());
        self
    }

    /// Make `search` fail.
    pub fn fail_search(mut self, reason: impl Into<String>) -> Self {
        self.search_failure = Some(reason.into());
        self
    }

    /// Demand credentials + OTP through the handoff when the working profile
    /// has no authenticated session.
    pub fn require_login(mut self) -> Self {
        self.require_login = true;
        self
    }

    /// Delay `search` (for timeout and shutdown-mid-search tests).
    pub fn search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    /// Fail the next `n` booking attempts with "offer no longer valid".
    pub fn booking_gone_times(self, n: usize) -> Self {
        self.booking_gone.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every booking attempt fatally.
    pub fn fail_booking(mut self, reason: impl Into<String>) -> Self {
        self.booking_fatal = Some(reason.into());
        self
    }

    // --- observation ---

    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stop_count() > 0
    }

    pub fn received_credentials(&self) -> Option<Credential> {
        self.recorded.lock().credentials.clone()
    }

    pub fn received_otp(&self) -> Option<String> {
        self.recorded.lock().otp.clone()
    }

    /// Names of offers booked (or attempted) through this driver.
    pub fn bookings(&self) -> Vec<String> {
        self.recorded.lock().bookings.clone()
    }
}

#[async_trait]
impl PlatformDriver for FakeDriver {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn initialize(
        &self,
        profile: &WorkingProfile,
        handoff: &dyn InputHandoff,
    ) -> Result<(), DriverError> {
        if let Some(reason) = &self.init_failure {
            return Err(DriverError::Initialization {
                platform: self.platform.clone(),
                reason: reason.clone(),
            });
        }

        if self.require_login && !profile.had_session() {
            let credentials = handoff.request_credentials().await?;
            self.recorded.lock().credentials = Some(credentials);
            let otp = handoff.request_otp().await?;
            self.recorded.lock().otp = Some(otp);

            // First-time login populates the persisted path in place.
            tokio::fs::create_dir_all(profile.path()).await.map_err(|e| {
                DriverError::Initialization {
                    platform: self.platform.clone(),
                    reason: e.to_string(),
                }
            })?;
            tokio::fs::write(profile.path().join("auth.json"), b"{\"fake\": true}")
                .await
                .map_err(|e| DriverError::Initialization {
                    platform: self.platform.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<Offer>, DriverError> {
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.search_failure {
            return Err(DriverError::Search {
                platform: self.platform.clone(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .offers
            .iter()
            .enumerate()
            .map(|(index, scripted)| Offer {
                platform: self.platform.clone(),
                name: scripted.name.clone(),
                price_text: scripted.price.clone(),
                key: scripted.key.clone(),
                details: serde_json::Value::Null,
                handle: OfferHandle::new(FakeToken { index }),
            })
            .collect())
    }

    async fn book(&self, offer: &Offer) -> Result<BookingConfirmation, DriverError> {
        self.recorded.lock().bookings.push(offer.name.clone());

        let token = offer.handle.downcast_ref::<FakeToken>().ok_or_else(|| {
            DriverError::Booking {
                platform: self.platform.clone(),
                failure: BookingFailure::Fatal,
                reason: "offer handle issued by another driver".to_string(),
            }
        })?;

        if let Some(reason) = &self.booking_fatal {
            return Err(DriverError::Booking {
                platform: self.platform.clone(),
                failure: BookingFailure::Fatal,
                reason: reason.clone(),
            });
        }

        let gone = self.booking_gone.load(Ordering::SeqCst);
        if gone > 0 {
            self.booking_gone.store(gone - 1, Ordering::SeqCst);
            return Err(DriverError::Booking {
                platform: self.platform.clone(),
                failure: BookingFailure::OfferGone,
                reason: format!("{} is no longer available", offer.name),
            });
        }

        Ok(BookingConfirmation {
            platform: self.platform.clone(),
            reference: Some(format!("fake-{}-{}", self.platform, token.index)),
            message: format!("{} booked, awaiting manual confirmation", offer.name),
        })
    }

    async fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out pre-registered fake drivers.
#[derive(Default)]
pub struct FakeDriverFactory {
    drivers: Mutex<HashMap<String, Arc<FakeDriver>>>,
}

impl FakeDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, driver: Arc<FakeDriver>) {
        self.drivers.lock().insert(driver.platform().to_string(), driver);
    }

    pub fn with_driver(self, driver: Arc<FakeDriver>) -> Self {
        self.register(driver);
        self
    }
}

impl DriverFactory for FakeDriverFactory {
    fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self.drivers.lock().keys().cloned().collect();
        platforms.sort();
        platforms
    }

    fn create(&self, platform: &str) -> Result<Arc<dyn PlatformDriver>, DriverError> {
        self.drivers
            .lock()
            .get(platform)
            .cloned()
            .map(|driver| driver as Arc<dyn PlatformDriver>)
            .ok_or_else(|| DriverError::Initialization {
                platform: platform.to_string(),
                reason: "no driver registered".to_string(),
            })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
