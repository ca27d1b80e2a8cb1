// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fault-isolated concurrent search across drivers, with price ranking.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use valet_adapters::{DriverError, PlatformDriver};
use valet_core::{Offer, SearchQuery};

/// One driver's search failure, reported per-platform.
#[derive(Debug)]
pub struct PlatformFailure {
    pub platform: String,
    pub error: DriverError,
}

/// Combined result of fanning a search out over every active driver.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// All surviving offers, ranked by normalized price
    pub offers: Vec<Offer>,
    pub failures: Vec<PlatformFailure>,
}

impl SearchOutcome {
    /// Human-readable summary of per-platform failures, if any.
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let parts: Vec<String> =
            self.failures.iter().map(|f| f.error.to_string()).collect();
        Some(parts.join("; "))
    }
}

/// Run `search` on every driver concurrently.
///
/// A failing or timed-out driver contributes an empty result and a recorded
/// failure; it never cancels or fails its siblings. Surviving offers are
/// ranked ascending by normalized price; ties keep discovery order and
/// unparsable prices rank last.
pub async fn search_all(
    drivers: &[Arc<dyn PlatformDriver>],
    query: &SearchQuery,
    timeout: Duration,
) -> SearchOutcome {
    let searches = drivers.iter().map(|driver| async move {
        let platform = driver.platform().to_string();
        match tokio::time::timeout(timeout, driver.search(query)).await {
            Ok(Ok(offers)) => {
                info!(platform, count = offers.len(), "search completed");
                Ok(offers)
            }
            Ok(Err(error)) => {
                warn!(platform, error = %error, "search failed");
                Err(PlatformFailure { platform, error })
            }
            Err(_) => {
                warn!(platform, timeout_s = timeout.as_secs(), "search timed out");
                Err(PlatformFailure {
                    platform,
                    error: DriverError::Timeout { operation: "search".to_string(), timeout },
                })
            }
        }
    });

    let mut outcome = SearchOutcome::default();
    for result in join_all(searches).await {
        match result {
            Ok(offers) => outcome.offers.extend(offers),
            Err(failure) => outcome.failures.push(failure),
        }
    }
    rank_offers(&mut outcome.offers);
    outcome
}

/// Stable ascending sort by normalized price; unparsable prices last.
pub fn rank_offers(offers: &mut [Offer]) {
    offers.sort_by(|a, b| a.rank_price().total_cmp(&b.rank_price()));
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
