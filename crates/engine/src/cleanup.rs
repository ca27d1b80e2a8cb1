// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cleanup coordinator: release driver resources and temp profiles exactly
//! once, on success, failure, abandonment, or process shutdown.

use crate::registry::{JobRegistry, LiveDriver};
use futures_util::future::join_all;
use tracing::{debug, info};
use valet_core::JobId;
use valet_storage::SessionStore;

/// Stop one driver and release its working profile.
///
/// Best-effort: `stop` swallows its own secondary errors, and profile
/// release logs rather than fails. Safe after partial initialization.
pub(crate) async fn stop_driver(store: &SessionStore, live: &LiveDriver) {
    live.driver.stop().await;
    store.release(&live.profile).await;
    debug!(platform = live.driver.platform(), "driver stopped");
}

/// Tear down everything a job owns.
///
/// Cancels any pending handoff (waking a suspended task with the
/// cancellation sentinel), stops all drivers concurrently, and drops the
/// retained offers. Drivers are drained from the registry first, so
/// concurrent teardown paths release each resource at most once.
pub(crate) async fn teardown_job(registry: &JobRegistry, store: &SessionStore, id: &JobId) {
    registry.cancel_pending(id);
    let drivers = registry.take_drivers(id);
    if !drivers.is_empty() {
        join_all(drivers.iter().map(|live| stop_driver(store, live))).await;
    }
    registry.clear_offers(id);
    debug!(job_id = %id, drivers = drivers.len(), "job torn down");
}

/// Shutdown sweep: tear down every still-open job concurrently.
///
/// Never fail-fast and never sequential — sequential teardown of N jobs
/// risks unbounded shutdown latency, and one stubborn driver must not keep
/// the others' resources alive.
pub async fn shutdown_all(registry: &JobRegistry, store: &SessionStore) {
    let open = registry.open_jobs();
    if open.is_empty() {
        return;
    }
    info!(jobs = open.len(), "shutdown sweep");
    for id in &open {
        registry.mark_abandoned(id);
    }
    join_all(open.iter().map(|id| teardown_job(registry, store, id))).await;
    info!(jobs = open.len(), "shutdown sweep complete");
}
