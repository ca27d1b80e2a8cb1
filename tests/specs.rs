// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level integration tests: whole search→book flows through the
//! public orchestrator surface, with scripted drivers and a real (temp)
//! session store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use valet_adapters::{FakeDriver, FakeDriverFactory};
use valet_core::{Credential, FakeClock, JobId, JobStatus, OfferRef, SearchQuery};
use valet_engine::{Orchestrator, OrchestratorConfig};
use valet_storage::SessionStore;

fn orchestrator(
    root: &TempDir,
    factory: FakeDriverFactory,
) -> Orchestrator<FakeDriverFactory, FakeClock> {
    Orchestrator::new(
        SessionStore::new(root.path()),
        factory,
        FakeClock::new(),
        OrchestratorConfig::default(),
    )
}

async fn wait_for_status(
    orch: &Orchestrator<FakeDriverFactory, FakeClock>,
    id: &JobId,
    status: JobStatus,
) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = orch.status(id).unwrap();
        if snapshot.status == status {
            return;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "job stuck at {} waiting for {status}",
            snapshot.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Seed a persisted profile so `acquire` hands out a temp copy.
async fn seed_session(root: &Path, platform: &str) {
    let dir = root.join(format!("{platform}_profile_default"));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("auth.json"), br#"{"auth": "token"}"#).await.unwrap();
}

/// Every temp working copy is gone once the jobs that made them are done.
fn assert_no_temp_copies(root: &Path) {
    let tmp = root.join("tmp");
    if !tmp.is_dir() {
        return;
    }
    let leftovers: Vec<_> = std::fs::read_dir(&tmp)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    assert!(leftovers.is_empty(), "leaked temp profiles: {leftovers:?}");
}

#[tokio::test]
async fn multi_platform_search_ranks_and_books_despite_one_failure() {
    let root = TempDir::new().unwrap();
    for platform in ["testcab", "quickhop", "swifteats"] {
        seed_session(root.path(), platform).await;
    }

    let testcab = Arc::new(
        FakeDriver::new("testcab")
            .with_keyed_offer("Go Premium", "₹310", "prem")
            .with_keyed_offer("Go Mini", "₹180", "mini"),
    );
    let quickhop = Arc::new(FakeDriver::new("quickhop").fail_search("upstream 503"));
    let swifteats = Arc::new(FakeDriver::new("swifteats").with_offer("Hop Standard", "₹199"));
    let factory = FakeDriverFactory::new()
        .with_driver(Arc::clone(&testcab))
        .with_driver(Arc::clone(&quickhop))
        .with_driver(Arc::clone(&swifteats));
    let orch = orchestrator(&root, factory);

    let created =
        orch.create_search_job(SearchQuery::builder("Home", "Airport").build()).await.unwrap();
    assert_eq!(created.status, JobStatus::WaitingForChoice);

    // Offers from the surviving platforms, ranked by normalized price, and
    // the failed platform reported in the message rather than failing the job.
    let summary: Vec<(&str, &str)> = created
        .offers
        .iter()
        .map(|o| (o.platform.as_str(), o.name.as_str()))
        .collect();
    assert_eq!(
        summary,
        [("testcab", "Go Mini"), ("swifteats", "Hop Standard"), ("testcab", "Go Premium")]
    );
    assert!(created.message.contains("upstream 503"));

    let confirmation =
        orch.select_offer(&created.job_id, OfferRef::by_key("testcab", "mini")).await.unwrap();
    assert_eq!(confirmation.platform, "testcab");
    assert_eq!(testcab.bookings(), vec!["Go Mini".to_string()]);

    wait_for_status(&orch, &created.job_id, JobStatus::Completed).await;
    for driver in [&testcab, &quickhop, &swifteats] {
        assert_eq!(driver.stop_count(), 1);
    }
    assert_no_temp_copies(root.path());
}

#[tokio::test]
async fn first_login_persists_a_session_the_next_job_reuses() {
    let root = TempDir::new().unwrap();
    let driver = Arc::new(
        FakeDriver::new("testcab")
            .require_login()
            .with_keyed_offer("Go Mini", "₹180", "mini"),
    );
    let orch = orchestrator(&root, FakeDriverFactory::new().with_driver(Arc::clone(&driver)));
    let query = SearchQuery::builder("Home", "Airport").build();

    // No persisted session: the job parks for credentials, then for the OTP.
    let created = orch.create_search_job(query.clone()).await.unwrap();
    assert_eq!(created.status, JobStatus::WaitingForCredentials);
    assert!(created.offers.is_empty());

    orch.submit_credentials(&created.job_id, Credential::with_secret("+91-99", "pin")).unwrap();
    wait_for_status(&orch, &created.job_id, JobStatus::WaitingForOtp).await;
    orch.submit_otp(&created.job_id, "424242").unwrap();
    wait_for_status(&orch, &created.job_id, JobStatus::WaitingForChoice).await;

    assert_eq!(driver.received_credentials().unwrap().identity, "+91-99");
    assert_eq!(driver.received_otp().as_deref(), Some("424242"));

    orch.select_offer(&created.job_id, OfferRef::by_key("testcab", "mini")).await.unwrap();
    wait_for_status(&orch, &created.job_id, JobStatus::Completed).await;

    // The login populated the persisted profile in place.
    let persisted = root.path().join("testcab_profile_default");
    assert!(persisted.join("auth.json").is_file());

    // A second job on the same store finds the session and skips the login
    // handoff entirely.
    let again = orch.create_search_job(query).await.unwrap();
    assert_eq!(again.status, JobStatus::WaitingForChoice);
    orch.select_offer(&again.job_id, OfferRef::by_key("testcab", "mini")).await.unwrap();
    wait_for_status(&orch, &again.job_id, JobStatus::Completed).await;
    assert_no_temp_copies(root.path());
}

#[tokio::test]
async fn shutdown_sweeps_every_open_job() {
    let root = TempDir::new().unwrap();
    seed_session(root.path(), "testcab").await;
    seed_session(root.path(), "quickhop").await;

    let parked = Arc::new(FakeDriver::new("testcab").with_keyed_offer("Go Mini", "₹180", "mini"));
    let searching = Arc::new(
        FakeDriver::new("quickhop")
            .with_offer("Hop", "₹199")
            .search_delay(Duration::from_millis(200)),
    );
    let logging_in = Arc::new(FakeDriver::new("swifteats").require_login());
    let factory = FakeDriverFactory::new()
        .with_driver(Arc::clone(&parked))
        .with_driver(Arc::clone(&searching))
        .with_driver(Arc::clone(&logging_in));
    let orch = orchestrator(&root, factory);

    // One job parked on a choice, one mid-search, one parked inside login.
    let choice_job = orch
        .create_search_job(SearchQuery::builder("Home", "Airport").platform("testcab").build())
        .await
        .unwrap();
    assert_eq!(choice_job.status, JobStatus::WaitingForChoice);

    let orch_clone = orch.clone();
    let search_job = tokio::spawn(async move {
        orch_clone
            .create_search_job(
                SearchQuery::builder("Home", "Station").platform("quickhop").build(),
            )
            .await
            .unwrap()
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let otp_job = orch
        .create_search_job(SearchQuery::builder("Home", "Office").platform("swifteats").build())
        .await
        .unwrap();
    assert_eq!(otp_job.status, JobStatus::WaitingForCredentials);

    orch.shutdown().await;

    // Every driver was stopped by the sweep, parked or not.
    assert!(parked.was_stopped());
    assert!(searching.was_stopped());
    assert!(logging_in.was_stopped());

    // Woken tasks unwind to Error; the mid-search task notices the abandon
    // flag once its search returns.
    wait_for_status(&orch, &choice_job.job_id, JobStatus::Error).await;
    wait_for_status(&orch, &otp_job.job_id, JobStatus::Error).await;
    let search_job = search_job.await.unwrap();
    wait_for_status(&orch, &search_job.job_id, JobStatus::Error).await;

    assert!(orch.registry().open_jobs().is_empty());
    assert_no_temp_copies(root.path());
}

#[tokio::test]
async fn snapshots_serialize_without_driver_internals() {
    let root = TempDir::new().unwrap();
    seed_session(root.path(), "testcab").await;
    let driver = Arc::new(FakeDriver::new("testcab").with_keyed_offer("Go Mini", "₹180", "mini"));
    let orch = orchestrator(&root, FakeDriverFactory::new().with_driver(driver));

    let created =
        orch.create_search_job(SearchQuery::builder("Home", "Airport").build()).await.unwrap();
    let snapshot = orch.status(&created.job_id).unwrap();

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["status"], "waiting_for_choice");
    assert_eq!(json["offers"][0]["platform"], "testcab");
    assert_eq!(json["offers"][0]["price"], "₹180");
    // Projections never carry the opaque driver handle.
    assert!(json["offers"][0].get("handle").is_none());

    orch.abandon(&created.job_id).unwrap();
    wait_for_status(&orch, &created.job_id, JobStatus::Error).await;
}
