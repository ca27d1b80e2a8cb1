// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: the embedding application's entry point.
//!
//! One spawned tokio task drives one job end-to-end; every external call
//! (create, submit credentials/OTP, select an offer, poll status, abandon,
//! shutdown) goes through the orchestrator and touches the job only via the
//! registry and the handoff controller.

use crate::cleanup;
use crate::handoff::{HandoffError, HandoffPayload};
use crate::reconcile::{self, ReconcileError};
use crate::registry::{JobRegistry, LiveDriver, RegistryError};
use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use valet_adapters::{
    BookingConfirmation, DriverError, DriverFactory, InputHandoff, PlatformDriver,
};
use valet_core::{
    Clock, Credential, HandoffKind, JobId, JobSnapshot, JobStatus, OfferRef, SearchQuery,
    SystemClock,
};
use valet_storage::SessionStore;

/// Result of one booking attempt, delivered to the caller that selected the
/// offer.
pub type BookingReply = Result<BookingConfirmation, OrchestratorError>;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no platforms available to search")]
    NoPlatforms,

    #[error("job abandoned")]
    Abandoned,

    #[error("all platforms failed: {0}")]
    AllPlatformsFailed(String),

    #[error("booking failed: {0}")]
    BookingFailed(String),

    /// The driving task went away before answering a booking request
    #[error("job torn down before the booking completed")]
    Interrupted,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Timeouts for the bounded phases of a job.
///
/// Login handoffs are deliberately unbounded: a human typing an OTP is not
/// on a deadline. Only fully-automated phases get one.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Per-driver session bring-up when a persisted session exists
    pub init_timeout: Duration,
    /// Per-driver search
    pub search_timeout: Duration,
    /// Booking a selected offer
    pub book_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(120),
            search_timeout: Duration::from_secs(60),
            book_timeout: Duration::from_secs(120),
        }
    }
}

/// What `create_search_job` returns: the job handle plus whatever the job
/// reached first — ranked offers, a login prompt, or a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct SearchCreated {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub offers: Vec<valet_core::OfferProjection>,
}

impl SearchCreated {
    fn from_snapshot(snapshot: JobSnapshot) -> Self {
        Self {
            job_id: snapshot.id,
            status: snapshot.status,
            message: snapshot.message,
            offers: snapshot.offers,
        }
    }
}

/// Orchestrates search→book jobs over a driver factory and a session store.
pub struct Orchestrator<F: DriverFactory, C: Clock = SystemClock> {
    registry: Arc<JobRegistry>,
    store: Arc<SessionStore>,
    factory: Arc<F>,
    clock: C,
    config: OrchestratorConfig,
}

impl<F: DriverFactory, C: Clock> Clone for Orchestrator<F, C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            factory: Arc::clone(&self.factory),
            clock: self.clock.clone(),
            config: self.config,
        }
    }
}

/// Per-job context shared between the driving task and its handoff surface.
struct JobCtx {
    registry: Arc<JobRegistry>,
    job_id: JobId,
    /// Fired once, at the first point worth reporting back to the creator
    ready: Mutex<Option<oneshot::Sender<SearchCreated>>>,
}

impl JobCtx {
    /// Report the job's current state to the creating caller, once.
    fn fire_ready(&self) {
        let Some(tx) = self.ready.lock().take() else { return };
        if let Ok(snapshot) = self.registry.snapshot(&self.job_id) {
            let _ = tx.send(SearchCreated::from_snapshot(snapshot));
        }
    }

    /// Park the driving task on a handoff and suspend until resumed.
    ///
    /// On wake-up the driving task writes the job back to `Running` itself;
    /// the resumer never touches status. Cancellation (abandon, shutdown)
    /// surfaces as [`DriverError::Cancelled`] so callers unwind.
    async fn suspend(
        &self,
        kind: HandoffKind,
        park_message: impl Into<String>,
        resume_message: &str,
    ) -> Result<HandoffPayload, DriverError> {
        let rx = self
            .registry
            .park(&self.job_id, kind, park_message)
            .map_err(|_| DriverError::Cancelled { kind })?;
        self.fire_ready();

        let payload = rx.await.map_err(|_| DriverError::Cancelled { kind })?;
        if matches!(payload, HandoffPayload::Cancelled) {
            return Err(DriverError::Cancelled { kind });
        }
        self.registry
            .set_status(&self.job_id, JobStatus::Running, resume_message)
            .map_err(|_| DriverError::Cancelled { kind })?;
        Ok(payload)
    }
}

/// The handoff surface handed to drivers during `initialize`.
struct JobHandoff {
    ctx: Arc<JobCtx>,
}

#[async_trait]
impl InputHandoff for JobHandoff {
    async fn request_credentials(&self) -> Result<Credential, DriverError> {
        let payload = self
            .ctx
            .suspend(HandoffKind::Credentials, "waiting for login credentials", "logging in")
            .await?;
        match payload {
            HandoffPayload::Credentials(credential) => Ok(credential),
            _ => Err(DriverError::Cancelled { kind: HandoffKind::Credentials }),
        }
    }

    async fn request_otp(&self) -> Result<String, DriverError> {
        let payload = self
            .ctx
            .suspend(
                HandoffKind::Otp,
                "waiting for one-time password",
                "verifying one-time password",
            )
            .await?;
        match payload {
            HandoffPayload::Otp(otp) => Ok(otp),
            _ => Err(DriverError::Cancelled { kind: HandoffKind::Otp }),
        }
    }
}

impl<F: DriverFactory, C: Clock> Orchestrator<F, C> {
    pub fn new(store: SessionStore, factory: F, clock: C, config: OrchestratorConfig) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            store: Arc::new(store),
            factory: Arc::new(factory),
            clock,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Create a job for the query and spawn its driving task.
    ///
    /// Returns at the job's first reportable point: ranked offers parked for
    /// a choice, a login prompt parked for credentials, or a terminal state.
    pub async fn create_search_job(
        &self,
        query: SearchQuery,
    ) -> Result<SearchCreated, OrchestratorError> {
        let platforms = if query.platforms.is_empty() {
            self.factory.platforms()
        } else {
            query.platforms.clone()
        };
        if platforms.is_empty() {
            return Err(OrchestratorError::NoPlatforms);
        }

        let job_id = self.registry.create(self.clock.epoch_ms());
        info!(
            job_id = %job_id,
            origin = %query.origin,
            destination = %query.destination,
            platforms = ?platforms,
            "search job created"
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let ctx = Arc::new(JobCtx {
            registry: Arc::clone(&self.registry),
            job_id: job_id.clone(),
            ready: Mutex::new(Some(ready_tx)),
        });

        let this = self.clone();
        tokio::spawn(async move { this.drive(ctx, query, platforms).await });

        match ready_rx.await {
            Ok(created) => Ok(created),
            // The driving task dropped the channel without firing; read
            // whatever state the job ended in.
            Err(_) => Ok(SearchCreated::from_snapshot(self.registry.snapshot(&job_id)?)),
        }
    }

    /// Resume a job waiting for login credentials.
    pub fn submit_credentials(
        &self,
        id: &JobId,
        credential: Credential,
    ) -> Result<(), OrchestratorError> {
        self.registry.resume_credentials(id, credential)?;
        Ok(())
    }

    /// Resume a job waiting for a one-time password.
    pub fn submit_otp(&self, id: &JobId, otp: impl Into<String>) -> Result<(), OrchestratorError> {
        self.registry.resume_otp(id, otp)?;
        Ok(())
    }

    /// Resume a job waiting for an offer choice and wait for the booking
    /// attempt to finish.
    ///
    /// A recoverable failure (offer gone, selection not found or ambiguous)
    /// returns the error and leaves the job parked for another selection.
    pub async fn select_offer(
        &self,
        id: &JobId,
        selection: OfferRef,
    ) -> Result<BookingConfirmation, OrchestratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.registry.resume_choice(id, selection, reply_tx)?;
        reply_rx.await.map_err(|_| OrchestratorError::Interrupted)?
    }

    /// Read-only status poll.
    pub fn status(&self, id: &JobId) -> Result<JobSnapshot, OrchestratorError> {
        Ok(self.registry.snapshot(id)?)
    }

    /// Abandon a job: its driving task unwinds at the next suspension point
    /// and the cleanup coordinator releases everything the job owns.
    pub fn abandon(&self, id: &JobId) -> Result<(), OrchestratorError> {
        self.registry.snapshot(id)?;
        self.registry.mark_abandoned(id);
        self.registry.cancel_pending(id);
        info!(job_id = %id, "job abandoned");
        Ok(())
    }

    /// Tear down every open job before the process exits.
    pub async fn shutdown(&self) {
        cleanup::shutdown_all(&self.registry, &self.store).await;
    }

    /// The spawned per-job driving task.
    async fn drive(self, ctx: Arc<JobCtx>, query: SearchQuery, platforms: Vec<String>) {
        let id = ctx.job_id.clone();
        if let Err(error) = self.run_job(&ctx, &query, &platforms).await {
            error!(job_id = %id, error = %error, "job failed");
            self.fail_job(&id, error.to_string().as_str()).await;
        }
        // Whatever happened, the creating caller gets an answer.
        ctx.fire_ready();
    }

    async fn run_job(
        &self,
        ctx: &Arc<JobCtx>,
        query: &SearchQuery,
        platforms: &[String],
    ) -> Result<(), OrchestratorError> {
        let id = &ctx.job_id;
        let mut failures: Vec<String> = Vec::new();

        // Phase 1: acquire working profiles and construct drivers. A failing
        // platform is recorded and skipped; only all-failed kills the job.
        let mut pending: Vec<(Arc<dyn PlatformDriver>, valet_storage::WorkingProfile)> =
            Vec::new();
        for platform in platforms {
            let driver = match self.factory.create(platform) {
                Ok(driver) => driver,
                Err(error) => {
                    warn!(job_id = %id, platform = %platform, error = %error,
                        "driver construction failed");
                    failures.push(error.to_string());
                    continue;
                }
            };
            let profile = match self.store.acquire(platform, &query.session).await {
                Ok(profile) => profile,
                Err(error) => {
                    warn!(job_id = %id, platform = %platform, error = %error,
                        "profile acquisition failed");
                    failures.push(format!("{platform}: {error}"));
                    continue;
                }
            };
            self.registry.register_driver(
                id,
                LiveDriver { driver: Arc::clone(&driver), profile: profile.clone() },
            )?;
            pending.push((driver, profile));
        }
        if pending.is_empty() {
            return Err(OrchestratorError::AllPlatformsFailed(failures.join("; ")));
        }

        // Phase 2: bring up sessions, pausing through the handoff for login.
        self.registry.set_status(id, JobStatus::Running, "preparing platform sessions")?;
        let handoff = JobHandoff { ctx: Arc::clone(ctx) };
        let mut active: Vec<Arc<dyn PlatformDriver>> = Vec::new();
        for (driver, profile) in &pending {
            match self.initialize_driver(driver.as_ref(), profile, &handoff).await {
                Ok(()) => active.push(Arc::clone(driver)),
                Err(error @ DriverError::Cancelled { .. }) => return Err(error.into()),
                Err(error) => {
                    warn!(job_id = %id, platform = driver.platform(), error = %error,
                        "initialization failed");
                    failures.push(error.to_string());
                    self.unpark_after_failure(id);
                }
            }
        }
        if active.is_empty() {
            return Err(OrchestratorError::AllPlatformsFailed(failures.join("; ")));
        }
        if self.registry.is_abandoned(id) {
            return Err(OrchestratorError::Abandoned);
        }

        // Phase 3: fan the search out and rank what survives.
        self.registry.set_message(id, "searching")?;
        let outcome =
            crate::aggregate::search_all(&active, query, self.config.search_timeout).await;
        if self.registry.is_abandoned(id) {
            return Err(OrchestratorError::Abandoned);
        }
        if outcome.failures.len() == active.len() && outcome.offers.is_empty() {
            let summary = outcome.failure_summary().unwrap_or_default();
            return Err(OrchestratorError::AllPlatformsFailed(summary));
        }
        if outcome.offers.is_empty() {
            let message = match outcome.failure_summary() {
                Some(summary) => format!("no offers found ({summary})"),
                None => "no offers found".to_string(),
            };
            self.complete_job(id, &message).await;
            return Ok(());
        }

        let count = outcome.offers.len();
        let mut park_message = match outcome.failure_summary() {
            Some(summary) => format!("{count} offers found ({summary}); select one to book"),
            None => format!("{count} offers found; select one to book"),
        };
        self.registry.set_offers(id, outcome.offers)?;

        // Phase 4: park for a choice and book. Recoverable booking failures
        // loop back to parked.
        loop {
            let payload = ctx
                .suspend(HandoffKind::Choice, park_message.as_str(), "booking selected offer")
                .await?;
            let HandoffPayload::Choice { selection, reply } = payload else {
                return Err(DriverError::Cancelled { kind: HandoffKind::Choice }.into());
            };

            let offers = self.registry.offers(id)?;
            let offer = match reconcile::reconcile(&offers, &selection) {
                Ok(offer) => offer.clone(),
                Err(error) => {
                    debug!(job_id = %id, error = %error, "selection did not reconcile");
                    park_message = format!("{error}; select one of the listed offers");
                    let _ = reply.send(Err(error.into()));
                    continue;
                }
            };

            let Some(driver) = self.registry.driver_for(id, &offer.platform) else {
                let reason = format!("{}: no live driver for platform", offer.platform);
                let _ = reply.send(Err(OrchestratorError::BookingFailed(reason.clone())));
                return Err(OrchestratorError::BookingFailed(reason));
            };

            let booked =
                match tokio::time::timeout(self.config.book_timeout, driver.book(&offer)).await {
                    Ok(result) => result,
                    Err(_) => Err(DriverError::Timeout {
                        operation: format!("{} book", offer.platform),
                        timeout: self.config.book_timeout,
                    }),
                };
            match booked {
                Ok(confirmation) => {
                    info!(job_id = %id, platform = %confirmation.platform,
                        reference = ?confirmation.reference, "booking reached confirmation point");
                    self.complete_job(id, &confirmation.message).await;
                    let _ = reply.send(Ok(confirmation));
                    return Ok(());
                }
                Err(error) if error.is_offer_gone() => {
                    debug!(job_id = %id, error = %error, "offer gone; reparking for choice");
                    park_message = format!("{error}; select another offer");
                    let _ = reply.send(Err(error.into()));
                    continue;
                }
                Err(error) => {
                    let message = error.to_string();
                    let _ = reply.send(Err(error.into()));
                    return Err(OrchestratorError::BookingFailed(message));
                }
            }
        }
    }

    /// Bring up one driver's session.
    ///
    /// Bounded only when a persisted session exists; a first-time login may
    /// park on human input indefinitely.
    async fn initialize_driver(
        &self,
        driver: &dyn PlatformDriver,
        profile: &valet_storage::WorkingProfile,
        handoff: &JobHandoff,
    ) -> Result<(), DriverError> {
        if profile.had_session() {
            match tokio::time::timeout(
                self.config.init_timeout,
                driver.initialize(profile, handoff),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DriverError::Timeout {
                    operation: format!("{} initialize", driver.platform()),
                    timeout: self.config.init_timeout,
                }),
            }
        } else {
            driver.initialize(profile, handoff).await
        }
    }

    /// A timed-out login attempt can leave the job parked in a `Waiting*`
    /// state with a dead receiver; unpark it so the remaining drivers keep
    /// the job moving.
    fn unpark_after_failure(&self, id: &JobId) {
        self.registry.cancel_pending(id);
        if let Ok(snapshot) = self.registry.snapshot(id) {
            if snapshot.status.is_waiting() {
                let _ = self.registry.set_status(
                    id,
                    JobStatus::Running,
                    "continuing with remaining platforms",
                );
            }
        }
    }

    /// Finish a job successfully: stop drivers, persist refreshed sessions,
    /// release temp copies, then mark `Completed`.
    async fn complete_job(&self, id: &JobId, message: &str) {
        let drivers = self.registry.take_drivers(id);
        join_all(drivers.iter().map(|live| live.driver.stop())).await;
        for live in &drivers {
            if let Err(error) = self.store.persist(&live.profile).await {
                warn!(platform = %live.profile.platform, error = %error,
                    "failed to persist session profile");
            }
            self.store.release(&live.profile).await;
        }
        self.registry.cancel_pending(id);
        self.registry.clear_offers(id);
        if let Err(error) = self.registry.set_status(id, JobStatus::Completed, message) {
            warn!(job_id = %id, error = %error, "job not in a completable state");
        }
    }

    /// Move a job to `Error` and release everything it owns.
    async fn fail_job(&self, id: &JobId, message: &str) {
        if let Err(error) = self.registry.set_status(id, JobStatus::Error, message) {
            debug!(job_id = %id, error = %error, "job already terminal at failure");
        }
        cleanup::teardown_job(&self.registry, &self.store, id).await;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
