//! Posting orchestrator: sequential, durable, cancellable thread posting.
//!
//! The `PostingOrchestrator` owns at most one `PostingRun` at a time and
//! drives it through a single advance loop running as a tokio task:
//!
//! 1. Stop if the run is stopping or the queue is exhausted.
//! 2. Draw a delay, checkpoint `next_action_at`, count down observably.
//! 3. Re-check cancellation after the wait.
//! 4. Probe the target; a dead target ends the run.
//! 5. Submit the current item with a bounded retry budget.
//! 6. Record the outcome, advance the cursor, checkpoint, broadcast.
//!
//! `start`/`stop` only perform narrow transitions under the state lock; the
//! loop is the single writer of counters and cursor. Finalization is
//! guarded by run id so it happens exactly once per run.
//!
//! Several processes may share one checkpoint store. The persisted run
//! carries a lease naming the orchestrator driving it; a background task
//! renews it while the loop is alive, and other instances refuse to start
//! or resume until it goes stale.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use threadcast_types::config::PostingConfig;
use threadcast_types::error::{StartError, StopError, SubmitError};
use threadcast_types::event::PostingEvent;
use threadcast_types::license::LicenseStatus;
use threadcast_types::run::{
    DelayWindow, PostingRun, RunAccepted, RunLease, RunStatus, RunSummary, StatusSnapshot,
    StopAccepted, StopReason, TargetHandle,
};
use threadcast_types::thread::ThreadPayload;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::checkpoint::{CheckpointError, RunCheckpoint};
use super::delay::DelayGenerator;
use super::target::TargetAdapter;
use crate::event::bus::EventBus;
use crate::license::Authorizer;
use crate::storage::kv_store::KvStore;
use crate::thread::import::dedupe;

/// Countdown broadcast granularity.
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// A lease not renewed for this long no longer protects its run.
pub const LEASE_TTL: Duration = Duration::from_secs(30);

const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(10);

pub const MSG_STARTING: &str = "Starting…";
pub const MSG_WAITING: &str = "Waiting to post next thread…";
pub const MSG_POSTING: &str = "Posting thread…";
pub const MSG_STOPPING: &str = "Stopping…";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Retry budget and timeouts for the advance loop.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Submission attempts per item, including the first.
    pub max_attempts: u32,
    /// Fixed wait before each retry.
    pub retry_backoff: Duration,
    /// Upper bound on a target liveness probe.
    pub readiness_timeout: Duration,
    /// Upper bound on one submission attempt.
    pub attempt_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&PostingConfig::default())
    }
}

impl From<&PostingConfig> for OrchestratorSettings {
    fn from(config: &PostingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            readiness_timeout: config.readiness_timeout(),
            attempt_timeout: config.attempt_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// The in-memory side of the active run.
struct ActiveRun {
    run: PostingRun,
    cancel: CancellationToken,
}

/// What the loop needs to process the item under the cursor.
struct NextItem {
    index: usize,
    item: ThreadPayload,
    window: DelayWindow,
    target: TargetHandle,
    /// The id is already in `posted_ids`; resolve without submitting.
    already_posted: bool,
}

/// Why the advance loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    /// Every item was resolved.
    Exhausted,
    /// Cancellation was observed; the reason is on the run.
    Cancelled,
    /// The target surface disappeared.
    TargetLost,
}

/// Result of submitting one item with retries.
#[derive(Debug)]
enum SubmitOutcome {
    Posted { attempts: u32 },
    Failed { attempts: u32, error: SubmitError },
    Cancelled,
    TargetLost,
}

/// What `resume_if_needed` found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No persisted run.
    NothingToResume,
    /// A run is already active in this process.
    AlreadyRunning,
    /// Another live process holds the persisted run's lease.
    HeldElsewhere { run_id: Uuid },
    /// The persisted run was re-entered at `cursor`.
    Resumed { run_id: Uuid, cursor: usize },
    /// The persisted run could not continue and was finalized.
    Abandoned { run_id: Uuid, reason: StopReason },
}

struct Inner<K: KvStore, A: TargetAdapter, Z: Authorizer> {
    /// Lease owner id for runs driven by this instance.
    instance_id: Uuid,
    checkpoint: RunCheckpoint<K>,
    adapter: A,
    authorizer: Arc<Z>,
    delay: Arc<dyn DelayGenerator>,
    events: EventBus,
    settings: OrchestratorSettings,
    current: Mutex<Option<ActiveRun>>,
}

// ---------------------------------------------------------------------------
// PostingOrchestrator
// ---------------------------------------------------------------------------

/// Drives posting runs. Cheap to clone; clones share the same state.
pub struct PostingOrchestrator<K: KvStore, A: TargetAdapter, Z: Authorizer> {
    inner: Arc<Inner<K, A, Z>>,
}

impl<K: KvStore, A: TargetAdapter, Z: Authorizer> Clone for PostingOrchestrator<K, A, Z> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, A, Z> PostingOrchestrator<K, A, Z>
where
    K: KvStore + 'static,
    A: TargetAdapter + 'static,
    Z: Authorizer + 'static,
{
    /// Create an idle orchestrator with its collaborators.
    pub fn new(
        store: K,
        adapter: A,
        authorizer: Arc<Z>,
        delay: Arc<dyn DelayGenerator>,
        events: EventBus,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                instance_id: Uuid::now_v7(),
                checkpoint: RunCheckpoint::new(store),
                adapter,
                authorizer,
                delay,
                events,
                settings,
                current: Mutex::new(None),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn authorizer(&self) -> &Arc<Z> {
        &self.inner.authorizer
    }

    pub async fn is_active(&self) -> bool {
        self.inner.current.lock().await.is_some()
    }

    /// Id and target of the active run, if any.
    pub async fn active_target(&self) -> Option<(Uuid, TargetHandle)> {
        self.inner
            .current
            .lock()
            .await
            .as_ref()
            .map(|active| (active.run.id, active.run.target_handle.clone()))
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Begin posting `items` to `target`. Returns once the run is persisted
    /// and its loop spawned; does not touch the target surface.
    pub async fn start(
        &self,
        items: Vec<ThreadPayload>,
        window: DelayWindow,
        target: TargetHandle,
    ) -> Result<RunAccepted, StartError> {
        if items.is_empty() {
            return Err(StartError::EmptyQueue);
        }
        if !window.is_valid() {
            return Err(StartError::InvalidDelayWindow {
                min_ms: window.min_ms,
                max_ms: window.max_ms,
            });
        }
        if self.is_active().await {
            return Err(StartError::AlreadyRunning);
        }

        self.ensure_authorized().await?;

        let (items, duplicates_dropped) = dedupe(items);
        if duplicates_dropped > 0 {
            tracing::warn!(duplicates_dropped, "collapsed duplicate threads before posting");
        }

        let mut run = PostingRun::new(items, window, target);
        run.lease = Some(self.fresh_lease());
        let cancel = CancellationToken::new();
        {
            let mut current = self.inner.current.lock().await;
            if current.is_some() {
                return Err(StartError::AlreadyRunning);
            }
            self.ensure_no_persisted_run().await?;
            self.inner
                .checkpoint
                .save(&run)
                .await
                .map_err(|e| StartError::Storage(e.to_string()))?;
            *current = Some(ActiveRun {
                run: run.clone(),
                cancel: cancel.clone(),
            });
        }

        tracing::info!(
            run_id = %run.id,
            total = run.total(),
            target = %run.target_handle,
            min_delay_ms = window.min_ms,
            max_delay_ms = window.max_ms,
            "posting run started"
        );
        self.inner.events.publish(PostingEvent::RunStarted {
            run_id: run.id,
            total: run.total(),
            resumed_at: None,
        });
        self.spawn_loop(run.id, cancel);

        Ok(RunAccepted {
            run_id: run.id,
            total: run.total(),
            duplicates_dropped,
        })
    }

    /// Request a user stop of the active run.
    pub async fn stop(&self) -> Result<StopAccepted, StopError> {
        self.stop_with_reason(StopReason::UserRequested).await
    }

    /// Move the active run to `Stopping` and cancel its token.
    ///
    /// Returns as soon as the flag is set and checkpointed; finalization
    /// happens on the loop and is observed through the completion event.
    /// Stopping an already stopping run is accepted and keeps the first
    /// reason.
    pub async fn stop_with_reason(&self, reason: StopReason) -> Result<StopAccepted, StopError> {
        let snapshot = {
            let mut current = self.inner.current.lock().await;
            let active = current.as_mut().ok_or(StopError::NoActiveRun)?;
            active.cancel.cancel();
            if active.run.status == RunStatus::Active {
                active.run.status = RunStatus::Stopping;
                active.run.stop_reason = Some(reason);
                self.persist(&active.run).await;
            }
            active.run.clone()
        };

        tracing::info!(run_id = %snapshot.id, %reason, "posting run stopping");
        self.inner
            .events
            .publish(progress_event(&snapshot, 0, false));

        Ok(StopAccepted {
            run_id: snapshot.id,
        })
    }

    /// Pure read of the active run.
    pub async fn status(&self) -> StatusSnapshot {
        let current = self.inner.current.lock().await;
        match current.as_ref() {
            Some(active) => snapshot_of(&active.run),
            None => StatusSnapshot::idle(),
        }
    }

    /// Probe the active run's target and abort the run if it is gone.
    ///
    /// Returns the stop acknowledgement when an abort was issued.
    pub async fn verify_target(&self) -> Option<StopAccepted> {
        let (run_id, target) = self.active_target().await?;
        if self.probe_target(&target).await {
            return None;
        }

        tracing::warn!(%run_id, %target, "target surface lost");
        self.inner.events.publish(PostingEvent::TargetLost {
            run_id,
            target: target.to_string(),
        });
        self.stop_with_reason(StopReason::TargetLost).await.ok()
    }

    /// Re-enter a run persisted by a previous process.
    ///
    /// Idempotent: a second call while the run is live reports
    /// `AlreadyRunning`. A run whose lease another live process holds is
    /// left alone.
    pub async fn resume_if_needed(&self) -> Result<ResumeOutcome, CheckpointError> {
        if self.is_active().await {
            return Ok(ResumeOutcome::AlreadyRunning);
        }

        let run = match self.inner.checkpoint.load().await {
            Ok(Some(run)) => run,
            Ok(None) => return Ok(ResumeOutcome::NothingToResume),
            Err(CheckpointError::Corrupt(e)) => {
                tracing::warn!(error = %e, "discarding unreadable posting checkpoint");
                self.inner.checkpoint.clear().await?;
                return Ok(ResumeOutcome::NothingToResume);
            }
            Err(e) => return Err(e),
        };

        if self.held_elsewhere(&run) {
            tracing::info!(run_id = %run.id, "posting run is driven by another process");
            return Ok(ResumeOutcome::HeldElsewhere { run_id: run.id });
        }

        match run.status {
            RunStatus::Active => {}
            RunStatus::Stopping => {
                let run_id = run.id;
                let reason = run.stop_reason.unwrap_or(StopReason::UserRequested);
                if !self.install(run, CancellationToken::new()).await {
                    return Ok(ResumeOutcome::AlreadyRunning);
                }
                self.finalize(run_id, LoopExit::Cancelled).await;
                return Ok(ResumeOutcome::Abandoned { run_id, reason });
            }
            RunStatus::Idle | RunStatus::Completed => {
                self.inner.checkpoint.clear().await?;
                return Ok(ResumeOutcome::NothingToResume);
            }
        }

        let run_id = run.id;
        let cursor = run.cursor;
        let total = run.total();
        let target = run.target_handle.clone();

        let cancel = CancellationToken::new();
        if !self.install(run, cancel.clone()).await {
            return Ok(ResumeOutcome::AlreadyRunning);
        }
        let lease = self.fresh_lease();
        self.mutate(run_id, |run| run.lease = Some(lease)).await;

        if !self.probe_target(&target).await {
            tracing::warn!(%run_id, %target, "target gone on resume, abandoning run");
            self.inner.events.publish(PostingEvent::TargetLost {
                run_id,
                target: target.to_string(),
            });
            self.finalize(run_id, LoopExit::TargetLost).await;
            return Ok(ResumeOutcome::Abandoned {
                run_id,
                reason: StopReason::TargetLost,
            });
        }

        tracing::info!(%run_id, cursor, total, "resuming posting run");
        self.inner.events.publish(PostingEvent::RunStarted {
            run_id,
            total,
            resumed_at: Some(cursor),
        });
        self.spawn_loop(run_id, cancel);
        Ok(ResumeOutcome::Resumed { run_id, cursor })
    }

    // -----------------------------------------------------------------------
    // Advance loop
    // -----------------------------------------------------------------------

    fn spawn_loop(&self, run_id: Uuid, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            let loop_done = CancellationToken::new();
            let keeper = tokio::spawn({
                let this = this.clone();
                let loop_done = loop_done.clone();
                async move { this.keep_lease(run_id, loop_done).await }
            });

            let exit = this.drive(run_id, &cancel).await;
            loop_done.cancel();
            if let Err(e) = keeper.await {
                tracing::warn!(%run_id, error = %e, "lease renewal task failed");
            }
            this.finalize(run_id, exit).await;
        });
    }

    /// Renew this instance's lease on `run_id` until the loop ends.
    async fn keep_lease(&self, run_id: Uuid, loop_done: CancellationToken) {
        let mut renew = tokio::time::interval(LEASE_RENEW_INTERVAL);
        renew.tick().await;
        loop {
            tokio::select! {
                _ = loop_done.cancelled() => return,
                _ = renew.tick() => {
                    let lease = self.fresh_lease();
                    if self.mutate(run_id, |run| run.lease = Some(lease)).await.is_none() {
                        return;
                    }
                    tracing::trace!(%run_id, "renewed posting run lease");
                }
            }
        }
    }

    async fn drive(&self, run_id: Uuid, cancel: &CancellationToken) -> LoopExit {
        loop {
            let next = match self.next_item(run_id).await {
                Ok(next) => next,
                Err(exit) => return exit,
            };
            if cancel.is_cancelled() {
                return LoopExit::Cancelled;
            }
            if next.already_posted {
                tracing::info!(%run_id, index = next.index, thread_id = %next.item.id, "thread already posted, skipping");
                self.resolve(run_id, next.index, true).await;
                continue;
            }

            let delay = self.inner.delay.generate(next.window);
            self.schedule_next_action(run_id, delay).await;
            if !self.countdown(run_id, delay, cancel).await || cancel.is_cancelled() {
                return LoopExit::Cancelled;
            }

            if !self.probe_target(&next.target).await {
                tracing::warn!(%run_id, target = %next.target, "target surface lost");
                self.inner.events.publish(PostingEvent::TargetLost {
                    run_id,
                    target: next.target.to_string(),
                });
                return LoopExit::TargetLost;
            }

            self.publish_progress(run_id, 0, false).await;
            let outcome = self
                .submit_with_retry(run_id, next.index, &next.item, &next.target, cancel)
                .await;

            match outcome {
                SubmitOutcome::Posted { attempts } => {
                    self.resolve(run_id, next.index, true).await;
                    tracing::info!(%run_id, index = next.index, thread_id = %next.item.id, attempts, "thread posted");
                    self.inner.events.publish(PostingEvent::ThreadPosted {
                        run_id,
                        thread_id: next.item.id.clone(),
                        index: next.index,
                        attempts,
                    });
                }
                SubmitOutcome::Failed { attempts, error } => {
                    self.resolve(run_id, next.index, false).await;
                    tracing::warn!(%run_id, index = next.index, thread_id = %next.item.id, attempts, %error, "thread failed");
                    self.inner.events.publish(PostingEvent::ThreadFailed {
                        run_id,
                        thread_id: next.item.id.clone(),
                        index: next.index,
                        attempts,
                        error: error.to_string(),
                    });
                }
                SubmitOutcome::Cancelled => return LoopExit::Cancelled,
                SubmitOutcome::TargetLost => {
                    self.inner.events.publish(PostingEvent::TargetLost {
                        run_id,
                        target: next.target.to_string(),
                    });
                    return LoopExit::TargetLost;
                }
            }
            self.publish_progress(run_id, 0, false).await;
        }
    }

    /// Step 1: decide whether there is an item to process.
    async fn next_item(&self, run_id: Uuid) -> Result<NextItem, LoopExit> {
        let current = self.inner.current.lock().await;
        let active = match current.as_ref() {
            Some(active) if active.run.id == run_id => active,
            _ => return Err(LoopExit::Cancelled),
        };
        if active.run.status != RunStatus::Active {
            return Err(LoopExit::Cancelled);
        }
        match active.run.current_item() {
            Some(item) => Ok(NextItem {
                index: active.run.cursor,
                item: item.clone(),
                window: active.run.delay_window,
                target: active.run.target_handle.clone(),
                already_posted: active.run.has_posted(&item.id),
            }),
            None => Err(LoopExit::Exhausted),
        }
    }

    /// Record `next_action_at` and checkpoint it.
    async fn schedule_next_action(&self, run_id: Uuid, delay: Duration) {
        let next_action_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let snapshot = self
            .mutate(run_id, |run| run.next_action_at = Some(next_action_at))
            .await;
        if let Some(run) = snapshot {
            tracing::debug!(%run_id, cursor = run.cursor, delay_ms = delay.as_millis() as u64, "next post scheduled");
        }
    }

    /// Cancellable wait broadcasting whole seconds remaining.
    ///
    /// Returns `false` if cancelled before the delay elapsed.
    async fn countdown(&self, run_id: Uuid, delay: Duration, cancel: &CancellationToken) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.publish_progress(run_id, remaining.as_secs(), true).await;
            if remaining.is_zero() {
                return true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(remaining.min(COUNTDOWN_TICK)) => {}
            }
        }
    }

    /// Step 5: bounded retries with a fixed backoff.
    async fn submit_with_retry(
        &self,
        run_id: Uuid,
        index: usize,
        item: &ThreadPayload,
        target: &TargetHandle,
        cancel: &CancellationToken,
    ) -> SubmitOutcome {
        let settings = self.inner.settings;
        let mut last_error = SubmitError::Rejected("no attempt made".to_string());

        for attempt in 1..=settings.max_attempts {
            if attempt > 1 {
                tokio::select! {
                    _ = cancel.cancelled() => return SubmitOutcome::Cancelled,
                    _ = tokio::time::sleep(settings.retry_backoff) => {}
                }
                if cancel.is_cancelled() {
                    return SubmitOutcome::Cancelled;
                }
            }

            let result = tokio::time::timeout(
                settings.attempt_timeout,
                self.inner.adapter.submit(item, target, cancel),
            )
            .await
            .unwrap_or(Err(SubmitError::Timeout(settings.attempt_timeout.as_secs())));

            match result {
                Ok(()) => return SubmitOutcome::Posted { attempts: attempt },
                Err(SubmitError::TargetLost) => return SubmitOutcome::TargetLost,
                Err(error) => {
                    tracing::debug!(%run_id, index, attempt, %error, "submission attempt failed");
                    if cancel.is_cancelled() {
                        return SubmitOutcome::Cancelled;
                    }
                    last_error = error;
                }
            }
        }

        SubmitOutcome::Failed {
            attempts: settings.max_attempts,
            error: last_error,
        }
    }

    /// Step 6: advance the cursor past `index` and checkpoint.
    async fn resolve(&self, run_id: Uuid, index: usize, posted: bool) {
        self.mutate(run_id, |run| {
            if run.cursor != index {
                return;
            }
            if posted {
                run.record_posted();
            } else {
                run.record_failed();
            }
        })
        .await;
    }

    /// Exactly-once finalization: clear storage, reset memory, broadcast.
    async fn finalize(&self, run_id: Uuid, exit: LoopExit) {
        let (run, reason) = {
            let mut current = self.inner.current.lock().await;
            let Some(active) = current.take_if(|active| active.run.id == run_id) else {
                tracing::debug!(%run_id, "run already finalized");
                return;
            };
            active.cancel.cancel();

            let reason = match exit {
                LoopExit::Exhausted => None,
                LoopExit::Cancelled => {
                    Some(active.run.stop_reason.unwrap_or(StopReason::UserRequested))
                }
                LoopExit::TargetLost => Some(StopReason::TargetLost),
            };

            if let Err(e) = self.inner.checkpoint.clear().await {
                tracing::error!(%run_id, error = %e, "failed to clear posting checkpoint");
            }

            let mut run = active.run;
            run.status = RunStatus::Completed;
            (run, reason)
        };

        let summary = RunSummary::from_run(&run, reason, Utc::now());
        tracing::info!(
            %run_id,
            posted = summary.posted,
            failed = summary.failed,
            total = summary.total,
            stopped = summary.stopped,
            duration_ms = summary.duration_ms,
            "posting run completed"
        );
        self.inner
            .events
            .publish(PostingEvent::completed(summary.clone()));
        self.inner.authorizer.record_completion(&summary).await;
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn ensure_authorized(&self) -> Result<(), StartError> {
        match self.inner.authorizer.authorize().await {
            LicenseStatus::Invalid { reason } => {
                tracing::info!(%reason, "posting run refused");
                Err(StartError::Unauthorized(reason))
            }
            _ => Ok(()),
        }
    }

    /// Refuse to overwrite a run another process drives or one awaiting resume.
    async fn ensure_no_persisted_run(&self) -> Result<(), StartError> {
        match self.inner.checkpoint.load().await {
            Ok(None) => Ok(()),
            Ok(Some(existing)) if self.held_elsewhere(&existing) => {
                tracing::info!(run_id = %existing.id, "posting run is driven by another process");
                Err(StartError::AlreadyRunning)
            }
            Ok(Some(existing)) => {
                tracing::info!(run_id = %existing.id, "interrupted run must be resumed first");
                Err(StartError::ResumePending)
            }
            Err(CheckpointError::Corrupt(e)) => {
                tracing::warn!(error = %e, "overwriting unreadable posting checkpoint");
                Ok(())
            }
            Err(e) => Err(StartError::Storage(e.to_string())),
        }
    }

    fn fresh_lease(&self) -> RunLease {
        RunLease::new(self.inner.instance_id, Utc::now())
    }

    /// Whether another live orchestrator holds `run`'s lease.
    pub fn held_elsewhere(&self, run: &PostingRun) -> bool {
        let ttl = chrono::Duration::from_std(LEASE_TTL).unwrap_or_else(|_| chrono::Duration::zero());
        run.lease
            .is_some_and(|lease| lease.held_by_other(self.inner.instance_id, ttl, Utc::now()))
    }

    async fn probe_target(&self, target: &TargetHandle) -> bool {
        tokio::time::timeout(
            self.inner.settings.readiness_timeout,
            self.inner.adapter.is_target_live(target),
        )
        .await
        .unwrap_or(false)
    }

    async fn install(&self, run: PostingRun, cancel: CancellationToken) -> bool {
        let mut current = self.inner.current.lock().await;
        if current.is_some() {
            return false;
        }
        *current = Some(ActiveRun { run, cancel });
        true
    }

    /// Mutate and checkpoint the active run if it is still `run_id`.
    ///
    /// The save happens under the state lock so it can never land after
    /// `finalize` has cleared the record.
    async fn mutate(&self, run_id: Uuid, f: impl FnOnce(&mut PostingRun)) -> Option<PostingRun> {
        let mut current = self.inner.current.lock().await;
        let active = current.as_mut().filter(|active| active.run.id == run_id)?;
        f(&mut active.run);
        self.persist(&active.run).await;
        Some(active.run.clone())
    }

    async fn persist(&self, run: &PostingRun) {
        if let Err(e) = self.inner.checkpoint.save(run).await {
            tracing::error!(run_id = %run.id, error = %e, "failed to checkpoint posting run");
        }
    }

    async fn publish_progress(&self, run_id: Uuid, next_post_in: u64, waiting: bool) {
        let event = {
            let current = self.inner.current.lock().await;
            match current.as_ref() {
                Some(active) if active.run.id == run_id => {
                    progress_event(&active.run, next_post_in, waiting)
                }
                _ => return,
            }
        };
        self.inner.events.publish(event);
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Most specific human-readable state of `run`.
pub fn status_message(run: &PostingRun, waiting: bool) -> &'static str {
    if run.status == RunStatus::Stopping {
        MSG_STOPPING
    } else if run.cursor == 0 && run.posted_count == 0 && run.failed_count == 0 {
        MSG_STARTING
    } else if waiting {
        MSG_WAITING
    } else {
        MSG_POSTING
    }
}

fn progress_event(run: &PostingRun, next_post_in: u64, waiting: bool) -> PostingEvent {
    PostingEvent::Progress {
        run_id: run.id,
        posted: run.posted_count,
        failed: run.failed_count,
        remaining: run.remaining(),
        total: run.total(),
        next_post_in,
        message: status_message(run, waiting).to_string(),
    }
}

fn snapshot_of(run: &PostingRun) -> StatusSnapshot {
    let now = Utc::now();
    let (waiting, next_post_in) = match run.next_action_at {
        Some(at) if now < at => (true, (at - now).num_seconds().max(0) as u64),
        _ => (false, 0),
    };
    StatusSnapshot {
        is_posting: true,
        posted: run.posted_count,
        failed: run.failed_count,
        remaining: run.remaining(),
        total: run.total(),
        next_post_in,
        message: status_message(run, waiting).to_string(),
        complete: false,
    }
}
