//! Shared test doubles for threadcast-core unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use threadcast_types::error::SubmitError;
use threadcast_types::license::{LicenseError, LicenseStatus, LicenseVerdict};
use threadcast_types::run::{DelayWindow, PostingRun, RunSummary, TargetHandle};
use threadcast_types::thread::{Paragraph, ThreadPayload};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::license::{Authorizer, LicenseVerifier};
use crate::posting::delay::DelayGenerator;
use crate::posting::target::TargetAdapter;
use crate::service::hash::ContentHasher;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// One single-paragraph payload per id, text equal to the id.
pub fn payloads(ids: &[&str]) -> Vec<ThreadPayload> {
    ids.iter()
        .map(|id| ThreadPayload::from_paragraphs(*id, vec![Paragraph::plain(*id)]))
        .collect()
}

pub fn sample_run(ids: &[&str]) -> PostingRun {
    PostingRun::new(
        payloads(ids),
        DelayWindow::new(1_000, 2_000),
        TargetHandle::new("tab-1"),
    )
}

pub fn sample_summary() -> RunSummary {
    RunSummary {
        run_id: Uuid::now_v7(),
        posted: 2,
        failed: 0,
        total: 2,
        stopped: false,
        reason: None,
        duration_ms: 1_500,
        posted_thread_ids: vec!["a".into(), "b".into()],
    }
}

/// Deterministic FNV-1a hasher.
pub struct StubHasher;

impl ContentHasher for StubHasher {
    fn compute_hash(&self, content: &str) -> String {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in content.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        format!("{hash:016x}{hash:016x}")
    }
}

/// Always waits the same amount.
pub struct FixedDelay(pub Duration);

impl DelayGenerator for FixedDelay {
    fn generate(&self, _window: DelayWindow) -> Duration {
        self.0
    }
}

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AdapterState {
    submitted: Vec<String>,
    attempted_at: Vec<tokio::time::Instant>,
    successes: usize,
    fail_always: HashSet<String>,
    fail_remaining: HashMap<String, usize>,
    lose_target_on: HashSet<String>,
    dies_after: Option<usize>,
    latency: Option<Duration>,
}

/// Scriptable target adapter. Clones share state.
#[derive(Clone, Default)]
pub struct MockAdapter {
    state: Arc<Mutex<AdapterState>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_always(self, id: &str) -> Self {
        self.state.lock().unwrap().fail_always.insert(id.to_string());
        self
    }

    /// Fail the first `times` attempts for `id`, then succeed.
    pub fn fail_times(self, id: &str, times: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_remaining
            .insert(id.to_string(), times);
        self
    }

    /// Report `SubmitError::TargetLost` when `id` is submitted.
    pub fn lose_target_on(self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .lose_target_on
            .insert(id.to_string());
        self
    }

    /// The liveness probe fails once `successes` items have been posted.
    pub fn target_dies_after(self, successes: usize) -> Self {
        self.state.lock().unwrap().dies_after = Some(successes);
        self
    }

    /// Every submission takes `latency` and ignores cancellation.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().latency = Some(latency);
        self
    }

    /// Ids in submission order, one entry per attempt.
    pub fn submitted_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// When each attempt reached the adapter, in submission order.
    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.state.lock().unwrap().attempted_at.clone()
    }

    pub fn attempts_for(&self, id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .filter(|submitted| *submitted == id)
            .count()
    }

    pub fn kill_target(&self) {
        let mut state = self.state.lock().unwrap();
        state.dies_after = Some(state.successes);
    }
}

impl TargetAdapter for MockAdapter {
    async fn submit(
        &self,
        payload: &ThreadPayload,
        _target: &TargetHandle,
        _cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        let latency = {
            let mut state = self.state.lock().unwrap();
            state.submitted.push(payload.id.clone());
            state.attempted_at.push(tokio::time::Instant::now());
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.lose_target_on.contains(&payload.id) {
            return Err(SubmitError::TargetLost);
        }
        if state.fail_always.contains(&payload.id) {
            return Err(SubmitError::Rejected("scripted failure".into()));
        }
        if let Some(remaining) = state.fail_remaining.get_mut(&payload.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SubmitError::TargetBusy);
            }
        }
        state.successes += 1;
        Ok(())
    }

    async fn is_target_live(&self, _target: &TargetHandle) -> bool {
        let state = self.state.lock().unwrap();
        state.dies_after.is_none_or(|limit| state.successes < limit)
    }
}

// ---------------------------------------------------------------------------
// StaticAuthorizer
// ---------------------------------------------------------------------------

/// Authorizer answering from fixed statuses.
pub struct StaticAuthorizer {
    validate: Mutex<LicenseStatus>,
    revalidate: Mutex<LicenseStatus>,
    validations: AtomicUsize,
    revalidations: AtomicUsize,
    completions: AtomicUsize,
}

impl StaticAuthorizer {
    pub fn new(validate: LicenseStatus, revalidate: LicenseStatus) -> Self {
        Self {
            validate: Mutex::new(validate),
            revalidate: Mutex::new(revalidate),
            validations: AtomicUsize::new(0),
            revalidations: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
        }
    }

    pub fn valid() -> Self {
        let valid = LicenseStatus::Valid { expires_at: None };
        Self::new(valid.clone(), valid)
    }

    /// Replace both answers.
    pub fn set_status(&self, status: LicenseStatus) {
        *self.validate.lock().unwrap() = status.clone();
        *self.revalidate.lock().unwrap() = status;
    }

    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }

    pub fn revalidations(&self) -> usize {
        self.revalidations.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

impl Authorizer for StaticAuthorizer {
    async fn validate(&self) -> LicenseStatus {
        self.validations.fetch_add(1, Ordering::SeqCst);
        self.validate.lock().unwrap().clone()
    }

    async fn revalidate(&self) -> LicenseStatus {
        self.revalidations.fetch_add(1, Ordering::SeqCst);
        self.revalidate.lock().unwrap().clone()
    }

    /// Treats every `validate` answer as local, so a rejection is re-checked.
    async fn authorize(&self) -> LicenseStatus {
        let status = self.validate().await;
        if status.is_valid() {
            return status;
        }
        self.revalidate().await
    }

    async fn record_completion(&self, _summary: &RunSummary) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockVerifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum VerifierReply {
    Valid(Option<DateTime<Utc>>),
    Invalid,
    NetworkDown,
}

pub struct MockVerifier {
    reply: VerifierReply,
    verify_calls: AtomicUsize,
    usage_reports: AtomicUsize,
}

impl MockVerifier {
    pub fn new(reply: VerifierReply) -> Self {
        Self {
            reply,
            verify_calls: AtomicUsize::new(0),
            usage_reports: AtomicUsize::new(0),
        }
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn usage_reports(&self) -> usize {
        self.usage_reports.load(Ordering::SeqCst)
    }
}

impl LicenseVerifier for MockVerifier {
    async fn verify(&self, _key: &str) -> Result<LicenseVerdict, LicenseError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            VerifierReply::Valid(expires_at) => Ok(LicenseVerdict {
                valid: true,
                expires_at: *expires_at,
                message: None,
            }),
            VerifierReply::Invalid => Ok(LicenseVerdict {
                valid: false,
                expires_at: None,
                message: Some("revoked".into()),
            }),
            VerifierReply::NetworkDown => {
                Err(LicenseError::Network("connection refused".into()))
            }
        }
    }

    async fn report_usage(&self, _key: &str, _summary: &RunSummary) -> Result<(), LicenseError> {
        self.usage_reports.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
