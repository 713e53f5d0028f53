//! Posting run types.
//!
//! A `PostingRun` is the unit of work for one invocation of "post N items".
//! It is the only mutable record the orchestrator persists; everything the
//! advance loop needs to resume after a restart lives here.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::thread::ThreadPayload;

/// Lifecycle status of a posting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Active,
    Stopping,
    Completed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Active => write!(f, "active"),
            RunStatus::Stopping => write!(f, "stopping"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Inclusive bounds for the randomized wait before each submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayWindow {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A window is valid when `min <= max`.
    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }
}

/// Opaque reference to the surface items are submitted to (e.g. a tab id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetHandle(String);

impl TargetHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a run ended before its queue was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A caller issued `stop()`.
    UserRequested,
    /// The target surface disappeared.
    TargetLost,
    /// The session guardian found the license no longer valid.
    AuthorizationLost,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::UserRequested => write!(f, "stopped by user"),
            StopReason::TargetLost => write!(f, "target lost"),
            StopReason::AuthorizationLost => write!(f, "authorization lost"),
        }
    }
}

/// Claim by one orchestrator instance on a persisted run.
///
/// The driving process renews `renewed_at` while its loop is alive; other
/// processes must not re-enter the run until the lease has gone stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLease {
    pub owner: Uuid,
    pub renewed_at: DateTime<Utc>,
}

impl RunLease {
    pub fn new(owner: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            renewed_at: now,
        }
    }

    /// Whether a process other than `owner` renewed this lease within `ttl`.
    pub fn held_by_other(&self, owner: Uuid, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.owner != owner && now - self.renewed_at < ttl
    }
}

/// Durable state of one posting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRun {
    pub id: Uuid,
    pub status: RunStatus,
    pub items: Vec<ThreadPayload>,
    /// Index of the next unprocessed item. `items[..cursor]` are resolved.
    pub cursor: usize,
    pub posted_count: usize,
    pub failed_count: usize,
    /// Ids of successfully posted items, in posting order.
    pub posted_ids: Vec<String>,
    pub delay_window: DelayWindow,
    pub next_action_at: Option<DateTime<Utc>>,
    pub target_handle: TargetHandle,
    pub started_at: DateTime<Utc>,
    /// Set when the run flips to `Stopping`, so a restart reports the real cause.
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub lease: Option<RunLease>,
}

impl PostingRun {
    /// Create a fresh active run with `cursor = 0`.
    pub fn new(items: Vec<ThreadPayload>, delay_window: DelayWindow, target_handle: TargetHandle) -> Self {
        Self {
            id: Uuid::now_v7(),
            status: RunStatus::Active,
            items,
            cursor: 0,
            posted_count: 0,
            failed_count: 0,
            posted_ids: Vec::new(),
            delay_window,
            next_action_at: None,
            target_handle,
            started_at: Utc::now(),
            stop_reason: None,
            lease: None,
        }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.cursor)
    }

    /// The item under the cursor, if any remain.
    pub fn current_item(&self) -> Option<&ThreadPayload> {
        self.items.get(self.cursor)
    }

    pub fn has_posted(&self, id: &str) -> bool {
        self.posted_ids.iter().any(|posted| posted == id)
    }

    /// Resolve the current item as posted and advance the cursor.
    pub fn record_posted(&mut self) {
        if let Some(item) = self.items.get(self.cursor) {
            if !self.has_posted(&item.id) {
                self.posted_ids.push(item.id.clone());
            }
            self.posted_count += 1;
            self.cursor += 1;
        }
    }

    /// Resolve the current item as permanently failed and advance the cursor.
    pub fn record_failed(&mut self) {
        if self.cursor < self.items.len() {
            self.failed_count += 1;
            self.cursor += 1;
        }
    }
}

/// Point-in-time view of the orchestrator for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_posting: bool,
    pub posted: usize,
    pub failed: usize,
    pub remaining: usize,
    pub total: usize,
    /// Whole seconds until the next submission attempt.
    pub next_post_in: u64,
    pub message: String,
    pub complete: bool,
}

impl StatusSnapshot {
    /// Terminal snapshot returned when no run exists.
    pub fn idle() -> Self {
        Self {
            is_posting: false,
            posted: 0,
            failed: 0,
            remaining: 0,
            total: 0,
            next_post_in: 0,
            message: "Idle".to_string(),
            complete: true,
        }
    }
}

/// Returned by a successful `start()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAccepted {
    pub run_id: Uuid,
    pub total: usize,
    /// Number of duplicate payloads collapsed before the run began.
    pub duplicates_dropped: usize,
}

/// Returned by a successful `stop()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAccepted {
    pub run_id: Uuid,
}

/// Final outcome of a run, carried by the completion event and handed to
/// the authorizer for usage logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub posted: usize,
    pub failed: usize,
    pub total: usize,
    pub stopped: bool,
    pub reason: Option<StopReason>,
    pub duration_ms: u64,
    pub posted_thread_ids: Vec<String>,
}

impl RunSummary {
    /// Summarize `run` as it stands at finalization.
    pub fn from_run(run: &PostingRun, reason: Option<StopReason>, finished_at: DateTime<Utc>) -> Self {
        let duration_ms = (finished_at - run.started_at).num_milliseconds().max(0) as u64;
        Self {
            run_id: run.id,
            posted: run.posted_count,
            failed: run.failed_count,
            total: run.total(),
            stopped: reason.is_some(),
            reason,
            duration_ms,
            posted_thread_ids: run.posted_ids.clone(),
        }
    }
}
