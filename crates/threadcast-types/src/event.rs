//! Event types for the Threadcast posting event bus.
//!
//! `PostingEvent` is the unified event type broadcast while a run advances.
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run::RunSummary;

/// Events emitted during a posting run.
///
/// Used by the event bus to communicate progress and lifecycle changes to
/// subscribers (CLI progress bar, WebSocket clients, logging).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostingEvent {
    /// A run has been accepted and its loop spawned (fresh or resumed).
    RunStarted {
        run_id: Uuid,
        total: usize,
        resumed_at: Option<usize>,
    },

    /// Periodic progress tick: once per second while waiting, once per item.
    Progress {
        run_id: Uuid,
        posted: usize,
        failed: usize,
        remaining: usize,
        total: usize,
        next_post_in: u64,
        message: String,
    },

    /// An item was submitted successfully.
    ThreadPosted {
        run_id: Uuid,
        thread_id: String,
        index: usize,
        attempts: u32,
    },

    /// An item exhausted its retry budget.
    ThreadFailed {
        run_id: Uuid,
        thread_id: String,
        index: usize,
        attempts: u32,
        error: String,
    },

    /// The target surface disappeared mid-run.
    TargetLost { run_id: Uuid, target: String },

    /// The session guardian force-stopped a run.
    AuthorizationLost { run_id: Option<Uuid>, reason: String },

    /// A run finished. Emitted exactly once per run.
    Completed(RunSummary),
}

impl PostingEvent {
    /// Build the completion event from a run summary.
    pub fn completed(summary: RunSummary) -> Self {
        PostingEvent::Completed(summary)
    }

    /// The run this event belongs to, if any.
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            PostingEvent::RunStarted { run_id, .. }
            | PostingEvent::Progress { run_id, .. }
            | PostingEvent::ThreadPosted { run_id, .. }
            | PostingEvent::ThreadFailed { run_id, .. }
            | PostingEvent::TargetLost { run_id, .. } => Some(*run_id),
            PostingEvent::AuthorizationLost { run_id, .. } => *run_id,
            PostingEvent::Completed(summary) => Some(summary.run_id),
        }
    }
}
