use thiserror::Error;

/// Errors returned synchronously by `start()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("a posting run is already active")]
    AlreadyRunning,

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("no threads to post")]
    EmptyQueue,

    #[error("invalid delay window: min {min_ms}ms exceeds max {max_ms}ms")]
    InvalidDelayWindow { min_ms: u64, max_ms: u64 },

    #[error("an interrupted posting run is waiting to be resumed")]
    ResumePending,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors returned synchronously by `stop()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("no active posting run")]
    NoActiveRun,
}

/// Errors reported by a target adapter for a single submission attempt.
///
/// The orchestrator retries every variant except `TargetLost` without
/// distinguishing between them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("target is busy")]
    TargetBusy,

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("submission timed out after {0}s")]
    Timeout(u64),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("submission cancelled")]
    Cancelled,

    #[error("target surface is gone")]
    TargetLost,
}

/// Errors from repository operations (used by trait definitions in threadcast-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
