//! Target adapter trait.
//!
//! The adapter is the external collaborator that reproduces one thread on
//! the target surface (typing, formatting, clicking submit). The core only
//! sees whether an attempt succeeded and whether the surface still exists.
//! Implementations live in threadcast-infra.

use threadcast_types::error::SubmitError;
use threadcast_types::run::TargetHandle;
use threadcast_types::thread::ThreadPayload;
use tokio_util::sync::CancellationToken;

/// Trait for submitting thread payloads to a target surface.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait TargetAdapter: Send + Sync {
    /// Attempt to post `payload` on `target`.
    ///
    /// Must be safe to call again after a reported failure. Implementations
    /// should check `cancel` at their internal suspension points and return
    /// `SubmitError::Cancelled` when it fires; the caller does not preempt.
    fn submit(
        &self,
        payload: &ThreadPayload,
        target: &TargetHandle,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), SubmitError>> + Send;

    /// Cheap liveness probe for the target surface.
    fn is_target_live(
        &self,
        target: &TargetHandle,
    ) -> impl std::future::Future<Output = bool> + Send;
}
