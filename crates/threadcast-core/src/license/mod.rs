//! License verification ports and the authorization policy.
//!
//! `LicenseVerifier` is the remote license server (implemented in
//! threadcast-infra). `Authorizer` is what the orchestrator and guardian
//! consult; `LicenseService` implements it on top of a verifier and a
//! `KvStore` holding the cached license record.

pub mod service;

use threadcast_types::license::{LicenseError, LicenseStatus, LicenseVerdict};
use threadcast_types::run::RunSummary;

/// Remote license server operations.
pub trait LicenseVerifier: Send + Sync {
    /// Ask the server whether `key` is valid right now.
    ///
    /// Connectivity failures must map to `LicenseError::Network` so the
    /// caller can apply the grace period.
    fn verify(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<LicenseVerdict, LicenseError>> + Send;

    /// Report a finished run for usage accounting.
    fn report_usage(
        &self,
        key: &str,
        summary: &RunSummary,
    ) -> impl std::future::Future<Output = Result<(), LicenseError>> + Send;
}

/// Authorization gate consulted before and during posting runs.
pub trait Authorizer: Send + Sync {
    /// Policy check: local first, remote when stale or locally expired,
    /// grace period on network failure.
    fn validate(&self) -> impl std::future::Future<Output = LicenseStatus> + Send;

    /// Force a remote verification regardless of local freshness.
    fn revalidate(&self) -> impl std::future::Future<Output = LicenseStatus> + Send;

    /// Gate for starting a run: `validate`, plus one forced remote check
    /// only when the negative answer came from local data alone.
    fn authorize(&self) -> impl std::future::Future<Output = LicenseStatus> + Send;

    /// Best-effort completion logging. Never fails the caller.
    fn record_completion(
        &self,
        summary: &RunSummary,
    ) -> impl std::future::Future<Output = ()> + Send;
}
