//! Global configuration types for Threadcast.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls
//! posting timing, retry budgets, guardian intervals, the license server
//! and the target bridge endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.threadcast/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub posting: PostingConfig,
    #[serde(default)]
    pub guardian: GuardianConfig,
    #[serde(default)]
    pub license: LicenseConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Timing and retry policy for the advance loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Default lower bound of the inter-post delay window.
    pub min_delay_ms: u64,
    /// Default upper bound of the inter-post delay window.
    pub max_delay_ms: u64,
    /// Submission attempts per item, including the first.
    pub max_attempts: u32,
    /// Fixed wait before each retry attempt.
    pub retry_backoff_secs: u64,
    /// Upper bound on a target liveness probe.
    pub readiness_timeout_secs: u64,
    /// Upper bound on a single submission attempt.
    pub attempt_timeout_secs: u64,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 3_000,
            max_delay_ms: 10_000,
            max_attempts: 3,
            retry_backoff_secs: 5,
            readiness_timeout_secs: 15,
            attempt_timeout_secs: 60,
        }
    }
}

impl PostingConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Session guardian intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    pub license_check_interval_secs: u64,
    pub target_probe_interval_secs: u64,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            license_check_interval_secs: 3_600,
            target_probe_interval_secs: 15,
        }
    }
}

/// License server and validation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    pub server_url: String,
    /// How long after activation a network failure is tolerated.
    pub grace_period_hours: u64,
    /// Minimum spacing between remote verifications.
    pub remote_check_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            server_url: "https://license.threadcast.app/api/v1".to_string(),
            grace_period_hours: 24,
            remote_check_interval_secs: 3_600,
            request_timeout_secs: 10,
        }
    }
}

/// Endpoint of the local browser bridge that drives the target surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub base_url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9323".to_string(),
        }
    }
}
