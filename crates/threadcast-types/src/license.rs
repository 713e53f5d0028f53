//! License types.
//!
//! A `LicenseRecord` is the locally cached result of the last successful
//! activation or remote verification. `LicenseStatus` is what the
//! authorization policy concludes from it at a given moment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Locally persisted license state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub key: String,
    /// When the key was first activated on this installation.
    pub activated_at: DateTime<Utc>,
    /// Server-reported expiry. `None` means perpetual.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the license server last confirmed the key.
    pub last_verified_at: DateTime<Utc>,
}

impl LicenseRecord {
    pub fn is_locally_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// Last four characters of the key, for display.
    pub fn masked_key(&self) -> String {
        let tail: String = self
            .key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{tail}")
    }
}

/// Answer from the remote license server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseVerdict {
    pub valid: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Confirmed valid (locally fresh or remotely verified).
    Valid { expires_at: Option<DateTime<Utc>> },
    /// Remote check failed on the network; accepted until `until`.
    Grace { until: DateTime<Utc> },
    /// Not authorized.
    Invalid { reason: String },
}

impl LicenseStatus {
    pub fn is_valid(&self) -> bool {
        !matches!(self, LicenseStatus::Invalid { .. })
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        LicenseStatus::Invalid {
            reason: reason.into(),
        }
    }
}

/// Errors from license verification and storage.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The license server could not be reached (eligible for grace).
    #[error("license server unreachable: {0}")]
    Network(String),

    /// The server answered but the response was unusable.
    #[error("unexpected license server response: {0}")]
    Protocol(String),

    /// The key was rejected on activation.
    #[error("license rejected: {0}")]
    Rejected(String),

    #[error("license storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: Option<DateTime<Utc>>) -> LicenseRecord {
        let now = Utc::now();
        LicenseRecord {
            key: "ABCD-EFGH-1234".to_string(),
            activated_at: now,
            expires_at,
            last_verified_at: now,
        }
    }

    #[test]
    fn test_local_expiry() {
        let now = Utc::now();
        assert!(!record(None).is_locally_expired(now));
        assert!(!record(Some(now + Duration::days(1))).is_locally_expired(now));
        assert!(record(Some(now - Duration::seconds(1))).is_locally_expired(now));
    }

    #[test]
    fn test_masked_key_shows_tail_only() {
        assert_eq!(record(None).masked_key(), "****1234");
    }

    #[test]
    fn test_status_validity() {
        assert!(LicenseStatus::Valid { expires_at: None }.is_valid());
        assert!(LicenseStatus::Grace { until: Utc::now() }.is_valid());
        assert!(!LicenseStatus::invalid("expired").is_valid());
    }

    #[test]
    fn test_verdict_defaults() {
        let verdict: LicenseVerdict = serde_json::from_str(r#"{"valid":true}"#).unwrap();
        assert!(verdict.valid);
        assert!(verdict.expires_at.is_none());
    }
}
