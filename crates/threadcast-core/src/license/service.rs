//! License service: activation, cached record and the validation policy.
//!
//! Validation order:
//! 1. No cached record -> invalid.
//! 2. Record fresh (verified within the remote check interval) and not
//!    locally expired -> valid without a network call.
//! 3. Otherwise verify remotely. A definitive answer replaces the cache.
//! 4. On a network failure, accept local-only validation while within the
//!    grace period measured from the original activation.

use chrono::{DateTime, Duration, Utc};
use threadcast_types::config::LicenseConfig;
use threadcast_types::license::{LicenseError, LicenseRecord, LicenseStatus};
use threadcast_types::run::RunSummary;

use super::{Authorizer, LicenseVerifier};
use crate::storage::kv_store::KvStore;

/// Namespace holding license state.
pub const LICENSE_NAMESPACE: &str = "license";

/// Key of the cached license record.
pub const RECORD_KEY: &str = "record";

/// Timing knobs for license validation.
#[derive(Debug, Clone, Copy)]
pub struct LicensePolicy {
    pub grace_period: Duration,
    pub remote_check_interval: Duration,
}

impl Default for LicensePolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::hours(24),
            remote_check_interval: Duration::hours(1),
        }
    }
}

impl From<&LicenseConfig> for LicensePolicy {
    fn from(config: &LicenseConfig) -> Self {
        Self {
            grace_period: Duration::hours(config.grace_period_hours as i64),
            remote_check_interval: Duration::seconds(config.remote_check_interval_secs as i64),
        }
    }
}

/// License management and `Authorizer` implementation.
pub struct LicenseService<K: KvStore, V: LicenseVerifier> {
    store: K,
    verifier: V,
    policy: LicensePolicy,
}

impl<K: KvStore, V: LicenseVerifier> LicenseService<K, V> {
    pub fn new(store: K, verifier: V, policy: LicensePolicy) -> Self {
        Self {
            store,
            verifier,
            policy,
        }
    }

    /// The cached license record, if a key has been activated.
    pub async fn record(&self) -> Result<Option<LicenseRecord>, LicenseError> {
        let value = self
            .store
            .get(LICENSE_NAMESPACE, RECORD_KEY)
            .await
            .map_err(|e| LicenseError::Storage(e.to_string()))?;
        match value {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| LicenseError::Storage(format!("corrupt license record: {e}"))),
            None => Ok(None),
        }
    }

    async fn save_record(&self, record: &LicenseRecord) -> Result<(), LicenseError> {
        let value =
            serde_json::to_value(record).map_err(|e| LicenseError::Storage(e.to_string()))?;
        self.store
            .set(LICENSE_NAMESPACE, RECORD_KEY, &value)
            .await
            .map_err(|e| LicenseError::Storage(e.to_string()))
    }

    /// Verify `key` with the server and cache it as the active license.
    pub async fn activate(&self, key: &str) -> Result<LicenseRecord, LicenseError> {
        let key = key.trim();
        let verdict = self.verifier.verify(key).await?;
        if !verdict.valid {
            return Err(LicenseError::Rejected(
                verdict
                    .message
                    .unwrap_or_else(|| "license key is not valid".to_string()),
            ));
        }

        let now = Utc::now();
        let record = LicenseRecord {
            key: key.to_string(),
            activated_at: now,
            expires_at: verdict.expires_at,
            last_verified_at: now,
        };
        self.save_record(&record).await?;
        tracing::info!(key = %record.masked_key(), "license activated");
        Ok(record)
    }

    /// Forget the cached license.
    pub async fn deactivate(&self) -> Result<(), LicenseError> {
        self.store
            .delete(LICENSE_NAMESPACE, RECORD_KEY)
            .await
            .map_err(|e| LicenseError::Storage(e.to_string()))?;
        tracing::info!("license deactivated");
        Ok(())
    }

    /// Apply the validation policy as of `now`.
    pub async fn validate_at(&self, now: DateTime<Utc>, force_remote: bool) -> LicenseStatus {
        self.check_at(now, force_remote).await.0
    }

    /// Policy check that also reports whether the server was consulted.
    async fn check_at(&self, now: DateTime<Utc>, force_remote: bool) -> (LicenseStatus, bool) {
        let mut record = match self.record().await {
            Ok(Some(record)) => record,
            Ok(None) => return (LicenseStatus::invalid("no license activated"), false),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read license record");
                return (LicenseStatus::invalid(e.to_string()), false);
            }
        };

        let locally_expired = record.is_locally_expired(now);
        let stale = now - record.last_verified_at >= self.policy.remote_check_interval;
        if !locally_expired && !stale && !force_remote {
            let status = LicenseStatus::Valid {
                expires_at: record.expires_at,
            };
            return (status, false);
        }

        let status = match self.verifier.verify(&record.key).await {
            Ok(verdict) if verdict.valid => {
                record.last_verified_at = now;
                record.expires_at = verdict.expires_at;
                if let Err(e) = self.save_record(&record).await {
                    tracing::warn!(error = %e, "failed to cache license verification");
                }
                if record.is_locally_expired(now) {
                    LicenseStatus::invalid("license expired")
                } else {
                    LicenseStatus::Valid {
                        expires_at: record.expires_at,
                    }
                }
            }
            Ok(verdict) => {
                let reason = verdict
                    .message
                    .unwrap_or_else(|| "license revoked".to_string());
                tracing::warn!(key = %record.masked_key(), %reason, "license server rejected key");
                LicenseStatus::invalid(reason)
            }
            Err(LicenseError::Network(e)) => {
                let until = record.activated_at + self.policy.grace_period;
                if now < until && !locally_expired {
                    tracing::warn!(error = %e, %until, "license server unreachable, using grace period");
                    LicenseStatus::Grace { until }
                } else {
                    LicenseStatus::invalid(format!(
                        "license server unreachable and grace period elapsed: {e}"
                    ))
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "license verification failed");
                LicenseStatus::invalid(e.to_string())
            }
        };
        (status, true)
    }
}

impl<K: KvStore, V: LicenseVerifier> Authorizer for LicenseService<K, V> {
    async fn validate(&self) -> LicenseStatus {
        self.validate_at(Utc::now(), false).await
    }

    async fn revalidate(&self) -> LicenseStatus {
        self.validate_at(Utc::now(), true).await
    }

    async fn authorize(&self) -> LicenseStatus {
        let now = Utc::now();
        match self.check_at(now, false).await {
            (status, true) => status,
            (status, false) if status.is_valid() => status,
            (_, false) => self.validate_at(now, true).await,
        }
    }

    async fn record_completion(&self, summary: &RunSummary) {
        let record = match self.record().await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(error = %e, "skipping usage report");
                return;
            }
        };
        if let Err(e) = self.verifier.report_usage(&record.key, summary).await {
            tracing::warn!(run_id = %summary.run_id, error = %e, "failed to report run usage");
        }
    }
}
