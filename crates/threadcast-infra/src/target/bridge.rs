//! BridgeTargetAdapter -- [`TargetAdapter`] that drives a local browser
//! bridge over HTTP.
//!
//! The bridge owns the actual page automation (typing paragraphs,
//! formatting, clicking submit). This adapter only forwards one payload per
//! attempt and maps the bridge's answers onto `SubmitError`:
//!
//! | Bridge answer          | Result                     |
//! |------------------------|----------------------------|
//! | 2xx                    | `Ok(())`                   |
//! | 404                    | `SubmitError::TargetLost`  |
//! | 409 / 423              | `SubmitError::TargetBusy`  |
//! | 422                    | `ElementNotFound(body)`    |
//! | other 4xx              | `Rejected(body)`           |
//! | 5xx / transport error  | `Transport(..)`            |
//! | client timeout         | `Timeout(secs)`            |

use std::time::Duration;

use threadcast_core::posting::target::TargetAdapter;
use threadcast_types::config::BridgeConfig;
use threadcast_types::error::SubmitError;
use threadcast_types::run::TargetHandle;
use threadcast_types::thread::ThreadPayload;
use tokio_util::sync::CancellationToken;

/// Timeout for a liveness probe request.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BridgeTargetAdapter {
    client: reqwest::Client,
    base_url: reqwest::Url,
    request_timeout: Duration,
}

impl BridgeTargetAdapter {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, SubmitError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| SubmitError::Transport(format!("invalid bridge URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SubmitError::Transport(format!(
                "bridge URL cannot be a base: {base_url}"
            )));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SubmitError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    pub fn from_config(config: &BridgeConfig, request_timeout: Duration) -> Result<Self, SubmitError> {
        Self::new(&config.base_url, request_timeout)
    }

    /// `{base}/targets/{handle}[/{tail}]` with the handle percent-encoded.
    fn target_url(&self, target: &TargetHandle, tail: Option<&str>) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("targets").push(target.as_str());
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        url
    }

    async fn send_payload(
        &self,
        payload: &ThreadPayload,
        target: &TargetHandle,
    ) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(self.target_url(target, Some("threads")))
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SubmitError::Timeout(self.request_timeout.as_secs())
                } else {
                    SubmitError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            404 => SubmitError::TargetLost,
            409 | 423 => SubmitError::TargetBusy,
            422 => SubmitError::ElementNotFound(body),
            400..=499 => SubmitError::Rejected(format!("HTTP {status}: {body}")),
            _ => SubmitError::Transport(format!("HTTP {status}: {body}")),
        })
    }
}

impl TargetAdapter for BridgeTargetAdapter {
    async fn submit(
        &self,
        payload: &ThreadPayload,
        target: &TargetHandle,
        cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        if cancel.is_cancelled() {
            return Err(SubmitError::Cancelled);
        }

        tracing::debug!(thread_id = %payload.id, %target, "submitting thread to bridge");
        tokio::select! {
            _ = cancel.cancelled() => Err(SubmitError::Cancelled),
            result = self.send_payload(payload, target) => result,
        }
    }

    async fn is_target_live(&self, target: &TargetHandle) -> bool {
        let result = self
            .client
            .get(self.target_url(target, None))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(%target, status = %response.status(), "target probe failed");
                false
            }
            Err(e) => {
                tracing::debug!(%target, error = %e, "target probe unreachable");
                false
            }
        }
    }
}
