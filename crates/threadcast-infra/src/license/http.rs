//! HttpLicenseVerifier -- [`LicenseVerifier`] backed by the remote license
//! server.
//!
//! Endpoints (relative to the configured `server_url`):
//! - `POST /licenses/verify` with `{"key": ..}` answers a `LicenseVerdict`.
//! - `POST /usage` with `{"key": .., "summary": ..}` records a finished run.
//!
//! Connection failures, timeouts and 5xx answers map to
//! `LicenseError::Network` so the caller can apply its grace period.

use std::time::Duration;

use serde::Serialize;
use threadcast_core::license::LicenseVerifier;
use threadcast_types::config::LicenseConfig;
use threadcast_types::license::{LicenseError, LicenseVerdict};
use threadcast_types::run::RunSummary;

#[derive(Serialize)]
struct VerifyRequest<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct UsageRequest<'a> {
    key: &'a str,
    summary: &'a RunSummary,
}

/// License verifier talking JSON over HTTP.
///
/// Does not derive Debug; license keys pass through request bodies.
pub struct HttpLicenseVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLicenseVerifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LicenseError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LicenseError::Protocol(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LicenseConfig) -> Result<Self, LicenseError> {
        Self::new(
            config.server_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response, LicenseError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(LicenseError::Network(format!("license server returned {status}")));
        }
        Ok(response)
    }
}

fn map_transport_error(err: reqwest::Error) -> LicenseError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        LicenseError::Network(err.to_string())
    } else {
        LicenseError::Protocol(err.to_string())
    }
}

impl LicenseVerifier for HttpLicenseVerifier {
    async fn verify(&self, key: &str) -> Result<LicenseVerdict, LicenseError> {
        let response = self.post("/licenses/verify", &VerifyRequest { key }).await?;
        let status = response.status();

        if matches!(status.as_u16(), 401 | 403 | 404) {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "license server refused key");
            let message = if body.is_empty() {
                format!("license server returned {status}")
            } else {
                body
            };
            return Ok(LicenseVerdict {
                valid: false,
                expires_at: None,
                message: Some(message),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LicenseError::Protocol(format!("HTTP {status}: {body}")));
        }

        response
            .json::<LicenseVerdict>()
            .await
            .map_err(|e| LicenseError::Protocol(format!("failed to parse verdict: {e}")))
    }

    async fn report_usage(&self, key: &str, summary: &RunSummary) -> Result<(), LicenseError> {
        let response = self.post("/usage", &UsageRequest { key, summary }).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LicenseError::Protocol(format!("usage report returned {status}")));
        }
        tracing::debug!(run_id = %summary.run_id, "reported run usage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn verifier(base: &str) -> HttpLicenseVerifier {
        HttpLicenseVerifier::new(base, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_verify_valid_key() {
        let app = Router::new().route(
            "/licenses/verify",
            post(|Json(body): Json<Value>| async move {
                let valid = body["key"] == "GOOD";
                Json(json!({"valid": valid, "expires_at": "2030-01-01T00:00:00Z"}))
            }),
        );
        let base = serve(app).await;

        let verdict = verifier(&base).verify("GOOD").await.unwrap();
        assert!(verdict.valid);
        assert!(verdict.expires_at.is_some());

        let verdict = verifier(&base).verify("BAD").await.unwrap();
        assert!(!verdict.valid);
    }

    #[tokio::test]
    async fn test_verify_forbidden_is_invalid_verdict() {
        let app = Router::new().route(
            "/licenses/verify",
            post(|| async { (StatusCode::FORBIDDEN, "key revoked") }),
        );
        let base = serve(app).await;

        let verdict = verifier(&base).verify("ANY").await.unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.message.as_deref(), Some("key revoked"));
    }

    #[tokio::test]
    async fn test_server_error_is_network_failure() {
        let app = Router::new().route(
            "/licenses/verify",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(app).await;

        let err = verifier(&base).verify("ANY").await.unwrap_err();
        assert!(matches!(err, LicenseError::Network(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = verifier(&format!("http://{addr}"))
            .verify("ANY")
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::Network(_)));
    }

    #[tokio::test]
    async fn test_malformed_verdict_is_protocol_error() {
        let app = Router::new().route("/licenses/verify", post(|| async { "not json" }));
        let base = serve(app).await;

        let err = verifier(&base).verify("ANY").await.unwrap_err();
        assert!(matches!(err, LicenseError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_report_usage_posts_summary() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/usage",
                post(
                    |State(hits): State<Arc<AtomicUsize>>, Json(body): Json<Value>| async move {
                        assert_eq!(body["key"], "KEY");
                        assert_eq!(body["summary"]["posted"], 2);
                        hits.fetch_add(1, Ordering::SeqCst);
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(Arc::clone(&hits));
        let base = serve(app).await;

        let summary = RunSummary {
            run_id: uuid::Uuid::now_v7(),
            posted: 2,
            failed: 0,
            total: 2,
            stopped: false,
            reason: None,
            duration_ms: 10,
            posted_thread_ids: vec!["a".into(), "b".into()],
        };
        verifier(&format!("{base}/"))
            .report_usage("KEY", &summary)
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
