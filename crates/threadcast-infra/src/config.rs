//! Global configuration loader for Threadcast.
//!
//! Reads `config.toml` from the data directory (`~/.threadcast/` in
//! production) and deserializes it into [`GlobalConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::Path;

use thiserror::Error;
use threadcast_types::config::GlobalConfig;

/// Semantic problems in an otherwise well-formed config file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("[posting] min_delay_ms ({min_ms}) exceeds max_delay_ms ({max_ms})")]
    InvalidDelayWindow { min_ms: u64, max_ms: u64 },

    #[error("[posting] max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("{field} is not an http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Reject configurations the posting loop cannot run with.
pub fn validate_config(config: &GlobalConfig) -> Result<(), ConfigError> {
    let posting = &config.posting;
    if posting.min_delay_ms > posting.max_delay_ms {
        return Err(ConfigError::InvalidDelayWindow {
            min_ms: posting.min_delay_ms,
            max_ms: posting.max_delay_ms,
        });
    }
    if posting.max_attempts == 0 {
        return Err(ConfigError::ZeroAttempts);
    }
    check_url("[license] server_url", &config.license.server_url)?;
    check_url("[bridge] base_url", &config.bridge.base_url)?;
    Ok(())
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.posting.min_delay_ms, 3_000);
        assert_eq!(config.posting.max_attempts, 3);
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[posting]
min_delay_ms = 1000
max_delay_ms = 2000
retry_backoff_secs = 2

[guardian]
target_probe_interval_secs = 30

[license]
server_url = "https://licenses.example.com/v2"
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.posting.min_delay_ms, 1_000);
        assert_eq!(config.posting.retry_backoff_secs, 2);
        assert_eq!(config.posting.attempt_timeout_secs, 60);
        assert_eq!(config.guardian.target_probe_interval_secs, 30);
        assert_eq!(config.license.server_url, "https://licenses.example.com/v2");
        assert!(validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.posting.max_delay_ms, 10_000);
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let mut config = GlobalConfig::default();
        config.posting.min_delay_ms = 9_000;
        config.posting.max_delay_ms = 1_000;
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::InvalidDelayWindow {
                min_ms: 9_000,
                max_ms: 1_000
            })
        );
    }

    #[test]
    fn validate_rejects_zero_attempts_and_bad_urls() {
        let mut config = GlobalConfig::default();
        config.posting.max_attempts = 0;
        assert_eq!(validate_config(&config), Err(ConfigError::ZeroAttempts));

        let mut config = GlobalConfig::default();
        config.bridge.base_url = "ftp://bridge".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { field: "[bridge] base_url", .. })
        ));
    }
}
