//! Filesystem helpers: data directory layout and thread file loading.

use std::path::{Path, PathBuf};

use thiserror::Error;
use threadcast_core::service::hash::ContentHasher;
use threadcast_core::thread::import::{ImportError, parse_threads};
use threadcast_types::thread::ThreadPayload;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "THREADCAST_DATA_DIR";

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "threadcast.db";

#[derive(Debug, Error)]
pub enum ThreadFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Import { path: PathBuf, source: ImportError },
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `THREADCAST_DATA_DIR` environment variable
/// 2. `~/.threadcast`
/// 3. `./.threadcast`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".threadcast");
    }

    PathBuf::from(".threadcast")
}

/// Path of the SQLite database for `data_dir`.
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

/// Create the data directory if needed.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(data_dir).await
}

/// Read and parse a JSON thread list from disk.
pub async fn load_thread_file(
    path: &Path,
    hasher: &dyn ContentHasher,
) -> Result<Vec<ThreadPayload>, ThreadFileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ThreadFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let threads = parse_threads(&content, hasher).map_err(|source| ThreadFileError::Import {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), count = threads.len(), "loaded thread file");
    Ok(threads)
}
