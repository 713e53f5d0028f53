//! Infrastructure layer for Threadcast.
//!
//! Contains implementations of the port traits defined in `threadcast-core`:
//! SQLite storage, SHA-256 content hashing, the HTTP license verifier and the
//! HTTP target bridge, plus config loading and data directory resolution.

pub mod config;
pub mod crypto;
pub mod filesystem;
pub mod license;
pub mod sqlite;
pub mod target;
