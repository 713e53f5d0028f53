//! Shared domain types for Threadcast.
//!
//! This crate contains the core domain types used across the Threadcast
//! workspace: thread payloads, posting runs, status snapshots, events,
//! license records, configuration and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod license;
pub mod run;
pub mod thread;
