//! Storage abstractions for Threadcast.
//!
//! Defines the namespaced key-value store trait used for run checkpoints and
//! license records, plus an in-memory implementation.
//! The durable implementation lives in threadcast-infra.

pub mod kv_store;
pub mod memory;
