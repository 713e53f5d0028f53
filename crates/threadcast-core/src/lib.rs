//! Posting orchestration logic and port trait definitions for Threadcast.
//!
//! This crate defines the "ports" (storage, target adapter, license
//! verifier) that the infrastructure layer implements, plus the posting
//! orchestrator and session guardian that drive them. It depends only on
//! `threadcast-types` -- never on `threadcast-infra` or any database/IO crate.

pub mod event;
pub mod license;
pub mod posting;
pub mod service;
pub mod storage;
pub mod thread;

#[cfg(test)]
pub(crate) mod testing;
