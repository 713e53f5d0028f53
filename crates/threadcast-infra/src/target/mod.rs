//! Target adapters.

pub mod bridge;
