//! Service-level abstractions shared by the core modules.

pub mod hash;
