//! SHA-256 content hashing for thread ids.

pub mod hash;
