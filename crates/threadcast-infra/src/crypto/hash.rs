//! SHA-256 content hashing.
//!
//! Implements the `ContentHasher` trait from `threadcast-core` using the
//! `sha2` crate. Imported threads without an explicit id get one derived
//! from this digest.

use sha2::{Digest, Sha256};

use threadcast_core::service::hash::ContentHasher;

/// Lowercase hex SHA-256 digests of content strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for Sha256ContentHasher {
    fn compute_hash(&self, content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        format!("{:x}", digest)
    }
}
