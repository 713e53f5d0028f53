//! ContentHasher trait for deriving stable thread identifiers.
//!
//! Defined in threadcast-core so thread import can hash content without
//! coupling to a specific hashing algorithm. The `Sha256ContentHasher`
//! adapter lives in threadcast-infra.

/// Abstraction over content hashing.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}
