//! Content fingerprints for accepted card documents

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 fingerprint of a card document
///
/// Computed over the canonical JSON rendering of the parsed tree, so YAML and
/// JSON serializations of the same card share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from a parsed document
    ///
    /// `serde_json::Map` keeps keys sorted, which makes the rendering canonical.
    pub fn of_document(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self(format!("{:x}", Sha256::digest(canonical.as_bytes())))
    }

    /// Short prefix for display
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }

    /// Verify that a document matches this checksum
    pub fn verify_document(&self, value: &serde_json::Value) -> bool {
        *self == Self::of_document(value)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
