//! SHA-256 content digests.
//!
//! A [`ContentDigest`] is the exact-duplicate key of a catalog entry: the
//! lowercase hex SHA-256 of the file's bytes, 64 characters long.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CatalogError;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 of a file's exact byte content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Digest a complete in-memory buffer.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(bytes);
        hasher.finalize()
    }

    /// Parse a stored digest. Uppercase hex is accepted and normalized.
    pub fn from_hex(s: &str) -> Result<Self, CatalogError> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(CatalogError::Validation(format!(
                "content digest must be {} hex characters, got {}",
                DIGEST_HEX_LEN,
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CatalogError::Validation(format!(
                "content digest is not hex: {}",
                s
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.0)
    }
}

/// Incremental hasher for content that arrives in blocks (streamed reads).
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, block: &[u8]) {
        self.inner.update(block);
        self.bytes += block.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn finalize(self) -> ContentDigest {
        ContentDigest(format!("{:x}", self.inner.finalize()))
    }
}
