//! Duplicate queries against the owner's catalog.
//!
//! Two independent signals:
//!
//! - **exact duplicates**: entries whose content digest equals the new
//!   file's digest;
//! - **similar entries**: entries whose title contains the file's
//!   normalized base name (see [`doccat_core::similarity`]).
//!
//! Both are read-only. Whether a failed check blocks the caller is the
//! caller's [`CheckFailurePolicy`](crate::config::CheckFailurePolicy).

use std::sync::Arc;

use serde::Serialize;

use doccat_core::digest::ContentDigest;
use doccat_core::error::Result;
use doccat_core::models::{CatalogEntry, FileUpload, OwnerId};
use doccat_core::similarity::{normalized_base_name, DEFAULT_SIMILAR_LIMIT};
use doccat_core::store::CatalogStore;

/// Result of checking one file against the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheck {
    pub digest: ContentDigest,
    pub exact_duplicates: Vec<CatalogEntry>,
    pub similar_entries: Vec<CatalogEntry>,
}

impl DuplicateCheck {
    pub fn has_exact(&self) -> bool {
        !self.exact_duplicates.is_empty()
    }

    /// Any exact or similar match.
    pub fn has_conflict(&self) -> bool {
        self.has_exact() || !self.similar_entries.is_empty()
    }

    pub fn is_exact_duplicate_of(&self, id: &str) -> Option<&CatalogEntry> {
        self.exact_duplicates.iter().find(|e| e.id == id)
    }
}

#[derive(Clone)]
pub struct DuplicateChecker {
    store: Arc<dyn CatalogStore>,
    similar_limit: usize,
}

impl DuplicateChecker {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            similar_limit: DEFAULT_SIMILAR_LIMIT,
        }
    }

    pub fn with_similar_limit(mut self, limit: usize) -> Self {
        self.similar_limit = limit.max(1);
        self
    }

    pub async fn find_exact_duplicates(
        &self,
        digest: &ContentDigest,
        owner: &OwnerId,
        exclude_id: Option<&str>,
    ) -> Result<Vec<CatalogEntry>> {
        self.store.find_by_digest(owner, digest, exclude_id).await
    }

    /// At most `similar_limit` entries whose title contains the normalized
    /// base name of `file_name`.
    pub async fn find_similar_by_name(
        &self,
        file_name: &str,
        owner: &OwnerId,
        exclude_id: Option<&str>,
    ) -> Result<Vec<CatalogEntry>> {
        let needle = normalized_base_name(file_name);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        self.store
            .find_by_title(owner, &needle, exclude_id, self.similar_limit)
            .await
    }

    /// Hash `upload` and run both queries.
    pub async fn check_all(
        &self,
        upload: &FileUpload,
        owner: &OwnerId,
        exclude_id: Option<&str>,
    ) -> Result<DuplicateCheck> {
        self.check_digest(upload.digest(), &upload.file_name, owner, exclude_id)
            .await
    }

    /// Both queries for an already computed digest.
    pub async fn check_digest(
        &self,
        digest: ContentDigest,
        file_name: &str,
        owner: &OwnerId,
        exclude_id: Option<&str>,
    ) -> Result<DuplicateCheck> {
        let exact_duplicates = self
            .find_exact_duplicates(&digest, owner, exclude_id)
            .await?;
        let similar_entries = self
            .find_similar_by_name(file_name, owner, exclude_id)
            .await?;
        Ok(DuplicateCheck {
            digest,
            exact_duplicates,
            similar_entries,
        })
    }
}
