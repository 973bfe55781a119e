//! Storage abstractions for doccat.
//!
//! [`CatalogStore`] persists catalog rows; [`ObjectStore`] holds the file
//! bytes each row points to. Both are owner-scoped seams with pluggable
//! backends (SQLite, filesystem, S3, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::digest::ContentDigest;
use crate::error::Result;
use crate::models::{CatalogEntry, EntryPatch, NewEntry, OwnerId};

/// Persisted catalog of document records.
///
/// Every operation is scoped to `owner`: rows of other owners behave as if
/// they did not exist.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list`](CatalogStore::list) | All entries of an owner, newest first |
/// | [`get`](CatalogStore::get) | One entry by id |
/// | [`insert`](CatalogStore::insert) | Create a row, returning its new id |
/// | [`update`](CatalogStore::update) | Compare-and-swap partial update |
/// | [`delete`](CatalogStore::delete) | Remove a row, returning it |
/// | [`find_by_digest`](CatalogStore::find_by_digest) | Exact-duplicate lookup |
/// | [`find_by_title`](CatalogStore::find_by_title) | Similar-name lookup |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>>;

    async fn get(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>>;

    /// Insert a row. Fails with `DuplicateContent` when the owner already
    /// holds an entry with the same digest.
    async fn insert(&self, entry: NewEntry) -> Result<String>;

    /// Apply `patch` if the stored version still equals `expected_version`.
    /// Bumps `version` and `updated_at`. Fails with `NotFound` for a missing
    /// row and `VersionConflict` when another writer got there first.
    async fn update(
        &self,
        owner: &OwnerId,
        id: &str,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<CatalogEntry>;

    /// Remove a row. Returns `None` when nothing was deleted.
    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>>;

    /// Entries of `owner` whose digest equals `digest`, minus `exclude_id`.
    async fn find_by_digest(
        &self,
        owner: &OwnerId,
        digest: &ContentDigest,
        exclude_id: Option<&str>,
    ) -> Result<Vec<CatalogEntry>>;

    /// Up to `limit` entries of `owner` whose lowercased title contains
    /// `needle` (already normalized), minus `exclude_id`. Newest first.
    async fn find_by_title(
        &self,
        owner: &OwnerId,
        needle: &str,
        exclude_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogEntry>>;
}

/// Byte storage addressed by path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` at `path`, overwriting nothing: callers always use
    /// freshly generated paths.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Read the object. Fails with `ObjectNotFound` when absent.
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove the object. Removing a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}
