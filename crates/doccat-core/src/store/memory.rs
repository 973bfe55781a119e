//! In-memory [`CatalogStore`] and [`ObjectStore`] implementations for
//! testing and embedding.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Enforces the same invariants
//! as the SQLite backend: per-owner digest uniqueness and version
//! compare-and-swap on update.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::digest::ContentDigest;
use crate::error::{CatalogError, Result};
use crate::models::{CatalogEntry, EntryPatch, NewEntry, OwnerId};
use crate::similarity::title_contains_normalized;

use super::{CatalogStore, ObjectStore};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}

/// In-memory catalog. Timestamps come from the system clock.
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of rows across all owners.
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sorted_newest_first(mut rows: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rows
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn digest_taken<'a>(
    entries: &'a HashMap<String, CatalogEntry>,
    owner: &OwnerId,
    digest: &ContentDigest,
    exclude_id: Option<&str>,
) -> Option<&'a CatalogEntry> {
    entries.values().find(|e| {
        &e.owner_id == owner
            && e.content_digest() == Some(digest)
            && Some(e.id.as_str()) != exclude_id
    })
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>> {
        let rows = read(&self.entries)
            .values()
            .filter(|e| &e.owner_id == owner)
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(rows))
    }

    async fn get(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        Ok(read(&self.entries)
            .get(id)
            .filter(|e| &e.owner_id == owner)
            .cloned())
    }

    async fn insert(&self, entry: NewEntry) -> Result<String> {
        let mut entries = write(&self.entries);
        if let Some(digest) = &entry.file.content_digest {
            if let Some(existing) = digest_taken(&entries, &entry.owner_id, digest, None) {
                return Err(CatalogError::DuplicateContent {
                    digest: digest.clone(),
                    existing_id: existing.id.clone(),
                });
            }
        }
        let now = chrono::Utc::now().timestamp();
        let id = Uuid::new_v4().to_string();
        entries.insert(
            id.clone(),
            CatalogEntry {
                id: id.clone(),
                owner_id: entry.owner_id,
                file: entry.file,
                metadata: entry.metadata,
                version: 1,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: &str,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<CatalogEntry> {
        let mut entries = write(&self.entries);
        let current = entries
            .get(id)
            .filter(|e| &e.owner_id == owner)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        if current.version != expected_version {
            return Err(CatalogError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
            });
        }
        if let Some(digest) = patch.file.as_ref().and_then(|f| f.content_digest.as_ref()) {
            if let Some(existing) = digest_taken(&entries, owner, digest, Some(id)) {
                return Err(CatalogError::DuplicateContent {
                    digest: digest.clone(),
                    existing_id: existing.id.clone(),
                });
            }
        }
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        if let Some(metadata) = patch.metadata {
            entry.metadata = metadata;
        }
        if let Some(file) = patch.file {
            entry.file = file;
        }
        entry.version += 1;
        entry.updated_at = chrono::Utc::now().timestamp().max(entry.updated_at);
        Ok(entry.clone())
    }

    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        let mut entries = write(&self.entries);
        let owned = entries.get(id).is_some_and(|e| &e.owner_id == owner);
        Ok(if owned { entries.remove(id) } else { None })
    }

    async fn find_by_digest(
        &self,
        owner: &OwnerId,
        digest: &ContentDigest,
        exclude_id: Option<&str>,
    ) -> Result<Vec<CatalogEntry>> {
        let rows = read(&self.entries)
            .values()
            .filter(|e| {
                &e.owner_id == owner
                    && e.content_digest() == Some(digest)
                    && Some(e.id.as_str()) != exclude_id
            })
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(rows))
    }

    async fn find_by_title(
        &self,
        owner: &OwnerId,
        needle: &str,
        exclude_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogEntry>> {
        let rows = read(&self.entries)
            .values()
            .filter(|e| {
                &e.owner_id == owner
                    && Some(e.id.as_str()) != exclude_id
                    && title_contains_normalized(e.title(), needle)
            })
            .cloned()
            .collect();
        let mut rows = Self::sorted_newest_first(rows);
        rows.truncate(limit);
        Ok(rows)
    }
}

/// In-memory object store keyed by path.
pub struct InMemoryObjects {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjects {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        read(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted paths of every stored object.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = read(&self.objects).keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for InMemoryObjects {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjects {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        write(&self.objects).insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        read(&self.objects)
            .get(path)
            .cloned()
            .ok_or_else(|| CatalogError::ObjectNotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        write(&self.objects).remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(read(&self.objects).contains_key(path))
    }
}
