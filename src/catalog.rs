//! Catalog service: rows and their storage objects, kept in step.
//!
//! Every entry points at exactly one object. Creation uploads first and
//! removes the object again when the row cannot be written. Replacement
//! always uploads to a fresh path, swaps the row with a version
//! compare-and-swap, and only then removes the old object. An object that
//! cannot be removed after its row is gone is logged and published as
//! [`CatalogEvent::OrphanedObject`]; the operation itself still succeeds.

use std::sync::Arc;

use tracing::{info, warn};

use doccat_core::digest::ContentDigest;
use doccat_core::error::{CatalogError, Result};
use doccat_core::events::{CatalogEvent, EventBus};
use doccat_core::models::{
    CatalogEntry, EntryMetadata, EntryPatch, FileUpload, NewEntry, OwnerId, StoredFile,
};
use doccat_core::store::{CatalogStore, ObjectStore};

use crate::storage::object_path;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    bus: EventBus<CatalogEvent>,
}

impl Catalog {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        bus: EventBus<CatalogEvent>,
    ) -> Self {
        Self {
            store,
            objects,
            bus,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn bus(&self) -> &EventBus<CatalogEvent> {
        &self.bus
    }

    /// All entries of `owner`, newest first.
    pub async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>> {
        self.store.list(owner).await
    }

    pub async fn get(&self, owner: &OwnerId, id: &str) -> Result<CatalogEntry> {
        self.store
            .get(owner, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Bytes of the object behind an entry.
    pub async fn read_file(&self, owner: &OwnerId, id: &str) -> Result<Vec<u8>> {
        let entry = self.get(owner, id).await?;
        self.objects.get(entry.storage_path()).await
    }

    /// Upload `upload` to a fresh path and insert its row.
    pub async fn create(
        &self,
        owner: &OwnerId,
        upload: &FileUpload,
        digest: &ContentDigest,
        metadata: EntryMetadata,
    ) -> Result<CatalogEntry> {
        validate_metadata(&metadata)?;

        let file = self.upload_object(owner, upload, digest).await?;
        let storage_path = file.storage_path.clone();
        let new_entry = NewEntry {
            owner_id: owner.clone(),
            file,
            metadata,
        };

        let id = match self.store.insert(new_entry).await {
            Ok(id) => id,
            Err(e) => {
                self.discard_object(&storage_path, &e).await;
                return Err(e);
            }
        };

        let entry = self.get(owner, &id).await?;
        info!(id = %entry.id, title = %entry.title(), "catalog: entry created");
        self.bus.publish(CatalogEvent::EntryCreated {
            id: entry.id.clone(),
            title: entry.title().to_string(),
        });
        Ok(entry)
    }

    /// Overwrite the descriptive fields of an entry.
    pub async fn update_metadata(
        &self,
        owner: &OwnerId,
        id: &str,
        expected_version: i64,
        metadata: EntryMetadata,
    ) -> Result<CatalogEntry> {
        validate_metadata(&metadata)?;
        let entry = self
            .store
            .update(owner, id, expected_version, EntryPatch::metadata(metadata))
            .await?;
        self.bus.publish(CatalogEvent::EntryUpdated {
            id: entry.id.clone(),
            version: entry.version,
        });
        Ok(entry)
    }

    /// Point an existing entry at new content, keeping its id.
    ///
    /// Fails with `DuplicateContent` when another entry of the owner already
    /// holds `digest`, and with `VersionConflict` when the entry changed
    /// since `expected_version` was read. On failure the freshly uploaded
    /// object is removed and the entry is left as it was. `metadata: None`
    /// keeps the current descriptive fields.
    pub async fn replace(
        &self,
        owner: &OwnerId,
        id: &str,
        expected_version: i64,
        upload: &FileUpload,
        digest: &ContentDigest,
        metadata: Option<EntryMetadata>,
    ) -> Result<CatalogEntry> {
        if let Some(ref m) = metadata {
            validate_metadata(m)?;
        }
        let current = self.get(owner, id).await?;
        if current.version != expected_version {
            return Err(CatalogError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
            });
        }

        let others = self.store.find_by_digest(owner, digest, Some(id)).await?;
        if let Some(other) = others.first() {
            return Err(CatalogError::DuplicateContent {
                digest: digest.clone(),
                existing_id: other.id.clone(),
            });
        }

        let file = self.upload_object(owner, upload, digest).await?;
        let new_path = file.storage_path.clone();
        let patch = EntryPatch {
            metadata,
            file: Some(file),
        };

        let entry = match self.store.update(owner, id, expected_version, patch).await {
            Ok(entry) => entry,
            Err(e) => {
                self.discard_object(&new_path, &e).await;
                return Err(e);
            }
        };

        let old_path = current.storage_path().to_string();
        if let Err(e) = self.objects.delete(&old_path).await {
            self.report_orphan(&old_path, &e);
        }

        info!(id = %entry.id, version = entry.version, "catalog: entry replaced");
        self.bus.publish(CatalogEvent::EntryReplaced {
            id: entry.id.clone(),
            old_path,
            new_path,
        });
        Ok(entry)
    }

    /// Remove the row, then its object. Returns the removed entry.
    pub async fn delete(&self, owner: &OwnerId, id: &str) -> Result<CatalogEntry> {
        let entry = self
            .store
            .delete(owner, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        if let Err(e) = self.objects.delete(entry.storage_path()).await {
            self.report_orphan(entry.storage_path(), &e);
        }

        info!(id = %entry.id, "catalog: entry deleted");
        self.bus.publish(CatalogEvent::EntryDeleted {
            id: entry.id.clone(),
        });
        Ok(entry)
    }

    async fn upload_object(
        &self,
        owner: &OwnerId,
        upload: &FileUpload,
        digest: &ContentDigest,
    ) -> Result<StoredFile> {
        let storage_path = object_path(owner, &upload.file_name);
        self.objects
            .put(&storage_path, &upload.bytes, &upload.content_type)
            .await?;
        Ok(StoredFile {
            storage_path,
            file_name: upload.file_name.clone(),
            file_size: upload.size(),
            content_type: upload.content_type.clone(),
            content_digest: Some(digest.clone()),
        })
    }

    /// Best-effort removal of an object whose row was never written.
    async fn discard_object(&self, path: &str, cause: &CatalogError) {
        warn!(storage_path = %path, error = %cause, "catalog: row write failed, removing uploaded object");
        if let Err(e) = self.objects.delete(path).await {
            self.report_orphan(path, &e);
        }
    }

    fn report_orphan(&self, path: &str, err: &CatalogError) {
        warn!(storage_path = %path, error = %err, "catalog: orphaned storage object");
        self.bus.publish(CatalogEvent::OrphanedObject {
            path: path.to_string(),
            reason: err.to_string(),
        });
    }
}

fn validate_metadata(metadata: &EntryMetadata) -> Result<()> {
    if metadata.title.trim().is_empty() {
        return Err(CatalogError::Validation("title must not be empty".into()));
    }
    if metadata.doc_type.trim().is_empty() {
        return Err(CatalogError::Validation("doc_type must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccat_core::store::memory::{InMemoryCatalog, InMemoryObjects};

    fn setup() -> (Catalog, Arc<InMemoryCatalog>, Arc<InMemoryObjects>) {
        let store = Arc::new(InMemoryCatalog::new());
        let objects = Arc::new(InMemoryObjects::new());
        let catalog = Catalog::new(store.clone(), objects.clone(), EventBus::new());
        (catalog, store, objects)
    }

    fn upload(name: &str, bytes: &[u8]) -> FileUpload {
        FileUpload::new(name, "application/pdf", bytes.to_vec())
    }

    #[tokio::test]
    async fn create_writes_row_and_object() {
        let (catalog, store, objects) = setup();
        let owner = OwnerId::new("alice").unwrap();
        let up = upload("pump.pdf", b"pump");
        let entry = catalog
            .create(&owner, &up, &up.digest(), EntryMetadata::new("Pump", "manual"))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(objects.paths(), vec![entry.storage_path().to_string()]);
        assert_eq!(entry.version, 1);
        assert_eq!(entry.content_digest(), Some(&up.digest()));
    }

    #[tokio::test]
    async fn duplicate_create_leaves_no_object_behind() {
        let (catalog, store, objects) = setup();
        let owner = OwnerId::new("alice").unwrap();
        let up = upload("pump.pdf", b"pump");
        catalog
            .create(&owner, &up, &up.digest(), EntryMetadata::new("Pump", "manual"))
            .await
            .unwrap();
        let err = catalog
            .create(&owner, &up, &up.digest(), EntryMetadata::new("Pump 2", "manual"))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::DuplicateContent { .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(objects.len(), 1);
    }

    #[tokio::test]
    async fn blank_title_is_rejected_before_upload() {
        let (catalog, _, objects) = setup();
        let owner = OwnerId::new("alice").unwrap();
        let up = upload("pump.pdf", b"pump");
        let err = catalog
            .create(&owner, &up, &up.digest(), EntryMetadata::new("  ", "manual"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn replace_keeps_id_and_removes_old_object() {
        let (catalog, _, objects) = setup();
        let owner = OwnerId::new("alice").unwrap();
        let v1 = upload("pump.pdf", b"rev A");
        let entry = catalog
            .create(&owner, &v1, &v1.digest(), EntryMetadata::new("Pump", "manual"))
            .await
            .unwrap();

        let v2 = upload("pump.pdf", b"rev B");
        let replaced = catalog
            .replace(&owner, &entry.id, entry.version, &v2, &v2.digest(), None)
            .await
            .unwrap();

        assert_eq!(replaced.id, entry.id);
        assert_eq!(replaced.version, 2);
        assert_eq!(replaced.title(), "Pump");
        assert_eq!(replaced.content_digest(), Some(&v2.digest()));
        assert_ne!(replaced.storage_path(), entry.storage_path());
        assert_eq!(objects.paths(), vec![replaced.storage_path().to_string()]);
    }

    #[tokio::test]
    async fn stale_replace_is_a_version_conflict() {
        let (catalog, _, objects) = setup();
        let owner = OwnerId::new("alice").unwrap();
        let v1 = upload("pump.pdf", b"rev A");
        let entry = catalog
            .create(&owner, &v1, &v1.digest(), EntryMetadata::new("Pump", "manual"))
            .await
            .unwrap();
        catalog
            .update_metadata(&owner, &entry.id, 1, EntryMetadata::new("Pump P-101", "manual"))
            .await
            .unwrap();

        let v2 = upload("pump.pdf", b"rev B");
        let err = catalog
            .replace(&owner, &entry.id, 1, &v2, &v2.digest(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::VersionConflict { .. }));
        assert_eq!(objects.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_row_and_object() {
        let (catalog, store, objects) = setup();
        let owner = OwnerId::new("alice").unwrap();
        let sub = catalog.bus().subscribe();
        let up = upload("pump.pdf", b"pump");
        let entry = catalog
            .create(&owner, &up, &up.digest(), EntryMetadata::new("Pump", "manual"))
            .await
            .unwrap();

        catalog.delete(&owner, &entry.id).await.unwrap();
        assert!(store.is_empty());
        assert!(objects.is_empty());
        assert!(matches!(
            catalog.delete(&owner, &entry.id).await,
            Err(CatalogError::NotFound(_))
        ));

        let events = sub.drain();
        assert!(events.contains(&CatalogEvent::EntryDeleted { id: entry.id.clone() }));
    }

    #[tokio::test]
    async fn other_owner_sees_not_found() {
        let (catalog, _, _) = setup();
        let alice = OwnerId::new("alice").unwrap();
        let bob = OwnerId::new("bob").unwrap();
        let up = upload("pump.pdf", b"pump");
        let entry = catalog
            .create(&alice, &up, &up.digest(), EntryMetadata::new("Pump", "manual"))
            .await
            .unwrap();

        assert!(matches!(
            catalog.get(&bob, &entry.id).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete(&bob, &entry.id).await,
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(catalog.read_file(&alice, &entry.id).await.unwrap(), b"pump");
    }
}
