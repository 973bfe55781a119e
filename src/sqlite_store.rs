//! SQLite-backed [`CatalogStore`] implementation.
//!
//! One row of `catalog_entries` per entry. Per-owner digest uniqueness is
//! enforced by a partial unique index; updates are compare-and-swap on the
//! `version` column.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use doccat_core::digest::ContentDigest;
use doccat_core::error::{BackendExt, CatalogError, Result};
use doccat_core::models::{CatalogEntry, EntryMetadata, EntryPatch, NewEntry, OwnerId, StoredFile};
use doccat_core::similarity::title_contains_normalized;
use doccat_core::store::CatalogStore;

const COLUMNS: &str = "id, owner_id, storage_path, file_name, file_size, content_type, \
    content_digest, title, doc_type, tags_json, equipment_model, manufacturer, year, \
    norm_source, description, serial_number, plant_unit, system_area, revision_version, \
    version, created_at, updated_at";

/// SQLite implementation of the [`CatalogStore`] trait.
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_where(&self, clause: &str, binds: &[&str]) -> Result<Vec<CatalogEntry>> {
        let sql = format!("SELECT {COLUMNS} FROM catalog_entries WHERE {clause}");
        let mut query = sqlx::query(&sql);
        for b in binds {
            query = query.bind(*b);
        }
        let rows = query.fetch_all(&self.pool).await.backend()?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn existing_digest_owner(
        &self,
        owner: &OwnerId,
        digest: &ContentDigest,
        exclude_id: Option<&str>,
    ) -> Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM catalog_entries WHERE owner_id = ? AND content_digest = ? AND id != ? LIMIT 1",
        )
        .bind(owner.as_str())
        .bind(digest.as_str())
        .bind(exclude_id.unwrap_or(""))
        .fetch_optional(&self.pool)
        .await
        .backend()?;
        Ok(id)
    }
}

/// Decode one row. A malformed `content_digest` or `tags_json` fails the
/// whole query with `Backend` naming the entry.
fn row_to_entry(row: &SqliteRow) -> Result<CatalogEntry> {
    let id: String = row.try_get("id").backend()?;
    let digest: Option<String> = row.try_get("content_digest").backend()?;
    let content_digest = digest
        .as_deref()
        .map(ContentDigest::from_hex)
        .transpose()
        .map_err(|e| anyhow::anyhow!("entry {id}: malformed content_digest: {e}"))
        .backend()?;
    let tags_json: String = row.try_get("tags_json").backend()?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| anyhow::anyhow!("entry {id}: malformed tags_json: {e}"))
        .backend()?;
    let owner: String = row.try_get("owner_id").backend()?;

    Ok(CatalogEntry {
        id,
        owner_id: OwnerId::new(owner)?,
        file: StoredFile {
            storage_path: row.try_get("storage_path").backend()?,
            file_name: row.try_get("file_name").backend()?,
            file_size: row.try_get("file_size").backend()?,
            content_type: row.try_get("content_type").backend()?,
            content_digest,
        },
        metadata: EntryMetadata {
            title: row.try_get("title").backend()?,
            doc_type: row.try_get("doc_type").backend()?,
            tags,
            equipment_model: row.try_get("equipment_model").backend()?,
            manufacturer: row.try_get("manufacturer").backend()?,
            year: row.try_get("year").backend()?,
            norm_source: row.try_get("norm_source").backend()?,
            description: row.try_get("description").backend()?,
            serial_number: row.try_get("serial_number").backend()?,
            plant_unit: row.try_get("plant_unit").backend()?,
            system_area: row.try_get("system_area").backend()?,
            revision_version: row.try_get("revision_version").backend()?,
        },
        version: row.try_get("version").backend()?,
        created_at: row.try_get("created_at").backend()?,
        updated_at: row.try_get("updated_at").backend()?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>> {
        self.fetch_where(
            "owner_id = ? ORDER BY created_at DESC, id DESC",
            &[owner.as_str()],
        )
        .await
    }

    async fn get(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        let mut rows = self
            .fetch_where("owner_id = ? AND id = ?", &[owner.as_str(), id])
            .await?;
        Ok(rows.pop())
    }

    async fn insert(&self, entry: NewEntry) -> Result<String> {
        if let Some(digest) = &entry.file.content_digest {
            if let Some(existing_id) = self.existing_digest_owner(&entry.owner_id, digest, None).await? {
                return Err(CatalogError::DuplicateContent {
                    digest: digest.clone(),
                    existing_id,
                });
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let tags_json = serde_json::to_string(&entry.metadata.tags).backend()?;
        let meta = &entry.metadata;
        let file = &entry.file;

        let result = sqlx::query(
            r#"
            INSERT INTO catalog_entries (id, owner_id, storage_path, file_name, file_size,
                content_type, content_digest, title, doc_type, tags_json, equipment_model,
                manufacturer, year, norm_source, description, serial_number, plant_unit,
                system_area, revision_version, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(entry.owner_id.as_str())
        .bind(&file.storage_path)
        .bind(&file.file_name)
        .bind(file.file_size)
        .bind(&file.content_type)
        .bind(file.content_digest.as_ref().map(|d| d.as_str()))
        .bind(&meta.title)
        .bind(&meta.doc_type)
        .bind(&tags_json)
        .bind(&meta.equipment_model)
        .bind(&meta.manufacturer)
        .bind(meta.year)
        .bind(&meta.norm_source)
        .bind(&meta.description)
        .bind(&meta.serial_number)
        .bind(&meta.plant_unit)
        .bind(&meta.system_area)
        .bind(&meta.revision_version)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            // Lost a race against a concurrent insert of the same content.
            Err(e) if is_unique_violation(&e) => {
                let existing = match &file.content_digest {
                    Some(digest) => self
                        .existing_digest_owner(&entry.owner_id, digest, None)
                        .await?
                        .map(|existing_id| (digest.clone(), existing_id)),
                    None => None,
                };
                match existing {
                    Some((digest, existing_id)) => Err(CatalogError::DuplicateContent {
                        digest,
                        existing_id,
                    }),
                    None => Err(CatalogError::backend(e)),
                }
            }
            Err(e) => Err(CatalogError::backend(e)),
        }
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: &str,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<CatalogEntry> {
        let current = self
            .get(owner, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        if current.version != expected_version {
            return Err(CatalogError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
            });
        }

        if let Some(digest) = patch.file.as_ref().and_then(|f| f.content_digest.as_ref()) {
            if let Some(existing_id) = self.existing_digest_owner(owner, digest, Some(id)).await? {
                return Err(CatalogError::DuplicateContent {
                    digest: digest.clone(),
                    existing_id,
                });
            }
        }

        let metadata = patch.metadata.unwrap_or(current.metadata);
        let file = patch.file.unwrap_or(current.file);
        let tags_json = serde_json::to_string(&metadata.tags).backend()?;
        let now = chrono::Utc::now().timestamp().max(current.updated_at);

        let result = sqlx::query(
            r#"
            UPDATE catalog_entries SET
                storage_path = ?, file_name = ?, file_size = ?, content_type = ?,
                content_digest = ?, title = ?, doc_type = ?, tags_json = ?,
                equipment_model = ?, manufacturer = ?, year = ?, norm_source = ?,
                description = ?, serial_number = ?, plant_unit = ?, system_area = ?,
                revision_version = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND owner_id = ? AND version = ?
            "#,
        )
        .bind(&file.storage_path)
        .bind(&file.file_name)
        .bind(file.file_size)
        .bind(&file.content_type)
        .bind(file.content_digest.as_ref().map(|d| d.as_str()))
        .bind(&metadata.title)
        .bind(&metadata.doc_type)
        .bind(&tags_json)
        .bind(&metadata.equipment_model)
        .bind(&metadata.manufacturer)
        .bind(metadata.year)
        .bind(&metadata.norm_source)
        .bind(&metadata.description)
        .bind(&metadata.serial_number)
        .bind(&metadata.plant_unit)
        .bind(&metadata.system_area)
        .bind(&metadata.revision_version)
        .bind(now)
        .bind(id)
        .bind(owner.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await;

        let done = match result {
            Ok(done) => done,
            Err(e) if is_unique_violation(&e) => {
                return Err(CatalogError::Validation(format!(
                    "update of entry {} collides with another entry: {}",
                    id, e
                )))
            }
            Err(e) => return Err(CatalogError::backend(e)),
        };

        if done.rows_affected() == 0 {
            // The row changed (or vanished) between the read and the write.
            return match self.get(owner, id).await? {
                Some(_) => Err(CatalogError::VersionConflict {
                    id: id.to_string(),
                    expected: expected_version,
                }),
                None => Err(CatalogError::NotFound(id.to_string())),
            };
        }

        self.get(owner, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        let Some(existing) = self.get(owner, id).await? else {
            return Ok(None);
        };
        let done = sqlx::query("DELETE FROM catalog_entries WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner.as_str())
            .execute(&self.pool)
            .await
            .backend()?;
        Ok((done.rows_affected() > 0).then_some(existing))
    }

    async fn find_by_digest(
        &self,
        owner: &OwnerId,
        digest: &ContentDigest,
        exclude_id: Option<&str>,
    ) -> Result<Vec<CatalogEntry>> {
        self.fetch_where(
            "owner_id = ? AND content_digest = ? AND id != ? ORDER BY created_at DESC, id DESC",
            &[owner.as_str(), digest.as_str(), exclude_id.unwrap_or("")],
        )
        .await
    }

    async fn find_by_title(
        &self,
        owner: &OwnerId,
        needle: &str,
        exclude_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogEntry>> {
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        // SQLite's lower() folds ASCII only. Titles are matched in Rust.
        let sql = format!(
            "SELECT {COLUMNS} FROM catalog_entries WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .backend()?;

        let mut hits = Vec::new();
        for row in &rows {
            let id: &str = row.try_get("id").backend()?;
            let title: &str = row.try_get("title").backend()?;
            if Some(id) == exclude_id || !title_contains_normalized(title, needle) {
                continue;
            }
            hits.push(row_to_entry(row)?);
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }
}
