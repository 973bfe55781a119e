//! Core data models used throughout doccat.
//!
//! These types represent the uploaded files, catalog rows, and partial
//! updates that flow between the duplicate checker, the resolution
//! workflow, the bulk ingest pipeline, and the stores.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::CatalogError;

/// Identifier of the authenticated principal that owns catalog entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Build an owner id; blank ids are rejected as unauthenticated.
    pub fn new(id: impl Into<String>) -> Result<Self, CatalogError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::NotAuthenticated);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive fields of a document. Everything beyond `title` and
/// `doc_type` is optional and stored as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub title: String,
    pub doc_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_version: Option<String>,
}

impl EntryMetadata {
    pub fn new(title: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            doc_type: doc_type.into(),
            ..Default::default()
        }
    }
}

/// A file submitted for cataloguing: its name, MIME type, and full bytes.
#[derive(Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }

    pub fn digest(&self) -> ContentDigest {
        ContentDigest::compute(&self.bytes)
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Pointer from a catalog row to its backing storage object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub storage_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: String,
    /// `None` only for rows created before digests were recorded.
    pub content_digest: Option<ContentDigest>,
}

/// A persisted catalog row, paired one-to-one with a storage object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub file: StoredFile,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    /// Optimistic-concurrency token, bumped on every mutation.
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CatalogEntry {
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn storage_path(&self) -> &str {
        &self.file.storage_path
    }

    pub fn content_digest(&self) -> Option<&ContentDigest> {
        self.file.content_digest.as_ref()
    }
}

/// Row to insert. The store assigns `id`, `version`, and timestamps.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub owner_id: OwnerId,
    pub file: StoredFile,
    pub metadata: EntryMetadata,
}

/// Partial update of a catalog row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub metadata: Option<EntryMetadata>,
    pub file: Option<StoredFile>,
}

impl EntryPatch {
    pub fn metadata(metadata: EntryMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            file: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.file.is_none()
    }
}
