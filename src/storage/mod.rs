//! Object storage backends.
//!
//! - **[`fs::FilesystemObjectStore`]**: objects under a local directory,
//!   written via temp file + rename.
//! - **[`s3::S3ObjectStore`]**: S3-compatible buckets (AWS, MinIO,
//!   Supabase storage) through SigV4-signed REST calls.
//!
//! Use [`open_object_store`] to build the backend selected in the config.

pub mod fs;
pub mod s3;

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use uuid::Uuid;

use doccat_core::models::OwnerId;
use doccat_core::store::ObjectStore;

use crate::config::Config;

/// Fresh, unique storage path for a new object of `owner`:
/// `{owner}/{uuid}-{sanitized file name}`.
pub fn object_path(owner: &OwnerId, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        sanitize_segment(owner.as_str()),
        Uuid::new_v4(),
        sanitize_segment(file_name)
    )
}

/// Keep `[A-Za-z0-9._-]`, replace anything else with `_`, never empty and
/// never a relative path component.
fn sanitize_segment(s: &str) -> String {
    let base = s.rsplit(['/', '\\']).next().unwrap_or(s);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build the object store configured in `[storage]`.
pub async fn open_object_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        "filesystem" => {
            let root = config
                .storage
                .root
                .clone()
                .ok_or_else(|| anyhow!("storage.root is required for the filesystem backend"))?;
            Ok(Arc::new(fs::FilesystemObjectStore::new(root).await?))
        }
        "s3" => {
            let s3_config = config
                .storage
                .s3
                .clone()
                .ok_or_else(|| anyhow!("[storage.s3] is required for the s3 backend"))?;
            Ok(Arc::new(s3::S3ObjectStore::from_env(s3_config)?))
        }
        other => bail!("Unknown storage backend: {}", other),
    }
}
