use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use doccat_core::error::{BackendExt, CatalogError, Result};
use doccat_core::store::ObjectStore;

/// Filesystem-backed object store rooted at a base directory.
///
/// Objects live at `{root}/{storage_path}`. Writes go to `{root}/.tmp`
/// first and are renamed into place, so readers never see partial files.
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    pub async fn new(root: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let safe = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(CatalogError::Validation(format!(
                "invalid storage path: {path}"
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        let target = self.full_path(path)?;
        debug!(storage_path = %path, size = bytes.len(), "object store: put");

        let temp = self.root.join(".tmp").join(Uuid::new_v4().to_string());
        if let Err(e) = fs::write(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CatalogError::backend(e));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.backend()?;
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CatalogError::backend(e));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.full_path(path)?;
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::ObjectNotFound(path.to_string()))
            }
            Err(e) => Err(CatalogError::backend(e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.full_path(path)?;
        debug!(storage_path = %path, "object store: delete");
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::backend(e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.full_path(path)?;
        fs::try_exists(&target).await.backend()
    }
}
