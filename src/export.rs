//! Export an owner's catalog as JSON.
//!
//! Writes every entry (file pointer, digest, metadata, version) as a
//! pretty-printed JSON document, to a file or to stdout for piping.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use doccat_core::models::{CatalogEntry, OwnerId};

use crate::catalog::Catalog;

#[derive(Serialize)]
pub struct CatalogExport {
    pub owner: OwnerId,
    pub exported_at: DateTime<Utc>,
    pub entry_count: usize,
    pub entries: Vec<CatalogEntry>,
}

pub async fn build_export(catalog: &Catalog, owner: &OwnerId) -> Result<CatalogExport> {
    let entries = catalog.list(owner).await?;
    Ok(CatalogExport {
        owner: owner.clone(),
        exported_at: Utc::now(),
        entry_count: entries.len(),
        entries,
    })
}

/// Export the catalog of `owner`.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout.
pub async fn run_export(catalog: &Catalog, owner: &OwnerId, output: Option<&Path>) -> Result<()> {
    let export = build_export(catalog, owner).await?;
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} entries to {}",
                export.entry_count,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}
