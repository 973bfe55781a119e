//! Single-file commands: `upload`, `check`, `replace`.

use std::path::Path;

use anyhow::{bail, Result};

use doccat_core::extraction::quick_metadata;
use doccat_core::models::CatalogEntry;

use crate::app::App;
use crate::duplicates::DuplicateCheck;
use crate::entries::EntryEdit;
use crate::files;
use crate::resolution::{upload_single, OnConflict};

/// Upload one file, resolving conflicts according to `on_conflict`.
pub async fn run_upload(
    app: &App,
    path: &Path,
    doc_type: &str,
    edit: EntryEdit,
    on_conflict: OnConflict,
    json: bool,
) -> Result<()> {
    app.session.require_owner()?;
    let upload = files::load_upload(path).await?;
    let metadata = edit.apply(quick_metadata(&upload.file_name, doc_type, &[]));
    let file_name = upload.file_name.clone();

    let outcome = upload_single(
        &app.catalog,
        &app.checker,
        &app.session,
        app.config.duplicates.on_check_failure_single,
        upload,
        metadata,
        on_conflict,
    )
    .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Some(ref check) = outcome.duplicate_check {
        if !outcome.ok && outcome.resolution.is_none() {
            print_check(&file_name, check);
        }
    }

    match (outcome.ok, outcome.resolution, outcome.error) {
        (true, _, _) => {
            if !json {
                if let Some(ref entry) = outcome.entry {
                    let verb = outcome.resolution.unwrap_or("created");
                    println!("{} {} ({})", capitalize(verb), entry.id, entry.title());
                }
            }
            Ok(())
        }
        (false, Some("cancelled"), _) => {
            if !json {
                println!("Cancelled; nothing stored.");
            }
            Ok(())
        }
        (false, _, Some(error)) => bail!(error),
        (false, _, None) => {
            bail!("Possible duplicate of an existing entry. Re-run with --on-conflict replace|keep-both|cancel.")
        }
    }
}

/// Report duplicates of a file without storing anything.
pub async fn run_check(app: &App, path: &Path, json: bool) -> Result<()> {
    let owner = app.session.require_owner()?;
    let upload = files::load_upload(path).await?;
    let check = app.checker.check_all(&upload, owner, None).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else if check.has_conflict() {
        print_check(&upload.file_name, &check);
    } else {
        println!("No duplicates for {} ({}).", upload.file_name, check.digest);
    }
    Ok(())
}

/// Put the content of `path` into entry `id`, keeping its id and metadata.
pub async fn run_replace(app: &App, id: &str, path: &Path) -> Result<()> {
    let owner = app.session.require_owner()?;
    let current = app.catalog.get(owner, id).await?;
    let upload = files::load_upload(path).await?;
    let digest = upload.digest();
    if current.content_digest() == Some(&digest) {
        println!("{} already holds this content.", current.id);
        return Ok(());
    }
    let entry = app
        .catalog
        .replace(owner, id, current.version, &upload, &digest, None)
        .await?;
    println!("Replaced {} (version {}).", entry.id, entry.version);
    Ok(())
}

fn print_check(file_name: &str, check: &DuplicateCheck) {
    println!("Possible duplicates for {}:", file_name);
    if check.has_exact() {
        println!("  identical content:");
        for e in &check.exact_duplicates {
            print_match(e);
        }
    }
    if !check.similar_entries.is_empty() {
        println!("  similar names:");
        for e in &check.similar_entries {
            print_match(e);
        }
    }
}

fn print_match(e: &CatalogEntry) {
    println!(
        "    {}  {}  ({}, v{})",
        e.id,
        e.title(),
        e.file.file_name,
        e.version
    );
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
