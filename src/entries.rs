//! Catalog browsing and editing commands: `list`, `show`, `edit`, `delete`.

use anyhow::Result;

use doccat_core::models::{CatalogEntry, EntryMetadata};

use crate::app::App;
use crate::stats::{format_bytes, format_ts_relative};

/// Field changes requested on the command line. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct EntryEdit {
    pub title: Option<String>,
    pub doc_type: Option<String>,
    /// Replaces the tag list when given.
    pub tags: Option<Vec<String>>,
    pub equipment_model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: Option<i32>,
    pub norm_source: Option<String>,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub plant_unit: Option<String>,
    pub system_area: Option<String>,
    pub revision_version: Option<String>,
}

impl EntryEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.doc_type.is_none()
            && self.tags.is_none()
            && self.equipment_model.is_none()
            && self.manufacturer.is_none()
            && self.year.is_none()
            && self.norm_source.is_none()
            && self.description.is_none()
            && self.serial_number.is_none()
            && self.plant_unit.is_none()
            && self.system_area.is_none()
            && self.revision_version.is_none()
    }

    /// Overlay the requested changes on `base`. An empty string clears an
    /// optional field.
    pub fn apply(self, mut base: EntryMetadata) -> EntryMetadata {
        fn set(field: &mut Option<String>, value: Option<String>) {
            if let Some(v) = value {
                *field = if v.trim().is_empty() { None } else { Some(v) };
            }
        }
        if let Some(title) = self.title {
            base.title = title;
        }
        if let Some(doc_type) = self.doc_type {
            base.doc_type = doc_type;
        }
        if let Some(tags) = self.tags {
            base.tags = tags;
        }
        if self.year.is_some() {
            base.year = self.year;
        }
        set(&mut base.equipment_model, self.equipment_model);
        set(&mut base.manufacturer, self.manufacturer);
        set(&mut base.norm_source, self.norm_source);
        set(&mut base.description, self.description);
        set(&mut base.serial_number, self.serial_number);
        set(&mut base.plant_unit, self.plant_unit);
        set(&mut base.system_area, self.system_area);
        set(&mut base.revision_version, self.revision_version);
        base
    }
}

pub async fn run_list(app: &App, doc_type: Option<&str>, json: bool) -> Result<()> {
    let owner = app.session.require_owner()?;
    let mut entries = app.catalog.list(owner).await?;
    if let Some(doc_type) = doc_type {
        entries.retain(|e| e.metadata.doc_type.eq_ignore_ascii_case(doc_type));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }
    println!(
        "{:<36}  {:<14} {:>10}  {:<14}  TITLE",
        "ID", "TYPE", "SIZE", "UPDATED"
    );
    for e in &entries {
        println!(
            "{:<36}  {:<14} {:>10}  {:<14}  {}",
            e.id,
            e.metadata.doc_type,
            format_bytes(e.file.file_size.max(0) as u64),
            format_ts_relative(e.updated_at),
            e.title()
        );
    }
    Ok(())
}

pub async fn run_show(app: &App, id: &str, json: bool) -> Result<()> {
    let owner = app.session.require_owner()?;
    let entry = app.catalog.get(owner, id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry(&entry);
    }
    Ok(())
}

pub async fn run_edit(app: &App, id: &str, edit: EntryEdit) -> Result<()> {
    let owner = app.session.require_owner()?;
    if edit.is_empty() {
        anyhow::bail!("Nothing to change. Pass at least one field flag.");
    }
    let entry = app.catalog.get(owner, id).await?;
    let metadata = edit.apply(entry.metadata.clone());
    let updated = app
        .catalog
        .update_metadata(owner, id, entry.version, metadata)
        .await?;
    println!("Updated {} (version {}).", updated.id, updated.version);
    Ok(())
}

pub async fn run_delete(app: &App, id: &str) -> Result<()> {
    let owner = app.session.require_owner()?;
    let entry = app.catalog.delete(owner, id).await?;
    println!("Deleted {} ({}).", entry.id, entry.title());
    Ok(())
}

pub fn print_entry(e: &CatalogEntry) {
    println!("{}", e.title());
    println!("  id:          {}", e.id);
    println!("  type:        {}", e.metadata.doc_type);
    println!(
        "  file:        {} ({}, {})",
        e.file.file_name,
        e.file.content_type,
        format_bytes(e.file.file_size.max(0) as u64)
    );
    println!(
        "  digest:      {}",
        e.content_digest().map(|d| d.as_str()).unwrap_or("-")
    );
    println!("  version:     {}", e.version);
    println!("  updated:     {}", format_ts_relative(e.updated_at));
    if !e.metadata.tags.is_empty() {
        println!("  tags:        {}", e.metadata.tags.join(", "));
    }
    let optional = [
        ("equipment", e.metadata.equipment_model.as_deref()),
        ("manufacturer", e.metadata.manufacturer.as_deref()),
        ("norm", e.metadata.norm_source.as_deref()),
        ("serial", e.metadata.serial_number.as_deref()),
        ("plant unit", e.metadata.plant_unit.as_deref()),
        ("system area", e.metadata.system_area.as_deref()),
        ("revision", e.metadata.revision_version.as_deref()),
        ("description", e.metadata.description.as_deref()),
    ];
    for (label, value) in optional {
        if let Some(v) = value {
            println!("  {:<12} {}", format!("{label}:"), v);
        }
    }
    if let Some(year) = e.metadata.year {
        println!("  year:        {}", year);
    }
}
