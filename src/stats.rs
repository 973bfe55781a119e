//! Catalog statistics.
//!
//! Summarizes an owner's catalog for `doccat stats`: entry counts per
//! document type, stored bytes, and legacy rows that predate content
//! digests (those are invisible to exact-duplicate detection).

use std::collections::BTreeMap;

use anyhow::Result;

use doccat_core::models::{CatalogEntry, OwnerId};

use crate::catalog::Catalog;

#[derive(Debug, Default, PartialEq)]
pub struct CatalogStats {
    pub entries: usize,
    pub total_bytes: i64,
    pub without_digest: usize,
    pub by_doc_type: BTreeMap<String, DocTypeStats>,
    pub last_updated: Option<i64>,
}

#[derive(Debug, Default, PartialEq)]
pub struct DocTypeStats {
    pub entries: usize,
    pub bytes: i64,
}

impl CatalogStats {
    pub fn from_entries(entries: &[CatalogEntry]) -> Self {
        let mut stats = CatalogStats::default();
        for entry in entries {
            stats.entries += 1;
            stats.total_bytes += entry.file.file_size;
            if entry.content_digest().is_none() {
                stats.without_digest += 1;
            }
            let by_type = stats
                .by_doc_type
                .entry(entry.metadata.doc_type.clone())
                .or_default();
            by_type.entries += 1;
            by_type.bytes += entry.file.file_size;
            stats.last_updated = stats.last_updated.max(Some(entry.updated_at));
        }
        stats
    }
}

/// Run the stats command and print a summary.
pub async fn run_stats(catalog: &Catalog, owner: &OwnerId) -> Result<()> {
    let entries = catalog.list(owner).await?;
    let stats = CatalogStats::from_entries(&entries);

    println!("doccat — Catalog Stats");
    println!("======================");
    println!();
    println!("  Owner:       {}", owner);
    println!("  Entries:     {}", stats.entries);
    println!("  Stored:      {}", format_bytes(stats.total_bytes.max(0) as u64));
    println!("  No digest:   {}", stats.without_digest);
    if let Some(ts) = stats.last_updated {
        println!("  Updated:     {}", format_ts_relative(ts));
    }

    if !stats.by_doc_type.is_empty() {
        println!();
        println!("  By document type:");
        println!("  {:<28} {:>8} {:>12}", "TYPE", "ENTRIES", "SIZE");
        println!("  {}", "-".repeat(50));
        for (doc_type, s) in &stats.by_doc_type {
            println!(
                "  {:<28} {:>8} {:>12}",
                doc_type,
                s.entries,
                format_bytes(s.bytes.max(0) as u64)
            );
        }
    }
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Unix timestamp as a relative time ("3 hours ago"), or a date when old.
pub fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if !(0..86400 * 30).contains(&delta) {
        return chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ts.to_string());
    }
    let (n, unit) = match delta {
        0..=59 => return "just now".to_string(),
        60..=3599 => (delta / 60, "min"),
        3600..=86399 => (delta / 3600, "hour"),
        _ => (delta / 86400, "day"),
    };
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccat_core::digest::ContentDigest;
    use doccat_core::models::{EntryMetadata, StoredFile};

    fn entry(doc_type: &str, size: i64, digest: bool, updated_at: i64) -> CatalogEntry {
        CatalogEntry {
            id: format!("{doc_type}-{size}"),
            owner_id: OwnerId::new("alice").unwrap(),
            file: StoredFile {
                storage_path: format!("alice/{doc_type}-{size}"),
                file_name: "f.pdf".into(),
                file_size: size,
                content_type: "application/pdf".into(),
                content_digest: digest.then(|| ContentDigest::compute(&size.to_le_bytes())),
            },
            metadata: EntryMetadata::new("T", doc_type),
            version: 1,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn groups_by_doc_type() {
        let stats = CatalogStats::from_entries(&[
            entry("manual", 100, true, 10),
            entry("manual", 50, false, 30),
            entry("drawing", 7, true, 20),
        ]);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.total_bytes, 157);
        assert_eq!(stats.without_digest, 1);
        assert_eq!(stats.last_updated, Some(30));
        assert_eq!(
            stats.by_doc_type["manual"],
            DocTypeStats {
                entries: 2,
                bytes: 150
            }
        );
        assert_eq!(stats.by_doc_type["drawing"].entries, 1);
    }

    #[test]
    fn empty_catalog() {
        assert_eq!(CatalogStats::from_entries(&[]), CatalogStats::default());
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn relative_times() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
