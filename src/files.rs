//! Local file helpers: loading uploads, streaming digests, discovery.
//!
//! `collect_files` expands the paths given to `doccat ingest`: files are
//! taken as-is, directories are walked and filtered by the `[ingest]`
//! include/exclude globs.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

use doccat_core::digest::{ContentDigest, ContentHasher};
use doccat_core::models::FileUpload;

const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Read a file from disk into an upload, with the MIME type guessed from
/// its extension.
pub async fn load_upload(path: &Path) -> Result<FileUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = file_name_of(path);
    let content_type = detect_content_type(&file_name);
    Ok(FileUpload::new(file_name, content_type, bytes))
}

/// Digest of a file's contents, read in 64 KiB blocks.
pub async fn hash_path(path: &Path) -> Result<ContentDigest> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// MIME type from a file extension.
pub fn detect_content_type(file_name: &str) -> String {
    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    };
    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "dwg" => "image/vnd.dwg",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Expand `paths` into an ordered list of files.
///
/// Explicit file arguments are kept in argument order. Directory contents
/// are sorted by relative path, matched against `include_globs` and not
/// matched by `exclude_globs`. A path appearing twice is kept once.
pub fn collect_files(
    paths: &[PathBuf],
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string(), "**/.tmp/**".to_string()];
    excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            bail!("Path does not exist: {}", root.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();
            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            found.push(path.to_path_buf());
        }
        found.sort();
        files.extend(found);
    }

    let mut seen = std::collections::HashSet::new();
    files.retain(|p| seen.insert(p.clone()));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {pattern}"))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streaming_hash_matches_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &bytes).unwrap();

        assert_eq!(hash_path(&path).await.unwrap(), ContentDigest::compute(&bytes));
    }

    #[tokio::test]
    async fn hashing_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(hash_path(&dir.path().join("nope.pdf")).await.is_err());
    }

    #[tokio::test]
    async fn load_upload_detects_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Manual.PDF");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let upload = load_upload(&path).await.unwrap();
        assert_eq!(upload.file_name, "Manual.PDF");
        assert_eq!(upload.content_type, "application/pdf");
        assert_eq!(upload.size(), 8);
    }

    #[test]
    fn collect_walks_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("b.pdf"), b"b").unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::write(root.join("skip.exe"), b"x").unwrap();
        std::fs::write(root.join("sub/c.pdf"), b"c").unwrap();
        std::fs::write(root.join("sub/draft.pdf"), b"d").unwrap();

        let files = collect_files(
            &[root.to_path_buf()],
            &["**/*.pdf".to_string(), "**/*.txt".to_string()],
            &["**/draft*".to_string()],
        )
        .unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.pdf", "sub/c.pdf"]);
    }

    #[test]
    fn explicit_files_bypass_globs_and_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("drawing.dwg");
        std::fs::write(&file, b"x").unwrap();
        let files = collect_files(
            &[file.clone(), file.clone()],
            &["**/*.pdf".to_string()],
            &[],
        )
        .unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(collect_files(&[PathBuf::from("/definitely/not/here")], &[], &[]).is_err());
    }
}
