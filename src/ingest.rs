//! Bulk ingest pipeline.
//!
//! Catalogues many files in one run:
//!
//! 1. **Pre-filter**: hash every file and skip those whose content is
//!    already catalogued, or repeats an earlier file of the same run.
//!    Similar names never skip.
//! 2. **Batching**: survivors are processed in chunks of `batch_size`
//!    with `batch_pause` between chunks.
//! 3. **Per file**: metadata from the file name (quick) or the metadata
//!    extractor (assisted, falling back to the file name), then upload and
//!    insert.
//!
//! Files are processed sequentially in input order. A failing file is
//! recorded and the run continues; nothing is retried. Every input file
//! ends as exactly one of success, failed or skipped.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use doccat_core::digest::ContentDigest;
use doccat_core::error::{CatalogError, Result};
use doccat_core::events::CatalogEvent;
use doccat_core::extraction::{quick_metadata, Extraction};
use doccat_core::models::{EntryMetadata, FileUpload, OwnerId};
use doccat_core::progress::{IngestFailure, IngestProgress, IngestSummary};

use crate::app::App;
use crate::catalog::Catalog;
use crate::config::{CheckFailurePolicy, Config};
use crate::duplicates::DuplicateChecker;
use crate::extractor::{DisabledExtractor, MetadataExtractor};
use crate::files;
use crate::progress::{IngestProgressReporter, ProgressMode};
use crate::session::Session;

/// One file handed to the pipeline.
#[derive(Debug, Clone)]
pub enum IngestItem {
    Path(PathBuf),
    Bytes(FileUpload),
}

impl IngestItem {
    pub fn file_name(&self) -> String {
        match self {
            IngestItem::Path(p) => files::file_name_of(p),
            IngestItem::Bytes(u) => u.file_name.clone(),
        }
    }

    async fn digest(&self) -> anyhow::Result<ContentDigest> {
        match self {
            IngestItem::Path(p) => files::hash_path(p).await,
            IngestItem::Bytes(u) => Ok(u.digest()),
        }
    }

    async fn load(&self) -> anyhow::Result<FileUpload> {
        match self {
            IngestItem::Path(p) => files::load_upload(p).await,
            IngestItem::Bytes(u) => Ok(u.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Metadata from the file name and declared type only.
    Quick,
    /// Ask the metadata extractor, fall back to quick metadata.
    Assisted,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub doc_type: String,
    pub mode: IngestMode,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub check_failure_policy: CheckFailurePolicy,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_pause: Duration::from_millis(500),
            check_failure_policy: CheckFailurePolicy::Proceed,
        }
    }
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.ingest.batch_size.max(1),
            batch_pause: Duration::from_millis(config.ingest.batch_pause_ms),
            check_failure_policy: config.duplicates.on_check_failure_bulk,
        }
    }
}

/// Collaborators of one pipeline run.
pub struct IngestContext<'a> {
    pub catalog: &'a Catalog,
    pub checker: &'a DuplicateChecker,
    pub extractor: &'a dyn MetadataExtractor,
    pub reporter: &'a dyn IngestProgressReporter,
}

struct Survivor {
    item: IngestItem,
    digest: Option<ContentDigest>,
}

struct Run<'a> {
    ctx: &'a IngestContext<'a>,
    progress: IngestProgress,
    failures: Vec<IngestFailure>,
}

impl Run<'_> {
    fn start_file(&mut self, index: usize, file_name: &str) {
        self.progress.current = index + 1;
        self.progress.current_file = Some(file_name.to_string());
    }

    fn succeeded(&mut self) {
        self.progress.success += 1;
        self.publish();
    }

    fn skipped(&mut self, file_name: &str, existing_id: Option<String>) {
        self.progress.skipped += 1;
        self.ctx.catalog.bus().publish(CatalogEvent::DuplicateSkipped {
            file_name: file_name.to_string(),
            existing_id,
        });
        self.publish();
    }

    fn failed(&mut self, file_name: &str, error: impl ToString) {
        let error = error.to_string();
        warn!(file = %file_name, error = %error, "ingest: file failed");
        self.progress.failed += 1;
        self.failures.push(IngestFailure {
            file_name: file_name.to_string(),
            error,
        });
        self.publish();
    }

    fn publish(&self) {
        self.ctx.reporter.report(&self.progress);
        self.ctx
            .catalog
            .bus()
            .publish(CatalogEvent::IngestProgress(self.progress.clone()));
    }
}

/// Ingest `items` for the session owner.
///
/// Fails only with `NotAuthenticated`; per-file problems are recorded in
/// the returned summary.
pub async fn run_bulk_ingest(
    ctx: &IngestContext<'_>,
    session: &Session,
    items: Vec<IngestItem>,
    options: &IngestOptions,
    settings: &IngestSettings,
) -> Result<IngestSummary> {
    let owner = session.require_owner()?.clone();
    let start = Utc::now();
    let total = items.len();
    let mut run = Run {
        ctx,
        progress: IngestProgress::new(total, start),
        failures: Vec::new(),
    };
    info!(total, mode = ?options.mode, "ingest: starting");

    let survivors = prefilter(&mut run, &owner, items, settings.check_failure_policy).await;
    debug!(survivors = survivors.len(), "ingest: pre-filter done");

    let batch_size = settings.batch_size.max(1);
    for (batch_no, batch) in survivors.chunks(batch_size).enumerate() {
        if batch_no > 0 && !settings.batch_pause.is_zero() {
            debug!(batch = batch_no + 1, pause_ms = settings.batch_pause.as_millis() as u64, "ingest: pausing between batches");
            tokio::time::sleep(settings.batch_pause).await;
        }
        for (index, survivor) in batch {
            let file_name = survivor.item.file_name();
            run.start_file(*index, &file_name);
            ctx.reporter.report(&run.progress);
            match ingest_one(ctx, &owner, survivor, options).await {
                Ok(()) => run.succeeded(),
                Err(e) => run.failed(&file_name, e),
            }
        }
    }

    let summary = IngestSummary {
        total,
        success: run.progress.success,
        failed: run.progress.failed,
        skipped: run.progress.skipped,
        failures: run.failures,
        elapsed_ms: run.progress.elapsed_ms(Utc::now()),
    };
    info!(
        success = summary.success,
        failed = summary.failed,
        skipped = summary.skipped,
        elapsed_ms = summary.elapsed_ms,
        "ingest: finished"
    );
    ctx.reporter.finish(&summary);
    ctx.catalog
        .bus()
        .publish(CatalogEvent::IngestFinished(summary.clone()));
    Ok(summary)
}

/// Hash and check each item. Returns the survivors with their input index.
async fn prefilter(
    run: &mut Run<'_>,
    owner: &OwnerId,
    items: Vec<IngestItem>,
    policy: CheckFailurePolicy,
) -> Vec<(usize, Survivor)> {
    let mut survivors = Vec::new();
    let mut seen: HashSet<ContentDigest> = HashSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let file_name = item.file_name();
        run.start_file(index, &file_name);

        let digest = match item.digest().await {
            Ok(d) => d,
            Err(e) => {
                // Unreadable files fail in the per-file step.
                debug!(file = %file_name, error = %e, "ingest: could not hash file");
                survivors.push((index, Survivor { item, digest: None }));
                continue;
            }
        };

        match run
            .ctx
            .checker
            .find_exact_duplicates(&digest, owner, None)
            .await
        {
            Ok(existing) if !existing.is_empty() => {
                debug!(file = %file_name, existing = %existing[0].id, "ingest: exact duplicate, skipping");
                run.skipped(&file_name, Some(existing[0].id.clone()));
                continue;
            }
            Ok(_) => {}
            Err(e) => match policy {
                CheckFailurePolicy::Proceed => {
                    warn!(file = %file_name, error = %e, "ingest: duplicate check failed, proceeding");
                }
                CheckFailurePolicy::Block => {
                    run.failed(&file_name, format!("duplicate check failed: {e}"));
                    continue;
                }
            },
        }

        if !seen.insert(digest.clone()) {
            debug!(file = %file_name, "ingest: repeats an earlier file of this run, skipping");
            run.skipped(&file_name, None);
            continue;
        }
        survivors.push((
            index,
            Survivor {
                item,
                digest: Some(digest),
            },
        ));
    }
    survivors
}

async fn ingest_one(
    ctx: &IngestContext<'_>,
    owner: &OwnerId,
    survivor: &Survivor,
    options: &IngestOptions,
) -> Result<()> {
    let upload = survivor.item.load().await.map_err(CatalogError::Backend)?;
    let digest = upload.digest();
    if survivor.digest.as_ref().is_some_and(|checked| checked != &digest) {
        return Err(CatalogError::Validation(format!(
            "{} changed on disk during ingest",
            upload.file_name
        )));
    }
    let metadata = metadata_for(ctx.extractor, &upload, options).await;
    ctx.catalog.create(owner, &upload, &digest, metadata).await?;
    Ok(())
}

/// Metadata for one file. Extraction problems never fail the file.
async fn metadata_for(
    extractor: &dyn MetadataExtractor,
    upload: &FileUpload,
    options: &IngestOptions,
) -> EntryMetadata {
    let base = quick_metadata(&upload.file_name, &options.doc_type, &options.tags);
    if options.mode == IngestMode::Quick {
        return base;
    }
    match extractor.extract(upload, &options.doc_type).await {
        Ok(Extraction::Parsed(extracted)) => {
            let mut merged = extracted.apply_to(base.clone());
            if merged.title.trim().is_empty() {
                merged.title = base.title;
            }
            if merged.doc_type.trim().is_empty() {
                merged.doc_type = base.doc_type;
            }
            merged
        }
        Ok(Extraction::Unparseable(raw)) => {
            warn!(
                file = %upload.file_name,
                response = %raw.chars().take(200).collect::<String>(),
                "ingest: extraction response unparseable, using file name metadata"
            );
            base
        }
        Err(e) => {
            warn!(file = %upload.file_name, error = %e, "ingest: extraction failed, using file name metadata");
            base
        }
    }
}

/// CLI entry point for `doccat ingest`: expand `paths`, run the pipeline and
/// print a summary. Returns the summary so callers can set the exit code.
pub async fn run_ingest(
    app: &App,
    paths: &[PathBuf],
    options: IngestOptions,
    progress: ProgressMode,
) -> anyhow::Result<IngestSummary> {
    app.session.require_owner()?;
    let files = files::collect_files(
        paths,
        &app.config.ingest.include_globs,
        &app.config.ingest.exclude_globs,
    )?;
    if files.is_empty() {
        println!("No matching files.");
    }

    let extractor: Box<dyn MetadataExtractor> = match options.mode {
        IngestMode::Quick => Box::new(DisabledExtractor),
        IngestMode::Assisted => app.extractor()?,
    };
    let reporter = progress.reporter();
    let ctx = IngestContext {
        catalog: &app.catalog,
        checker: &app.checker,
        extractor: extractor.as_ref(),
        reporter: reporter.as_ref(),
    };
    let items = files.into_iter().map(IngestItem::Path).collect();
    let settings = IngestSettings::from_config(&app.config);
    let summary = run_bulk_ingest(&ctx, &app.session, items, &options, &settings).await?;

    println!(
        "Ingest complete: {} stored, {} skipped as duplicates, {} failed ({} files).",
        summary.success, summary.skipped, summary.failed, summary.total
    );
    for failure in &summary.failures {
        println!("  failed: {}: {}", failure.file_name, failure.error);
    }
    Ok(summary)
}
