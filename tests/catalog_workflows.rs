use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use doccat::app::App;
use doccat::config::{parse_config, CheckFailurePolicy, Config};
use doccat::extractor::DisabledExtractor;
use doccat::ingest::{run_bulk_ingest, IngestContext, IngestItem, IngestMode, IngestOptions, IngestSettings};
use doccat::progress::NoProgress;
use doccat::resolution::{
    upload_single, OnConflict, Resolution, ResolutionWorkflow, UploadOutcome, WorkflowState,
};
use doccat::session::Session;
use doccat_core::digest::ContentDigest;
use doccat_core::error::{CatalogError, Result};
use doccat_core::events::CatalogEvent;
use doccat_core::extraction::quick_metadata;
use doccat_core::models::{CatalogEntry, EntryMetadata, EntryPatch, FileUpload, NewEntry, OwnerId};
use doccat_core::store::memory::{InMemoryCatalog, InMemoryObjects};
use doccat_core::store::{CatalogStore, ObjectStore};

fn sqlite_config(root: &TempDir) -> Config {
    let toml = format!(
        r#"[db]
path = "{0}/data/doccat.sqlite"

[storage]
backend = "filesystem"
root = "{0}/objects"

[ingest]
batch_size = 2
batch_pause_ms = 0
"#,
        root.path().display()
    );
    parse_config(&toml).unwrap()
}

async fn sqlite_app(root: &TempDir, owner: &str) -> App {
    App::open(sqlite_config(root))
        .await
        .unwrap()
        .with_session(Session::for_owner(OwnerId::new(owner).unwrap()))
}

fn memory_config() -> Config {
    parse_config(
        r#"[db]
path = "/unused/doccat.sqlite"

[storage]
root = "/unused/objects"
"#,
    )
    .unwrap()
}

fn alice() -> OwnerId {
    OwnerId::new("alice").unwrap()
}

fn pdf(name: &str, bytes: &[u8]) -> FileUpload {
    FileUpload::new(name, "application/pdf", bytes.to_vec())
}

fn manual(title: &str) -> EntryMetadata {
    EntryMetadata::new(title, "manual")
}

fn count_objects(root: &TempDir) -> usize {
    walkdir::WalkDir::new(root.path().join("objects"))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.path().components().any(|c| c.as_os_str() == ".tmp"))
        .count()
}

// ============ SQLite + filesystem ============

#[tokio::test]
async fn bulk_ingest_skips_existing_duplicate() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;
    let existing = pdf("pump.pdf", b"pump manual");
    app.catalog
        .create(&alice(), &existing, &existing.digest(), manual("Pump"))
        .await
        .unwrap();

    let ctx = IngestContext {
        catalog: &app.catalog,
        checker: &app.checker,
        extractor: &DisabledExtractor,
        reporter: &NoProgress,
    };
    let items = vec![
        IngestItem::Bytes(pdf("valve.pdf", b"valve")),
        IngestItem::Bytes(pdf("pump-copy.pdf", b"pump manual")),
        IngestItem::Bytes(pdf("motor.pdf", b"motor")),
    ];
    let options = IngestOptions {
        doc_type: "manual".into(),
        mode: IngestMode::Quick,
        tags: vec![],
    };
    let summary = run_bulk_ingest(
        &ctx,
        &app.session,
        items,
        &options,
        &IngestSettings::from_config(&app.config),
    )
    .await
    .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.success + summary.failed, 2);
    assert_eq!(summary.success, 2);
    assert_eq!(app.catalog.list(&alice()).await.unwrap().len(), 3);
    assert_eq!(count_objects(&tmp), 3);
}

#[tokio::test]
async fn replace_with_identical_content_keeps_one_entry() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;
    let original = pdf("pump.pdf", b"pump manual");
    let entry = app
        .catalog
        .create(&alice(), &original, &original.digest(), manual("Pump"))
        .await
        .unwrap();

    let mut wf = ResolutionWorkflow::new(
        app.catalog.clone(),
        app.checker.clone(),
        &app.session,
        CheckFailurePolicy::Block,
    )
    .unwrap();
    let state = wf
        .submit(pdf("pump (1).pdf", b"pump manual"), manual("Pump again"))
        .await
        .unwrap();
    assert!(matches!(state, WorkflowState::ConflictDetected(_)));

    let outcome = wf.resolve(Resolution::Replace(entry.id.clone())).await.unwrap();
    let replaced = outcome.entry().unwrap().clone();
    assert_eq!(replaced.id, entry.id);
    assert_eq!(replaced.version, entry.version + 1);

    let entries = app.catalog.list(&alice()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(count_objects(&tmp), 1);
    assert_eq!(
        app.catalog.read_file(&alice(), &entry.id).await.unwrap(),
        b"pump manual"
    );
}

#[tokio::test]
async fn cancel_leaves_catalog_untouched() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;
    let original = pdf("pump.pdf", b"pump manual");
    app.catalog
        .create(&alice(), &original, &original.digest(), manual("Pump"))
        .await
        .unwrap();
    let before = app.catalog.list(&alice()).await.unwrap();

    let outcome = upload_single(
        &app.catalog,
        &app.checker,
        &app.session,
        CheckFailurePolicy::Block,
        pdf("pump.pdf", b"pump manual"),
        manual("Pump"),
        OnConflict::Cancel,
    )
    .await;

    assert!(!outcome.ok);
    assert_eq!(outcome.resolution, Some("cancelled"));
    assert_eq!(app.catalog.list(&alice()).await.unwrap(), before);
    assert_eq!(count_objects(&tmp), 1);
}

#[tokio::test]
async fn keep_both_for_similar_name_creates_second_entry() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;
    let original = pdf("pump.pdf", b"rev A");
    app.catalog
        .create(&alice(), &original, &original.digest(), manual("Pump manual"))
        .await
        .unwrap();

    let outcome = upload_single(
        &app.catalog,
        &app.checker,
        &app.session,
        CheckFailurePolicy::Block,
        pdf("pump.pdf", b"rev B"),
        manual("Pump manual rev B"),
        OnConflict::KeepBoth,
    )
    .await;

    assert!(outcome.ok, "{:?}", outcome.error);
    assert_eq!(outcome.resolution, Some("created"));
    let check = outcome.duplicate_check.unwrap();
    assert!(check.exact_duplicates.is_empty());
    assert_eq!(check.similar_entries.len(), 1);
    assert_eq!(app.catalog.list(&alice()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn keep_both_refuses_identical_content() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;
    let original = pdf("pump.pdf", b"pump manual");
    app.catalog
        .create(&alice(), &original, &original.digest(), manual("Pump"))
        .await
        .unwrap();

    let outcome = upload_single(
        &app.catalog,
        &app.checker,
        &app.session,
        CheckFailurePolicy::Block,
        pdf("other.pdf", b"pump manual"),
        manual("Other"),
        OnConflict::KeepBoth,
    )
    .await;

    assert!(!outcome.ok);
    let check = outcome.duplicate_check.unwrap();
    assert!(check.has_exact() && check.similar_entries.is_empty());
    assert_eq!(app.catalog.list(&alice()).await.unwrap().len(), 1);
    assert_eq!(count_objects(&tmp), 1);
}

async fn upload_report_revision(app: &App, bytes: &[u8]) -> UploadOutcome {
    let file = pdf("report-final.pdf", bytes);
    let metadata = quick_metadata(&file.file_name, "report", &[]);
    upload_single(
        &app.catalog,
        &app.checker,
        &app.session,
        CheckFailurePolicy::Block,
        file,
        metadata,
        OnConflict::Ask,
    )
    .await
}

#[tokio::test]
async fn new_revision_under_same_hyphenated_name_asks_first() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;

    let first = upload_report_revision(&app, b"rev A").await;
    assert_eq!(first.resolution, Some("created"));
    assert_eq!(first.entry.unwrap().metadata.title, "report final");

    let second = upload_report_revision(&app, b"rev B").await;
    assert!(!second.ok);
    assert_eq!(second.resolution, None);
    let check = second.duplicate_check.unwrap();
    assert!(check.exact_duplicates.is_empty());
    assert_eq!(check.similar_entries.len(), 1);
    assert_eq!(app.catalog.list(&alice()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn owners_do_not_see_each_others_content() {
    let tmp = TempDir::new().unwrap();
    let alice_app = sqlite_app(&tmp, "alice").await;
    let bob_app = sqlite_app(&tmp, "bob").await;
    let bob = OwnerId::new("bob").unwrap();
    let file = pdf("pump.pdf", b"pump manual");

    let entry = alice_app
        .catalog
        .create(&alice(), &file, &file.digest(), manual("Pump"))
        .await
        .unwrap();

    let check = bob_app.checker.check_all(&file, &bob, None).await.unwrap();
    assert!(!check.has_conflict());
    bob_app
        .catalog
        .create(&bob, &file, &file.digest(), manual("Pump"))
        .await
        .unwrap();

    assert!(matches!(
        bob_app.catalog.get(&bob, &entry.id).await,
        Err(CatalogError::NotFound(_))
    ));
    assert!(matches!(
        bob_app.catalog.delete(&bob, &entry.id).await,
        Err(CatalogError::NotFound(_))
    ));
    assert_eq!(alice_app.catalog.list(&alice()).await.unwrap().len(), 1);
    assert_eq!(bob_app.catalog.list(&bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_removes_row_and_object() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;
    let events = app.subscribe();
    let file = pdf("pump.pdf", b"pump manual");
    let entry = app
        .catalog
        .create(&alice(), &file, &file.digest(), manual("Pump"))
        .await
        .unwrap();

    app.catalog.delete(&alice(), &entry.id).await.unwrap();
    assert!(app.catalog.list(&alice()).await.unwrap().is_empty());
    assert_eq!(count_objects(&tmp), 0);

    let events = events.drain();
    assert!(matches!(events.first(), Some(CatalogEvent::EntryCreated { .. })));
    assert!(matches!(events.last(), Some(CatalogEvent::EntryDeleted { id }) if id == &entry.id));
}

#[tokio::test]
async fn metadata_edit_requires_current_version() {
    let tmp = TempDir::new().unwrap();
    let app = sqlite_app(&tmp, "alice").await;
    let file = pdf("pump.pdf", b"pump manual");
    let entry = app
        .catalog
        .create(&alice(), &file, &file.digest(), manual("Pump"))
        .await
        .unwrap();

    let updated = app
        .catalog
        .update_metadata(&alice(), &entry.id, entry.version, manual("Pump P-101"))
        .await
        .unwrap();
    assert_eq!(updated.version, entry.version + 1);

    let stale = app
        .catalog
        .update_metadata(&alice(), &entry.id, entry.version, manual("Stale"))
        .await;
    assert!(matches!(stale, Err(CatalogError::VersionConflict { .. })));
    assert_eq!(
        app.catalog.get(&alice(), &entry.id).await.unwrap().metadata.title,
        "Pump P-101"
    );
}

// ============ Fault injection ============

/// Object store whose writes or deletes can be switched off.
#[derive(Default)]
struct FlakyObjects {
    inner: InMemoryObjects,
    fail_put_for: std::sync::Mutex<Option<String>>,
    fail_delete: AtomicBool,
}

impl FlakyObjects {
    fn fail_puts_containing(&self, needle: &str) {
        *self.fail_put_for.lock().unwrap() = Some(needle.to_string());
    }
}

#[async_trait]
impl ObjectStore for FlakyObjects {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let needle = self.fail_put_for.lock().unwrap().clone();
        if let Some(needle) = needle {
            if path.contains(&needle) {
                return Err(CatalogError::backend(anyhow::anyhow!("disk full")));
            }
        }
        self.inner.put(path, bytes, content_type).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.get(path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(CatalogError::backend(anyhow::anyhow!("permission denied")));
        }
        self.inner.delete(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path).await
    }
}

/// Catalog store whose next update is preceded by a competing writer.
struct RacingCatalog {
    inner: InMemoryCatalog,
    race_next_update: AtomicBool,
}

#[async_trait]
impl CatalogStore for RacingCatalog {
    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>> {
        self.inner.list(owner).await
    }

    async fn get(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        self.inner.get(owner, id).await
    }

    async fn insert(&self, entry: NewEntry) -> Result<String> {
        self.inner.insert(entry).await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: &str,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<CatalogEntry> {
        if self.race_next_update.swap(false, Ordering::SeqCst) {
            let mut competing = manual("Edited elsewhere");
            competing.tags = vec!["race".into()];
            self.inner
                .update(owner, id, expected_version, EntryPatch::metadata(competing))
                .await?;
        }
        self.inner.update(owner, id, expected_version, patch).await
    }

    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        self.inner.delete(owner, id).await
    }

    async fn find_by_digest(
        &self,
        owner: &OwnerId,
        digest: &ContentDigest,
        exclude_id: Option<&str>,
    ) -> Result<Vec<CatalogEntry>> {
        self.inner.find_by_digest(owner, digest, exclude_id).await
    }

    async fn find_by_title(
        &self,
        owner: &OwnerId,
        needle: &str,
        exclude_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogEntry>> {
        self.inner.find_by_title(owner, needle, exclude_id, limit).await
    }
}

/// Catalog store whose digest lookups fail.
struct BrokenDigestLookup {
    inner: InMemoryCatalog,
}

#[async_trait]
impl CatalogStore for BrokenDigestLookup {
    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>> {
        self.inner.list(owner).await
    }

    async fn get(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        self.inner.get(owner, id).await
    }

    async fn insert(&self, entry: NewEntry) -> Result<String> {
        self.inner.insert(entry).await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: &str,
        expected_version: i64,
        patch: EntryPatch,
    ) -> Result<CatalogEntry> {
        self.inner.update(owner, id, expected_version, patch).await
    }

    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<Option<CatalogEntry>> {
        self.inner.delete(owner, id).await
    }

    async fn find_by_digest(
        &self,
        _owner: &OwnerId,
        _digest: &ContentDigest,
        _exclude_id: Option<&str>,
    ) -> Result<Vec<CatalogEntry>> {
        Err(CatalogError::backend(anyhow::anyhow!("connection reset")))
    }

    async fn find_by_title(
        &self,
        owner: &OwnerId,
        needle: &str,
        exclude_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogEntry>> {
        self.inner.find_by_title(owner, needle, exclude_id, limit).await
    }
}

fn broken_lookup_app() -> (App, Arc<BrokenDigestLookup>) {
    let store = Arc::new(BrokenDigestLookup {
        inner: InMemoryCatalog::new(),
    });
    let app = App::with_stores(memory_config(), store.clone(), Arc::new(InMemoryObjects::new()))
        .with_session(Session::for_owner(alice()));
    (app, store)
}

#[tokio::test]
async fn failed_check_blocks_single_upload_until_resolved() {
    let (app, store) = broken_lookup_app();
    let mut wf = ResolutionWorkflow::new(
        app.catalog.clone(),
        app.checker.clone(),
        &app.session,
        CheckFailurePolicy::Block,
    )
    .unwrap();

    let state = wf.submit(pdf("pump.pdf", b"pump"), manual("Pump")).await.unwrap();
    assert!(matches!(state, WorkflowState::CheckFailed { error } if error.contains("connection reset")));
    assert!(wf.duplicate_check().is_none());
    assert_eq!(store.inner.len(), 0);

    let outcome = wf.resolve(Resolution::KeepBoth).await.unwrap();
    assert_eq!(outcome.label(), "created");
    assert_eq!(store.inner.len(), 1);

    let asked = upload_single(
        &app.catalog,
        &app.checker,
        &app.session,
        CheckFailurePolicy::Block,
        pdf("valve.pdf", b"valve"),
        manual("Valve"),
        OnConflict::Ask,
    )
    .await;
    assert!(!asked.ok);
    assert!(asked.error.unwrap().contains("duplicate check failed"));
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn failed_check_with_proceed_creates_single_upload() {
    let (app, store) = broken_lookup_app();
    let outcome = upload_single(
        &app.catalog,
        &app.checker,
        &app.session,
        CheckFailurePolicy::Proceed,
        pdf("pump.pdf", b"pump"),
        manual("Pump"),
        OnConflict::Ask,
    )
    .await;

    assert!(outcome.ok, "{:?}", outcome.error);
    assert_eq!(outcome.resolution, Some("created"));
    assert!(outcome.duplicate_check.is_none());
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn failed_check_in_bulk_follows_policy() {
    let options = IngestOptions {
        doc_type: "manual".into(),
        mode: IngestMode::Quick,
        tags: vec![],
    };
    for (policy, expected) in [
        (CheckFailurePolicy::Proceed, (2, 0, 0)),
        (CheckFailurePolicy::Block, (0, 2, 0)),
    ] {
        let (app, store) = broken_lookup_app();
        let ctx = IngestContext {
            catalog: &app.catalog,
            checker: &app.checker,
            extractor: &DisabledExtractor,
            reporter: &NoProgress,
        };
        let items = vec![
            IngestItem::Bytes(pdf("pump.pdf", b"pump")),
            IngestItem::Bytes(pdf("valve.pdf", b"valve")),
        ];
        let settings = IngestSettings {
            batch_size: 10,
            batch_pause: Duration::ZERO,
            check_failure_policy: policy,
        };
        let summary = run_bulk_ingest(&ctx, &app.session, items, &options, &settings)
            .await
            .unwrap();

        assert_eq!(
            (summary.success, summary.failed, summary.skipped),
            expected,
            "{policy:?}"
        );
        assert_eq!(store.inner.len(), expected.0);
        if policy == CheckFailurePolicy::Block {
            assert!(summary
                .failures
                .iter()
                .all(|f| f.error.contains("duplicate check failed")));
        }
    }
}

#[tokio::test]
async fn lost_replace_race_removes_new_object() {
    let store = Arc::new(RacingCatalog {
        inner: InMemoryCatalog::new(),
        race_next_update: AtomicBool::new(false),
    });
    let objects = Arc::new(InMemoryObjects::new());
    let app = App::with_stores(memory_config(), store.clone(), objects.clone())
        .with_session(Session::for_owner(alice()));

    let v1 = pdf("pump.pdf", b"rev A");
    let entry = app
        .catalog
        .create(&alice(), &v1, &v1.digest(), manual("Pump"))
        .await
        .unwrap();
    let paths_before = objects.paths();

    store.race_next_update.store(true, Ordering::SeqCst);
    let v2 = pdf("pump.pdf", b"rev B");
    let err = app
        .catalog
        .replace(&alice(), &entry.id, entry.version, &v2, &v2.digest(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::VersionConflict { .. }));
    assert_eq!(objects.paths(), paths_before);
    let current = app.catalog.get(&alice(), &entry.id).await.unwrap();
    assert_eq!(current.storage_path(), entry.storage_path());
    assert_eq!(current.metadata.title, "Edited elsewhere");
}

#[tokio::test]
async fn concurrent_replaces_leave_one_object() {
    let store = Arc::new(InMemoryCatalog::new());
    let objects = Arc::new(InMemoryObjects::new());
    let app = App::with_stores(memory_config(), store.clone(), objects.clone())
        .with_session(Session::for_owner(alice()));

    let v1 = pdf("pump.pdf", b"rev A");
    let entry = app
        .catalog
        .create(&alice(), &v1, &v1.digest(), manual("Pump"))
        .await
        .unwrap();

    let b = pdf("pump.pdf", b"rev B");
    let c = pdf("pump.pdf", b"rev C");
    let owner = alice();
    let (b_digest, c_digest) = (b.digest(), c.digest());
    let (first, second) = tokio::join!(
        app.catalog
            .replace(&owner, &entry.id, entry.version, &b, &b_digest, None),
        app.catalog
            .replace(&owner, &entry.id, entry.version, &c, &c_digest, None),
    );

    let oks = [first.is_ok(), second.is_ok()];
    assert_eq!(oks.iter().filter(|ok| **ok).count(), 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(CatalogError::VersionConflict { .. })));
    assert_eq!(store.len(), 1);
    assert_eq!(objects.len(), 1);
}

#[tokio::test]
async fn racing_creates_of_same_content_keep_one_entry() {
    let store = Arc::new(InMemoryCatalog::new());
    let objects = Arc::new(InMemoryObjects::new());
    let app = App::with_stores(memory_config(), store.clone(), objects.clone())
        .with_session(Session::for_owner(alice()));

    let a = pdf("pump.pdf", b"same");
    let b = pdf("pump-copy.pdf", b"same");
    let owner = alice();
    let (a_digest, b_digest) = (a.digest(), b.digest());
    let (first, second) = tokio::join!(
        app.catalog.create(&owner, &a, &a_digest, manual("Pump")),
        app.catalog.create(&owner, &b, &b_digest, manual("Pump copy")),
    );

    assert!(first.is_ok() != second.is_ok());
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(CatalogError::DuplicateContent { .. })));
    assert_eq!(store.len(), 1);
    assert_eq!(objects.len(), 1);
}

#[tokio::test]
async fn failed_old_object_delete_is_reported_as_orphan() {
    let store = Arc::new(InMemoryCatalog::new());
    let objects = Arc::new(FlakyObjects::default());
    let app = App::with_stores(memory_config(), store, objects.clone())
        .with_session(Session::for_owner(alice()));
    let events = app.subscribe();

    let v1 = pdf("pump.pdf", b"rev A");
    let entry = app
        .catalog
        .create(&alice(), &v1, &v1.digest(), manual("Pump"))
        .await
        .unwrap();

    objects.fail_delete.store(true, Ordering::SeqCst);
    let v2 = pdf("pump.pdf", b"rev B");
    let replaced = app
        .catalog
        .replace(&alice(), &entry.id, entry.version, &v2, &v2.digest(), None)
        .await
        .unwrap();

    assert_ne!(replaced.storage_path(), entry.storage_path());
    let orphan = events.drain().into_iter().find_map(|e| match e {
        CatalogEvent::OrphanedObject { path, .. } => Some(path),
        _ => None,
    });
    assert_eq!(orphan.as_deref(), Some(entry.storage_path()));
}

#[tokio::test]
async fn bulk_ingest_continues_after_upload_failure() {
    let store = Arc::new(InMemoryCatalog::new());
    let objects = Arc::new(FlakyObjects::default());
    objects.fail_puts_containing("broken");
    let app = App::with_stores(memory_config(), store.clone(), objects)
        .with_session(Session::for_owner(alice()));

    let ctx = IngestContext {
        catalog: &app.catalog,
        checker: &app.checker,
        extractor: &DisabledExtractor,
        reporter: &NoProgress,
    };
    let items = vec![
        IngestItem::Bytes(pdf("first.pdf", b"1")),
        IngestItem::Bytes(pdf("broken.pdf", b"2")),
        IngestItem::Bytes(pdf("third.pdf", b"3")),
    ];
    let options = IngestOptions {
        doc_type: "datasheet".into(),
        mode: IngestMode::Assisted,
        tags: vec![],
    };
    let settings = IngestSettings {
        batch_size: 1,
        batch_pause: Duration::from_millis(1),
        check_failure_policy: CheckFailurePolicy::Proceed,
    };
    let summary = run_bulk_ingest(&ctx, &app.session, items, &options, &settings)
        .await
        .unwrap();

    assert_eq!((summary.success, summary.failed, summary.skipped), (2, 1, 0));
    assert_eq!(summary.failures[0].file_name, "broken.pdf");
    assert!(summary.failures[0].error.contains("disk full"));
    assert_eq!(store.len(), 2);
}
