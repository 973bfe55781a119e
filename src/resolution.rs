//! Interactive duplicate resolution for single-file uploads.
//!
//! ```text
//! Idle ──submit──▶ Checking ──┬─▶ NoConflict ──create──▶ Resolved(Created)
//!                             ├─▶ ConflictDetected ─┐
//!                             └─▶ CheckFailed ──────┴─resolve──▶ Resolved(..)
//! ```
//!
//! Catalog mutations happen only on the transition into `Resolved`. A
//! `resolve` call that fails leaves the workflow where it was, so the
//! caller can pick another action. `Resolved` is terminal.

use serde::Serialize;
use tracing::{debug, warn};

use doccat_core::digest::ContentDigest;
use doccat_core::error::{CatalogError, Result};
use doccat_core::models::{CatalogEntry, EntryMetadata, FileUpload, OwnerId};

use crate::catalog::Catalog;
use crate::config::CheckFailurePolicy;
use crate::duplicates::{DuplicateCheck, DuplicateChecker};
use crate::session::Session;

/// Decision taken on a detected conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Put the new content into this existing entry. Must be one of the
    /// exact duplicates.
    Replace(String),
    /// Create a separate entry.
    KeepBoth,
    /// Discard the pending file.
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOutcome {
    Created(CatalogEntry),
    Replaced(CatalogEntry),
    Cancelled,
}

impl ResolvedOutcome {
    pub fn entry(&self) -> Option<&CatalogEntry> {
        match self {
            ResolvedOutcome::Created(e) | ResolvedOutcome::Replaced(e) => Some(e),
            ResolvedOutcome::Cancelled => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolvedOutcome::Created(_) => "created",
            ResolvedOutcome::Replaced(_) => "replaced",
            ResolvedOutcome::Cancelled => "cancelled",
        }
    }
}

/// What the user is shown when a conflict is detected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictDetails {
    pub file_name: String,
    pub exact_duplicates: Vec<CatalogEntry>,
    pub similar_entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    Checking,
    NoConflict,
    ConflictDetected(ConflictDetails),
    CheckFailed { error: String },
    Resolved(ResolvedOutcome),
}

impl WorkflowState {
    fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Checking => "checking",
            WorkflowState::NoConflict => "no_conflict",
            WorkflowState::ConflictDetected(_) => "conflict_detected",
            WorkflowState::CheckFailed { .. } => "check_failed",
            WorkflowState::Resolved(_) => "resolved",
        }
    }
}

struct Pending {
    upload: FileUpload,
    metadata: EntryMetadata,
    digest: ContentDigest,
    check: Option<DuplicateCheck>,
}

/// One upload's path through duplicate detection and resolution.
pub struct ResolutionWorkflow {
    catalog: Catalog,
    checker: DuplicateChecker,
    owner: OwnerId,
    policy: CheckFailurePolicy,
    state: WorkflowState,
    pending: Option<Pending>,
}

impl ResolutionWorkflow {
    /// Fails with `NotAuthenticated` when the session has no owner.
    pub fn new(
        catalog: Catalog,
        checker: DuplicateChecker,
        session: &Session,
        policy: CheckFailurePolicy,
    ) -> Result<Self> {
        let owner = session.require_owner()?.clone();
        Ok(Self {
            catalog,
            checker,
            owner,
            policy,
            state: WorkflowState::Idle,
            pending: None,
        })
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// The duplicate check of the pending file, when one succeeded.
    pub fn duplicate_check(&self) -> Option<&DuplicateCheck> {
        self.pending.as_ref().and_then(|p| p.check.as_ref())
    }

    /// Check `upload` and create it right away when nothing matches.
    pub async fn submit(
        &mut self,
        upload: FileUpload,
        metadata: EntryMetadata,
    ) -> Result<&WorkflowState> {
        if self.state != WorkflowState::Idle {
            return Err(self.invalid("submit"));
        }
        self.state = WorkflowState::Checking;
        let digest = upload.digest();

        let checked = self
            .checker
            .check_digest(digest.clone(), &upload.file_name, &self.owner, None)
            .await;

        match checked {
            Ok(check) if check.has_conflict() => {
                debug!(
                    file = %upload.file_name,
                    exact = check.exact_duplicates.len(),
                    similar = check.similar_entries.len(),
                    "resolution: conflict detected"
                );
                self.state = WorkflowState::ConflictDetected(ConflictDetails {
                    file_name: upload.file_name.clone(),
                    exact_duplicates: check.exact_duplicates.clone(),
                    similar_entries: check.similar_entries.clone(),
                });
                self.pending = Some(Pending {
                    upload,
                    metadata,
                    digest,
                    check: Some(check),
                });
                Ok(&self.state)
            }
            Ok(check) => {
                self.pending = Some(Pending {
                    upload,
                    metadata,
                    digest,
                    check: Some(check),
                });
                self.create_without_conflict().await
            }
            Err(e) => match self.policy {
                CheckFailurePolicy::Block => {
                    self.state = WorkflowState::CheckFailed {
                        error: e.to_string(),
                    };
                    self.pending = Some(Pending {
                        upload,
                        metadata,
                        digest,
                        check: None,
                    });
                    Ok(&self.state)
                }
                CheckFailurePolicy::Proceed => {
                    warn!(file = %upload.file_name, error = %e, "resolution: duplicate check failed, proceeding");
                    self.pending = Some(Pending {
                        upload,
                        metadata,
                        digest,
                        check: None,
                    });
                    self.create_without_conflict().await
                }
            },
        }
    }

    /// Apply the user's decision to a pending conflict.
    pub async fn resolve(&mut self, action: Resolution) -> Result<&ResolvedOutcome> {
        if !matches!(
            self.state,
            WorkflowState::ConflictDetected(_) | WorkflowState::CheckFailed { .. }
        ) {
            return Err(self.invalid("resolve"));
        }
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| CatalogError::InvalidTransition("no pending file".into()))?;

        let outcome = match action {
            Resolution::Cancel => ResolvedOutcome::Cancelled,
            Resolution::KeepBoth => {
                let entry = self
                    .catalog
                    .create(
                        &self.owner,
                        &pending.upload,
                        &pending.digest,
                        pending.metadata.clone(),
                    )
                    .await?;
                ResolvedOutcome::Created(entry)
            }
            Resolution::Replace(target_id) => {
                let target = pending
                    .check
                    .as_ref()
                    .and_then(|c| c.is_exact_duplicate_of(&target_id))
                    .ok_or_else(|| {
                        CatalogError::Validation(format!(
                            "entry {target_id} is not an exact duplicate of {}",
                            pending.upload.file_name
                        ))
                    })?;
                let entry = self
                    .catalog
                    .replace(
                        &self.owner,
                        &target.id,
                        target.version,
                        &pending.upload,
                        &pending.digest,
                        Some(pending.metadata.clone()),
                    )
                    .await?;
                ResolvedOutcome::Replaced(entry)
            }
        };

        self.pending = None;
        self.state = WorkflowState::Resolved(outcome);
        match &self.state {
            WorkflowState::Resolved(outcome) => Ok(outcome),
            _ => Err(self.invalid("resolve")),
        }
    }

    async fn create_without_conflict(&mut self) -> Result<&WorkflowState> {
        self.state = WorkflowState::NoConflict;
        let created = match self.pending.as_ref() {
            Some(p) => {
                self.catalog
                    .create(&self.owner, &p.upload, &p.digest, p.metadata.clone())
                    .await
            }
            None => Err(CatalogError::InvalidTransition("no pending file".into())),
        };
        match created {
            Ok(entry) => {
                self.pending = None;
                self.state = WorkflowState::Resolved(ResolvedOutcome::Created(entry));
                Ok(&self.state)
            }
            Err(e) => {
                self.pending = None;
                self.state = WorkflowState::Idle;
                Err(e)
            }
        }
    }

    fn invalid(&self, op: &str) -> CatalogError {
        CatalogError::InvalidTransition(format!(
            "cannot {op} while {}",
            self.state.name()
        ))
    }
}

/// Conflict decision made before the upload starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Stop and report the conflict.
    Ask,
    /// Replace the first exact duplicate.
    Replace,
    KeepBoth,
    Cancel,
}

/// Single-file upload result, as printed by `doccat upload --json`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_check: Option<DuplicateCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<CatalogEntry>,
}

impl UploadOutcome {
    fn failed(error: impl ToString, duplicate_check: Option<DuplicateCheck>) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
            duplicate_check,
            resolution: None,
            entry: None,
        }
    }

    fn resolved(outcome: &ResolvedOutcome, duplicate_check: Option<DuplicateCheck>) -> Self {
        Self {
            ok: !matches!(outcome, ResolvedOutcome::Cancelled),
            error: None,
            duplicate_check,
            resolution: Some(outcome.label()),
            entry: outcome.entry().cloned(),
        }
    }
}

/// Run the workflow for one file with a decision supplied up front.
pub async fn upload_single(
    catalog: &Catalog,
    checker: &DuplicateChecker,
    session: &Session,
    policy: CheckFailurePolicy,
    upload: FileUpload,
    metadata: EntryMetadata,
    on_conflict: OnConflict,
) -> UploadOutcome {
    let mut workflow =
        match ResolutionWorkflow::new(catalog.clone(), checker.clone(), session, policy) {
            Ok(w) => w,
            Err(e) => return UploadOutcome::failed(e, None),
        };

    let state = match workflow.submit(upload, metadata).await {
        Ok(state) => state.clone(),
        Err(e) => return UploadOutcome::failed(e, None),
    };
    let check = workflow.duplicate_check().cloned();

    let action = match (&state, on_conflict) {
        (WorkflowState::Resolved(outcome), _) => {
            return UploadOutcome::resolved(outcome, check);
        }
        (WorkflowState::CheckFailed { error }, OnConflict::Ask) => {
            return UploadOutcome::failed(format!("duplicate check failed: {error}"), None);
        }
        (_, OnConflict::Ask) => {
            return UploadOutcome {
                ok: false,
                error: None,
                duplicate_check: check,
                resolution: None,
                entry: None,
            };
        }
        (_, OnConflict::Replace) => match check.as_ref().and_then(|c| c.exact_duplicates.first()) {
            Some(target) => Resolution::Replace(target.id.clone()),
            None => {
                return UploadOutcome::failed("no exact duplicate to replace", check);
            }
        },
        (_, OnConflict::KeepBoth) => Resolution::KeepBoth,
        (_, OnConflict::Cancel) => Resolution::Cancel,
    };

    match workflow.resolve(action).await {
        Ok(outcome) => UploadOutcome::resolved(outcome, check),
        Err(e) => UploadOutcome::failed(e, check),
    }
}
