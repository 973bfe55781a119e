//! Error taxonomy for catalog, storage, and workflow operations.
//!
//! Every fallible operation at a store or service seam returns
//! [`CatalogError`] as a value. Transient backend failures (database,
//! object storage, network) are wrapped in [`CatalogError::Backend`] and
//! never retried by this crate.

use thiserror::Error;

use crate::digest::ContentDigest;

/// Errors surfaced by catalog stores, object stores, and the ingest services.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// No authenticated owner. Raised before any hashing or storage work.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The entry does not exist or belongs to another owner.
    #[error("entry {0} not found or no permission")]
    NotFound(String),

    /// The owner already has an entry with identical content.
    #[error("identical content already catalogued as entry {existing_id} (digest {digest})")]
    DuplicateContent {
        digest: ContentDigest,
        existing_id: String,
    },

    /// Another writer mutated the entry since it was read.
    #[error("entry {id} was modified concurrently (expected version {expected})")]
    VersionConflict { id: String, expected: i64 },

    /// The request is malformed or not applicable to the current data.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A workflow operation was called in a state that does not allow it.
    #[error("invalid workflow transition: {0}")]
    InvalidTransition(String),

    /// No object exists at the given storage path.
    #[error("storage object not found: {0}")]
    ObjectNotFound(String),

    /// Database, storage, or network failure.
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl CatalogError {
    /// Wrap any backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        CatalogError::Backend(err.into())
    }
}

/// Adapts foreign errors (sqlx, reqwest, io) into [`CatalogError::Backend`]
/// so backends can use `?` on them.
pub trait BackendExt<T> {
    fn backend(self) -> Result<T, CatalogError>;
}

impl<T, E> BackendExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn backend(self) -> Result<T, CatalogError> {
        self.map_err(CatalogError::backend)
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
