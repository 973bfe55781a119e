use doccat_core::error::CatalogError;
use doccat_core::models::OwnerId;

use crate::config::Config;

/// The authenticated principal of the current invocation, if any.
#[derive(Debug, Clone, Default)]
pub struct Session {
    owner: Option<OwnerId>,
}

impl Session {
    pub fn new(owner: Option<OwnerId>) -> Self {
        Self { owner }
    }

    pub fn for_owner(owner: OwnerId) -> Self {
        Self { owner: Some(owner) }
    }

    pub fn anonymous() -> Self {
        Self { owner: None }
    }

    /// Owner from `DOCCAT_OWNER` or `[session] owner`; blank means anonymous.
    pub fn from_config(config: &Config) -> Self {
        let owner = config
            .session_owner()
            .and_then(|o| OwnerId::new(o).ok());
        Self { owner }
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.owner.as_ref()
    }

    /// The owner, or `NotAuthenticated`.
    pub fn require_owner(&self) -> Result<&OwnerId, CatalogError> {
        self.owner.as_ref().ok_or(CatalogError::NotAuthenticated)
    }
}
