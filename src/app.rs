//! Application root: builds the stores and services once and hands them
//! to the commands.
//!
//! The [`EventBus`] lives here. Services publish on clones of it and
//! callers subscribe through [`App::subscribe`].

use std::sync::Arc;

use anyhow::Result;

use doccat_core::events::{CatalogEvent, EventBus, Subscription};
use doccat_core::store::{CatalogStore, ObjectStore};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::db;
use crate::duplicates::DuplicateChecker;
use crate::extractor::{create_extractor, MetadataExtractor};
use crate::migrate;
use crate::session::Session;
use crate::sqlite_store::SqliteCatalog;
use crate::storage::open_object_store;

pub struct App {
    pub config: Config,
    pub session: Session,
    pub catalog: Catalog,
    pub checker: DuplicateChecker,
    bus: EventBus<CatalogEvent>,
}

impl App {
    /// Open the configured SQLite catalog and object store.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::apply(&pool).await?;
        let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalog::new(pool));
        let objects = open_object_store(&config).await?;
        Ok(Self::with_stores(config, store, objects))
    }

    /// Wire the services around the given stores.
    pub fn with_stores(
        config: Config,
        store: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let bus = EventBus::new();
        let session = Session::from_config(&config);
        let catalog = Catalog::new(store.clone(), objects, bus.clone());
        let checker =
            DuplicateChecker::new(store).with_similar_limit(config.duplicates.similar_limit);
        Self {
            config,
            session,
            catalog,
            checker,
            bus,
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn subscribe(&self) -> Subscription<CatalogEvent> {
        self.bus.subscribe()
    }

    /// The configured metadata extractor. Built on demand so commands that
    /// never extract do not need provider credentials.
    pub fn extractor(&self) -> Result<Box<dyn MetadataExtractor>> {
        create_extractor(&self.config.extraction)
    }
}
