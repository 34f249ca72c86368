use crate::services::attachment::{AttachmentService, DiskAttachmentService};
use crate::services::entity::{EntityStore, SqliteEntityStore};
use crate::services::media::MediaLimits;
use crate::services::permission::{PermissionOracle, RolePermissionOracle};
use crate::services::spam::{PhraseSpamChecker, SpamChecker};
use crate::{Config, Database};
use anyhow::Result;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub store: Arc<dyn EntityStore>,
    pub permissions: Arc<dyn PermissionOracle>,
    pub attachments: Arc<dyn AttachmentService>,
    pub spam: Arc<dyn SpamChecker>,
}

impl AppState {
    /// Wires the SQLite and disk backed collaborators.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let store: Arc<dyn EntityStore> = Arc::new(SqliteEntityStore::new(db.clone()));
        let permissions = Arc::new(RolePermissionOracle::new(store.clone()));
        let attachments = Arc::new(DiskAttachmentService::new(store.clone(), &config.media)?);
        let spam = Arc::new(PhraseSpamChecker::new(&config.spam));

        Ok(Self {
            config,
            db,
            store,
            permissions,
            attachments,
            spam,
        })
    }

    pub fn limits(&self) -> MediaLimits {
        MediaLimits::from(&self.config.media)
    }

    pub fn base_url(&self) -> &str {
        self.config.api.base_url.trim_end_matches('/')
    }
}
