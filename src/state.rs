use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::certificates::{IssuanceWorkflow, VerificationService};
use crate::config::Config;
use crate::db::Db;
use crate::events::StatusHandlers;
use crate::notifications::{LogOutbox, Notifier, Outbox};
use crate::pdf::{DocumentRenderer, LayoutEngine};
use crate::storage::DocumentStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Db,
    pub issuance: IssuanceWorkflow,
    pub verification: VerificationService,
    pub handlers: StatusHandlers,
    pub regeneration_locks: RegenerationLocks,
}

impl AppState {
    /// Production wiring: the layout engine renders, messages go to the log.
    pub fn new(config: Config, db: Db) -> Result<Self, tera::Error> {
        let renderer = Arc::new(LayoutEngine::new(&config));
        Self::with_parts(config, db, renderer, Arc::new(LogOutbox))
    }

    pub fn with_parts(
        config: Config,
        db: Db,
        renderer: Arc<dyn DocumentRenderer>,
        outbox: Arc<dyn Outbox>,
    ) -> Result<Self, tera::Error> {
        let storage = DocumentStorage::new(&config.media_root);
        let issuance = IssuanceWorkflow::new(db.clone(), storage, renderer);
        let verification = VerificationService::new(db.clone(), &config)?;
        let notifier = Arc::new(Notifier::new(outbox, config.institute_name.clone()));
        let handlers = StatusHandlers::new(
            db.clone(),
            issuance.clone(),
            verification.clone(),
            notifier,
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            issuance,
            verification,
            handlers,
            regeneration_locks: RegenerationLocks::default(),
        })
    }
}

/// One async lock per certificate id, so staff regenerations of the same
/// record run one at a time.
#[derive(Clone, Default)]
pub struct RegenerationLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RegenerationLocks {
    pub fn lock_for(&self, certificate_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = match self.inner.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(map.entry(certificate_id).or_default())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        match self.inner.lock() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
