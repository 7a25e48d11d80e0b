use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;

use crate::config::Config;
use crate::domain::mapping::map_library;
use crate::domain::models::LibraryBook;
use crate::drive_client::DriveClient;
use crate::session::{BookSource, SessionController};
use crate::storage::{KeyValueStore, PositionStore, SettingsStore};
use crate::sync::{
    PositionUpdateCoalescer, ProgressState, RemoteProgressStore, SyncOrchestrator, SyncOutcome,
};

/// Everything the HTTP handlers share.
pub struct AppContext {
    pub config: Config,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub coalescer: Arc<PositionUpdateCoalescer>,
    pub session: SessionController,
    pub settings: SettingsStore,
    drive: RwLock<Option<Arc<DriveClient>>>,
    books: RwLock<Option<Arc<dyn BookSource>>>,
}

impl AppContext {
    /// Wire the sync engine on top of `kv`. Must be called from within a tokio runtime.
    pub fn new(config: Config, kv: Arc<dyn KeyValueStore>) -> Self {
        let progress = Arc::new(ProgressState::new());
        let local = Arc::new(PositionStore::new(kv.clone()));
        let orchestrator = Arc::new(SyncOrchestrator::new(progress.clone(), local));
        let coalescer = PositionUpdateCoalescer::new(orchestrator.clone(), config.debounce());
        let session = SessionController::new(progress, coalescer.clone());
        Self {
            config,
            orchestrator,
            coalescer,
            session,
            settings: SettingsStore::new(kv),
            drive: RwLock::new(None),
            books: RwLock::new(None),
        }
    }

    pub fn drive(&self) -> Option<Arc<DriveClient>> {
        self.drive.read().clone()
    }

    pub fn books(&self) -> Option<Arc<dyn BookSource>> {
        self.books.read().clone()
    }

    /// A new access token arrived: talk to Drive with it and reconcile.
    #[tracing::instrument(level = "debug", skip(self, access_token))]
    pub async fn sign_in(&self, access_token: &str) -> anyhow::Result<SyncOutcome> {
        let client = DriveClient::new(&self.config.drive_api_base)
            .context("Failed to build Drive client")?
            .with_access_token(access_token);
        tracing::info!(drive_base = %self.config.drive_api_base, has_access_token = client.has_access_token(), "configured Drive client");
        Ok(self.connect(Arc::new(client)).await)
    }

    pub async fn connect(&self, drive: Arc<DriveClient>) -> SyncOutcome {
        let books: Arc<dyn BookSource> = drive.clone();
        let remote: Arc<dyn RemoteProgressStore> = drive.clone();
        *self.drive.write() = Some(drive);
        *self.books.write() = Some(books);
        self.orchestrator.establish_remote(remote).await
    }

    /// Re-run reconciliation with whatever access is currently established.
    pub async fn sync(&self) -> SyncOutcome {
        self.orchestrator.sync(self.orchestrator.has_remote()).await
    }

    /// EPUBs in Drive with resolved folder paths. `Ok(None)` without remote access.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn library(&self) -> anyhow::Result<Option<Vec<LibraryBook>>> {
        let Some(drive) = self.drive() else {
            return Ok(None);
        };
        let (files, folders) = tokio::try_join!(drive.list_epubs(), drive.list_folders())?;
        Ok(Some(map_library(&files, &folders)))
    }

    #[cfg(test)]
    pub async fn connect_with(
        &self,
        books: Arc<dyn BookSource>,
        remote: Arc<dyn RemoteProgressStore>,
    ) -> SyncOutcome {
        *self.books.write() = Some(books);
        self.orchestrator.establish_remote(remote).await
    }
}
