//! Session-start reconciliation between local, remote and in-memory progress.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::remote::RemoteProgressStore;
use super::state::ProgressState;
use crate::domain::models::ProgressMap;
use crate::domain::reconcile::merge;
use crate::storage::PositionStore;

/// Recoverable remote problem surfaced to the UI as informational state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// Remote read failed; the session continues on local data only.
    RemoteReadFailed(String),
    /// Remote write failed; local already holds the merged result.
    RemoteWriteFailed(String),
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::RemoteReadFailed(msg) => write!(f, "remote progress unavailable: {}", msg),
            SyncWarning::RemoteWriteFailed(msg) => {
                write!(f, "remote progress not updated: {}", msg)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The in-memory map after the sync, identical to what was written locally.
    pub progress: ProgressMap,
    /// Whether the remote map was read successfully and took part in the merge.
    pub remote_used: bool,
    /// Whether the result was uploaded.
    pub uploaded: bool,
    pub warning: Option<SyncWarning>,
}

pub struct SyncOrchestrator {
    progress: Arc<ProgressState>,
    local: Arc<PositionStore>,
    remote: RwLock<Option<Arc<dyn RemoteProgressStore>>>,
    upload_lock: tokio::sync::Mutex<()>,
    last_warning: RwLock<Option<SyncWarning>>,
}

impl SyncOrchestrator {
    pub fn new(progress: Arc<ProgressState>, local: Arc<PositionStore>) -> Self {
        Self {
            progress,
            local,
            remote: RwLock::new(None),
            upload_lock: tokio::sync::Mutex::new(()),
            last_warning: RwLock::new(None),
        }
    }

    pub fn progress(&self) -> &Arc<ProgressState> {
        &self.progress
    }

    pub fn local(&self) -> &Arc<PositionStore> {
        &self.local
    }

    /// The remote store, if remote access has been established.
    pub fn remote(&self) -> Option<Arc<dyn RemoteProgressStore>> {
        self.remote.read().clone()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.read().is_some()
    }

    pub fn last_warning(&self) -> Option<SyncWarning> {
        self.last_warning.read().clone()
    }

    /// A session-establishing event: install `store` and reconcile once.
    pub async fn establish_remote(&self, store: Arc<dyn RemoteProgressStore>) -> SyncOutcome {
        *self.remote.write() = Some(store);
        tracing::info!("remote access established");
        self.sync(true).await
    }

    /// Reconcile local and (when `has_remote_access`) remote progress, install the result as
    /// the in-memory map and write it back to both stores.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync(&self, has_remote_access: bool) -> SyncOutcome {
        let local = self.local.load().await;
        let remote_store = if has_remote_access { self.remote() } else { None };

        let mut warning = None;
        let mut remote_used = false;
        let mut upload_to = None;
        let remote = match remote_store {
            None => ProgressMap::new(),
            Some(store) => match store.read_map().await {
                Ok(Some(remote)) => {
                    remote_used = true;
                    upload_to = Some(store);
                    remote
                }
                Ok(None) => {
                    tracing::info!("no remote progress yet");
                    remote_used = true;
                    upload_to = Some(store);
                    ProgressMap::new()
                }
                Err(e) => {
                    tracing::warn!(error = %format!("{:#}", e), "remote progress read failed; continuing with local data");
                    warning = Some(SyncWarning::RemoteReadFailed(format!("{:#}", e)));
                    ProgressMap::new()
                }
            },
        };

        let merged = merge(&local, &remote);
        self.progress.replace_with_merge_result(merged);
        let written = self.local.save_latest(|| self.progress.snapshot()).await;

        let mut uploaded = false;
        if let Some(store) = upload_to {
            // an absent remote document is only created when there is something to put in it
            if remote.is_empty() && written.is_empty() {
                tracing::debug!("nothing to upload");
            } else {
                match self.upload_latest(store.as_ref()).await {
                    Ok(_) => uploaded = true,
                    Err(e) => {
                        tracing::warn!(error = %format!("{:#}", e), "remote progress write failed");
                        warning = Some(SyncWarning::RemoteWriteFailed(format!("{:#}", e)));
                    }
                }
            }
        }

        *self.last_warning.write() = warning.clone();
        tracing::info!(
            entries = written.len(),
            local_entries = local.len(),
            remote_entries = remote.len(),
            remote_used,
            uploaded,
            "progress synchronized"
        );
        SyncOutcome {
            progress: self.progress.snapshot(),
            remote_used,
            uploaded,
            warning,
        }
    }

    /// Upload the current in-memory map. The snapshot is taken once the previous upload has
    /// finished, so uploads can never land out of order.
    pub async fn upload_latest(&self, store: &dyn RemoteProgressStore) -> anyhow::Result<ProgressMap> {
        let _guard = self.upload_lock.lock().await;
        let snapshot = self.progress.snapshot();
        store.write_map(&snapshot).await?;
        tracing::debug!(entries = snapshot.len(), "uploaded progress");
        Ok(snapshot)
    }
}
