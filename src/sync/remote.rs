//! Remote progress persistence seam.

use crate::domain::models::ProgressMap;
use crate::drive_client::DriveClient;

/// Whole-document remote storage of the progress map. Both calls fail with a transport error
/// on network, auth or HTTP failure.
#[async_trait::async_trait]
pub trait RemoteProgressStore: Send + Sync {
    /// `Ok(None)` when no remote document has been created yet.
    async fn read_map(&self) -> anyhow::Result<Option<ProgressMap>>;
    async fn write_map(&self, map: &ProgressMap) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl RemoteProgressStore for DriveClient {
    async fn read_map(&self) -> anyhow::Result<Option<ProgressMap>> {
        self.load_progress().await
    }

    async fn write_map(&self, map: &ProgressMap) -> anyhow::Result<()> {
        self.save_progress(map).await
    }
}
