//! Reading session lifecycle: which book is open and when its position must be flushed.

mod controller;

pub use controller::{
    PageDisplay, Relocation, SessionController, SessionError, SessionState, SessionView,
    TocEntry,
};

use crate::drive_client::DriveClient;

/// Where book bytes come from.
#[async_trait::async_trait]
pub trait BookSource: Send + Sync {
    async fn fetch_book(&self, book_id: &str) -> anyhow::Result<Vec<u8>>;
}

#[async_trait::async_trait]
impl BookSource for DriveClient {
    async fn fetch_book(&self, book_id: &str) -> anyhow::Result<Vec<u8>> {
        self.download(book_id).await
    }
}
