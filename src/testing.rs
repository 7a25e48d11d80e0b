// In-memory collaborators for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::models::ProgressMap;
use crate::session::BookSource;
use crate::sync::RemoteProgressStore;

/// Remote store holding the document in memory, with switchable failures and latency.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    stored: Mutex<Option<ProgressMap>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency: Mutex<Duration>,
}

impl MemoryRemoteStore {
    /// A remote where the progress document was never created.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(map: ProgressMap) -> Self {
        let store = Self::default();
        *store.stored.lock() = Some(map);
        store
    }

    pub fn stored(&self) -> Option<ProgressMap> {
        self.stored.lock().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    async fn wait(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl RemoteProgressStore for MemoryRemoteStore {
    async fn read_map(&self) -> anyhow::Result<Option<ProgressMap>> {
        self.wait().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("Drive returned 503 Service Unavailable");
        }
        Ok(self.stored())
    }

    async fn write_map(&self, map: &ProgressMap) -> anyhow::Result<()> {
        self.wait().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("Drive returned 401 Unauthorized");
        }
        *self.stored.lock() = Some(map.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Book bytes keyed by id. Unknown ids fail like a missing Drive file.
#[derive(Debug, Default)]
pub struct StaticBookSource {
    books: HashMap<String, Vec<u8>>,
}

impl StaticBookSource {
    pub fn with_book(mut self, book_id: &str, bytes: &[u8]) -> Self {
        self.books.insert(book_id.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait::async_trait]
impl BookSource for StaticBookSource {
    async fn fetch_book(&self, book_id: &str) -> anyhow::Result<Vec<u8>> {
        self.books
            .get(book_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Drive returned 404 Not Found: {}", book_id))
    }
}
