//! Debounced persistence of live position updates.

use std::sync::Arc;
use std::time::Duration;

use super::orchestrator::SyncOrchestrator;
use super::timer::DebounceTimer;
use crate::domain::models::PositionRecord;

/// Turns a high-frequency stream of relocations into at most one commit per quiet window.
///
/// Every event updates the in-memory map at once and restarts the shared debounce timer. When
/// the timer fires the whole map is written locally and then, if remote access exists, uploaded.
pub struct PositionUpdateCoalescer {
    orchestrator: Arc<SyncOrchestrator>,
    timer: Arc<DebounceTimer>,
    delay: Duration,
}

impl PositionUpdateCoalescer {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            timer: DebounceTimer::new(),
            delay,
        })
    }

    pub fn has_pending_commit(&self) -> bool {
        self.timer.is_pending()
    }

    /// Record a new position for `book_id` and (re)schedule the commit.
    pub fn on_position_change(self: &Arc<Self>, book_id: &str, position: &str) -> PositionRecord {
        let record = self
            .orchestrator
            .progress()
            .apply_optimistic_update(book_id, position);
        tracing::trace!(%book_id, updated_at = record.updated_at, "position changed");

        let this = Arc::clone(self);
        self.timer.schedule(self.delay, async move {
            this.commit().await;
        });
        record
    }

    async fn commit(&self) {
        let progress = self.orchestrator.progress();
        let saved = self
            .orchestrator
            .local()
            .save_latest(|| progress.snapshot())
            .await;
        tracing::debug!(entries = saved.len(), "committed progress locally");

        if let Some(remote) = self.orchestrator.remote() {
            if let Err(e) = self.orchestrator.upload_latest(remote.as_ref()).await {
                tracing::warn!(error = %format!("{:#}", e), "best-effort progress upload failed");
            }
        }
    }

    /// Flush-on-teardown: cancel the pending commit and write the latest map locally right
    /// away. The remote upload, if a commit was pending, is spawned and never awaited because
    /// the host may go away before it completes. Returns whether a commit was pending.
    pub async fn flush(&self) -> bool {
        let was_pending = self.timer.cancel();
        let progress = self.orchestrator.progress();
        let saved = self
            .orchestrator
            .local()
            .save_latest(|| progress.snapshot())
            .await;
        tracing::debug!(entries = saved.len(), was_pending, "flushed progress locally");

        if was_pending {
            if let Some(remote) = self.orchestrator.remote() {
                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move {
                    if let Err(e) = orchestrator.upload_latest(remote.as_ref()).await {
                        tracing::warn!(error = %format!("{:#}", e), "progress upload after flush failed");
                    }
                });
            }
        }
        was_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryKvStore, PROGRESS_KEY, PositionStore};
    use crate::sync::state::ProgressState;
    use crate::testing::MemoryRemoteStore;

    const DELAY: Duration = Duration::from_millis(750);

    struct Fixture {
        kv: Arc<MemoryKvStore>,
        remote: Arc<MemoryRemoteStore>,
        orchestrator: Arc<SyncOrchestrator>,
        coalescer: Arc<PositionUpdateCoalescer>,
    }

    async fn fixture(with_remote: bool) -> Fixture {
        let kv = Arc::new(MemoryKvStore::new());
        let local = Arc::new(PositionStore::new(kv.clone()));
        let orchestrator = Arc::new(SyncOrchestrator::new(Arc::new(ProgressState::new()), local));
        let remote = Arc::new(MemoryRemoteStore::new());
        if with_remote {
            orchestrator.establish_remote(remote.clone()).await;
        }
        let coalescer = PositionUpdateCoalescer::new(orchestrator.clone(), DELAY);
        Fixture {
            kv,
            remote,
            orchestrator,
            coalescer,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_yields_exactly_one_commit_with_last_value() {
        let f = fixture(true).await;
        let local_writes = f.kv.write_count();
        let remote_writes = f.remote.write_count();

        for i in 0..20 {
            f.coalescer.on_position_change("book1", &format!("p{}", i));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(f.kv.write_count(), local_writes);
        assert!(f.coalescer.has_pending_commit());

        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;

        assert_eq!(f.kv.write_count(), local_writes + 1);
        assert_eq!(f.remote.write_count(), remote_writes + 1);
        let saved = f.orchestrator.local().load().await;
        assert_eq!(saved.get("book1").unwrap().position, "p19");
        assert_eq!(
            f.remote.stored().unwrap().get("book1").unwrap().position,
            "p19"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn in_memory_map_is_updated_before_commit() {
        let f = fixture(false).await;
        let rec = f.coalescer.on_position_change("book1", "p1");
        assert_eq!(f.orchestrator.progress().position_of("book1"), Some(rec));
        assert!(f.kv.raw(PROGRESS_KEY).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_commit_separately() {
        let f = fixture(false).await;
        f.coalescer.on_position_change("book1", "a");
        tokio::time::sleep(DELAY * 2).await;
        f.coalescer.on_position_change("book2", "b");
        tokio::time::sleep(DELAY * 2).await;

        assert_eq!(f.kv.write_count(), 2);
        let saved = f.orchestrator.local().load().await;
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_during_commit_is_swallowed() {
        let f = fixture(true).await;
        f.remote.fail_writes(true);
        f.coalescer.on_position_change("book1", "p1");
        tokio::time::sleep(DELAY * 2).await;

        let saved = f.orchestrator.local().load().await;
        assert_eq!(saved.get("book1").unwrap().position, "p1");
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_locally_without_waiting_for_the_window() {
        let f = fixture(false).await;
        f.coalescer.on_position_change("book1", "p1");
        f.coalescer.on_position_change("book1", "p2");

        assert!(f.coalescer.flush().await);

        // the local write happened before flush returned, with zero time elapsed
        let saved = f.orchestrator.local().load().await;
        assert_eq!(saved.get("book1").unwrap().position, "p2");
        assert!(!f.coalescer.has_pending_commit());

        // the cancelled timer never fires a second commit
        let writes = f.kv.write_count();
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(f.kv.write_count(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_does_not_wait_for_remote() {
        let f = fixture(true).await;
        f.remote.set_latency(Duration::from_secs(30));
        let before = f.remote.write_count();
        f.coalescer.on_position_change("book1", "p1");

        let start = tokio::time::Instant::now();
        assert!(f.coalescer.flush().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(f.remote.write_count(), before);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(f.remote.write_count(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_without_pending_commit_still_writes_locally() {
        let f = fixture(false).await;
        assert!(!f.coalescer.flush().await);
        assert_eq!(f.kv.write_count(), 1);
    }
}
