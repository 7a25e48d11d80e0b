use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::BookSource;
use crate::domain::models::PositionRecord;
use crate::sync::{PositionUpdateCoalescer, ProgressState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDisplay {
    pub page: u32,
    pub total: u32,
}

/// A relocation reported by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Relocation {
    pub position: String,
    pub displayed: Option<PageDisplay>,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub label: String,
    pub href: String,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub book_id: Option<String>,
    pub position: Option<String>,
    pub displayed: Option<PageDisplay>,
    pub percentage: Option<f64>,
    pub toc: Vec<TocEntry>,
}

/// A book ready to hand to the renderer.
#[derive(Debug, Clone)]
pub struct OpenedBook {
    pub book_id: String,
    /// Resume point; `None` starts at the renderer's default (beginning of book).
    pub start_position: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum SessionError {
    BookFetch(anyhow::Error),
    /// Another open or a close happened while this book was loading.
    Superseded { book_id: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::BookFetch(e) => write!(f, "failed to fetch book: {:#}", e),
            SessionError::Superseded { book_id } => {
                write!(f, "opening {} was superseded", book_id)
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    book_id: Option<String>,
    generation: u64,
    position: Option<String>,
    displayed: Option<PageDisplay>,
    percentage: Option<f64>,
    toc: Vec<TocEntry>,
}

impl Inner {
    fn clear_transient(&mut self) {
        self.position = None;
        self.displayed = None;
        self.percentage = None;
        self.toc.clear();
    }

    fn is_current(&self, book_id: &str) -> bool {
        self.state == SessionState::Ready && self.book_id.as_deref() == Some(book_id)
    }
}

/// Sequences book open/switch/close against the coalescer so no position update is lost.
///
/// `Idle -> Loading -> Ready -> (Loading | Idle)`. Leaving `Ready` always flushes first.
pub struct SessionController {
    progress: Arc<ProgressState>,
    coalescer: Arc<PositionUpdateCoalescer>,
    inner: Mutex<Inner>,
}

impl SessionController {
    pub fn new(progress: Arc<ProgressState>, coalescer: Arc<PositionUpdateCoalescer>) -> Self {
        Self {
            progress,
            coalescer,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                book_id: None,
                generation: 0,
                position: None,
                displayed: None,
                percentage: None,
                toc: Vec::new(),
            }),
        }
    }

    pub fn view(&self) -> SessionView {
        let inner = self.inner.lock();
        SessionView {
            state: inner.state,
            book_id: inner.book_id.clone(),
            position: inner.position.clone(),
            displayed: inner.displayed,
            percentage: inner.percentage,
            toc: inner.toc.clone(),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, source))]
    pub async fn open_book(
        &self,
        book_id: &str,
        source: &dyn BookSource,
    ) -> Result<OpenedBook, SessionError> {
        let previous = self.inner.lock().book_id.clone();
        if previous.is_some() {
            let flushed = self.coalescer.flush().await;
            tracing::debug!(previous = ?previous, flushed, "flushed previous book");
        }

        let generation = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = SessionState::Loading;
            inner.book_id = Some(book_id.to_string());
            inner.clear_transient();
            inner.generation
        };

        let fetched = source.fetch_book(book_id).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!(%book_id, "open superseded while loading");
            return Err(SessionError::Superseded {
                book_id: book_id.to_string(),
            });
        }
        match fetched {
            Ok(bytes) => {
                // looked up now so a sync that finished during the download is reflected
                let start_position = self.progress.position_of(book_id).map(|r| r.position);
                inner.state = SessionState::Ready;
                inner.position = start_position.clone();
                tracing::info!(%book_id, size = bytes.len(), resume = start_position.is_some(), "book ready");
                Ok(OpenedBook {
                    book_id: book_id.to_string(),
                    start_position,
                    bytes,
                })
            }
            Err(e) => {
                tracing::warn!(%book_id, error = %format!("{:#}", e), "failed to load book");
                inner.state = SessionState::Idle;
                inner.book_id = None;
                Err(SessionError::BookFetch(e))
            }
        }
    }

    /// Forward a renderer relocation for the open book. Events for any other book, or while
    /// not `Ready`, are stale and ignored (`None`).
    pub fn relocated(&self, book_id: &str, relocation: Relocation) -> Option<PositionRecord> {
        let mut inner = self.inner.lock();
        if !inner.is_current(book_id) {
            tracing::debug!(%book_id, state = ?inner.state, "ignoring stale relocation");
            return None;
        }
        let record = self
            .coalescer
            .on_position_change(book_id, &relocation.position);
        inner.position = Some(relocation.position);
        inner.displayed = relocation.displayed;
        inner.percentage = relocation.percentage;
        Some(record)
    }

    pub fn set_table_of_contents(&self, book_id: &str, toc: Vec<TocEntry>) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_current(book_id) {
            return false;
        }
        inner.toc = toc;
        true
    }

    /// The page was hidden; it may never come back, so persist now without closing.
    pub async fn visibility_hidden(&self) -> bool {
        self.coalescer.flush().await
    }

    pub async fn close(&self) {
        let flushed = self.coalescer.flush().await;
        let mut inner = self.inner.lock();
        tracing::info!(book_id = ?inner.book_id, flushed, "closing book");
        inner.generation += 1;
        inner.state = SessionState::Idle;
        inner.book_id = None;
        inner.clear_transient();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::models::now_millis;
    use crate::storage::{MemoryKvStore, PositionStore};
    use crate::sync::SyncOrchestrator;
    use crate::testing::{MemoryRemoteStore, StaticBookSource};

    const DELAY: Duration = Duration::from_millis(500);

    struct Fixture {
        orchestrator: Arc<SyncOrchestrator>,
        remote: Arc<MemoryRemoteStore>,
        session: SessionController,
    }

    async fn fixture() -> Fixture {
        let local = Arc::new(PositionStore::new(Arc::new(MemoryKvStore::new())));
        let progress = Arc::new(ProgressState::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(progress.clone(), local));
        let remote = Arc::new(MemoryRemoteStore::new());
        orchestrator.establish_remote(remote.clone()).await;
        let coalescer = PositionUpdateCoalescer::new(orchestrator.clone(), DELAY);
        Fixture {
            orchestrator,
            remote,
            session: SessionController::new(progress, coalescer),
        }
    }

    fn books() -> StaticBookSource {
        StaticBookSource::default()
            .with_book("book1", b"epub-1")
            .with_book("book2", b"epub-2")
    }

    fn relocation(position: &str) -> Relocation {
        Relocation {
            position: position.to_string(),
            displayed: Some(PageDisplay { page: 3, total: 120 }),
            percentage: Some(0.025),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn new_book_starts_at_default_and_persists_first_relocation() {
        let f = fixture().await;
        let opened = f.session.open_book("book1", &books()).await.unwrap();
        assert_eq!(opened.start_position, None);
        assert_eq!(opened.bytes, b"epub-1");
        assert_eq!(f.session.view().state, SessionState::Ready);

        let fired_at = now_millis();
        assert!(f.session.relocated("book1", relocation("epubcfi(/6/2)")).is_some());
        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;

        let local = f.orchestrator.local().load().await;
        let rec = local.get("book1").unwrap();
        assert_eq!(rec.position, "epubcfi(/6/2)");
        assert!(rec.updated_at >= fired_at);
        assert_eq!(f.remote.stored().unwrap().get("book1"), Some(rec));
    }

    #[tokio::test(start_paused = true)]
    async fn known_book_resumes_at_saved_position() {
        let f = fixture().await;
        f.orchestrator
            .progress()
            .apply_optimistic_update("book1", "epubcfi(/6/8)");

        let opened = f.session.open_book("book1", &books()).await.unwrap();
        assert_eq!(opened.start_position.as_deref(), Some("epubcfi(/6/8)"));
        assert_eq!(
            f.session.view().position.as_deref(),
            Some("epubcfi(/6/8)")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn switching_books_flushes_and_clears_transient_state() {
        let f = fixture().await;
        let source = books();
        f.session.open_book("book1", &source).await.unwrap();
        f.session.relocated("book1", relocation("b1-pos"));
        assert!(f.session.set_table_of_contents(
            "book1",
            vec![TocEntry {
                label: "Chapter 1".into(),
                href: "ch1.xhtml".into(),
                depth: 0,
            }]
        ));

        f.session.open_book("book2", &source).await.unwrap();

        // flushed without waiting for the debounce window
        let local = f.orchestrator.local().load().await;
        assert_eq!(local.get("book1").unwrap().position, "b1-pos");

        let view = f.session.view();
        assert_eq!(view.book_id.as_deref(), Some("book2"));
        assert_eq!(view.position, None);
        assert_eq!(view.displayed, None);
        assert_eq!(view.percentage, None);
        assert!(view.toc.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_relocations_are_ignored() {
        let f = fixture().await;
        assert!(f.session.relocated("book1", relocation("x")).is_none());

        let source = books();
        f.session.open_book("book1", &source).await.unwrap();
        f.session.open_book("book2", &source).await.unwrap();
        assert!(f.session.relocated("book1", relocation("late")).is_none());
        assert!(f.orchestrator.progress().position_of("book1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_returns_to_idle() {
        let f = fixture().await;
        let err = f.session.open_book("missing", &books()).await.unwrap_err();
        assert!(matches!(err, SessionError::BookFetch(_)));
        let view = f.session.view();
        assert_eq!(view.state, SessionState::Idle);
        assert_eq!(view.book_id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_and_goes_idle() {
        let f = fixture().await;
        f.session.open_book("book1", &books()).await.unwrap();
        f.session.relocated("book1", relocation("last"));

        f.session.close().await;

        assert_eq!(f.session.view().state, SessionState::Idle);
        let local = f.orchestrator.local().load().await;
        assert_eq!(local.get("book1").unwrap().position, "last");
        assert!(f.session.relocated("book1", relocation("after")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_hidden_flushes_but_keeps_book_open() {
        let f = fixture().await;
        f.session.open_book("book1", &books()).await.unwrap();
        f.session.relocated("book1", relocation("p"));

        assert!(f.session.visibility_hidden().await);
        assert_eq!(f.session.view().state, SessionState::Ready);
        let local = f.orchestrator.local().load().await;
        assert_eq!(local.get("book1").unwrap().position, "p");
    }

    struct SlowSource;

    #[async_trait::async_trait]
    impl BookSource for SlowSource {
        async fn fetch_book(&self, _book_id: &str) -> anyhow::Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(b"slow".to_vec())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_open_is_rejected() {
        let f = Arc::new(fixture().await);
        let slow = {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.session.open_book("book1", &SlowSource).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(f.session.view().state, SessionState::Loading);

        f.session.open_book("book2", &books()).await.unwrap();
        let stale = slow.await.unwrap();
        assert!(matches!(stale, Err(SessionError::Superseded { .. })));

        let view = f.session.view();
        assert_eq!(view.state, SessionState::Ready);
        assert_eq!(view.book_id.as_deref(), Some("book2"));
    }
}
