use std::sync::Arc;

use poem_openapi::{
    OpenApi,
    param::Path,
    payload::{Json, PlainText},
};

use super::models::{
    AccessTokenRequestDto, FlushResponseDto, LibraryResponseDto, NoContentResponseDto,
    OpenBookResponseDto, ProgressEntryResponseDto, ProgressListResponseDto, RelocatedResponseDto,
    RelocationRequestDto, SessionViewResponseDto, SettingsDto, SettingsResponseDto,
    SyncResponseDto, TocRequestDto,
};
use super::services::{
    health::HealthService, library::LibraryService, progress::ProgressService,
    session::SessionService, settings::SettingsService, sync::SyncService,
};
use crate::app::AppContext;

pub struct ReaderApi {
    pub ctx: Arc<AppContext>,
}

#[OpenApi]
impl ReaderApi {
    #[oai(path = "/status", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn status(&self) -> PlainText<String> {
        tracing::debug!("handling /status");
        HealthService::new(&self.ctx).status_text().await
    }

    // ===== Auth and sync =====

    /// Hand over a Google OAuth access token and reconcile progress with Drive
    #[oai(path = "/v1/auth/token", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn sign_in(&self, body: Json<AccessTokenRequestDto>) -> SyncResponseDto {
        SyncService::new(&self.ctx).sign_in(&body.0.access_token).await
    }

    /// Reconcile local and remote progress again
    #[oai(path = "/v1/sync", method = "post")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn sync(&self) -> SyncResponseDto {
        SyncService::new(&self.ctx).sync().await
    }

    // ===== Library and progress =====

    /// EPUBs stored in Google Drive
    #[oai(path = "/v1/library", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn library(&self) -> LibraryResponseDto {
        LibraryService::new(&self.ctx).list_books().await
    }

    #[oai(path = "/v1/progress", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_progress(&self) -> ProgressListResponseDto {
        ProgressService::new(&self.ctx).list()
    }

    #[oai(path = "/v1/progress/:book_id", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, book_id))]
    async fn get_progress(&self, book_id: Path<String>) -> ProgressEntryResponseDto {
        ProgressService::new(&self.ctx).get(&book_id.0)
    }

    // ===== Reading session =====

    /// Open a book, flushing the previous one; returns the EPUB bytes
    #[oai(path = "/v1/session/open/:book_id", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, book_id))]
    async fn open_book(&self, book_id: Path<String>) -> OpenBookResponseDto {
        SessionService::new(&self.ctx).open(&book_id.0).await
    }

    /// Report a renderer relocation
    #[oai(path = "/v1/session/relocated", method = "put")]
    #[tracing::instrument(level = "trace", skip(self, body))]
    async fn relocated(&self, body: Json<RelocationRequestDto>) -> RelocatedResponseDto {
        SessionService::new(&self.ctx).relocated(body.0)
    }

    /// Table of contents of the open book
    #[oai(path = "/v1/session/toc", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn set_toc(&self, body: Json<TocRequestDto>) -> NoContentResponseDto {
        SessionService::new(&self.ctx).set_toc(body.0)
    }

    #[oai(path = "/v1/session", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn session(&self) -> SessionViewResponseDto {
        SessionService::new(&self.ctx).view()
    }

    /// The page is being hidden; persist the latest position now
    #[oai(path = "/v1/session/flush", method = "post")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn flush(&self) -> FlushResponseDto {
        SessionService::new(&self.ctx).flush().await
    }

    #[oai(path = "/v1/session/close", method = "post")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn close(&self) -> NoContentResponseDto {
        SessionService::new(&self.ctx).close().await
    }

    // ===== Settings =====

    #[oai(path = "/v1/settings", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_settings(&self) -> SettingsResponseDto {
        SettingsService::new(&self.ctx).get().await
    }

    #[oai(path = "/v1/settings", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn put_settings(&self, body: Json<SettingsDto>) -> SettingsResponseDto {
        SettingsService::new(&self.ctx).put(body.0).await
    }
}
