use poem_openapi::payload::Json;

use crate::app::AppContext;
use crate::reader_api::models::{ErrorDto, LibraryBookDto, LibraryResponseDto};

pub struct LibraryService<'a> {
    pub ctx: &'a AppContext,
}

impl<'a> LibraryService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_books(&self) -> LibraryResponseDto {
        match self.ctx.library().await {
            Ok(Some(books)) => {
                let dtos = books.into_iter().map(LibraryBookDto::from).collect();
                LibraryResponseDto::Ok(Json(dtos))
            }
            Ok(None) => LibraryResponseDto::Unauthorized(Json(ErrorDto {
                message: "Sign in to Google Drive first".into(),
            })),
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), "failed to list library");
                LibraryResponseDto::BadGateway(Json(ErrorDto {
                    message: format!("Drive error: {:#}", e),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::storage::MemoryKvStore;

    #[tokio::test]
    async fn library_requires_drive_access() {
        let ctx = AppContext::new(Config::default(), Arc::new(MemoryKvStore::new()));
        let resp = LibraryService::new(&ctx).list_books().await;
        assert!(matches!(resp, LibraryResponseDto::Unauthorized(_)));
    }
}
