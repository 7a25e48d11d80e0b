use poem_openapi::payload::Json;

use crate::app::AppContext;
use crate::reader_api::models::{ErrorDto, SyncReportDto, SyncResponseDto};

pub struct SyncService<'a> {
    pub ctx: &'a AppContext,
}

impl<'a> SyncService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    #[tracing::instrument(level = "debug", skip(self, access_token))]
    pub async fn sign_in(&self, access_token: &str) -> SyncResponseDto {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return SyncResponseDto::BadRequest(Json(ErrorDto {
                message: "accessToken is empty".into(),
            }));
        }
        match self.ctx.sign_in(access_token).await {
            Ok(outcome) => SyncResponseDto::Ok(Json(SyncReportDto::from(&outcome))),
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), "failed to set up Drive access");
                SyncResponseDto::InternalError(Json(ErrorDto {
                    message: format!("Drive client error: {}", e),
                }))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync(&self) -> SyncResponseDto {
        let outcome = self.ctx.sync().await;
        SyncResponseDto::Ok(Json(SyncReportDto::from(&outcome)))
    }
}
