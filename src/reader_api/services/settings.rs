use poem_openapi::payload::Json;

use crate::app::AppContext;
use crate::domain::models::Settings;
use crate::reader_api::models::{ErrorDto, SettingsDto, SettingsResponseDto};

pub struct SettingsService<'a> {
    pub ctx: &'a AppContext,
}

impl<'a> SettingsService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    pub async fn get(&self) -> SettingsResponseDto {
        let settings = self.ctx.settings.load().await;
        SettingsResponseDto::Ok(Json(settings.into()))
    }

    #[tracing::instrument(level = "debug", skip(self, dto))]
    pub async fn put(&self, dto: SettingsDto) -> SettingsResponseDto {
        let settings = Settings::from(dto);
        if let Err(message) = settings.validate() {
            return SettingsResponseDto::BadRequest(Json(ErrorDto { message }));
        }
        if !self.ctx.settings.save(&settings).await {
            tracing::warn!("settings applied for this session only");
        }
        SettingsResponseDto::Ok(Json(settings.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::reader_api::models::{FlowModeDto, FontFamilyDto, ThemeDto};
    use crate::storage::MemoryKvStore;

    fn dto(font_scale: f64) -> SettingsDto {
        SettingsDto {
            theme: ThemeDto::Dark,
            font_scale,
            line_height: 1.6,
            font_family: FontFamilyDto::Atkinson,
            flow: FlowModeDto::Scrolled,
        }
    }

    #[tokio::test]
    async fn put_persists_and_get_returns_it() {
        let ctx = AppContext::new(Config::default(), Arc::new(MemoryKvStore::new()));
        let service = SettingsService::new(&ctx);

        assert!(matches!(service.put(dto(1.25)).await, SettingsResponseDto::Ok(_)));

        let SettingsResponseDto::Ok(Json(stored)) = service.get().await else {
            panic!("get never fails");
        };
        assert_eq!(stored.theme, ThemeDto::Dark);
        assert_eq!(stored.font_scale, 1.25);
        assert_eq!(stored.font_family, FontFamilyDto::Atkinson);
        assert_eq!(stored.flow, FlowModeDto::Scrolled);
    }

    #[tokio::test]
    async fn out_of_range_values_are_rejected() {
        let ctx = AppContext::new(Config::default(), Arc::new(MemoryKvStore::new()));
        let service = SettingsService::new(&ctx);

        assert!(matches!(
            service.put(dto(9.0)).await,
            SettingsResponseDto::BadRequest(_)
        ));
        let SettingsResponseDto::Ok(Json(stored)) = service.get().await else {
            panic!("get never fails");
        };
        assert_eq!(stored.font_scale, 1.0);
    }
}
