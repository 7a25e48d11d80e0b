use poem_openapi::payload::Json;

use crate::app::AppContext;
use crate::reader_api::models::{
    ErrorDto, ProgressEntryDto, ProgressEntryResponseDto, ProgressListResponseDto,
};

pub struct ProgressService<'a> {
    pub ctx: &'a AppContext,
}

impl<'a> ProgressService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    /// Live in-memory positions, which include updates still waiting to be committed
    pub fn list(&self) -> ProgressListResponseDto {
        let snapshot = self.ctx.orchestrator.progress().snapshot();
        let entries = snapshot
            .iter()
            .map(|(book_id, record)| ProgressEntryDto::new(book_id, record))
            .collect();
        ProgressListResponseDto::Ok(Json(entries))
    }

    pub fn get(&self, book_id: &str) -> ProgressEntryResponseDto {
        match self.ctx.orchestrator.progress().position_of(book_id) {
            Some(record) => {
                ProgressEntryResponseDto::Ok(Json(ProgressEntryDto::new(book_id, &record)))
            }
            None => ProgressEntryResponseDto::NotFound(Json(ErrorDto {
                message: format!("No saved position for {}", book_id),
            })),
        }
    }
}
