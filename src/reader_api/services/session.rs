use poem_openapi::payload::{Binary, Json};

use crate::app::AppContext;
use crate::reader_api::models::{
    ErrorDto, FlushResponseDto, FlushResultDto, NoContentResponseDto, OpenBookResponseDto,
    ProgressEntryDto, RelocatedResponseDto, RelocationRequestDto, SessionViewDto,
    SessionViewResponseDto, TocRequestDto,
};
use crate::session::{PageDisplay, Relocation, SessionError};

pub struct SessionService<'a> {
    pub ctx: &'a AppContext,
}

impl<'a> SessionService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn open(&self, book_id: &str) -> OpenBookResponseDto {
        let Some(books) = self.ctx.books() else {
            return OpenBookResponseDto::Unauthorized(Json(ErrorDto {
                message: "Sign in to Google Drive first".into(),
            }));
        };
        match self.ctx.session.open_book(book_id, books.as_ref()).await {
            Ok(opened) => {
                tracing::debug!(book_id = %opened.book_id, resume = ?opened.start_position, "sending book");
                OpenBookResponseDto::Ok(Binary(opened.bytes), opened.start_position)
            }
            Err(e @ SessionError::Superseded { .. }) => {
                OpenBookResponseDto::Conflict(Json(ErrorDto::from(e.to_string())))
            }
            Err(e @ SessionError::BookFetch(_)) => {
                OpenBookResponseDto::BadGateway(Json(ErrorDto::from(e.to_string())))
            }
        }
    }

    pub fn relocated(&self, req: RelocationRequestDto) -> RelocatedResponseDto {
        let displayed = match (req.page, req.total) {
            (Some(page), Some(total)) => Some(PageDisplay { page, total }),
            _ => None,
        };
        let relocation = Relocation {
            position: req.position,
            displayed,
            percentage: req.percentage,
        };
        match self.ctx.session.relocated(&req.book_id, relocation) {
            Some(record) => {
                RelocatedResponseDto::Accepted(Json(ProgressEntryDto::new(&req.book_id, &record)))
            }
            None => RelocatedResponseDto::Conflict(Json(ErrorDto {
                message: format!("{} is not the open book", req.book_id),
            })),
        }
    }

    pub fn set_toc(&self, req: TocRequestDto) -> NoContentResponseDto {
        let entries = req.entries.into_iter().map(Into::into).collect();
        if self.ctx.session.set_table_of_contents(&req.book_id, entries) {
            NoContentResponseDto::NoContent
        } else {
            NoContentResponseDto::Conflict(Json(ErrorDto {
                message: format!("{} is not the open book", req.book_id),
            }))
        }
    }

    pub fn view(&self) -> SessionViewResponseDto {
        let orchestrator = &self.ctx.orchestrator;
        SessionViewResponseDto::Ok(Json(SessionViewDto::new(
            self.ctx.session.view(),
            self.ctx.coalescer.has_pending_commit(),
            orchestrator.has_remote(),
            orchestrator.last_warning().map(|w| w.to_string()),
        )))
    }

    pub async fn flush(&self) -> FlushResponseDto {
        let was_pending = self.ctx.session.visibility_hidden().await;
        FlushResponseDto::Ok(Json(FlushResultDto { was_pending }))
    }

    pub async fn close(&self) -> NoContentResponseDto {
        self.ctx.session.close().await;
        NoContentResponseDto::NoContent
    }
}
