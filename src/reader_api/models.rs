use poem_openapi::{ApiResponse, Enum, Object, payload::Binary, payload::Json};

use crate::domain::models::{FlowMode, FontFamily, LibraryBook, PositionRecord, Settings, Theme};
use crate::session::{SessionState, SessionView, TocEntry};
use crate::sync::{SyncOutcome, SyncWarning};

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

impl From<String> for ErrorDto {
    fn from(message: String) -> Self {
        ErrorDto { message }
    }
}

// ===== Auth and sync =====

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct AccessTokenRequestDto {
    pub access_token: String,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct SyncReportDto {
    /// Number of books with a saved position after the sync
    pub entries: u64,
    pub remote_used: bool,
    pub uploaded: bool,
    /// Informational; the session keeps working on local data
    pub warning: Option<String>,
}

impl From<&SyncOutcome> for SyncReportDto {
    fn from(outcome: &SyncOutcome) -> Self {
        SyncReportDto {
            entries: outcome.progress.len() as u64,
            remote_used: outcome.remote_used,
            uploaded: outcome.uploaded,
            warning: outcome.warning.as_ref().map(SyncWarning::to_string),
        }
    }
}

#[derive(ApiResponse)]
pub enum SyncResponseDto {
    /// Reconciliation ran
    #[oai(status = 200)]
    Ok(Json<SyncReportDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

// ===== Library =====

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct LibraryBookDto {
    pub id: String,
    pub name: String,
    /// Folder path, empty for the Drive root
    pub path: String,
    pub modified_time: Option<String>,
    pub size: Option<u64>,
    pub icon_link: Option<String>,
}

impl From<LibraryBook> for LibraryBookDto {
    fn from(book: LibraryBook) -> Self {
        LibraryBookDto {
            id: book.id,
            name: book.name,
            path: book.path,
            modified_time: book.modified_time,
            size: book.size,
            icon_link: book.icon_link,
        }
    }
}

#[derive(ApiResponse)]
pub enum LibraryResponseDto {
    /// EPUBs found in Drive
    #[oai(status = 200)]
    Ok(Json<Vec<LibraryBookDto>>),

    /// No Drive access token yet
    #[oai(status = 401)]
    Unauthorized(Json<ErrorDto>),

    /// Upstream Drive error
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

// ===== Progress =====

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ProgressEntryDto {
    pub book_id: String,
    pub position: String,
    /// Milliseconds since the Unix epoch
    pub updated_at: i64,
}

impl ProgressEntryDto {
    pub fn new(book_id: &str, record: &PositionRecord) -> Self {
        ProgressEntryDto {
            book_id: book_id.to_string(),
            position: record.position.clone(),
            updated_at: record.updated_at,
        }
    }
}

#[derive(ApiResponse)]
pub enum ProgressListResponseDto {
    #[oai(status = 200)]
    Ok(Json<Vec<ProgressEntryDto>>),
}

#[derive(ApiResponse)]
pub enum ProgressEntryResponseDto {
    #[oai(status = 200)]
    Ok(Json<ProgressEntryDto>),

    /// No saved position for this book
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
}

// ===== Session =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[oai(rename_all = "lowercase")]
pub enum SessionStateDto {
    Idle,
    Loading,
    Ready,
}

impl From<SessionState> for SessionStateDto {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Idle => SessionStateDto::Idle,
            SessionState::Loading => SessionStateDto::Loading,
            SessionState::Ready => SessionStateDto::Ready,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct TocEntryDto {
    pub label: String,
    pub href: String,
    /// Nesting level, 0 for top-level chapters
    #[oai(default)]
    pub depth: u32,
}

impl From<TocEntryDto> for TocEntry {
    fn from(dto: TocEntryDto) -> Self {
        TocEntry {
            label: dto.label,
            href: dto.href,
            depth: dto.depth,
        }
    }
}

impl From<TocEntry> for TocEntryDto {
    fn from(entry: TocEntry) -> Self {
        TocEntryDto {
            label: entry.label,
            href: entry.href,
            depth: entry.depth,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct RelocationRequestDto {
    pub book_id: String,
    /// Opaque position token (EPUB CFI)
    pub position: String,
    pub page: Option<u32>,
    pub total: Option<u32>,
    /// Fraction of the book read, 0.0 to 1.0
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct TocRequestDto {
    pub book_id: String,
    pub entries: Vec<TocEntryDto>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct SessionViewDto {
    pub state: SessionStateDto,
    pub book_id: Option<String>,
    pub position: Option<String>,
    pub page: Option<u32>,
    pub total: Option<u32>,
    pub percentage: Option<f64>,
    pub toc: Vec<TocEntryDto>,
    /// A debounced commit is waiting to be written
    pub pending_commit: bool,
    pub remote_connected: bool,
    pub warning: Option<String>,
}

impl SessionViewDto {
    pub fn new(
        view: SessionView,
        pending_commit: bool,
        remote_connected: bool,
        warning: Option<String>,
    ) -> Self {
        SessionViewDto {
            state: view.state.into(),
            book_id: view.book_id,
            position: view.position,
            page: view.displayed.map(|d| d.page),
            total: view.displayed.map(|d| d.total),
            percentage: view.percentage,
            toc: view.toc.into_iter().map(Into::into).collect(),
            pending_commit,
            remote_connected,
            warning,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct FlushResultDto {
    /// Whether a debounced commit was waiting and got written early
    pub was_pending: bool,
}

#[derive(ApiResponse)]
pub enum OpenBookResponseDto {
    /// EPUB bytes; the resume point, if any, is in the header
    #[oai(status = 200, content_type = "application/epub+zip")]
    Ok(
        Binary<Vec<u8>>,
        #[oai(header = "X-Start-Position")] Option<String>,
    ),

    /// No Drive access token yet
    #[oai(status = 401)]
    Unauthorized(Json<ErrorDto>),

    /// Another book was opened while this one was loading
    #[oai(status = 409)]
    Conflict(Json<ErrorDto>),

    /// Download from Drive failed
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum RelocatedResponseDto {
    /// Accepted for debounced persistence
    #[oai(status = 202)]
    Accepted(Json<ProgressEntryDto>),

    /// Event does not belong to the open book
    #[oai(status = 409)]
    Conflict(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum SessionViewResponseDto {
    #[oai(status = 200)]
    Ok(Json<SessionViewDto>),
}

#[derive(ApiResponse)]
pub enum FlushResponseDto {
    #[oai(status = 200)]
    Ok(Json<FlushResultDto>),
}

#[derive(ApiResponse)]
pub enum NoContentResponseDto {
    /// Empty 204 response
    #[oai(status = 204)]
    NoContent,

    #[oai(status = 409)]
    Conflict(Json<ErrorDto>),
}

// ===== Settings =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[oai(rename_all = "lowercase")]
pub enum ThemeDto {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[oai(rename_all = "lowercase")]
pub enum FontFamilyDto {
    Os,
    Serif,
    Sans,
    Opendyslexic,
    Atkinson,
    Roboto,
    Robotomono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[oai(rename_all = "lowercase")]
pub enum FlowModeDto {
    Paginated,
    Scrolled,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct SettingsDto {
    pub theme: ThemeDto,
    pub font_scale: f64,
    pub line_height: f64,
    pub font_family: FontFamilyDto,
    pub flow: FlowModeDto,
}

impl From<Settings> for SettingsDto {
    fn from(s: Settings) -> Self {
        SettingsDto {
            theme: match s.theme {
                Theme::Light => ThemeDto::Light,
                Theme::Dark => ThemeDto::Dark,
            },
            font_scale: s.font_scale,
            line_height: s.line_height,
            font_family: match s.font_family {
                FontFamily::Os => FontFamilyDto::Os,
                FontFamily::Serif => FontFamilyDto::Serif,
                FontFamily::Sans => FontFamilyDto::Sans,
                FontFamily::Opendyslexic => FontFamilyDto::Opendyslexic,
                FontFamily::Atkinson => FontFamilyDto::Atkinson,
                FontFamily::Roboto => FontFamilyDto::Roboto,
                FontFamily::Robotomono => FontFamilyDto::Robotomono,
            },
            flow: match s.flow {
                FlowMode::Paginated => FlowModeDto::Paginated,
                FlowMode::Scrolled => FlowModeDto::Scrolled,
            },
        }
    }
}

impl From<SettingsDto> for Settings {
    fn from(dto: SettingsDto) -> Self {
        Settings {
            theme: match dto.theme {
                ThemeDto::Light => Theme::Light,
                ThemeDto::Dark => Theme::Dark,
            },
            font_scale: dto.font_scale,
            line_height: dto.line_height,
            font_family: match dto.font_family {
                FontFamilyDto::Os => FontFamily::Os,
                FontFamilyDto::Serif => FontFamily::Serif,
                FontFamilyDto::Sans => FontFamily::Sans,
                FontFamilyDto::Opendyslexic => FontFamily::Opendyslexic,
                FontFamilyDto::Atkinson => FontFamily::Atkinson,
                FontFamilyDto::Roboto => FontFamily::Roboto,
                FontFamilyDto::Robotomono => FontFamily::Robotomono,
            },
            flow: match dto.flow {
                FlowModeDto::Paginated => FlowMode::Paginated,
                FlowModeDto::Scrolled => FlowMode::Scrolled,
            },
        }
    }
}

#[derive(ApiResponse)]
pub enum SettingsResponseDto {
    #[oai(status = 200)]
    Ok(Json<SettingsDto>),

    /// Value out of range
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}
