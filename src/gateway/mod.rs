#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod wire;

use thiserror::Error;

use crate::notes::{Note, NoteId, SaveNote, TreeNode};
use crate::settings::Settings;

pub use http::HttpGateway;
pub use wire::{
    ExpandRequest, NoteContents, OptimizeReport, SavedNote, SearchRequest, SettingsPayload,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("{0}")]
    Semantic(String),
    #[error("Invalid response: {0}")]
    Decode(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Remote note store. Calls block until the server answers; failures are
/// returned to the caller and never retried here.
pub trait NoteGateway {
    fn fetch_tree(&self) -> GatewayResult<Vec<TreeNode>>;

    fn fetch_note(&self, id: NoteId) -> GatewayResult<NoteContents>;

    fn create_note(&self, note: &SaveNote) -> GatewayResult<SavedNote>;

    fn patch_note(&self, id: NoteId, patch: &SaveNote) -> GatewayResult<SavedNote>;

    fn patch_contents(&self, id: NoteId, contents: &str) -> GatewayResult<SavedNote> {
        self.patch_note(id, &SaveNote::contents_only(contents))
    }

    fn delete_note(&self, id: NoteId) -> GatewayResult<()>;

    fn set_expand_state(&self, request: &ExpandRequest) -> GatewayResult<()>;

    fn search(&self, request: &SearchRequest) -> GatewayResult<Vec<Note>>;

    fn fetch_settings(&self) -> GatewayResult<SettingsPayload>;

    fn put_settings(&self, settings: &Settings) -> GatewayResult<()>;

    fn optimize_database(&self) -> GatewayResult<OptimizeReport>;

    /// Backing-store metadata from the most recent successful response.
    fn database_info(&self) -> DatabaseInfo;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
}

impl DatabaseInfo {
    pub const FILE_HEADER: &'static str = "X-Database-File";
    pub const SIZE_HEADER: &'static str = "X-Database-Size";

    pub fn from_headers(file: Option<&str>, size: Option<&str>) -> Self {
        let path = file.unwrap_or_default().to_string();
        let name = path
            .replace('\\', "/")
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let size = size
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0);
        Self { path, name, size }
    }

    pub fn size_label(&self) -> String {
        format_db_size(self.size)
    }
}

pub fn format_db_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}b")
    } else if bytes < 1_048_576 {
        format!("{:.2}Kb", bytes as f64 / 1024.0)
    } else {
        format!("{:.2}Mb", bytes as f64 / 1_048_576.0)
    }
}
