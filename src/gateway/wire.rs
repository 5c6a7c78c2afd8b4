use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notes::{Note, NoteId, TreeNode};

#[derive(Debug, Deserialize)]
pub(crate) struct TreeResponse {
    #[serde(default)]
    pub notes: Vec<TreeNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NoteResponse {
    pub note: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotesResponse {
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Body of a lazily loaded note. `contents` is `None` when the server sent
/// no string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteContents {
    pub id: NoteId,
    pub contents: Option<String>,
}

impl NoteContents {
    pub fn from_value(value: &Value) -> Self {
        Self {
            id: value.get("id").and_then(Value::as_i64).unwrap_or(0),
            contents: value
                .get("contents")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedNote {
    pub id: NoteId,
    #[serde(default)]
    pub date: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expand: Vec<NoteId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collapse: Vec<NoteId>,
}

impl ExpandRequest {
    /// Id `0` addresses every note.
    pub const ALL: NoteId = 0;

    pub fn is_empty(&self) -> bool {
        self.expand.is_empty() && self.collapse.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub title: bool,
    pub whole: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPayload {
    #[serde(default)]
    pub settings: Value,
    #[serde(default, rename = "hljsThemes")]
    pub hljs_themes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OptimizeReport {
    pub size_old: u64,
    pub size_new: u64,
}

impl OptimizeReport {
    /// Percentage saved, rounded to a whole number. `None` when the file did not
    /// shrink.
    pub fn saved_percent(&self) -> Option<u64> {
        if self.size_new >= self.size_old {
            return None;
        }
        let saved = (self.size_old - self.size_new) as f64 / self.size_old as f64 * 100.0;
        Some(saved.round() as u64)
    }
}
