use serde::{Deserialize, Serialize};
use serde_with::{formats::Flexible, serde_as, BoolFromInt, DefaultOnNull, PickFirst};
use time::OffsetDateTime;

/// Server-assigned note identifier. `0` means "no note".
pub type NoteId = i64;

/// Note type for external links; such notes have no loadable contents.
pub const URL_TYPE: &str = "URL";

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Note {
    pub id: NoteId,
    pub parent_id: NoteId,
    pub depth: i64,
    pub left: i64,
    pub right: i64,
    #[serde_as(as = "PickFirst<(_, BoolFromInt<Flexible>)>")]
    pub expanded: bool,
    #[serde_as(as = "PickFirst<(_, BoolFromInt<Flexible>)>")]
    pub readonly: bool,
    pub icon: i64,
    #[serde(rename = "type")]
    #[serde_as(as = "DefaultOnNull")]
    pub kind: String,
    #[serde_as(as = "DefaultOnNull")]
    pub title: String,
    #[serde_as(as = "DefaultOnNull")]
    pub contents: String,
    pub url: Option<String>,
    pub syntax: Option<String>,
    #[serde_as(as = "PickFirst<(_, BoolFromInt<Flexible>)>")]
    pub favorite: bool,
    pub date_created: i64,
    pub date_modified: i64,
    pub contents_length: usize,
    /// Direct children in display order, filled in by [`crate::notes::NoteTree`].
    #[serde(skip)]
    pub children: Vec<NoteId>,
    #[serde(skip)]
    pub selected: bool,
}

impl Note {
    /// Empty note shown when nothing is selected.
    pub fn placeholder() -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            date_created: now,
            date_modified: now,
            ..Self::default()
        }
    }

    pub fn is_link(&self) -> bool {
        self.kind == URL_TYPE
    }

    pub fn is_editable(&self) -> bool {
        self.id > 0 && !self.readonly && !self.is_link()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Nested-set containment: true when `self` lies strictly inside `other`.
    pub fn is_descendant_of(&self, other: &Note) -> bool {
        self.left > other.left && self.right < other.right
    }
}

/// Wire shape of the tree endpoint: a note with its nested children.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub note: Note,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(note: Note) -> Self {
        Self {
            note,
            children: Vec::new(),
        }
    }
}

/// Partial note payload for create and patch requests. Absent fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveNote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

impl SaveNote {
    pub fn contents_only(contents: impl Into<String>) -> Self {
        Self {
            contents: Some(contents.into()),
            ..Self::default()
        }
    }

    pub fn favorite_only(favorite: bool) -> Self {
        Self {
            favorite: Some(favorite),
            ..Self::default()
        }
    }

    pub fn is_edit(&self) -> bool {
        self.id.unwrap_or(0) > 0
    }
}

impl From<&Note> for SaveNote {
    fn from(note: &Note) -> Self {
        Self {
            id: (note.id > 0).then_some(note.id),
            parent_id: Some(note.parent_id),
            expanded: Some(note.expanded),
            readonly: Some(note.readonly),
            icon: Some(note.icon),
            kind: Some(note.kind.clone()),
            title: Some(note.title.clone()),
            contents: None,
            url: note.url.clone(),
            syntax: note.syntax.clone(),
            favorite: None,
            options: None,
        }
    }
}

/// Formats a note timestamp as `YYYY-MM-DD`; zero renders as an empty string.
pub fn format_note_date(timestamp: i64) -> String {
    if timestamp == 0 {
        return String::new();
    }
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map(|dt| dt.date().to_string())
        .unwrap_or_default()
}
