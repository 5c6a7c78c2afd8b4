pub mod model;
pub mod navigation;
pub mod tree;

pub use model::{format_note_date, Note, NoteId, SaveNote, TreeNode, URL_TYPE};
pub use navigation::{find_next_id, find_prev_id, resolve, NavCommand, NavContext, NavOutcome};
pub use tree::{DateField, NoteTree, MAX_PARENT_HOPS};
