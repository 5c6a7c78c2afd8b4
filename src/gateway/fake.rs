use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use super::{
    DatabaseInfo, ExpandRequest, GatewayError, GatewayResult, NoteContents, NoteGateway,
    OptimizeReport, SavedNote, SearchRequest, SettingsPayload,
};
use crate::notes::{Note, NoteId, SaveNote, TreeNode};
use crate::settings::Settings;

const FAKE_DATE: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    FetchTree,
    FetchNote(NoteId),
    CreateNote(SaveNote),
    PatchNote(NoteId, SaveNote),
    DeleteNote(NoteId),
    SetExpand(ExpandRequest),
    Search(SearchRequest),
    FetchSettings,
    PutSettings,
    Optimize,
}

#[derive(Debug, Default)]
struct FakeState {
    notes: Vec<Note>,
    next_id: NoteId,
    calls: Vec<Call>,
    search_results: Option<Vec<NoteId>>,
    settings: Value,
    hljs_themes: Vec<String>,
    failure: Option<GatewayError>,
    clock: i64,
}

/// In-memory note store. Keeps notes as a flat table and recomputes nested-set
/// bounds after every structural change.
#[derive(Debug, Default)]
pub(crate) struct FakeGateway {
    state: RefCell<FakeState>,
}

pub(crate) fn fake_note(id: NoteId, parent_id: NoteId, title: &str) -> Note {
    Note {
        id,
        parent_id,
        title: title.to_string(),
        contents: format!("contents of {title}"),
        date_created: FAKE_DATE + id,
        date_modified: FAKE_DATE + id,
        ..Note::default()
    }
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        let gateway = Self::default();
        gateway.state.borrow_mut().clock = FAKE_DATE + 1000;
        gateway
    }

    pub(crate) fn with_notes(notes: Vec<Note>) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.state.borrow_mut();
            state.next_id = notes.iter().map(|note| note.id).max().unwrap_or(0) + 1;
            state.notes = notes;
            state.renumber();
        }
        gateway
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|call| predicate(call)).count()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub(crate) fn fail_with(&self, failure: Option<GatewayError>) {
        self.state.borrow_mut().failure = failure;
    }

    pub(crate) fn set_search_results(&self, ids: Vec<NoteId>) {
        self.state.borrow_mut().search_results = Some(ids);
    }

    pub(crate) fn set_settings(&self, settings: Value, themes: Vec<String>) {
        let mut state = self.state.borrow_mut();
        state.settings = settings;
        state.hljs_themes = themes;
    }

    pub(crate) fn set_contents(&self, id: NoteId, contents: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(note) = state.notes.iter_mut().find(|note| note.id == id) {
            note.contents = contents.to_string();
        }
    }

    pub(crate) fn stored(&self, id: NoteId) -> Option<Note> {
        self.state.borrow().notes.iter().find(|note| note.id == id).cloned()
    }

    fn record(&self, call: Call) -> GatewayResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

impl FakeState {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn renumber(&mut self) {
        let roots: Vec<NoteId> = self
            .notes
            .iter()
            .filter(|note| note.parent_id == 0 || !self.notes.iter().any(|p| p.id == note.parent_id))
            .map(|note| note.id)
            .collect();
        let mut counter = 0;
        for root in roots {
            self.number(root, 0, &mut counter);
        }
    }

    fn number(&mut self, id: NoteId, depth: i64, counter: &mut i64) {
        *counter += 1;
        let left = *counter;
        let children: Vec<NoteId> = self
            .notes
            .iter()
            .filter(|note| note.parent_id == id && note.id != id)
            .map(|note| note.id)
            .collect();
        for child in children {
            self.number(child, depth + 1, counter);
        }
        *counter += 1;
        let right = *counter;
        if let Some(note) = self.notes.iter_mut().find(|note| note.id == id) {
            note.left = left;
            note.right = right;
            note.depth = depth;
        }
    }

    fn subtree(&self, id: NoteId) -> TreeNode {
        let mut note = self
            .notes
            .iter()
            .find(|note| note.id == id)
            .cloned()
            .unwrap_or_default();
        note.contents_length = note.contents.chars().count();
        note.contents.clear();
        let children = self
            .notes
            .iter()
            .filter(|child| child.parent_id == id && child.id != id)
            .map(|child| self.subtree(child.id))
            .collect();
        TreeNode { note, children }
    }

    fn descendants(&self, id: NoteId) -> Vec<NoteId> {
        let Some(parent) = self.notes.iter().find(|note| note.id == id) else {
            return Vec::new();
        };
        self.notes
            .iter()
            .filter(|note| note.is_descendant_of(parent))
            .map(|note| note.id)
            .collect()
    }
}

fn apply_patch(note: &mut Note, patch: &SaveNote) {
    if let Some(parent_id) = patch.parent_id {
        note.parent_id = parent_id;
    }
    if let Some(expanded) = patch.expanded {
        note.expanded = expanded;
    }
    if let Some(readonly) = patch.readonly {
        note.readonly = readonly;
    }
    if let Some(icon) = patch.icon {
        note.icon = icon;
    }
    if let Some(kind) = &patch.kind {
        note.kind = kind.clone();
    }
    if let Some(title) = &patch.title {
        note.title = title.clone();
    }
    if let Some(contents) = &patch.contents {
        note.contents = contents.clone();
    }
    if patch.url.is_some() {
        note.url = patch.url.clone();
    }
    if patch.syntax.is_some() {
        note.syntax = patch.syntax.clone();
    }
    if let Some(favorite) = patch.favorite {
        note.favorite = favorite;
    }
}

impl NoteGateway for FakeGateway {
    fn fetch_tree(&self) -> GatewayResult<Vec<TreeNode>> {
        self.record(Call::FetchTree)?;
        let state = self.state.borrow();
        Ok(state
            .notes
            .iter()
            .filter(|note| note.parent_id == 0)
            .map(|root| state.subtree(root.id))
            .collect())
    }

    fn fetch_note(&self, id: NoteId) -> GatewayResult<NoteContents> {
        self.record(Call::FetchNote(id))?;
        let state = self.state.borrow();
        state
            .notes
            .iter()
            .find(|note| note.id == id)
            .map(|note| NoteContents {
                id,
                contents: Some(note.contents.clone()),
            })
            .ok_or_else(|| GatewayError::Http {
                status: 404,
                message: "Note not found".into(),
            })
    }

    fn create_note(&self, request: &SaveNote) -> GatewayResult<SavedNote> {
        self.record(Call::CreateNote(request.clone()))?;
        let mut state = self.state.borrow_mut();
        let id = state.next_id.max(1);
        state.next_id = id + 1;
        let date = state.tick();
        let mut note = Note {
            id,
            date_created: date,
            date_modified: date,
            ..Note::default()
        };
        apply_patch(&mut note, request);
        state.notes.push(note);
        state.renumber();
        Ok(SavedNote { id, date })
    }

    fn patch_note(&self, id: NoteId, patch: &SaveNote) -> GatewayResult<SavedNote> {
        self.record(Call::PatchNote(id, patch.clone()))?;
        let mut state = self.state.borrow_mut();
        let date = state.tick();
        let note = state
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| GatewayError::Http {
                status: 404,
                message: "Note not found".into(),
            })?;
        apply_patch(note, patch);
        note.date_modified = date;
        state.renumber();
        Ok(SavedNote { id, date })
    }

    fn delete_note(&self, id: NoteId) -> GatewayResult<()> {
        self.record(Call::DeleteNote(id))?;
        let mut state = self.state.borrow_mut();
        let mut removed = state.descendants(id);
        removed.push(id);
        state.notes.retain(|note| !removed.contains(&note.id));
        state.renumber();
        Ok(())
    }

    fn set_expand_state(&self, request: &ExpandRequest) -> GatewayResult<()> {
        self.record(Call::SetExpand(request.clone()))?;
        let mut state = self.state.borrow_mut();
        for note in state.notes.iter_mut() {
            let all_expand = request.expand.contains(&ExpandRequest::ALL);
            let all_collapse = request.collapse.contains(&ExpandRequest::ALL);
            if all_expand || request.expand.contains(&note.id) {
                note.expanded = true;
            }
            if all_collapse || request.collapse.contains(&note.id) {
                note.expanded = false;
            }
        }
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> GatewayResult<Vec<Note>> {
        self.record(Call::Search(request.clone()))?;
        let state = self.state.borrow();
        let matches = |note: &&Note| match &state.search_results {
            Some(ids) => ids.contains(&note.id),
            None => {
                let query = request.query.to_lowercase();
                note.title.to_lowercase().contains(&query)
                    || (!request.title && note.contents.to_lowercase().contains(&query))
            }
        };
        let mut found: Vec<Note> = state.notes.iter().filter(matches).cloned().collect();
        if let Some(ids) = &state.search_results {
            found.sort_by_key(|note| ids.iter().position(|id| *id == note.id));
        }
        Ok(found)
    }

    fn fetch_settings(&self) -> GatewayResult<SettingsPayload> {
        self.record(Call::FetchSettings)?;
        let state = self.state.borrow();
        Ok(SettingsPayload {
            settings: state.settings.clone(),
            hljs_themes: state.hljs_themes.clone(),
        })
    }

    fn put_settings(&self, settings: &Settings) -> GatewayResult<()> {
        self.record(Call::PutSettings)?;
        self.state.borrow_mut().settings =
            serde_json::to_value(settings).map_err(|err| GatewayError::Decode(err.to_string()))?;
        Ok(())
    }

    fn optimize_database(&self) -> GatewayResult<OptimizeReport> {
        self.record(Call::Optimize)?;
        Ok(OptimizeReport {
            size_old: 8192,
            size_new: 6144,
        })
    }

    fn database_info(&self) -> DatabaseInfo {
        DatabaseInfo::from_headers(Some("/tmp/notes.db"), Some("8192"))
    }
}

/// Lets a test keep a handle on the fake after boxing it into the app.
impl NoteGateway for Rc<FakeGateway> {
    fn fetch_tree(&self) -> GatewayResult<Vec<TreeNode>> {
        (**self).fetch_tree()
    }

    fn fetch_note(&self, id: NoteId) -> GatewayResult<NoteContents> {
        (**self).fetch_note(id)
    }

    fn create_note(&self, note: &SaveNote) -> GatewayResult<SavedNote> {
        (**self).create_note(note)
    }

    fn patch_note(&self, id: NoteId, patch: &SaveNote) -> GatewayResult<SavedNote> {
        (**self).patch_note(id, patch)
    }

    fn delete_note(&self, id: NoteId) -> GatewayResult<()> {
        (**self).delete_note(id)
    }

    fn set_expand_state(&self, request: &ExpandRequest) -> GatewayResult<()> {
        (**self).set_expand_state(request)
    }

    fn search(&self, request: &SearchRequest) -> GatewayResult<Vec<Note>> {
        (**self).search(request)
    }

    fn fetch_settings(&self) -> GatewayResult<SettingsPayload> {
        (**self).fetch_settings()
    }

    fn put_settings(&self, settings: &Settings) -> GatewayResult<()> {
        (**self).put_settings(settings)
    }

    fn optimize_database(&self) -> GatewayResult<OptimizeReport> {
        (**self).optimize_database()
    }

    fn database_info(&self) -> DatabaseInfo {
        (**self).database_info()
    }
}

#[test]
fn fake_store_maintains_nested_sets() {
    let gateway = FakeGateway::with_notes(vec![
        fake_note(1, 0, "root"),
        fake_note(2, 1, "child"),
        fake_note(3, 2, "grandchild"),
        fake_note(4, 0, "other"),
    ]);
    let forest = gateway.fetch_tree().expect("tree");
    assert_eq!(forest.len(), 2);
    assert_eq!((forest[0].note.left, forest[0].note.right), (1, 6));
    assert_eq!(forest[0].children[0].children[0].note.depth, 2);
    assert!(forest[0].note.contents.is_empty());
    assert_eq!(forest[1].note.left, 7);

    gateway.delete_note(2).expect("delete");
    assert!(gateway.stored(3).is_none());
    assert_eq!(gateway.stored(1).map(|n| n.right), Some(2));
}
