use std::borrow::Cow;
use std::time::{Duration, Instant};

use crate::gateway::ExpandRequest;
use crate::journaling::{format_timestamp, now_millis};
use crate::notes::{
    resolve, DateField, NavCommand, NavContext, NavOutcome, Note, NoteId, NoteTree, SaveNote,
    TreeNode, URL_TYPE,
};
use crate::scheduler::{DebounceTable, Slot};

use super::Services;

/// Delay for content loads triggered by rapid tree navigation.
pub const NAVIGATION_LOAD_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub debounce: bool,
    pub expand: bool,
}

impl SelectOptions {
    pub fn debounced() -> Self {
        Self {
            debounce: true,
            expand: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Unchanged,
    Cleared,
    NotFound,
    Selected(NoteId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Skipped,
    Cancelled,
    Failed,
    Deleted { reselected: Option<NoteId> },
}

/// Owns the tree of notes and the current-note slot.
///
/// `current` is a detached copy of the selected map entry; edits to it reach
/// the tree only through [`NotesState::update_contents`].
#[derive(Debug)]
pub struct NotesState {
    tree: NoteTree,
    current: Note,
    loaded: bool,
    load_error: bool,
    loads: DebounceTable<Slot, NoteId>,
}

impl Default for NotesState {
    fn default() -> Self {
        Self {
            tree: NoteTree::new(),
            current: Note::placeholder(),
            loaded: false,
            load_error: false,
            loads: DebounceTable::new(),
        }
    }
}

impl NotesState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &NoteTree {
        &self.tree
    }

    pub fn current(&self) -> &Note {
        &self.current
    }

    pub fn is_note_opened(&self) -> bool {
        self.current.id > 0
    }

    pub fn is_editable(&self) -> bool {
        self.current.is_editable()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn load_error(&self) -> bool {
        self.load_error
    }

    pub fn has_pending_load(&self) -> bool {
        self.loads.is_pending(&Slot::Navigation)
    }

    pub fn select(
        &mut self,
        id: NoteId,
        opts: SelectOptions,
        svc: &mut Services,
        now: Instant,
    ) -> SelectOutcome {
        if id == self.current.id {
            return SelectOutcome::Unchanged;
        }

        self.tree.clear_selection();

        if id == 0 {
            self.current = Note::placeholder();
            self.loads.cancel(&Slot::Navigation);
            svc.settings.set_edit_mode(false);
            return SelectOutcome::Cleared;
        }

        let Some(note) = self.tree.get_mut(id) else {
            svc.log.error(format!("Note {id} is not found!"));
            return SelectOutcome::NotFound;
        };
        note.selected = true;
        self.current = note.clone();

        self.tree.expand_parents(id);

        if opts.expand {
            self.toggle_expand(id, Some(true), svc);
        }

        if self.current.kind != URL_TYPE {
            let delay = if opts.debounce {
                NAVIGATION_LOAD_DELAY
            } else {
                Duration::ZERO
            };
            self.loads.schedule(Slot::Navigation, id, delay, now);
        }

        if svc.settings.is_auto_view() || !self.current.is_editable() {
            svc.settings.set_edit_mode(false);
        }
        tracing::debug!(note_id = id, "note selected");
        SelectOutcome::Selected(id)
    }

    pub fn reset_current(&mut self, svc: &mut Services, now: Instant) {
        self.select(0, SelectOptions::default(), svc, now);
    }

    /// Fires the pending content load once its debounce has elapsed.
    pub fn poll(&mut self, svc: &mut Services, now: Instant) -> bool {
        let due = self.loads.take_due(now);
        let fired = !due.is_empty();
        for (_, id) in due {
            self.load_contents(id, svc);
        }
        fired
    }

    fn load_contents(&mut self, id: NoteId, svc: &mut Services) {
        let response = match svc.gateway.fetch_note(id) {
            Ok(response) => response,
            Err(err) => {
                svc.log.error(format!("Error loading contents: {err}"));
                return;
            }
        };
        let contents = match response.contents {
            Some(contents) => contents,
            None => {
                svc.log
                    .error(format!("Invalid data structure: contents of note {id} is not a string"));
                String::new()
            }
        };
        if self.current.id != id {
            tracing::debug!(note_id = id, current = self.current.id, "dropping stale contents");
            return;
        }
        self.current.contents = contents;
    }

    /// Replaces the current note's contents and refreshes its character count.
    pub fn update_contents(&mut self, contents: &str) -> bool {
        let Some(note) = self.tree.get_mut(self.current.id) else {
            return false;
        };
        let length = contents.chars().count();
        note.contents_length = length;
        self.current.contents = contents.to_string();
        self.current.contents_length = length;
        true
    }

    /// Sets or toggles expansion and persists the change. Expanding also
    /// expands every ancestor; collapsing also collapses every descendant.
    pub fn toggle_expand(&mut self, id: NoteId, expanded: Option<bool>, svc: &mut Services) {
        let Some(note) = self.tree.get(id) else {
            return;
        };
        let expanded = expanded.unwrap_or(!note.expanded);
        self.tree.set_expanded(id, expanded);
        if self.current.id == id {
            self.current.expanded = expanded;
        }

        let mut request = ExpandRequest::default();
        if expanded {
            request.expand = self.tree.parent_ids(id);
            self.tree.expand_parents(id);
            request.expand.push(id);
        } else {
            request.collapse = self.tree.children_ids(id, true);
            self.tree.collapse_descendants(id);
            request.collapse.push(id);
        }

        if let Err(err) = svc.gateway.set_expand_state(&request) {
            svc.log.error(format!("Error saving expand state: {err}"));
        }
    }

    pub fn load_notes(&mut self, svc: &mut Services) -> bool {
        let selected = self.tree.selected_id();
        let mut forest = match svc.gateway.fetch_tree() {
            Ok(forest) => forest,
            Err(err) => {
                self.load_error = true;
                svc.log.error(format!("Error loading notes tree: {err}"));
                return false;
            }
        };
        if let Some(selected) = selected {
            mark_selected_in_forest(&mut forest, selected);
        }
        self.tree.replace(forest);
        self.loaded = true;
        self.load_error = false;
        tracing::info!(notes = self.tree.len(), "notes tree loaded");
        true
    }

    /// Creates (`id` absent or 0) or patches a note, then reloads the tree and
    /// selects the saved note.
    pub fn save_note(&mut self, note: SaveNote, svc: &mut Services, now: Instant) -> Option<NoteId> {
        let edit = note.is_edit();
        let result = match note.id.filter(|_| edit) {
            Some(id) => svc.gateway.patch_note(id, &note),
            None => svc.gateway.create_note(&note),
        };
        let saved = match result {
            Ok(saved) => saved,
            Err(err) => {
                svc.log.error(format!("Error save note: {err}"));
                return None;
            }
        };
        let id = if edit { note.id.unwrap_or(saved.id) } else { saved.id };
        svc.log.info(format!(
            "Note saved: [{id}] {}",
            note.title.as_deref().unwrap_or_default()
        ));

        if edit && self.current.id == id {
            self.current.date_modified = saved.date;
        }

        self.load_notes(svc);

        if edit {
            if let Some(stored) = self.tree.get_mut(id) {
                stored.date_modified = saved.date;
            }
            self.reset_current(svc, now);
        }
        let opts = SelectOptions {
            expand: !edit,
            ..SelectOptions::default()
        };
        self.select(id, opts, svc, now);

        if !edit && note.kind.as_deref() != Some(URL_TYPE) {
            svc.settings.set_edit_mode(true);
        }
        Some(id)
    }

    /// Applies a successful auto-save to the current note.
    pub fn on_contents_saved(&mut self, id: NoteId, date: i64, svc: &mut Services) {
        if self.current.id == id {
            self.current.date_modified = date;
        }
        if let Some(note) = self.tree.get_mut(id) {
            note.date_modified = date;
        }
        svc.log.info(format!(
            "Note #{id} contents saved at {}",
            format_timestamp(now_millis())
        ));
    }

    /// Deletes a note after `confirm` accepts it, then reloads and moves the
    /// selection to the former parent.
    pub fn delete_note(
        &mut self,
        id: NoteId,
        confirm: impl FnOnce(NoteId, &str) -> bool,
        svc: &mut Services,
        now: Instant,
    ) -> DeleteOutcome {
        if id <= 0 {
            return DeleteOutcome::Skipped;
        }
        let (title, parent_id) = match self.tree.get(id) {
            Some(note) => (note.title.clone(), note.parent_id),
            None => (self.current.title.clone(), self.current.parent_id),
        };
        if !confirm(id, &title) {
            return DeleteOutcome::Cancelled;
        }
        if let Err(err) = svc.gateway.delete_note(id) {
            svc.log.error(format!("Error delete note: {err}"));
            return DeleteOutcome::Failed;
        }
        svc.log.warning(format!("Note deleted: [{id}] {title}"));

        self.load_notes(svc);

        let reselected = if parent_id > 0 {
            self.select(parent_id, SelectOptions::default(), svc, now);
            Some(parent_id)
        } else {
            if self.current.id == id {
                self.reset_current(svc, now);
            }
            None
        };
        DeleteOutcome::Deleted { reselected }
    }

    pub fn toggle_favorite(&mut self, flag: Option<bool>, svc: &mut Services) -> bool {
        let id = self.current.id;
        if id == 0 {
            return false;
        }
        let favorite = flag.unwrap_or(!self.current.favorite);
        if let Err(err) = svc.gateway.patch_note(id, &SaveNote::favorite_only(favorite)) {
            svc.log.error(format!("Error favorite note: {err}"));
            return false;
        }
        self.current.favorite = favorite;
        if let Some(note) = self.tree.get_mut(id) {
            note.favorite = favorite;
        }
        true
    }

    pub fn expand_all(&mut self, svc: &mut Services) {
        let request = ExpandRequest {
            expand: vec![ExpandRequest::ALL],
            collapse: Vec::new(),
        };
        if let Err(err) = svc.gateway.set_expand_state(&request) {
            svc.log.error(format!("Error expanding notes: {err}"));
        }
        self.load_notes(svc);
    }

    pub fn collapse_all(&mut self, svc: &mut Services, now: Instant) {
        self.activate_root_parent(svc, now);
        let request = ExpandRequest {
            expand: Vec::new(),
            collapse: vec![ExpandRequest::ALL],
        };
        if let Err(err) = svc.gateway.set_expand_state(&request) {
            svc.log.error(format!("Error collapsing notes: {err}"));
        }
        self.load_notes(svc);
    }

    /// Moves the selection to the root ancestor of the current note.
    pub fn activate_root_parent(&mut self, svc: &mut Services, now: Instant) {
        if let Some(root) = self.tree.parent_ids(self.current.id).first().copied() {
            self.select(root, SelectOptions::default(), svc, now);
        }
    }

    /// Resolves a navigation command against `visible` and applies it.
    pub fn navigate(
        &mut self,
        command: NavCommand,
        visible: &[NoteId],
        search_mode: bool,
        svc: &mut Services,
        now: Instant,
    ) -> NavOutcome {
        let outcome = resolve(
            command,
            &NavContext {
                tree: &self.tree,
                current: self.current.id,
                visible,
                search_mode,
            },
        );
        match outcome {
            NavOutcome::Select(id) => {
                self.select(id, SelectOptions::debounced(), svc, now);
            }
            NavOutcome::Expand(id) => self.toggle_expand(id, Some(true), svc),
            NavOutcome::Collapse(id) => self.toggle_expand(id, Some(false), svc),
            NavOutcome::Stay => {}
        }
        outcome
    }

    /// Ancestor titles followed by the note's own title.
    pub fn path_title(&self, id: NoteId, separator: &str) -> String {
        let mut titles: Vec<&str> = self
            .tree
            .parents(id)
            .into_iter()
            .map(|note| note.title.as_str())
            .collect();
        if let Some(note) = self.tree.get(id) {
            titles.push(note.title.as_str());
        }
        titles.join(separator)
    }

    pub fn latest(&self, field: DateField, count: usize) -> Vec<&Note> {
        self.tree.latest(field, count)
    }

    pub fn favorites(&self, count: usize) -> Vec<&Note> {
        self.tree.favorites(count)
    }
}

fn mark_selected_in_forest(forest: &mut [TreeNode], id: NoteId) -> bool {
    for node in forest.iter_mut() {
        if node.note.id == id {
            node.note.selected = true;
            return true;
        }
        if mark_selected_in_forest(&mut node.children, id) {
            return true;
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddTarget {
    Root,
    Near,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Title,
    Kind,
    Url,
    Syntax,
    Icon,
    Parent,
    Readonly,
}

impl FormField {
    pub const ALL: [FormField; 7] = [
        FormField::Title,
        FormField::Kind,
        FormField::Url,
        FormField::Syntax,
        FormField::Icon,
        FormField::Parent,
        FormField::Readonly,
    ];

    pub fn next(self) -> Self {
        match self {
            FormField::Title => FormField::Kind,
            FormField::Kind => FormField::Url,
            FormField::Url => FormField::Syntax,
            FormField::Syntax => FormField::Icon,
            FormField::Icon => FormField::Parent,
            FormField::Parent => FormField::Readonly,
            FormField::Readonly => FormField::Title,
        }
    }
}

/// Draft for the add/edit note dialog. `parent_id` may be changed to move the
/// note elsewhere in the tree.
#[derive(Debug, Clone)]
pub struct NoteForm {
    pub draft: Note,
    pub parent_id: NoteId,
    pub target: Option<AddTarget>,
    pub field: FormField,
}

impl NoteForm {
    /// New note placed relative to `current`, inheriting its icon, type and
    /// syntax.
    pub fn add(target: AddTarget, notes: &NotesState) -> Self {
        let current = notes.current();
        let mut draft = Note::placeholder();
        if let Some(source) = notes.tree().get(current.id) {
            draft.icon = source.icon;
            draft.kind = source.kind.clone();
            draft.syntax = source.syntax.clone();
        }
        let parent_id = match target {
            AddTarget::Root => 0,
            AddTarget::Near => current.parent_id,
            AddTarget::Child => current.id,
        };
        draft.parent_id = parent_id;
        Self {
            draft,
            parent_id,
            target: Some(target),
            field: FormField::Title,
        }
    }

    pub fn edit(id: NoteId, notes: &NotesState) -> Option<Self> {
        let note = notes.tree().get(id)?;
        Some(Self {
            draft: note.clone(),
            parent_id: note.parent_id,
            target: None,
            field: FormField::Title,
        })
    }

    pub fn is_edit(&self) -> bool {
        self.draft.id > 0
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Title => Some(&mut self.draft.title),
            FormField::Kind => Some(&mut self.draft.kind),
            FormField::Url => Some(self.draft.url.get_or_insert_with(String::new)),
            FormField::Syntax => Some(self.draft.syntax.get_or_insert_with(String::new)),
            FormField::Icon | FormField::Parent | FormField::Readonly => None,
        }
    }

    fn number_mut(&mut self) -> Option<&mut i64> {
        match self.field {
            FormField::Icon => Some(&mut self.draft.icon),
            FormField::Parent => Some(&mut self.parent_id),
            _ => None,
        }
    }

    pub fn field_value(&self, field: FormField) -> Cow<'_, str> {
        match field {
            FormField::Title => Cow::Borrowed(&self.draft.title),
            FormField::Kind => Cow::Borrowed(&self.draft.kind),
            FormField::Url => Cow::Borrowed(self.draft.url.as_deref().unwrap_or_default()),
            FormField::Syntax => Cow::Borrowed(self.draft.syntax.as_deref().unwrap_or_default()),
            FormField::Icon => Cow::Owned(self.draft.icon.to_string()),
            FormField::Parent => Cow::Owned(self.parent_id.to_string()),
            FormField::Readonly => Cow::Borrowed(if self.draft.readonly { "yes" } else { "no" }),
        }
    }

    /// Numeric fields accept digits only; space flips the read-only flag.
    pub fn push_char(&mut self, ch: char) {
        if self.field == FormField::Readonly {
            if ch == ' ' {
                self.draft.readonly = !self.draft.readonly;
            }
            return;
        }
        if let Some(value) = self.number_mut() {
            let next = ch
                .to_digit(10)
                .and_then(|digit| value.checked_mul(10)?.checked_add(i64::from(digit)));
            if let Some(next) = next {
                *value = next;
            }
            return;
        }
        if let Some(text) = self.text_mut() {
            text.push(ch);
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(value) = self.number_mut() {
            *value /= 10;
        } else if let Some(text) = self.text_mut() {
            text.pop();
        }
    }

    pub fn next_field(&mut self) {
        self.field = self.field.next();
    }

    /// Checks the draft before it is sent: a title is required and the parent
    /// must exist and lie outside the note's own subtree.
    pub fn validate(&self, notes: &NotesState) -> Result<(), String> {
        if self.draft.title.trim().is_empty() {
            return Err("Note title cannot be empty".to_string());
        }
        if self.parent_id == 0 {
            return Ok(());
        }
        let Some(parent) = notes.tree().get(self.parent_id) else {
            return Err(format!("Parent note #{} does not exist", self.parent_id));
        };
        let inside_self = self.is_edit()
            && (parent.id == self.draft.id
                || notes
                    .tree()
                    .get(self.draft.id)
                    .is_some_and(|note| parent.is_descendant_of(note)));
        if inside_self {
            return Err("A note cannot be moved into its own subtree".to_string());
        }
        Ok(())
    }

    pub fn to_save_note(&self) -> SaveNote {
        let mut save = SaveNote::from(&self.draft);
        save.parent_id = Some(self.parent_id);
        save.title = Some(self.draft.title.trim().to_string());
        save
    }

    pub fn submit(&self, notes: &mut NotesState, svc: &mut Services, now: Instant) -> Option<NoteId> {
        notes.save_note(self.to_save_note(), svc, now)
    }
}
