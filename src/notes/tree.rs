use indexmap::IndexMap;

use super::model::{Note, NoteId, TreeNode};

/// Upper bound on parent hops when walking towards a root, so cyclic parent
/// references from the store cannot loop forever.
pub const MAX_PARENT_HOPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Created,
    Modified,
}

/// Ordered forest of notes with an id index over the same entries.
///
/// Every note lives exactly once in `index`; tree order is expressed through
/// `roots` and each note's `children` ids. The index is cleared and rebuilt on
/// every [`NoteTree::replace`], so its keyset always equals the set of ids in
/// the forest.
#[derive(Debug, Clone, Default)]
pub struct NoteTree {
    roots: Vec<NoteId>,
    index: IndexMap<NoteId, Note>,
}

impl NoteTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_forest(forest: Vec<TreeNode>) -> Self {
        let mut tree = Self::new();
        tree.replace(forest);
        tree
    }

    /// Installs a freshly loaded forest, dropping the previous one.
    pub fn replace(&mut self, forest: Vec<TreeNode>) {
        self.roots.clear();
        self.index.clear();
        for node in forest {
            let id = node.note.id;
            self.roots.push(id);
            self.insert_subtree(node);
        }
    }

    fn insert_subtree(&mut self, node: TreeNode) {
        let TreeNode { mut note, children } = node;
        note.children = children.iter().map(|child| child.note.id).collect();
        // A duplicate id keeps its first map position and takes the latest value.
        self.index.insert(note.id, note);
        for child in children {
            self.insert_subtree(child);
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn roots(&self) -> &[NoteId] {
        &self.roots
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.index.get(&id)
    }

    pub fn get_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.index.get_mut(&id)
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.index.contains_key(&id)
    }

    /// Notes in map order (depth-first pre-order of the loaded forest).
    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.index.values()
    }

    pub fn children_of(&self, id: NoteId) -> &[NoteId] {
        self.index
            .get(&id)
            .map(|note| note.children.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestor ids of `id`, root first. Walks `parent_id` links and stops after
    /// [`MAX_PARENT_HOPS`] hops or at the first id missing from the map.
    pub fn parent_ids(&self, id: NoteId) -> Vec<NoteId> {
        let mut parents = Vec::new();
        let Some(mut note) = self.get(id) else {
            return parents;
        };
        while note.parent_id > 0 && parents.len() < MAX_PARENT_HOPS {
            let Some(parent) = self.get(note.parent_id) else {
                break;
            };
            parents.push(parent.id);
            note = parent;
        }
        parents.reverse();
        parents
    }

    pub fn parents(&self, id: NoteId) -> Vec<&Note> {
        self.parent_ids(id)
            .into_iter()
            .filter_map(|parent| self.get(parent))
            .collect()
    }

    /// Children of `id` in map order. The recursive variant uses the nested-set
    /// interval test, the direct variant compares `parent_id`.
    pub fn children_ids(&self, id: NoteId, recursive: bool) -> Vec<NoteId> {
        let Some(parent) = self.get(id) else {
            return Vec::new();
        };
        self.index
            .values()
            .filter(|note| {
                if recursive {
                    note.is_descendant_of(parent)
                } else {
                    note.parent_id == parent.id
                }
            })
            .map(|note| note.id)
            .collect()
    }

    /// Sets `expanded` on the note. Returns `false` when the id is unknown.
    pub fn set_expanded(&mut self, id: NoteId, expanded: bool) -> bool {
        match self.get_mut(id) {
            Some(note) => {
                note.expanded = expanded;
                true
            }
            None => false,
        }
    }

    /// Marks every ancestor of `id` expanded and returns the ids that changed.
    pub fn expand_parents(&mut self, id: NoteId) -> Vec<NoteId> {
        let mut changed = Vec::new();
        for parent in self.parent_ids(id) {
            if let Some(note) = self.get_mut(parent) {
                if !note.expanded {
                    note.expanded = true;
                    changed.push(parent);
                }
            }
        }
        changed
    }

    /// Collapses every descendant of `id` and returns the ids that changed.
    pub fn collapse_descendants(&mut self, id: NoteId) -> Vec<NoteId> {
        let mut changed = Vec::new();
        for child in self.children_ids(id, true) {
            if let Some(note) = self.get_mut(child) {
                if note.expanded {
                    note.expanded = false;
                    changed.push(child);
                }
            }
        }
        changed
    }

    pub fn clear_selection(&mut self) {
        for note in self.index.values_mut() {
            note.selected = false;
        }
    }

    pub fn mark_selected(&mut self, id: NoteId) -> bool {
        self.clear_selection();
        match self.get_mut(id) {
            Some(note) => {
                note.selected = true;
                true
            }
            None => false,
        }
    }

    pub fn selected_id(&self) -> Option<NoteId> {
        self.index
            .values()
            .find(|note| note.selected)
            .map(|note| note.id)
    }

    /// Most recently created or modified notes, newest first.
    pub fn latest(&self, field: DateField, count: usize) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.index.values().collect();
        notes.sort_by_key(|note| {
            std::cmp::Reverse(match field {
                DateField::Created => note.date_created,
                DateField::Modified => note.date_modified,
            })
        });
        notes.truncate(count);
        notes
    }

    /// Favorite notes ordered by descending `left` bound.
    pub fn favorites(&self, count: usize) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.index.values().filter(|note| note.favorite).collect();
        notes.sort_by_key(|note| std::cmp::Reverse(note.left));
        notes.truncate(count);
        notes
    }
}
