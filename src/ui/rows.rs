use crate::notes::{Note, NoteId, NoteTree};
use crate::search::SearchState;

/// One sidebar row in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: NoteId,
    pub depth: usize,
    /// Shown for context only; navigation skips it.
    pub excluded: bool,
    pub has_children: bool,
    pub expanded: bool,
}

impl Row {
    fn new(note: &Note, depth: usize, excluded: bool) -> Self {
        Self {
            id: note.id,
            depth,
            excluded,
            has_children: note.has_children(),
            expanded: note.expanded,
        }
    }
}

/// Rows the sidebar renders. Outside search every expanded branch is walked.
/// During a search the flat view lists results in server order, the tree view
/// keeps every branch that leads to a result and marks non-matching ancestors
/// as excluded.
pub fn visible_rows(tree: &NoteTree, search: &SearchState, tree_mode: bool) -> Vec<Row> {
    let mut rows = Vec::new();
    if !search.mode {
        for root in tree.roots() {
            push_expanded(tree, *root, 0, &mut rows);
        }
        return rows;
    }

    if !tree_mode {
        rows.extend(
            search
                .results()
                .iter()
                .filter_map(|id| tree.get(*id))
                .map(|note| Row::new(note, 0, false)),
        );
        return rows;
    }

    let hits: Vec<&Note> = search
        .results()
        .iter()
        .filter_map(|id| tree.get(*id))
        .collect();
    for root in tree.roots() {
        push_matching(tree, *root, 0, &hits, &mut rows);
    }
    rows
}

/// The visible-order sequence consumed by navigation.
pub fn visible_ids(tree: &NoteTree, search: &SearchState, tree_mode: bool) -> Vec<NoteId> {
    visible_rows(tree, search, tree_mode)
        .into_iter()
        .filter(|row| !row.excluded)
        .map(|row| row.id)
        .collect()
}

fn push_expanded(tree: &NoteTree, id: NoteId, depth: usize, rows: &mut Vec<Row>) {
    let Some(note) = tree.get(id) else {
        return;
    };
    rows.push(Row::new(note, depth, false));
    if note.expanded {
        for child in &note.children {
            push_expanded(tree, *child, depth + 1, rows);
        }
    }
}

fn push_matching(tree: &NoteTree, id: NoteId, depth: usize, hits: &[&Note], rows: &mut Vec<Row>) {
    let Some(note) = tree.get(id) else {
        return;
    };
    let is_hit = hits.iter().any(|hit| hit.id == id);
    let leads_to_hit = hits.iter().any(|hit| hit.is_descendant_of(note));
    if !is_hit && !leads_to_hit {
        return;
    }
    rows.push(Row::new(note, depth, !is_hit));
    for child in &note.children {
        push_matching(tree, *child, depth + 1, hits, rows);
    }
}
