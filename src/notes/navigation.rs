use super::model::{Note, NoteId};
use super::tree::NoteTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Home,
    End,
    Parent,
    Child,
    Up,
    Down,
}

/// What the selection controller should do in response to a [`NavCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Select(NoteId),
    Expand(NoteId),
    Collapse(NoteId),
    Stay,
}

/// Read-only view of everything navigation depends on.
pub struct NavContext<'a> {
    pub tree: &'a NoteTree,
    /// Id of the current note, `0` when nothing is selected.
    pub current: NoteId,
    /// Ids in display order after collapse and search filtering.
    pub visible: &'a [NoteId],
    pub search_mode: bool,
}

impl<'a> NavContext<'a> {
    fn current_note(&self) -> Option<&'a Note> {
        if self.current == 0 {
            return None;
        }
        self.tree.get(self.current)
    }

    fn home(&self) -> NavOutcome {
        self.visible
            .first()
            .map_or(NavOutcome::Stay, |id| NavOutcome::Select(*id))
    }

    fn end(&self) -> NavOutcome {
        self.visible
            .last()
            .map_or(NavOutcome::Stay, |id| NavOutcome::Select(*id))
    }
}

pub fn find_prev_id(visible: &[NoteId], id: NoteId) -> Option<NoteId> {
    let position = visible.iter().position(|candidate| *candidate == id)?;
    position.checked_sub(1).map(|prev| visible[prev])
}

pub fn find_next_id(visible: &[NoteId], id: NoteId) -> Option<NoteId> {
    let position = visible.iter().position(|candidate| *candidate == id)?;
    visible.get(position + 1).copied()
}

/// Resolves a navigation command against the visible order. Missing targets
/// resolve to [`NavOutcome::Stay`].
pub fn resolve(command: NavCommand, ctx: &NavContext<'_>) -> NavOutcome {
    match command {
        NavCommand::Home => ctx.home(),
        NavCommand::End => ctx.end(),
        NavCommand::Parent => {
            let Some(current) = ctx.current_note() else {
                return NavOutcome::Stay;
            };
            if current.expanded && !ctx.search_mode {
                NavOutcome::Collapse(current.id)
            } else if current.parent_id > 0 && ctx.tree.contains(current.parent_id) {
                NavOutcome::Select(current.parent_id)
            } else {
                NavOutcome::Stay
            }
        }
        NavCommand::Child => {
            let Some(current) = ctx.current_note() else {
                return NavOutcome::Stay;
            };
            if !current.has_children() {
                return NavOutcome::Stay;
            }
            if !current.expanded && !ctx.search_mode {
                return NavOutcome::Expand(current.id);
            }
            current
                .children
                .iter()
                .find(|child| ctx.visible.contains(child))
                .map_or(NavOutcome::Stay, |child| NavOutcome::Select(*child))
        }
        NavCommand::Up | NavCommand::Down => {
            if !ctx.visible.contains(&ctx.current) {
                return ctx.home();
            }
            let target = if command == NavCommand::Up {
                find_prev_id(ctx.visible, ctx.current)
            } else {
                find_next_id(ctx.visible, ctx.current)
            };
            target.map_or(NavOutcome::Stay, NavOutcome::Select)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::tree::tests::sample_forest;

    fn ctx<'a>(tree: &'a NoteTree, current: NoteId, visible: &'a [NoteId]) -> NavContext<'a> {
        NavContext {
            tree,
            current,
            visible,
            search_mode: false,
        }
    }

    #[test]
    fn prev_and_next_over_visible_order() {
        let visible = [5, 8, 3, 9];
        assert_eq!(find_prev_id(&visible, 8), Some(5));
        assert_eq!(find_next_id(&visible, 8), Some(3));
        assert_eq!(find_prev_id(&visible, 5), None);
        assert_eq!(find_next_id(&visible, 9), None);
        assert_eq!(find_next_id(&visible, 42), None);
    }

    #[test]
    fn home_and_end_use_visible_bounds() {
        let tree = NoteTree::from_forest(sample_forest());
        let visible = [1, 2, 3, 6];
        assert_eq!(resolve(NavCommand::Home, &ctx(&tree, 3, &visible)), NavOutcome::Select(1));
        assert_eq!(resolve(NavCommand::End, &ctx(&tree, 3, &visible)), NavOutcome::Select(6));
        assert_eq!(resolve(NavCommand::Home, &ctx(&tree, 3, &[])), NavOutcome::Stay);
    }

    #[test]
    fn up_down_fall_back_to_home_when_current_hidden() {
        let tree = NoteTree::from_forest(sample_forest());
        let visible = [1, 2, 3, 6];
        assert_eq!(resolve(NavCommand::Down, &ctx(&tree, 2, &visible)), NavOutcome::Select(3));
        assert_eq!(resolve(NavCommand::Up, &ctx(&tree, 2, &visible)), NavOutcome::Select(1));
        assert_eq!(resolve(NavCommand::Up, &ctx(&tree, 1, &visible)), NavOutcome::Stay);
        assert_eq!(resolve(NavCommand::Down, &ctx(&tree, 5, &visible)), NavOutcome::Select(1));
        assert_eq!(resolve(NavCommand::Down, &ctx(&tree, 0, &visible)), NavOutcome::Select(1));
    }

    #[test]
    fn parent_collapses_expanded_note_before_moving() {
        let mut tree = NoteTree::from_forest(sample_forest());
        tree.set_expanded(3, true);
        let visible = [1, 2, 3, 4, 6];
        assert_eq!(resolve(NavCommand::Parent, &ctx(&tree, 3, &visible)), NavOutcome::Collapse(3));

        let mut searching = ctx(&tree, 3, &visible);
        searching.search_mode = true;
        assert_eq!(resolve(NavCommand::Parent, &searching), NavOutcome::Select(1));

        tree.set_expanded(3, false);
        assert_eq!(resolve(NavCommand::Parent, &ctx(&tree, 3, &visible)), NavOutcome::Select(1));
        assert_eq!(resolve(NavCommand::Parent, &ctx(&tree, 6, &visible)), NavOutcome::Stay);
    }

    #[test]
    fn child_expands_collapsed_note_then_moves_to_first_visible_child() {
        let mut tree = NoteTree::from_forest(sample_forest());
        let visible = [1, 3, 6];
        assert_eq!(resolve(NavCommand::Child, &ctx(&tree, 1, &visible)), NavOutcome::Expand(1));

        let mut searching = ctx(&tree, 1, &visible);
        searching.search_mode = true;
        assert_eq!(resolve(NavCommand::Child, &searching), NavOutcome::Select(3));

        tree.set_expanded(1, true);
        // Child 2 is filtered out of the visible order.
        assert_eq!(resolve(NavCommand::Child, &ctx(&tree, 1, &visible)), NavOutcome::Select(3));
        assert_eq!(resolve(NavCommand::Child, &ctx(&tree, 6, &visible)), NavOutcome::Stay);
    }

    #[test]
    fn missing_current_is_a_no_op() {
        let tree = NoteTree::from_forest(sample_forest());
        let visible = [1, 6];
        assert_eq!(resolve(NavCommand::Parent, &ctx(&tree, 0, &visible)), NavOutcome::Stay);
        assert_eq!(resolve(NavCommand::Child, &ctx(&tree, 77, &visible)), NavOutcome::Stay);
    }
}
