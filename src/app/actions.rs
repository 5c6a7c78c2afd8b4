use std::time::Instant;

use crate::hotkeys::Action;
use crate::notes::NavCommand;
use crate::settings::PanelMode;

use super::{AddTarget, App, Focus, NoteForm, Overlay};

impl App {
    pub(crate) fn execute(&mut self, action: Action, now: Instant) {
        tracing::debug!(action = action.as_ref(), "dispatching action");
        match action {
            Action::Homepage => self.notes.reset_current(&mut self.svc, now),
            Action::MessageLog => self.toggle_message_log(),
            Action::Settings => self.overlay = Some(Overlay::Settings { selected: 0 }),
            Action::ExpandAll => self.notes.expand_all(&mut self.svc),
            Action::CollapseAll => self.notes.collapse_all(&mut self.svc, now),
            Action::MultilineToggle => self.svc.settings.toggle_multiline(),
            Action::GoHome => self.navigate(NavCommand::Home, now),
            Action::GoEnd => self.navigate(NavCommand::End, now),
            Action::GoUp => self.navigate(NavCommand::Up, now),
            Action::GoDown => self.navigate(NavCommand::Down, now),
            Action::GoParent => self.navigate(NavCommand::Parent, now),
            Action::GoChild => self.navigate(NavCommand::Child, now),
            Action::AddRoot => self.open_add_form(AddTarget::Root),
            Action::AddNear => self.open_add_form(AddTarget::Near),
            Action::AddChild => self.open_add_form(AddTarget::Child),
            Action::EditNote => {
                if let Some(form) = NoteForm::edit(self.notes.current().id, &self.notes) {
                    self.overlay = Some(Overlay::Form(form));
                }
            }
            Action::DeleteNote => {
                let current = self.notes.current();
                if current.id > 0 {
                    self.overlay = Some(Overlay::ConfirmDelete {
                        id: current.id,
                        title: current.title.clone(),
                    });
                }
            }
            Action::ToggleFavorite => {
                self.notes.toggle_favorite(None, &mut self.svc);
            }
            Action::ToggleSidebar => self.svc.settings.toggle_sidebar(),
            Action::ShowViewer => self.show_viewer(),
            Action::ShowEditor => self.show_editor(),
            Action::ToggleView => {
                if self.svc.settings.is_edit_mode() {
                    self.show_viewer();
                } else {
                    self.show_editor();
                }
            }
            Action::ModeDefault => self.svc.settings.set_panel_mode(PanelMode::Off),
            Action::ModeVertical => self.svc.settings.set_panel_mode(PanelMode::Vertical),
            Action::ModeHorizontal => self.svc.settings.set_panel_mode(PanelMode::Horizontal),
            Action::ToggleLineWrap => self.svc.settings.toggle_editor_line_wrap(),
            Action::SearchFocus => self.focus = Focus::Search,
            Action::SearchClear => {
                self.search.clear();
                if self.focus == Focus::Search {
                    self.focus = Focus::Tree;
                }
            }
            Action::SearchTitle => {
                self.svc.settings.toggle_search_title();
                self.rerun_search();
            }
            Action::SearchWhole => {
                self.svc.settings.toggle_search_whole();
                self.rerun_search();
            }
            Action::SearchTreeMode => self.svc.settings.toggle_search_tree_mode(),
            Action::DatabaseVacuum => self.optimize_database(),
        }
    }

    fn open_add_form(&mut self, target: AddTarget) {
        self.overlay = Some(Overlay::Form(NoteForm::add(target, &self.notes)));
    }

    fn toggle_message_log(&mut self) {
        let open = !self.svc.log.is_open();
        self.svc.log.set_open(open);
        self.overlay = open.then_some(Overlay::Messages);
    }

    fn show_viewer(&mut self) {
        self.svc.settings.set_edit_mode(false);
        if self.focus == Focus::Editor {
            self.focus = Focus::Tree;
        }
    }

    fn show_editor(&mut self) {
        let allowed = self.notes.is_note_opened()
            && self.notes.is_editable()
            && self.svc.settings.panel_mode() == PanelMode::Off
            && !self.svc.settings.is_edit_mode();
        if !allowed {
            return;
        }
        self.svc.settings.set_edit_mode(true);
        self.sync_editor();
        self.focus = Focus::Editor;
    }

    pub(super) fn rerun_search(&mut self) {
        if !self.search.mode {
            return;
        }
        self.search.execute(
            self.svc.gateway.as_ref(),
            &self.svc.settings.get().search,
            &mut self.svc.log,
        );
    }

    fn optimize_database(&mut self) {
        match self.svc.gateway.optimize_database() {
            Ok(report) => match report.saved_percent() {
                Some(percent) => self
                    .svc
                    .log
                    .info(format!("Database optimized, {percent}% of space saved.")),
                None => self.svc.log.warning("Database already optimized."),
            },
            Err(err) => self.svc.log.error(format!("Error optimizing database: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Instant;

    use crate::app::{App, Focus, Overlay, SelectOptions};
    use crate::config::AppConfig;
    use crate::gateway::fake::{fake_note, Call, FakeGateway};
    use crate::hotkeys::Action;
    use crate::journaling::{MessageKind, MessageLog};
    use crate::settings::PanelMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn app() -> (Rc<FakeGateway>, App) {
        let fake = Rc::new(FakeGateway::with_notes(vec![
            fake_note(1, 0, "root"),
            fake_note(2, 1, "child"),
        ]));
        let mut app = App::new(
            &AppConfig::default(),
            Box::new(Rc::clone(&fake)),
            MessageLog::in_memory(20),
        );
        app.start();
        fake.clear_calls();
        (fake, app)
    }

    #[test]
    fn editor_requires_open_editable_note_in_single_panel() {
        let (_fake, mut app) = app();
        let now = Instant::now();
        app.execute(Action::ShowEditor, now);
        assert!(!app.svc.settings.is_edit_mode());

        app.notes.select(2, SelectOptions::default(), &mut app.svc, now);
        app.execute(Action::ModeVertical, now);
        app.execute(Action::ShowEditor, now);
        assert!(!app.svc.settings.is_edit_mode());

        app.execute(Action::ModeDefault, now);
        app.execute(Action::ToggleView, now);
        assert!(app.svc.settings.is_edit_mode());
        assert_eq!(app.focus, Focus::Editor);
        app.execute(Action::ToggleView, now);
        assert!(!app.svc.settings.is_edit_mode());
        assert_eq!(app.focus, Focus::Tree);
        assert_eq!(app.svc.settings.panel_mode(), PanelMode::Off);
    }

    #[test]
    fn vacuum_reports_saved_space() {
        let (fake, mut app) = app();
        app.execute(Action::DatabaseVacuum, Instant::now());
        assert_eq!(fake.calls(), vec![Call::Optimize]);
        let last = app.services().log.last().cloned();
        assert_eq!(last.map(|e| (e.kind, e.message)), Some((
            MessageKind::Info,
            "Database optimized, 25% of space saved.".to_string()
        )));
    }

    #[test]
    fn message_log_action_toggles_overlay() {
        let (_fake, mut app) = app();
        app.execute(Action::MessageLog, Instant::now());
        assert!(matches!(app.overlay(), Some(Overlay::Messages)));
        assert!(app.services().log.is_open());
        app.execute(Action::MessageLog, Instant::now());
        assert!(app.overlay().is_none());
    }

    #[test]
    fn search_flag_toggle_reruns_active_query() {
        let (fake, mut app) = app();
        app.search.set_text("child", std::time::Duration::ZERO, Instant::now());
        app.execute(Action::SearchTitle, Instant::now());
        assert!(app.svc.settings.get().search.title);
        assert_eq!(fake.count(|call| matches!(call, Call::Search(req) if req.title)), 1);
        assert!(!app.search.is_pending());
    }

    #[test]
    fn edit_action_opens_form_for_current_note() {
        let (_fake, mut app) = app();
        let now = Instant::now();
        app.execute(Action::EditNote, now);
        assert!(app.overlay().is_none());
        app.notes.select(2, SelectOptions::default(), &mut app.svc, now);
        app.execute(Action::EditNote, now);
        assert!(matches!(app.overlay(), Some(Overlay::Form(form)) if form.is_edit() && form.parent_id == 1));
    }

    #[test]
    fn settings_dialog_changes_the_selected_setting() {
        let (fake, mut app) = app();
        let now = Instant::now();
        let press = |app: &mut App, code: KeyCode| {
            app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), now);
        };
        app.execute(Action::Settings, now);
        assert!(matches!(app.overlay(), Some(Overlay::Settings { selected: 0 })));

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert!(!app.svc.settings.get().sidebar.visible);
        assert!(matches!(app.overlay(), Some(Overlay::Settings { selected: 2 })));

        app.search.set_text("child", std::time::Duration::ZERO, now);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.svc.settings.get().search.whole);
        assert_eq!(fake.count(|call| matches!(call, Call::Search(req) if req.whole)), 1);

        press(&mut app, KeyCode::Esc);
        assert!(app.overlay().is_none());
        assert!(app.svc.settings.is_dirty());
    }
}
