use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use strum::IntoEnumIterator;

use crate::config::AppConfig;
use crate::gateway::NoteGateway;
use crate::hotkeys::{Action, HotkeyMap, KeyInput};
use crate::journaling::{AutoSaveEvent, AutoSaveRuntime, AutoSaveStatus, MessageLog};
use crate::notes::{NavCommand, NoteId};
use crate::search::SearchState;
use crate::settings::{SettingsItem, SettingsStore};
use crate::ui;

mod actions;
pub mod editor;
pub mod state;

pub use editor::{EditCommand, EditOutcome, EditorState};
pub use state::{
    AddTarget, DeleteOutcome, FormField, NoteForm, NotesState, SelectOptions, SelectOutcome,
};

/// Collaborators every controller needs: the remote store, the remote UI
/// settings and the user-facing message log.
pub struct Services {
    pub gateway: Box<dyn NoteGateway>,
    pub settings: SettingsStore,
    pub log: MessageLog,
}

impl Services {
    pub fn new(gateway: Box<dyn NoteGateway>, log: MessageLog) -> Self {
        Self {
            gateway,
            settings: SettingsStore::new(),
            log,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tree,
    Search,
    Editor,
}

#[derive(Debug, Clone)]
pub enum Overlay {
    Form(NoteForm),
    ConfirmDelete { id: NoteId, title: String },
    Messages,
    /// Index into [`SettingsItem::iter`].
    Settings { selected: usize },
}

pub struct App {
    svc: Services,
    notes: NotesState,
    search: SearchState,
    auto_save: AutoSaveRuntime,
    hotkeys: HotkeyMap,
    editor: Option<EditorState>,
    overlay: Option<Overlay>,
    focus: Focus,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: &AppConfig, gateway: Box<dyn NoteGateway>, log: MessageLog) -> Self {
        Self {
            svc: Services::new(gateway, log),
            notes: NotesState::new(),
            search: SearchState::new(),
            auto_save: AutoSaveRuntime::new(),
            hotkeys: HotkeyMap::default(),
            editor: None,
            overlay: None,
            focus: Focus::Tree,
            should_quit: false,
            tick_rate: config.ui.tick_rate(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.svc
    }

    pub fn notes(&self) -> &NotesState {
        &self.notes
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn editor(&self) -> Option<&EditorState> {
        self.editor.as_ref()
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn hotkeys(&self) -> &HotkeyMap {
        &self.hotkeys
    }

    pub fn autosave_status(&self) -> AutoSaveStatus {
        self.auto_save.status()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Loads remote settings and the notes tree.
    pub fn start(&mut self) {
        self.svc
            .settings
            .load(self.svc.gateway.as_ref(), &mut self.svc.log);
        self.notes.load_notes(&mut self.svc);
    }

    pub fn run(&mut self) -> Result<()> {
        self.start();
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        self.shutdown();
        restore_terminal(&mut terminal)?;
        result
    }

    /// Writes every pending content save and settings change.
    pub fn shutdown(&mut self) {
        let events = self.auto_save.flush_now(self.svc.gateway.as_ref());
        self.handle_autosave_events(events);
        self.svc
            .settings
            .flush(self.svc.gateway.as_ref(), &mut self.svc.log);
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| ui::draw_app(frame, self))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key, Instant::now());
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick(Instant::now());
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.notes.poll(&mut self.svc, now);
        self.sync_editor();
        self.search.poll(
            self.svc.gateway.as_ref(),
            &self.svc.settings.get().search,
            &mut self.svc.log,
            now,
        );
        let events = self.auto_save.poll(self.svc.gateway.as_ref(), now);
        self.handle_autosave_events(events);
        self.svc
            .settings
            .flush(self.svc.gateway.as_ref(), &mut self.svc.log);
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key, now) {
            return;
        }

        let action = KeyInput::from_event(&key).and_then(|input| self.hotkeys.resolve_input(&input));
        if let Some(action) = action {
            self.execute(action, now);
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
        {
            self.should_quit = true;
            return;
        }

        match self.focus {
            Focus::Search => self.handle_search_key(key, now),
            Focus::Editor => self.handle_editor_key(key, now),
            Focus::Tree => self.handle_tree_key(key, now),
        }
    }

    /// Ids of the sidebar rows the user can move between, in display order.
    pub fn visible_ids(&self) -> Vec<NoteId> {
        ui::rows::visible_ids(
            self.notes.tree(),
            &self.search,
            self.svc.settings.get().search.tree_mode,
        )
    }

    fn navigate(&mut self, command: NavCommand, now: Instant) {
        let visible = self.visible_ids();
        self.notes
            .navigate(command, &visible, self.search.mode, &mut self.svc, now);
    }

    fn handle_tree_key(&mut self, key: KeyEvent, now: Instant) {
        let command = match key.code {
            KeyCode::Up => NavCommand::Up,
            KeyCode::Down => NavCommand::Down,
            KeyCode::Left => NavCommand::Parent,
            KeyCode::Right => NavCommand::Child,
            KeyCode::Home => NavCommand::Home,
            KeyCode::End => NavCommand::End,
            KeyCode::Char(' ') => {
                let id = self.notes.current().id;
                if id > 0 {
                    self.notes.toggle_expand(id, None, &mut self.svc);
                }
                return;
            }
            KeyCode::Enter | KeyCode::Tab => {
                if self.svc.settings.is_edit_mode() && self.editor.is_some() {
                    self.focus = Focus::Editor;
                }
                return;
            }
            KeyCode::Char('/') => {
                self.focus = Focus::Search;
                return;
            }
            KeyCode::Char('q') => {
                self.should_quit = true;
                return;
            }
            _ => return,
        };
        self.navigate(command, now);
    }

    fn handle_search_key(&mut self, key: KeyEvent, now: Instant) {
        let delay = Duration::from_millis(self.svc.settings.get().search.search_delay);
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Tab => self.focus = Focus::Tree,
            KeyCode::Backspace => self.search.pop_char(delay, now),
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.search.push_char(ch, delay, now)
            }
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent, now: Instant) {
        if key.code == KeyCode::Esc || !self.svc.settings.is_edit_mode() {
            self.focus = Focus::Tree;
            return;
        }
        let Some(command) = EditCommand::from_key(&key) else {
            return;
        };
        let Some(editor) = self.editor.as_mut() else {
            self.focus = Focus::Tree;
            return;
        };
        if editor.apply(command) == EditOutcome::Changed {
            self.contents_changed(now);
        }
    }

    fn contents_changed(&mut self, now: Instant) {
        let Some(editor) = &self.editor else {
            return;
        };
        let id = editor.note_id();
        if id != self.notes.current().id {
            return;
        }
        let contents = editor.buffer().to_string();
        self.notes.update_contents(&contents);
        let delay = Duration::from_millis(self.svc.settings.get().editor.save_delay);
        self.auto_save.queue(id, &contents, delay, now);
    }

    /// Keeps the editor buffer bound to the current note.
    fn sync_editor(&mut self) {
        let current = self.notes.current();
        if !current.is_editable() {
            self.editor = None;
            if self.focus == Focus::Editor {
                self.focus = Focus::Tree;
            }
            return;
        }
        match self.editor.as_mut() {
            Some(editor) => {
                editor.sync(current.id, &current.contents);
            }
            None => self.editor = Some(EditorState::open(current.id, &current.contents)),
        }
    }

    fn handle_autosave_events(&mut self, events: Vec<AutoSaveEvent>) {
        for event in events {
            match event {
                AutoSaveEvent::Saved { note_id, date } => {
                    self.notes.on_contents_saved(note_id, date, &mut self.svc);
                }
                AutoSaveEvent::Error { note_id, message } => {
                    self.svc
                        .log
                        .error(format!("Error saving contents of note #{note_id}: {message}"));
                }
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        let Some(overlay) = self.overlay.take() else {
            return false;
        };
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
        self.overlay = match overlay {
            Overlay::Form(mut form) => match key.code {
                KeyCode::Esc => None,
                KeyCode::Enter => {
                    if let Err(problem) = form.validate(&self.notes) {
                        self.svc.log.warning(problem);
                        Some(Overlay::Form(form))
                    } else if form.submit(&mut self.notes, &mut self.svc, now).is_some() {
                        None
                    } else {
                        Some(Overlay::Form(form))
                    }
                }
                KeyCode::Tab => {
                    form.next_field();
                    Some(Overlay::Form(form))
                }
                KeyCode::Backspace => {
                    form.pop_char();
                    Some(Overlay::Form(form))
                }
                KeyCode::Char(ch) if plain => {
                    form.push_char(ch);
                    Some(Overlay::Form(form))
                }
                _ => Some(Overlay::Form(form)),
            },
            Overlay::ConfirmDelete { id, title } => match key.code {
                KeyCode::Enter | KeyCode::Char('y') => {
                    self.notes.delete_note(id, |_, _| true, &mut self.svc, now);
                    None
                }
                KeyCode::Esc | KeyCode::Char('n') => {
                    self.notes.delete_note(id, |_, _| false, &mut self.svc, now);
                    None
                }
                _ => Some(Overlay::ConfirmDelete { id, title }),
            },
            Overlay::Settings { selected } => {
                let count = SettingsItem::iter().count();
                match key.code {
                    KeyCode::Esc | KeyCode::Char('q') => None,
                    KeyCode::Up => Some(Overlay::Settings {
                        selected: (selected + count - 1) % count,
                    }),
                    KeyCode::Down | KeyCode::Tab => Some(Overlay::Settings {
                        selected: (selected + 1) % count,
                    }),
                    KeyCode::Enter | KeyCode::Char(' ') => {
                        if let Some(item) = SettingsItem::iter().nth(selected) {
                            item.apply(&mut self.svc.settings);
                            if item.affects_search() {
                                self.rerun_search();
                            }
                        }
                        Some(Overlay::Settings { selected })
                    }
                    _ => Some(Overlay::Settings { selected }),
                }
            }
            Overlay::Messages => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    self.svc.log.set_open(false);
                    None
                }
                KeyCode::Char('c') if plain => {
                    self.svc.log.clear();
                    Some(Overlay::Messages)
                }
                _ => {
                    let input = KeyInput::from_event(&key);
                    let toggles = input
                        .and_then(|input| self.hotkeys.resolve_input(&input))
                        .is_some_and(|action| action == Action::MessageLog);
                    if toggles {
                        self.svc.log.set_open(false);
                        None
                    } else {
                        Some(Overlay::Messages)
                    }
                }
            },
        };
        true
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{fake_note, Call, FakeGateway};
    use crate::notes::Note;
    use std::rc::Rc;

    fn app_with(notes: Vec<Note>) -> (Rc<FakeGateway>, App) {
        let fake = Rc::new(FakeGateway::with_notes(notes));
        let mut app = App::new(
            &AppConfig::default(),
            Box::new(Rc::clone(&fake)),
            MessageLog::in_memory(50),
        );
        app.start();
        fake.clear_calls();
        (fake, app)
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn ctrl_alt(code: KeyCode) -> KeyEvent {
        key(code, KeyModifiers::CONTROL | KeyModifiers::ALT)
    }

    #[test]
    fn go_home_hotkey_selects_first_visible_note() {
        let (_fake, mut app) = app_with(vec![
            fake_note(7, 0, "seven"),
            fake_note(2, 0, "two"),
            fake_note(9, 0, "nine"),
        ]);
        assert_eq!(app.visible_ids(), vec![7, 2, 9]);
        app.handle_key(ctrl_alt(KeyCode::Up), Instant::now());
        assert_eq!(app.notes().current().id, 7);
    }

    #[test]
    fn collapsed_children_are_skipped_by_arrow_keys() {
        let (_fake, mut app) = app_with(vec![
            fake_note(1, 0, "root"),
            fake_note(2, 1, "child"),
            fake_note(3, 0, "other"),
        ]);
        let now = Instant::now();
        app.handle_key(key(KeyCode::Down, KeyModifiers::NONE), now);
        assert_eq!(app.notes().current().id, 1);
        app.handle_key(key(KeyCode::Down, KeyModifiers::NONE), now);
        assert_eq!(app.notes().current().id, 3);

        app.handle_key(key(KeyCode::Up, KeyModifiers::NONE), now);
        app.handle_key(key(KeyCode::Right, KeyModifiers::NONE), now);
        assert_eq!(app.visible_ids(), vec![1, 2, 3]);
        app.handle_key(key(KeyCode::Right, KeyModifiers::NONE), now);
        assert_eq!(app.notes().current().id, 2);
    }

    #[test]
    fn typing_coalesces_into_one_content_save() {
        let (fake, mut app) = app_with(vec![fake_note(1, 0, "draft")]);
        let start = Instant::now();
        app.handle_key(key(KeyCode::Down, KeyModifiers::NONE), start);
        app.on_tick(start + Duration::from_millis(60));
        app.svc.settings.set_auto_view(false);
        app.handle_key(ctrl_alt(KeyCode::Char('e')), start);
        assert!(app.svc.settings.is_edit_mode());
        assert_eq!(app.focus(), Focus::Editor);

        app.handle_key(key(KeyCode::Char('h'), KeyModifiers::NONE), start);
        app.handle_key(key(KeyCode::Char('i'), KeyModifiers::NONE), start);
        assert_eq!(app.notes().current().contents, "hicontents of draft");
        fake.clear_calls();

        app.on_tick(start + Duration::from_millis(100));
        assert_eq!(fake.count(|call| matches!(call, Call::PatchNote(..))), 0);
        app.on_tick(start + Duration::from_millis(500));
        let patches: Vec<Call> = fake
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::PatchNote(..)))
            .collect();
        assert_eq!(patches.len(), 1);
        assert_eq!(fake.stored(1).map(|n| n.contents), Some("hicontents of draft".into()));
        assert!(app
            .services()
            .log
            .last()
            .is_some_and(|e| e.message.starts_with("Note #1 contents saved at")));
    }

    #[test]
    fn failed_content_save_is_reported_once() {
        let (fake, mut app) = app_with(vec![fake_note(1, 0, "draft")]);
        let start = Instant::now();
        app.handle_key(key(KeyCode::Down, KeyModifiers::NONE), start);
        app.on_tick(start + Duration::from_millis(60));
        app.svc.settings.set_auto_view(false);
        app.handle_key(ctrl_alt(KeyCode::Char('e')), start);
        app.handle_key(key(KeyCode::Char('!'), KeyModifiers::NONE), start);
        fake.fail_with(Some(crate::gateway::GatewayError::Transport("offline".into())));

        app.on_tick(start + Duration::from_millis(500));
        let errors: Vec<&str> = app
            .services()
            .log
            .entries()
            .iter()
            .filter(|entry| entry.kind == crate::journaling::MessageKind::Error)
            .map(|entry| entry.message.as_str())
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error saving contents of note #1"));
        assert_matches::assert_matches!(app.autosave_status(), AutoSaveStatus::Error { note_id: 1, .. });
    }

    #[test]
    fn search_input_is_debounced() {
        let (fake, mut app) = app_with(vec![fake_note(1, 0, "rust"), fake_note(2, 0, "go")]);
        let start = Instant::now();
        app.handle_key(ctrl_alt(KeyCode::Char('f')), start);
        assert_eq!(app.focus(), Focus::Search);
        app.handle_key(key(KeyCode::Char('r'), KeyModifiers::NONE), start);
        app.handle_key(key(KeyCode::Char('u'), KeyModifiers::NONE), start + Duration::from_millis(100));
        app.on_tick(start + Duration::from_millis(500));
        assert_eq!(fake.count(|call| matches!(call, Call::Search(_))), 0);
        app.on_tick(start + Duration::from_millis(600));
        assert_eq!(fake.count(|call| matches!(call, Call::Search(_))), 1);
        assert_eq!(app.search().results(), &[1]);
        assert_eq!(app.visible_ids(), vec![1]);
    }

    #[test]
    fn delete_confirmation_overlay_controls_the_request() {
        let (fake, mut app) = app_with(vec![fake_note(1, 0, "root"), fake_note(2, 1, "leaf")]);
        let now = Instant::now();
        app.notes.select(2, SelectOptions::default(), &mut app.svc, now);

        app.handle_key(ctrl_alt(KeyCode::Char('d')), now);
        assert!(matches!(app.overlay(), Some(Overlay::ConfirmDelete { id: 2, .. })));
        app.handle_key(key(KeyCode::Esc, KeyModifiers::NONE), now);
        assert!(app.overlay().is_none());
        assert_eq!(fake.count(|call| matches!(call, Call::DeleteNote(_))), 0);

        app.handle_key(ctrl_alt(KeyCode::Char('d')), now);
        app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE), now);
        assert_eq!(fake.count(|call| matches!(call, Call::DeleteNote(2))), 1);
        assert_eq!(app.notes().current().id, 1);
    }

    #[test]
    fn add_form_creates_child_note() {
        let (fake, mut app) = app_with(vec![fake_note(1, 0, "root")]);
        let now = Instant::now();
        app.notes.select(1, SelectOptions::default(), &mut app.svc, now);
        app.handle_key(ctrl_alt(KeyCode::Char('c')), now);
        for ch in "todo".chars() {
            app.handle_key(key(KeyCode::Char(ch), KeyModifiers::NONE), now);
        }
        app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE), now);
        assert!(app.overlay().is_none());
        assert_eq!(fake.stored(2).map(|n| (n.parent_id, n.title)), Some((1, "todo".into())));
        assert_eq!(app.notes().current().id, 2);
    }

    #[test]
    fn shutdown_flushes_pending_saves() {
        let (fake, mut app) = app_with(vec![fake_note(1, 0, "draft")]);
        let now = Instant::now();
        app.notes.select(1, SelectOptions::default(), &mut app.svc, now);
        app.on_tick(now);
        app.auto_save.queue(1, "unsaved", Duration::from_secs(60), now);
        app.shutdown();
        assert_eq!(fake.stored(1).map(|n| n.contents), Some("unsaved".into()));
    }

    #[test]
    fn ctrl_q_quits_from_any_focus() {
        let (_fake, mut app) = app_with(vec![]);
        app.handle_key(key(KeyCode::Char('q'), KeyModifiers::CONTROL), Instant::now());
        assert!(app.should_quit());
    }
}
