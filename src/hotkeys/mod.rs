use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use indexmap::IndexMap;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const CTRL = 0b0001;
        const SHIFT = 0b0010;
        const ALT = 0b0100;
        const META = 0b1000;
    }
}

/// A key press expressed with browser-style key codes (`KeyA`, `Digit1`,
/// `ArrowUp`, `Backquote`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub code: String,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(code: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            code: code.into(),
            modifiers,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Option<Self> {
        let mut modifiers = Modifiers::empty();
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            modifiers |= Modifiers::CTRL;
        }
        if event.modifiers.contains(KeyModifiers::SHIFT) {
            modifiers |= Modifiers::SHIFT;
        }
        if event.modifiers.contains(KeyModifiers::ALT) {
            modifiers |= Modifiers::ALT;
        }
        if event
            .modifiers
            .intersects(KeyModifiers::SUPER | KeyModifiers::META)
        {
            modifiers |= Modifiers::META;
        }
        let code = match event.code {
            KeyCode::Char(ch) => {
                if ch.is_ascii_uppercase() {
                    modifiers |= Modifiers::SHIFT;
                }
                char_code(ch)?
            }
            KeyCode::Enter => "Enter".into(),
            KeyCode::Tab => "Tab".into(),
            KeyCode::BackTab => {
                modifiers |= Modifiers::SHIFT;
                "Tab".into()
            }
            KeyCode::Backspace => "Backspace".into(),
            KeyCode::Esc => "Escape".into(),
            KeyCode::Up => "ArrowUp".into(),
            KeyCode::Down => "ArrowDown".into(),
            KeyCode::Left => "ArrowLeft".into(),
            KeyCode::Right => "ArrowRight".into(),
            KeyCode::Home => "Home".into(),
            KeyCode::End => "End".into(),
            KeyCode::PageUp => "PageUp".into(),
            KeyCode::PageDown => "PageDown".into(),
            KeyCode::Delete => "Delete".into(),
            KeyCode::Insert => "Insert".into(),
            KeyCode::F(n) => format!("F{n}"),
            _ => return None,
        };
        Some(Self { code, modifiers })
    }
}

fn char_code(ch: char) -> Option<String> {
    if ch.is_ascii_alphabetic() {
        return Some(format!("Key{}", ch.to_ascii_uppercase()));
    }
    if ch.is_ascii_digit() {
        return Some(format!("Digit{ch}"));
    }
    let code = match ch {
        ' ' => "Space",
        '`' | '~' => "Backquote",
        '-' | '_' => "Minus",
        '=' | '+' => "Equal",
        '[' | '{' => "BracketLeft",
        ']' | '}' => "BracketRight",
        '\\' | '|' => "Backslash",
        ';' | ':' => "Semicolon",
        '\'' | '"' => "Quote",
        ',' | '<' => "Comma",
        '.' | '>' => "Period",
        '/' | '?' => "Slash",
        _ => return None,
    };
    Some(code.to_string())
}

const MODIFIER_CODES: [&str; 8] = [
    "ControlLeft",
    "ControlRight",
    "ShiftLeft",
    "ShiftRight",
    "AltLeft",
    "AltRight",
    "MetaLeft",
    "MetaRight",
];

const LOCK_CODES: [&str; 3] = ["NumLock", "CapsLock", "ScrollLock"];

const PLAIN_KEYS: [&str; 10] = [
    "Enter",
    "Space",
    "Backspace",
    "Tab",
    "Backquote",
    "Escape",
    "ArrowUp",
    "ArrowRight",
    "ArrowDown",
    "ArrowLeft",
];

/// Builds the hotkey string (`Ctrl+Shift+Alt+Meta+Key`) for a key press, or
/// `None` when the press cannot be a hotkey.
pub fn detect_hotkey(input: &KeyInput) -> Option<String> {
    let code = input.code.as_str();
    if MODIFIER_CODES.contains(&code) || LOCK_CODES.contains(&code) {
        return None;
    }
    let mut key = code;
    if let Some(letter) = code.strip_prefix("Key").filter(|rest| is_single(rest, |c| c.is_ascii_uppercase())) {
        key = letter;
    }
    if let Some(digit) = code.strip_prefix("Digit").filter(|rest| is_single(rest, |c| c.is_ascii_digit())) {
        key = digit;
    }
    if key == "NumpadEnter" {
        key = "Enter";
    }
    if input.modifiers.is_empty()
        && (PLAIN_KEYS.contains(&key) || is_single(key, |c| c.is_ascii_alphanumeric()))
    {
        return None;
    }
    let mut parts: Vec<&str> = Vec::with_capacity(5);
    for (flag, label) in [
        (Modifiers::CTRL, "Ctrl"),
        (Modifiers::SHIFT, "Shift"),
        (Modifiers::ALT, "Alt"),
        (Modifiers::META, "Meta"),
    ] {
        if input.modifiers.contains(flag) {
            parts.push(label);
        }
    }
    parts.push(key);
    Some(parts.join("+"))
}

fn is_single(text: &str, predicate: impl Fn(char) -> bool) -> bool {
    let mut chars = text.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if predicate(c))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
pub enum Action {
    #[strum(serialize = "general.homepage")]
    Homepage,
    #[strum(serialize = "general.message_log")]
    MessageLog,
    #[strum(serialize = "general.settings")]
    Settings,
    #[strum(serialize = "treeview.expand_all")]
    ExpandAll,
    #[strum(serialize = "treeview.collapse_all")]
    CollapseAll,
    #[strum(serialize = "treeview.multiline_toggle")]
    MultilineToggle,
    #[strum(serialize = "treeview.go_home")]
    GoHome,
    #[strum(serialize = "treeview.go_end")]
    GoEnd,
    #[strum(serialize = "treeview.go_up")]
    GoUp,
    #[strum(serialize = "treeview.go_down")]
    GoDown,
    #[strum(serialize = "treeview.go_parent")]
    GoParent,
    #[strum(serialize = "treeview.go_child")]
    GoChild,
    #[strum(serialize = "note.add_root")]
    AddRoot,
    #[strum(serialize = "note.add_near")]
    AddNear,
    #[strum(serialize = "note.add_child")]
    AddChild,
    #[strum(serialize = "note.edit")]
    EditNote,
    #[strum(serialize = "note.delete")]
    DeleteNote,
    #[strum(serialize = "note.favorite")]
    ToggleFavorite,
    #[strum(serialize = "view.sidebar")]
    ToggleSidebar,
    #[strum(serialize = "view.viewer")]
    ShowViewer,
    #[strum(serialize = "view.editor")]
    ShowEditor,
    #[strum(serialize = "view.toggle")]
    ToggleView,
    #[strum(serialize = "view.mode_default")]
    ModeDefault,
    #[strum(serialize = "view.mode_vertical")]
    ModeVertical,
    #[strum(serialize = "view.mode_horizontal")]
    ModeHorizontal,
    #[strum(serialize = "view.linewrap")]
    ToggleLineWrap,
    #[strum(serialize = "search.focus")]
    SearchFocus,
    #[strum(serialize = "search.clear")]
    SearchClear,
    #[strum(serialize = "search.title")]
    SearchTitle,
    #[strum(serialize = "search.whole")]
    SearchWhole,
    #[strum(serialize = "search.tree_mode")]
    SearchTreeMode,
    #[strum(serialize = "database.vacuum")]
    DatabaseVacuum,
}

impl Action {
    pub fn default_hotkey(self) -> &'static str {
        match self {
            Action::Homepage => "Ctrl+Alt+H",
            Action::MessageLog => "Ctrl+Alt+M",
            Action::Settings => "Ctrl+Alt+O",
            Action::ExpandAll => "Ctrl+Alt+ArrowRight",
            Action::CollapseAll => "Ctrl+Alt+ArrowLeft",
            Action::MultilineToggle => "Ctrl+Alt+X",
            Action::GoHome => "Ctrl+Alt+ArrowUp",
            Action::GoEnd => "Ctrl+Alt+ArrowDown",
            Action::GoUp => "Alt+ArrowUp",
            Action::GoDown => "Alt+ArrowDown",
            Action::GoParent => "Alt+ArrowLeft",
            Action::GoChild => "Alt+ArrowRight",
            Action::AddRoot => "Ctrl+Alt+R",
            Action::AddNear => "Ctrl+Alt+N",
            Action::AddChild => "Ctrl+Alt+C",
            Action::EditNote => "Ctrl+Alt+Q",
            Action::DeleteNote => "Ctrl+Alt+D",
            Action::ToggleFavorite => "Ctrl+Alt+B",
            Action::ToggleSidebar => "Ctrl+Alt+S",
            Action::ShowViewer => "Ctrl+Alt+V",
            Action::ShowEditor => "Ctrl+Alt+E",
            Action::ToggleView => "Ctrl+Space",
            Action::ModeDefault => "Ctrl+Alt+Backquote",
            Action::ModeVertical => "Ctrl+Alt+1",
            Action::ModeHorizontal => "Ctrl+Alt+2",
            Action::ToggleLineWrap => "Ctrl+Alt+L",
            Action::SearchFocus => "Ctrl+Alt+F",
            Action::SearchClear => "Ctrl+Alt+Z",
            Action::SearchTitle => "Ctrl+Alt+T",
            Action::SearchWhole => "Ctrl+Alt+W",
            Action::SearchTreeMode => "Ctrl+Alt+Y",
            Action::DatabaseVacuum => "Ctrl+Alt+Minus",
        }
    }
}

/// Hotkey string to action lookup.
#[derive(Debug, Clone)]
pub struct HotkeyMap {
    bindings: IndexMap<String, Action>,
}

impl Default for HotkeyMap {
    fn default() -> Self {
        let bindings = Action::iter()
            .map(|action| (action.default_hotkey().to_string(), action))
            .collect();
        Self { bindings }
    }
}

impl HotkeyMap {
    pub fn resolve(&self, hotkey: &str) -> Option<Action> {
        self.bindings.get(hotkey).copied()
    }

    pub fn resolve_input(&self, input: &KeyInput) -> Option<Action> {
        detect_hotkey(input).and_then(|hotkey| self.resolve(&hotkey))
    }

    pub fn binding(&self, action: Action) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, bound)| **bound == action)
            .map(|(hotkey, _)| hotkey.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Action)> {
        self.bindings
            .iter()
            .map(|(hotkey, action)| (hotkey.as_str(), *action))
    }
}
