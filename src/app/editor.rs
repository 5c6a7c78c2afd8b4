use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::notes::NoteId;

const MAX_HISTORY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    Insert(char),
    Newline,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    WordLeft,
    WordRight,
    Undo,
    Redo,
}

impl EditCommand {
    /// Maps an editor key press. Keys carrying Alt or Meta are left for the
    /// hotkey layer.
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key
            .modifiers
            .intersects(KeyModifiers::ALT | KeyModifiers::SUPER | KeyModifiers::META)
        {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let command = match key.code {
            KeyCode::Char('z') if ctrl => EditCommand::Undo,
            KeyCode::Char('y') if ctrl => EditCommand::Redo,
            KeyCode::Left if ctrl => EditCommand::WordLeft,
            KeyCode::Right if ctrl => EditCommand::WordRight,
            KeyCode::Char(_) if ctrl => return None,
            KeyCode::Char(ch) => EditCommand::Insert(ch),
            KeyCode::Tab => EditCommand::Insert('\t'),
            KeyCode::Enter => EditCommand::Newline,
            KeyCode::Backspace => EditCommand::Backspace,
            KeyCode::Delete => EditCommand::Delete,
            KeyCode::Left => EditCommand::Left,
            KeyCode::Right => EditCommand::Right,
            KeyCode::Up => EditCommand::Up,
            KeyCode::Down => EditCommand::Down,
            KeyCode::Home => EditCommand::Home,
            KeyCode::End => EditCommand::End,
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Changed,
    Moved,
    Ignored,
}

/// Text buffer bound to one note. Cursor positions are byte offsets on
/// grapheme boundaries.
#[derive(Debug, Clone)]
pub struct EditorState {
    note_id: NoteId,
    buffer: String,
    cursor: usize,
    preferred_column: Option<usize>,
    history: Vec<String>,
    history_index: usize,
}

impl EditorState {
    pub fn open(note_id: NoteId, contents: &str) -> Self {
        Self {
            note_id,
            buffer: contents.to_string(),
            cursor: 0,
            preferred_column: None,
            history: vec![contents.to_string()],
            history_index: 0,
        }
    }

    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Re-binds the editor when the current note or its loaded contents
    /// differ from what is being edited. Returns `true` when it reset.
    pub fn sync(&mut self, note_id: NoteId, contents: &str) -> bool {
        if self.note_id == note_id && self.buffer == contents {
            return false;
        }
        if self.note_id == note_id && self.history.len() > 1 {
            return false;
        }
        *self = Self::open(note_id, contents);
        true
    }

    pub fn apply(&mut self, command: EditCommand) -> EditOutcome {
        let before = self.cursor;
        let changed = match command {
            EditCommand::Insert(ch) => {
                self.insert(ch);
                true
            }
            EditCommand::Newline => {
                self.insert('\n');
                self.preferred_column = Some(0);
                true
            }
            EditCommand::Backspace => self.backspace(),
            EditCommand::Delete => self.delete(),
            EditCommand::Undo => self.step_history(false),
            EditCommand::Redo => self.step_history(true),
            EditCommand::Left => {
                self.cursor = prev_grapheme_boundary(&self.buffer, self.cursor);
                self.preferred_column = None;
                false
            }
            EditCommand::Right => {
                self.cursor = next_grapheme_boundary(&self.buffer, self.cursor);
                self.preferred_column = None;
                false
            }
            EditCommand::Home => {
                self.cursor = line_start(&self.buffer, self.cursor);
                self.preferred_column = Some(0);
                false
            }
            EditCommand::End => {
                self.cursor = line_end(&self.buffer, self.cursor);
                self.preferred_column = None;
                false
            }
            EditCommand::Up => {
                self.move_vertically(false);
                false
            }
            EditCommand::Down => {
                self.move_vertically(true);
                false
            }
            EditCommand::WordLeft => {
                self.cursor = word_left(&self.buffer, self.cursor);
                self.preferred_column = None;
                false
            }
            EditCommand::WordRight => {
                self.cursor = word_right(&self.buffer, self.cursor);
                self.preferred_column = None;
                false
            }
        };
        if changed {
            EditOutcome::Changed
        } else if self.cursor != before {
            EditOutcome::Moved
        } else {
            EditOutcome::Ignored
        }
    }

    /// Zero-based line and display column of the cursor.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let head = &self.buffer[..self.cursor];
        let line = head.matches('\n').count();
        let start = line_start(&self.buffer, self.cursor);
        (line, self.buffer[start..self.cursor].width())
    }

    fn insert(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.preferred_column = None;
        self.record_history();
    }

    fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        self.record_history();
        true
    }

    fn delete(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.buffer.drain(self.cursor..next);
        self.preferred_column = None;
        self.record_history();
        true
    }

    fn move_vertically(&mut self, down: bool) {
        let start = line_start(&self.buffer, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, start, self.cursor));
        let target = if down {
            let end = line_end(&self.buffer, self.cursor);
            if end == self.buffer.len() {
                self.buffer.len()
            } else {
                position_for_column(&self.buffer, end + 1, column)
            }
        } else if start == 0 {
            0
        } else {
            let prev_start = line_start(&self.buffer, start - 1);
            position_for_column(&self.buffer, prev_start, column)
        };
        self.cursor = target;
        self.preferred_column = Some(column);
    }

    fn record_history(&mut self) {
        if self
            .history
            .get(self.history_index)
            .is_some_and(|current| *current == self.buffer)
        {
            return;
        }
        self.history.truncate(self.history_index + 1);
        self.history.push(self.buffer.clone());
        if self.history.len() > MAX_HISTORY {
            let overflow = self.history.len() - MAX_HISTORY;
            self.history.drain(..overflow);
        }
        self.history_index = self.history.len() - 1;
    }

    fn step_history(&mut self, forward: bool) -> bool {
        let target = if forward {
            self.history_index + 1
        } else {
            match self.history_index.checked_sub(1) {
                Some(index) => index,
                None => return false,
            }
        };
        let Some(snapshot) = self.history.get(target).cloned() else {
            return false;
        };
        self.history_index = target;
        self.buffer = snapshot;
        self.cursor = self.cursor.min(self.buffer.len());
        while !self.buffer.is_char_boundary(self.cursor) {
            self.cursor -= 1;
        }
        self.preferred_column = None;
        true
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .next_back()
        .map_or(0, |(idx, _)| idx)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map_or(text.len(), |grapheme| cursor + grapheme.len())
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map_or(0, |idx| idx + 1)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..].find('\n').map_or(text.len(), |idx| cursor + idx)
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let end = line_end(text, line_start);
    text[line_start..end]
        .grapheme_indices(true)
        .nth(column)
        .map_or(end, |(idx, _)| line_start + idx)
}

fn is_blank(grapheme: &str) -> bool {
    grapheme.trim().is_empty()
}

fn word_left(text: &str, cursor: usize) -> usize {
    let mut idx = cursor;
    let mut seen_word = false;
    while idx > 0 {
        let prev = prev_grapheme_boundary(text, idx);
        let blank = is_blank(&text[prev..idx]);
        if blank && seen_word {
            break;
        }
        seen_word |= !blank;
        idx = prev;
    }
    idx
}

fn word_right(text: &str, cursor: usize) -> usize {
    let mut idx = cursor;
    let mut seen_blank = false;
    while idx < text.len() {
        let next = next_grapheme_boundary(text, idx);
        let blank = is_blank(&text[idx..next]);
        if !blank && seen_blank {
            break;
        }
        seen_blank |= blank;
        idx = next;
    }
    idx
}
