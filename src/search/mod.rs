use std::time::{Duration, Instant};

use crate::gateway::{NoteGateway, SearchRequest};
use crate::journaling::MessageLog;
use crate::notes::NoteId;
use crate::scheduler::{DebounceTable, Slot};
use crate::settings::SearchSettings;

#[derive(Debug, Default)]
pub struct SearchState {
    pub text: String,
    pub mode: bool,
    pub loading: bool,
    pub not_found: bool,
    pub focused: bool,
    results: Vec<NoteId>,
    pending: DebounceTable<Slot, String>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_results(text: &str, results: Vec<NoteId>) -> Self {
        Self {
            text: text.to_string(),
            mode: !text.is_empty(),
            not_found: results.is_empty(),
            results,
            ..Self::default()
        }
    }

    /// Result ids in server order.
    pub fn results(&self) -> &[NoteId] {
        &self.results
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending(&Slot::Search)
    }

    fn toggle_mode(&mut self, text: &str) {
        self.mode = !text.is_empty();
        self.loading = self.mode;
        if !self.mode {
            self.results.clear();
        }
    }

    /// Updates the query text and schedules a debounced search for it.
    pub fn set_text(&mut self, text: impl Into<String>, delay: Duration, now: Instant) {
        let text = text.into();
        self.toggle_mode(&text);
        self.not_found = false;
        self.pending.schedule(Slot::Search, text.clone(), delay, now);
        self.text = text;
    }

    pub fn push_char(&mut self, ch: char, delay: Duration, now: Instant) {
        let mut text = self.text.clone();
        text.push(ch);
        self.set_text(text, delay, now);
    }

    pub fn pop_char(&mut self, delay: Duration, now: Instant) {
        let mut text = self.text.clone();
        if text.pop().is_some() {
            self.set_text(text, delay, now);
        }
    }

    /// Runs the debounced search once its delay has elapsed. Returns `true`
    /// when a search ran.
    pub fn poll(
        &mut self,
        gateway: &dyn NoteGateway,
        settings: &SearchSettings,
        log: &mut MessageLog,
        now: Instant,
    ) -> bool {
        let due = self.pending.take_due(now);
        let Some((_, query)) = due.into_iter().last() else {
            return false;
        };
        self.search(gateway, &query, settings, log);
        true
    }

    pub fn search(
        &mut self,
        gateway: &dyn NoteGateway,
        query: &str,
        settings: &SearchSettings,
        log: &mut MessageLog,
    ) {
        self.results.clear();
        self.not_found = false;
        if query.is_empty() {
            self.loading = false;
            return;
        }
        let request = SearchRequest {
            query: query.to_string(),
            title: settings.title,
            whole: settings.whole,
        };
        let response = gateway.search(&request);
        self.loading = false;
        match response {
            Ok(notes) => {
                self.results = notes.into_iter().map(|note| note.id).collect();
                self.not_found = self.results.is_empty();
                tracing::debug!(query, hits = self.results.len(), "search finished");
            }
            Err(err) => log.error(format!("Error searching '{query}': {err}")),
        }
    }

    /// Re-runs the current text immediately, e.g. after a search flag changed.
    pub fn execute(
        &mut self,
        gateway: &dyn NoteGateway,
        settings: &SearchSettings,
        log: &mut MessageLog,
    ) {
        self.pending.cancel(&Slot::Search);
        let query = self.text.clone();
        self.search(gateway, &query, settings, log);
    }

    pub fn clear(&mut self) {
        self.pending.cancel(&Slot::Search);
        self.text.clear();
        self.toggle_mode("");
        self.not_found = false;
        self.focused = false;
    }
}
