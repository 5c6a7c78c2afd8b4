use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::gateway::NoteGateway;
use crate::notes::NoteId;
use crate::scheduler::DebounceTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveStatus {
    Idle {
        last_saved_at: Option<OffsetDateTime>,
    },
    Pending {
        count: usize,
    },
    Error {
        note_id: NoteId,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveEvent {
    Saved { note_id: NoteId, date: i64 },
    Error { note_id: NoteId, message: String },
}

#[derive(Debug, Clone)]
struct AutoSaveFailure {
    note_id: NoteId,
    message: String,
}

/// Debounced content saves, one pending write per note. A newer edit of the
/// same note replaces the queued contents.
#[derive(Debug, Default)]
pub struct AutoSaveRuntime {
    pending: DebounceTable<NoteId, String>,
    last_saved_at: Option<OffsetDateTime>,
    last_error: Option<AutoSaveFailure>,
}

impl AutoSaveRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> AutoSaveStatus {
        if let Some(failure) = &self.last_error {
            return AutoSaveStatus::Error {
                note_id: failure.note_id,
                message: failure.message.clone(),
            };
        }
        if !self.pending.is_empty() {
            return AutoSaveStatus::Pending {
                count: self.pending.len(),
            };
        }
        AutoSaveStatus::Idle {
            last_saved_at: self.last_saved_at,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_pending(&self, note_id: NoteId) -> bool {
        self.pending.is_pending(&note_id)
    }

    pub fn queue(&mut self, note_id: NoteId, contents: &str, delay: Duration, now: Instant) {
        if note_id <= 0 {
            return;
        }
        if self
            .pending
            .schedule(note_id, contents.to_string(), delay, now)
            .is_some()
        {
            tracing::trace!(note_id, "coalesced pending autosave");
        }
        self.last_error = None;
    }

    pub fn poll(&mut self, gateway: &dyn NoteGateway, now: Instant) -> Vec<AutoSaveEvent> {
        let due = self.pending.take_due(now);
        self.write(gateway, due)
    }

    pub fn flush_now(&mut self, gateway: &dyn NoteGateway) -> Vec<AutoSaveEvent> {
        let all = self.pending.drain_all();
        self.write(gateway, all)
    }

    fn write(&mut self, gateway: &dyn NoteGateway, saves: Vec<(NoteId, String)>) -> Vec<AutoSaveEvent> {
        let mut events = Vec::with_capacity(saves.len());
        for (note_id, contents) in saves {
            match gateway.patch_contents(note_id, &contents) {
                Ok(saved) => {
                    self.last_saved_at = Some(OffsetDateTime::now_utc());
                    self.last_error = None;
                    events.push(AutoSaveEvent::Saved {
                        note_id,
                        date: saved.date,
                    });
                }
                Err(err) => {
                    let message = err.to_string();
                    self.last_error = Some(AutoSaveFailure {
                        note_id,
                        message: message.clone(),
                    });
                    events.push(AutoSaveEvent::Error { note_id, message });
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{fake_note, Call, FakeGateway};
    use crate::gateway::GatewayError;
    use crate::notes::SaveNote;
    use assert_matches::assert_matches;

    const DELAY: Duration = Duration::from_millis(500);

    #[test]
    fn edits_within_window_coalesce_into_one_patch() {
        let gateway = FakeGateway::with_notes(vec![fake_note(4, 0, "Draft")]);
        let mut runtime = AutoSaveRuntime::new();
        let start = Instant::now();

        runtime.queue(4, "a", DELAY, start);
        runtime.queue(4, "ab", DELAY, start + Duration::from_millis(200));
        assert_eq!(runtime.status(), AutoSaveStatus::Pending { count: 1 });
        assert!(runtime.poll(&gateway, start + Duration::from_millis(600)).is_empty());

        let events = runtime.poll(&gateway, start + Duration::from_millis(700));
        assert_matches!(events.as_slice(), [AutoSaveEvent::Saved { note_id: 4, .. }]);
        assert_eq!(gateway.calls(), vec![Call::PatchNote(4, SaveNote::contents_only("ab"))]);
        assert_eq!(gateway.stored(4).map(|n| n.contents), Some("ab".to_string()));
        assert_matches!(runtime.status(), AutoSaveStatus::Idle { last_saved_at: Some(_) });
    }

    #[test]
    fn separate_notes_save_independently() {
        let gateway = FakeGateway::with_notes(vec![fake_note(1, 0, "a"), fake_note(2, 0, "b")]);
        let mut runtime = AutoSaveRuntime::new();
        let now = Instant::now();
        runtime.queue(1, "one", DELAY, now);
        runtime.queue(2, "two", DELAY, now);
        let events = runtime.flush_now(&gateway);
        assert_eq!(events.len(), 2);
        assert!(!runtime.has_pending());
    }

    #[test]
    fn failures_are_reported_without_retry() {
        let gateway = FakeGateway::with_notes(vec![fake_note(1, 0, "a")]);
        gateway.fail_with(Some(GatewayError::Transport("offline".into())));
        let mut runtime = AutoSaveRuntime::new();
        let now = Instant::now();
        runtime.queue(1, "text", Duration::ZERO, now);

        let events = runtime.poll(&gateway, now);
        assert_matches!(events.as_slice(), [AutoSaveEvent::Error { note_id: 1, .. }]);
        assert_matches!(runtime.status(), AutoSaveStatus::Error { note_id: 1, .. });
        assert!(runtime.poll(&gateway, now + DELAY).is_empty());
        assert_eq!(gateway.calls().len(), 1);
    }

    #[test]
    fn placeholder_note_is_never_saved() {
        let mut runtime = AutoSaveRuntime::new();
        runtime.queue(0, "text", DELAY, Instant::now());
        assert!(!runtime.has_pending());
    }
}
