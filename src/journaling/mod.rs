pub mod autosave;
pub mod messages;

pub use autosave::{AutoSaveEvent, AutoSaveRuntime, AutoSaveStatus};
pub use messages::{format_timestamp, now_millis, LogEntry, MessageKind, MessageLog};
