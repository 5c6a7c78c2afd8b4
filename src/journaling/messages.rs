use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

const TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the UNIX epoch.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
}

impl LogEntry {
    pub fn format(&self) -> String {
        format!(
            "[{}] [{}] {}",
            format_timestamp(self.timestamp),
            self.kind,
            self.message
        )
    }
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn format_timestamp(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|dt| {
            dt.format(&format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .ok()
        })
        .unwrap_or_default()
}

/// User-facing message history. Every entry is mirrored into `tracing`.
#[derive(Debug)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    max_entries: usize,
    path: Option<PathBuf>,
    open: bool,
}

impl MessageLog {
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
            path: None,
            open: false,
        }
    }

    /// Opens the persisted history at `path`. A missing or unreadable file
    /// starts an empty history.
    pub fn load(path: PathBuf, max_entries: usize) -> Self {
        let entries = match fs::read(&path) {
            Ok(raw) => serde_json::from_slice::<Vec<LogEntry>>(&raw).unwrap_or_else(|err| {
                tracing::warn!(?err, "discarding unreadable message log {}", path.display());
                Vec::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                tracing::warn!(?err, "failed to read message log {}", path.display());
                Vec::new()
            }
        };
        let mut log = Self {
            entries,
            max_entries: max_entries.max(1),
            path: Some(path),
            open: false,
        };
        log.trim();
        log
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn add(&mut self, kind: MessageKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            MessageKind::Info => tracing::info!(target: "notetree::messages", "{message}"),
            MessageKind::Warning => tracing::warn!(target: "notetree::messages", "{message}"),
            MessageKind::Error => tracing::error!(target: "notetree::messages", "{message}"),
        }
        self.entries.push(LogEntry {
            timestamp: now_millis(),
            kind,
            message,
        });
        self.trim();
        self.persist();
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.add(MessageKind::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.add(MessageKind::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.add(MessageKind::Error, message);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    fn trim(&mut self) {
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = write_entries(path, &self.entries) {
            tracing::warn!(?err, "failed to persist message log");
        }
    }
}

fn write_entries(path: &Path, entries: &[LogEntry]) -> Result<()> {
    let json = serde_json::to_vec_pretty(entries).context("serialising message log")?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("ensuring message log dir {}", dir.display()))?;
    }
    let tmp_path = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp_path, &json)
        .with_context(|| format!("writing temporary message log {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("persisting message log {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn history_is_bounded() {
        let mut log = MessageLog::in_memory(3);
        for i in 0..5 {
            log.info(format!("message {i}"));
        }
        let messages: Vec<_> = log.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(log.last().map(|e| e.kind), Some(MessageKind::Info));
    }

    #[test]
    fn entries_persist_across_reopen() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("state").join("messages.json");
        {
            let mut log = MessageLog::load(path.clone(), 100);
            log.warning("Note deleted: [3] Draft");
            log.error("boom");
        }
        let log = MessageLog::load(path.clone(), 100);
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].kind, MessageKind::Warning);
        assert!(!path.with_extension(TMP_EXTENSION).exists());
        Ok(())
    }

    #[test]
    fn corrupt_history_starts_empty() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("messages.json");
        fs::write(&path, b"{ not json")?;
        let log = MessageLog::load(path, 100);
        assert!(log.entries().is_empty());
        Ok(())
    }

    #[test]
    fn entry_format_matches_log_view() {
        let entry = LogEntry {
            timestamp: 1_700_000_000_000,
            kind: MessageKind::Error,
            message: "Note 4 is not found!".into(),
        };
        insta::assert_snapshot!(entry.format(), @"[2023-11-14 22:13:20] [error] Note 4 is not found!");
    }
}
