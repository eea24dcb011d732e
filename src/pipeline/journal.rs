// Action journal
// Append-only JSONL record of every published action, for replay and
// diagnostics

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::bus::{ChannelSubscriber, EventBus, SubscriptionId};
use crate::events::ActionEvent;

/// Errors that can occur during journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// ISO 8601 wall-clock time the event was written
    pub recorded_at: String,

    pub event: ActionEvent,
}

impl JournalEntry {
    pub fn new(event: ActionEvent) -> Self {
        JournalEntry {
            recorded_at: Utc::now().to_rfc3339(),
            event,
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

pub struct ActionJournal {
    file_path: PathBuf,
}

impl ActionJournal {
    pub fn new(file_path: PathBuf) -> Self {
        ActionJournal { file_path }
    }

    /// Append one event; creates the file if it doesn't exist
    pub fn record(&self, event: &ActionEvent) -> Result<(), JournalError> {
        self.record_batch(std::slice::from_ref(event))
    }

    pub fn record_batch(&self, events: &[ActionEvent]) -> Result<(), JournalError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for event in events {
            let json_line = JournalEntry::new(event.clone()).to_json_line()?;
            file.write_all(json_line.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Subscribe to the bus's action topic and write events on a blocking
    /// thread
    ///
    /// The writer stops once the subscription is removed from the bus,
    /// returning how many events it wrote. Write failures are logged and
    /// skipped.
    pub fn attach(self, bus: &EventBus) -> (SubscriptionId, JoinHandle<usize>) {
        let (subscriber, mut receiver) = ChannelSubscriber::<ActionEvent>::channel();
        let id = bus.actions.subscribe(Arc::new(subscriber));

        let handle = tokio::task::spawn_blocking(move || {
            let mut written = 0;
            while let Some(event) = receiver.blocking_recv() {
                match self.record(&event) {
                    Ok(()) => written += 1,
                    Err(e) => log::warn!("Journal {}: {}", self.file_path.display(), e),
                }
            }
            written
        });

        (id, handle)
    }
}

/// Read journal entries from a JSONL file
pub fn read_journal(path: &Path) -> Result<Vec<JournalEntry>, JournalError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: JournalEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Action, SourceId};
    use tempfile::TempDir;

    fn event(action: Action, t: u64) -> ActionEvent {
        ActionEvent::new(action, SourceId::inertial(0), t)
    }

    #[test]
    fn test_journal_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let journal = ActionJournal::new(temp_dir.path().join("actions.jsonl"));

        let first = event(Action::Attack, 100);
        let second = event(Action::Parry, 250);
        journal.record(&first).unwrap();
        journal.record(&second).unwrap();

        let entries = read_journal(journal.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, first);
        assert_eq!(entries[1].event, second);
    }

    #[test]
    fn test_journal_batch_appends() {
        let temp_dir = TempDir::new().unwrap();
        let journal = ActionJournal::new(temp_dir.path().join("actions.jsonl"));

        journal.record(&event(Action::Jump, 0)).unwrap();
        journal
            .record_batch(&[event(Action::DashIn, 10), event(Action::Crouch, 20)])
            .unwrap();

        let actions: Vec<Action> = read_journal(journal.path())
            .unwrap()
            .into_iter()
            .map(|e| e.event.action)
            .collect();
        assert_eq!(actions, vec![Action::Jump, Action::DashIn, Action::Crouch]);
    }

    #[test]
    fn test_json_line_format() {
        let entry = JournalEntry::new(event(Action::WalkStep, 42));
        let json_line = entry.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));
        assert!(json_line.contains("\"walk_step\""));

        let parsed: JournalEntry = serde_json::from_str(json_line.trim()).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_journal(&temp_dir.path().join("absent.jsonl"));
        assert!(matches!(result, Err(JournalError::IoError(_))));
    }

    #[tokio::test]
    async fn test_attached_journal_records_bus_actions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("actions.jsonl");
        let bus = EventBus::new();

        let (id, writer) = ActionJournal::new(path.clone()).attach(&bus);
        let published = [event(Action::Attack, 10), event(Action::CombatArt, 200)];
        for e in &published {
            bus.actions.publish(e);
        }

        // Dropping the subscription closes the channel and ends the writer
        assert!(bus.actions.unsubscribe(id));
        assert_eq!(writer.await.unwrap(), 2);

        let entries = read_journal(&path).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.event.id).collect();
        assert_eq!(ids, vec![published[0].id, published[1].id]);
    }
}
