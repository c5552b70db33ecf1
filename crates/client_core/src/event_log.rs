use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use shared::{Command, LogEntry, LogKind};
use tracing::debug;
use uuid::Uuid;

const SERIALIZE_FAILURE_MARKER: &str = "Failed to serialize data";

/// Append-only record of everything that crossed the connection.
#[derive(Default)]
pub struct EventLog {
    entries: RwLock<Vec<LogEntry>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub kind: Option<LogKind>,
    pub search: Option<String>,
}

impl LogFilter {
    pub fn kind(kind: LogKind) -> Self {
        Self {
            kind: Some(kind),
            search: None,
        }
    }

    pub fn search(term: impl Into<String>) -> Self {
        Self {
            kind: None,
            search: Some(term.into()),
        }
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        if self.kind.is_some_and(|kind| kind != entry.kind) {
            return false;
        }

        let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) else {
            return true;
        };
        let needle = term.to_lowercase();
        if entry.message.to_lowercase().contains(&needle) {
            return true;
        }
        entry
            .data
            .as_ref()
            .is_some_and(|data| data.to_string().to_lowercase().contains(&needle))
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, kind: LogKind, message: impl Into<String>) -> Uuid {
        self.append_entry(kind, message, None, None)
    }

    pub fn append_data<T>(&self, kind: LogKind, message: impl Into<String>, data: &T) -> Uuid
    where
        T: Serialize + ?Sized,
    {
        self.append_entry(kind, message, Some(log_data(data)), None)
    }

    pub fn append_entry(
        &self,
        kind: LogKind,
        message: impl Into<String>,
        data: Option<Value>,
        command: Option<Command>,
    ) -> Uuid {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            data: data.filter(|value| !value.is_null()),
            command,
        };
        let id = entry.id;
        debug!(kind = %entry.kind, message = %entry.message, "log entry");
        self.entries.write().push(entry);
        id
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.append(LogKind::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.append(LogKind::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.append(LogKind::Error, message)
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<LogEntry> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn last(&self) -> Option<LogEntry> {
        self.entries.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn filter(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        let snapshot = self.entries();
        serde_json::to_string_pretty(&snapshot)
    }
}

pub fn log_data<T>(data: &T) -> Value
where
    T: Serialize + ?Sized,
{
    match serde_json::to_value(data) {
        Ok(Value::Null) => Value::Null,
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        Ok(Value::String(text)) => json!({ "value": text }),
        Ok(scalar) => json!({ "value": scalar.to_string() }),
        Err(_) => json!({ "error": SERIALIZE_FAILURE_MARKER }),
    }
}

#[cfg(test)]
#[path = "tests/event_log_tests.rs"]
mod tests;
