use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use parking_lot::Mutex;
use shared::{Command, CommandHistoryItem};
use storage::KeyValueStore;
use tracing::{debug, info, warn};

pub const HISTORY_STORAGE_KEY: &str = "obs-listener-command-history";

/// Usage-ranked catalog of executed commands, one item per canonical identity.
pub struct CommandHistoryStore {
    storage: Arc<dyn KeyValueStore>,
    items: Mutex<Vec<CommandHistoryItem>>,
    // Serializes snapshot + write so storage sees mutations in order.
    persist_lock: tokio::sync::Mutex<()>,
}

impl CommandHistoryStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            items: Mutex::new(Vec::new()),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn load(&self) -> usize {
        let _persist = self.persist_lock.lock().await;

        let raw = match self.storage.get(HISTORY_STORAGE_KEY).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("history: failed to read persisted command history: {err:#}");
                None
            }
        };

        let loaded = match raw.as_deref().map(serde_json::from_str::<Vec<CommandHistoryItem>>) {
            None => Vec::new(),
            Some(Ok(items)) => items,
            Some(Err(err)) => {
                warn!("history: discarding corrupt command history: {err}");
                Vec::new()
            }
        };

        let mut items = merge_by_canonical_id(loaded);
        for item in &mut items {
            item.session_count = 0;
        }

        let count = items.len();
        *self.items.lock() = items;
        info!(items = count, "history: loaded command history");
        count
    }

    pub async fn add_execution(&self, command: &Command) -> CommandHistoryItem {
        let _persist = self.persist_lock.lock().await;
        let now = Utc::now();
        let id = command.canonical_id();

        let (updated, snapshot) = {
            let mut items = self.items.lock();
            let updated = match items.iter_mut().find(|item| item.id == id) {
                Some(existing) => {
                    existing.record_execution(now);
                    existing.clone()
                }
                None => {
                    let created = CommandHistoryItem::first_execution(command.clone(), now);
                    items.push(created.clone());
                    created
                }
            };
            (updated, items.clone())
        };

        debug!(
            id = %updated.id,
            use_count = updated.use_count,
            session_count = updated.session_count,
            "history: recorded execution"
        );
        self.persist(&snapshot).await;
        updated
    }

    pub async fn clear_all(&self) {
        let _persist = self.persist_lock.lock().await;
        self.items.lock().clear();
        if let Err(err) = self.storage.remove(HISTORY_STORAGE_KEY).await {
            warn!("history: failed to clear persisted command history: {err:#}");
        }
    }

    pub async fn clear_session_counts(&self) {
        let _persist = self.persist_lock.lock().await;
        let snapshot = {
            let mut items = self.items.lock();
            for item in items.iter_mut() {
                item.session_count = 0;
            }
            items.clone()
        };
        self.persist(&snapshot).await;
    }

    pub fn get_frequent(&self, limit: usize) -> Vec<CommandHistoryItem> {
        let mut sorted = self.items();
        sorted.sort_by(|a, b| b.use_count.cmp(&a.use_count));
        sorted.truncate(limit);
        sorted
    }

    pub fn get_recent(&self, limit: usize) -> Vec<CommandHistoryItem> {
        let mut sorted = self.items();
        sorted.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        sorted.truncate(limit);
        sorted
    }

    pub fn get(&self, id: &str) -> Option<CommandHistoryItem> {
        self.items.lock().iter().find(|item| item.id == id).cloned()
    }

    pub fn items(&self) -> Vec<CommandHistoryItem> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn total_lifetime_executions(&self) -> u64 {
        self.items.lock().iter().map(|item| item.use_count).sum()
    }

    pub fn session_executions(&self) -> u64 {
        self.items.lock().iter().map(|item| item.session_count).sum()
    }

    async fn persist(&self, snapshot: &[CommandHistoryItem]) {
        let encoded = match serde_json::to_string(snapshot) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("history: failed to encode command history: {err}");
                return;
            }
        };
        if let Err(err) = self.storage.set(HISTORY_STORAGE_KEY, &encoded).await {
            warn!("history: failed to persist command history: {err:#}");
        }
    }
}

fn merge_by_canonical_id(items: Vec<CommandHistoryItem>) -> Vec<CommandHistoryItem> {
    let mut merged: Vec<CommandHistoryItem> = Vec::with_capacity(items.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for mut item in items {
        item.id = item.command.canonical_id();
        item.backfill_first_used();
        match positions.get(&item.id) {
            Some(&index) => {
                let Some(existing) = merged.get_mut(index) else {
                    continue;
                };
                existing.use_count = existing.use_count.saturating_add(item.use_count);
                existing.first_used = existing.first_used.min(item.first_used);
                if item.last_used > existing.last_used {
                    existing.last_used = item.last_used;
                    existing.command = item.command;
                }
            }
            None => {
                positions.insert(item.id.clone(), merged.len());
                merged.push(item);
            }
        }
    }

    merged
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
