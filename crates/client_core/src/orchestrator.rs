use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use shared::{
    Command, CommandHistoryItem, ConnectionConfig, ConnectionState, LogEntry, LogKind,
    ValidationError,
};
use storage::KeyValueStore;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::Settings,
    connection::{ConnectionController, InboundEvent},
    error::ClientError,
    event_log::{log_data, EventLog, LogFilter},
    executor::CommandExecutor,
    history::CommandHistoryStore,
    transport::{MissingTransportFactory, TransportEvent, TransportFactory},
    translator::RemoteEvent,
};

/// The surface a UI drives: one connection, its log, and the command catalog.
pub struct Orchestrator {
    log: Arc<EventLog>,
    history: Arc<CommandHistoryStore>,
    connection: Arc<ConnectionController>,
    executor: CommandExecutor,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub async fn start(
        settings: Settings,
        factory: Arc<dyn TransportFactory>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Arc<Self> {
        let log = Arc::new(EventLog::new());
        let history = Arc::new(CommandHistoryStore::new(storage));
        let loaded = history.load().await;

        let (connection, inbound) =
            ConnectionController::new(factory, Arc::clone(&log), settings.connection.clone());
        let connection = Arc::new(connection);

        let event_loop = tokio::spawn(run_event_loop(
            inbound,
            Arc::clone(&log),
            Arc::clone(&connection),
        ));
        let auto_connect =
            connection.spawn_auto_connect(settings.auto_connect, settings.settle_delay);

        info!(
            history_items = loaded,
            auto_connect = settings.auto_connect,
            "orchestrator: started"
        );

        Arc::new(Self {
            executor: CommandExecutor::new(Arc::clone(&log), Arc::clone(&history)),
            log,
            history,
            connection,
            tasks: Mutex::new(vec![event_loop, auto_connect]),
        })
    }

    /// Starts with no transport backend. Every connect attempt fails.
    pub async fn start_without_transport(
        settings: Settings,
        storage: Arc<dyn KeyValueStore>,
    ) -> Arc<Self> {
        Self::start(settings, Arc::new(MissingTransportFactory), storage).await
    }

    pub fn get_frequent_commands(&self, limit: usize) -> Vec<CommandHistoryItem> {
        self.history.get_frequent(limit)
    }

    pub fn get_recent_commands(&self, limit: usize) -> Vec<CommandHistoryItem> {
        self.history.get_recent(limit)
    }

    pub fn total_lifetime_executions(&self) -> u64 {
        self.history.total_lifetime_executions()
    }

    pub fn session_executions(&self) -> u64 {
        self.history.session_executions()
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub async fn execute_command(&self, command: &Command) -> Result<Value, ClientError> {
        self.executor.execute(command, &self.connection).await
    }

    pub async fn rerun_log_entry(&self, entry_id: Uuid) -> Result<Value, ClientError> {
        let Some(entry) = self.log.get(entry_id) else {
            return Err(ClientError::LogEntryNotFound(entry_id));
        };
        let Some(command) = entry.command else {
            self.log.warning("Log entry has no command to rerun");
            return Err(ClientError::NotRerunnable(entry_id));
        };
        debug!(%entry_id, kind = %command.kind(), "orchestrator: rerunning log entry");
        self.execute_command(&command).await
    }

    pub async fn clear_history(&self) {
        self.history.clear_all().await;
        self.log.info("Command history cleared");
    }

    pub async fn reset_session_counts(&self) {
        self.history.clear_session_counts().await;
        self.log.info("Session counts reset");
    }

    pub fn clear_logs(&self) {
        self.log.clear();
    }

    pub fn export_logs(&self) -> Result<String, ClientError> {
        Ok(self.log.export_json()?)
    }

    pub async fn set_config(&self, config: ConnectionConfig) -> Result<(), ClientError> {
        self.connection.set_config(config).await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe_state()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    pub fn filter_logs(&self, kind: Option<LogKind>, search: Option<&str>) -> Vec<LogEntry> {
        self.log.filter(&LogFilter {
            kind,
            search: search.map(str::to_string),
        })
    }

    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.connection.validation_errors()
    }

    pub fn config(&self) -> ConnectionConfig {
        self.connection.config()
    }

    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn history(&self) -> &Arc<CommandHistoryStore> {
        &self.history
    }

    pub async fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.connection.disconnect().await;
        info!("orchestrator: shut down");
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Handles inbound transport notifications one at a time, in arrival order.
async fn run_event_loop(
    mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
    log: Arc<EventLog>,
    connection: Arc<ConnectionController>,
) {
    while let Some(InboundEvent { generation, event }) = inbound.recv().await {
        match event {
            TransportEvent::Event { name, payload } => {
                if !connection.is_current(generation) {
                    debug!(
                        generation,
                        event = %name,
                        "orchestrator: dropping event from stale transport"
                    );
                    continue;
                }
                let remote = RemoteEvent::parse(&name, &payload);
                debug!(
                    event = %name,
                    recognized = remote.is_recognized(),
                    "orchestrator: inbound event"
                );
                log.append_entry(
                    LogKind::Event,
                    remote.log_message(),
                    Some(log_data(&payload)),
                    remote.to_command(),
                );
            }
            TransportEvent::Closed { reason } => {
                connection.handle_remote_close(generation, reason).await;
            }
            TransportEvent::Error { message } => {
                connection.handle_transport_error(generation, &message);
            }
        }
    }
    debug!("orchestrator: inbound channel closed");
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
