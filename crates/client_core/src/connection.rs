use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use shared::{error::join_messages, ConnectionConfig, ConnectionState, LogKind, ValidationError};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    event_log::EventLog,
    transport::{Transport, TransportEvent, TransportFactory},
};

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

struct ActiveTransport {
    transport: Arc<dyn Transport>,
    generation: u64,
    event_task: JoinHandle<()>,
}

/// Owns at most one live transport and the state machine around it.
pub struct ConnectionController {
    factory: Arc<dyn TransportFactory>,
    log: Arc<EventLog>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
    // Held for the whole of connect/disconnect so a new transport is only
    // installed after the previous one finished tearing down.
    connection_lock: tokio::sync::Mutex<()>,
    active: Mutex<Option<ActiveTransport>>,
    state: watch::Sender<ConnectionState>,
    config: RwLock<ConnectionConfig>,
    validation_errors: RwLock<Vec<ValidationError>>,
    generation: AtomicU64,
}

impl ConnectionController {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        log: Arc<EventLog>,
        config: ConnectionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let controller = Self {
            factory,
            log,
            inbound,
            connection_lock: tokio::sync::Mutex::new(()),
            active: Mutex::new(None),
            state,
            config: RwLock::new(config),
            validation_errors: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
        };
        (controller, inbound_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> ConnectionConfig {
        self.config.read().clone()
    }

    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.validation_errors.read().clone()
    }

    pub async fn set_config(&self, config: ConnectionConfig) -> Result<(), ClientError> {
        let _guard = self.connection_lock.lock().await;
        if matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Err(ClientError::ConfigLocked);
        }

        *self.validation_errors.write() = config.validate();
        debug!(url = %config.ws_url(), "connection: config updated");
        *self.config.write() = config;
        Ok(())
    }

    pub fn live_transport(&self) -> Option<Arc<dyn Transport>> {
        if self.state() != ConnectionState::Connected {
            return None;
        }
        self.active
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.transport))
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        let _guard = self.connection_lock.lock().await;
        self.connect_locked().await
    }

    pub async fn disconnect(&self) {
        let _guard = self.connection_lock.lock().await;

        let Some(active) = self.take_active() else {
            if self.state() != ConnectionState::Disconnected {
                self.set_state(ConnectionState::Disconnected);
                self.log.info("Disconnected from OBS");
            } else {
                debug!("connection: disconnect requested with no live transport");
            }
            return;
        };

        active.event_task.abort();
        let outcome = active.transport.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        match outcome {
            Ok(()) => {
                info!(generation = active.generation, "connection: disconnected");
                self.log.info("Disconnected from OBS");
            }
            Err(err) => {
                warn!(generation = active.generation, "connection: teardown failed: {err}");
                self.log.append_data(
                    LogKind::Warning,
                    "Error during disconnect",
                    &json!({ "error": err.to_string() }),
                );
            }
        }
    }

    /// Connects once if the policy allows it and nothing else has already
    /// started a connection.
    pub async fn auto_connect(&self, enabled: bool) {
        if !enabled {
            info!("connection: automatic connection disabled");
            self.log.info("Automatic connection disabled by configuration");
            return;
        }

        let _guard = self.connection_lock.lock().await;
        let state = self.state();
        if state != ConnectionState::Disconnected {
            debug!(%state, "connection: skipping automatic connection");
            return;
        }

        let errors = self.config.read().validate();
        if !errors.is_empty() {
            warn!(
                "connection: automatic connection skipped: {}",
                join_messages(&errors)
            );
            *self.validation_errors.write() = errors;
            self.log.warning("Automatic connection skipped due to configuration issues");
            return;
        }

        self.log.info("Attempting automatic connection...");
        // Already logged and reflected in the state.
        let _ = self.connect_locked().await;
    }

    pub fn spawn_auto_connect(self: &Arc<Self>, enabled: bool, delay: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.auto_connect(enabled).await;
        })
    }

    pub async fn handle_remote_close(&self, generation: u64, reason: Option<String>) {
        let _guard = self.connection_lock.lock().await;
        let active = {
            let mut slot = self.active.lock();
            if slot.as_ref().is_some_and(|active| active.generation == generation) {
                slot.take()
            } else {
                None
            }
        };
        let Some(active) = active else {
            debug!(generation, "connection: ignoring close from stale transport");
            return;
        };

        active.event_task.abort();
        self.set_state(ConnectionState::Disconnected);
        warn!(generation, reason = ?reason, "connection: closed by remote");
        match reason {
            Some(reason) => self.log.append_data(
                LogKind::Warning,
                "WebSocket connection closed",
                &json!({ "reason": reason }),
            ),
            None => self.log.warning("WebSocket connection closed"),
        };
    }

    pub fn handle_transport_error(&self, generation: u64, message: &str) {
        if !self.is_current(generation) {
            debug!(generation, "connection: ignoring error from stale transport");
            return;
        }
        warn!(generation, "connection: transport error: {message}");
        self.log.append_data(
            LogKind::Error,
            "Connection error",
            &json!({ "error": message }),
        );
    }

    async fn connect_locked(&self) -> Result<(), ClientError> {
        let config = self.config();
        let errors = config.validate();
        if !errors.is_empty() {
            let joined = join_messages(&errors);
            warn!("connection: refusing to connect: {joined}");
            *self.validation_errors.write() = errors.clone();
            self.log.error(format!("Configuration validation failed: {joined}"));
            return Err(ClientError::Validation(errors));
        }
        self.validation_errors.write().clear();

        if let Some(previous) = self.take_active() {
            previous.event_task.abort();
            match previous.transport.disconnect().await {
                Ok(()) => {
                    self.log.info("Disconnecting existing connection...");
                }
                Err(err) => {
                    warn!(
                        generation = previous.generation,
                        "connection: failed to tear down previous transport: {err}"
                    );
                    self.log.append_data(
                        LogKind::Warning,
                        "Error disconnecting existing connection",
                        &json!({ "error": err.to_string() }),
                    );
                }
            }
            self.set_state(ConnectionState::Disconnected);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let transport = self.factory.create();
        let event_task = self.spawn_event_pump(generation, &transport);
        *self.active.lock() = Some(ActiveTransport {
            transport: Arc::clone(&transport),
            generation,
            event_task,
        });

        let url = config.ws_url();
        self.set_state(ConnectionState::Connecting);
        info!(%url, generation, "connection: connecting");
        self.log.info(format!("Attempting to connect to {url}"));

        match transport.connect(&url, config.password()).await {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                info!(%url, generation, "connection: connected");
                self.log.info("Successfully connected to OBS");
                Ok(())
            }
            Err(err) => {
                if let Some(failed) = self.take_active() {
                    failed.event_task.abort();
                }
                self.set_state(ConnectionState::Error);
                warn!(%url, generation, "connection: connect failed: {err}");
                self.log.append_data(
                    LogKind::Error,
                    "Failed to connect to OBS",
                    &json!({ "error": err.to_string() }),
                );
                Err(ClientError::Transport(err))
            }
        }
    }

    fn spawn_event_pump(&self, generation: u64, transport: &Arc<dyn Transport>) -> JoinHandle<()> {
        let mut events = transport.subscribe_events();
        let inbound = self.inbound.clone();
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(generation, skipped, "connection: dropped lagging transport events");
                        continue;
                    }
                    Err(RecvError::Closed) => TransportEvent::Closed { reason: None },
                };
                let closed = matches!(event, TransportEvent::Closed { .. });
                if inbound.send(InboundEvent { generation, event }).is_err() || closed {
                    break;
                }
            }
        })
    }

    fn take_active(&self) -> Option<ActiveTransport> {
        self.active.lock().take()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "connection: state changed");
        }
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.event_task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
