//! Seam to the already-authenticated control-server connection.
//!
//! Framing and the authentication handshake live behind [`Transport`]; this
//! crate only opens, calls, listens and closes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Event { name: String, payload: Value },
    Closed { reason: Option<String> },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },
    #[error("request {method} failed: {message}")]
    Call { method: String, message: String },
    #[error("failed to close connection: {0}")]
    Disconnect(String),
    #[error("connection is closed")]
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolves once the connection is identified, or with the failure.
    async fn connect(&self, url: &str, password: Option<&str>) -> Result<(), TransportError>;
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError>;
    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Builds a fresh transport for every connection attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Transport>;
}

pub struct MissingTransportFactory;

impl TransportFactory for MissingTransportFactory {
    fn create(&self) -> Arc<dyn Transport> {
        Arc::new(MissingTransport::default())
    }
}

pub struct MissingTransport {
    events: broadcast::Sender<TransportEvent>,
}

impl Default for MissingTransport {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

#[async_trait]
impl Transport for MissingTransport {
    async fn connect(&self, url: &str, _password: Option<&str>) -> Result<(), TransportError> {
        Err(TransportError::Connect {
            url: url.to_string(),
            message: "no transport backend is configured".into(),
        })
    }

    async fn call(&self, _method: &str, _params: Option<Value>) -> Result<Value, TransportError> {
        Err(TransportError::Closed)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
