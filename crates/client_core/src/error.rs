use shared::{error::join_messages, ValidationError};
use thiserror::Error;
use uuid::Uuid;

use crate::transport::TransportError;

/// Failures returned to the caller. Each one has also been written to the
/// event log by the time it is returned.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid connection config: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),
    #[error("not connected to OBS")]
    NotConnected,
    #[error("unknown command type: {0}")]
    UnknownCommand(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("connection config can only change while disconnected")]
    ConfigLocked,
    #[error("no log entry with id {0}")]
    LogEntryNotFound(Uuid),
    #[error("log entry {0} has no rerunnable command")]
    NotRerunnable(Uuid),
    #[error("failed to serialize logs: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}
