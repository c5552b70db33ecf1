use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration problems reported before any I/O is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Address is required")]
    AddressRequired,
    #[error("Address must be a valid host name or IP address")]
    InvalidAddress,
    #[error("Port is required")]
    PortRequired,
    #[error("Port must be a valid number between 1 and 65535")]
    InvalidPort,
}

pub fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
