use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Host;
use uuid::Uuid;

use crate::{error::ValidationError, protocol::Command};

pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: &str = "4455";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to reach the control server. The port is kept as entered so that
/// validation can report on the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub address: String,
    pub port: String,
    #[serde(default)]
    pub password: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.into(),
            port: DEFAULT_PORT.into(),
            password: String::new(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(
        address: impl Into<String>,
        port: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port: port.into(),
            password: password.into(),
        }
    }

    /// Every problem with the config, in field order. Empty means valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let address = self.address.trim();
        if address.is_empty() {
            errors.push(ValidationError::AddressRequired);
        } else if Host::parse(address).is_err() {
            errors.push(ValidationError::InvalidAddress);
        }

        let port = self.port.trim();
        if port.is_empty() {
            errors.push(ValidationError::PortRequired);
        } else if parse_port(port).is_none() {
            errors.push(ValidationError::InvalidPort);
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.address.trim(), self.port.trim())
    }

    pub fn password(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(&self.password)
        }
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    match raw.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => u16::try_from(port).ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Info,
    Warning,
    Error,
    Event,
    Request,
    Response,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Warning => "warning",
            LogKind::Error => "error",
            LogKind::Event => "event",
            LogKind::Request => "request",
            LogKind::Response => "response",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
}

impl LogEntry {
    pub fn is_rerunnable(&self) -> bool {
        self.command.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandHistoryItem {
    pub id: String,
    pub command: Command,
    /// Absent in catalogs written before first-use tracking; see
    /// [`CommandHistoryItem::backfill_first_used`].
    #[serde(default)]
    pub first_used: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub use_count: u64,
    #[serde(default)]
    pub session_count: u64,
}

impl CommandHistoryItem {
    pub fn first_execution(command: Command, now: DateTime<Utc>) -> Self {
        Self {
            id: command.canonical_id(),
            command,
            first_used: now,
            last_used: now,
            use_count: 1,
            session_count: 1,
        }
    }

    pub fn record_execution(&mut self, now: DateTime<Utc>) {
        self.use_count = self.use_count.saturating_add(1);
        self.session_count = self.session_count.saturating_add(1);
        if now > self.last_used {
            self.last_used = now;
        }
    }

    pub fn description(&self) -> &str {
        self.command.description()
    }

    pub fn backfill_first_used(&mut self) {
        if self.first_used == DateTime::<Utc>::default() {
            self.first_used = self.last_used;
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
