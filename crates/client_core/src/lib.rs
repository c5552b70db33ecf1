//! Client-side session orchestration for an OBS websocket listener.
//!
//! Inbound events are logged and, when they describe a state change, turned
//! into commands that can be replayed later. Every replay or manual command is
//! tracked in a persisted, usage-ranked history.

pub mod config;
pub mod connection;
pub mod error;
pub mod event_log;
pub mod executor;
pub mod history;
pub mod orchestrator;
pub mod transport;
pub mod translator;

pub use config::{ConfigSource, MapConfigSource, Settings, TomlConfigSource};
pub use connection::{ConnectionController, InboundEvent};
pub use error::ClientError;
pub use event_log::{EventLog, LogFilter};
pub use executor::CommandExecutor;
pub use history::{CommandHistoryStore, HISTORY_STORAGE_KEY};
pub use orchestrator::Orchestrator;
pub use transport::{
    MissingTransportFactory, Transport, TransportError, TransportEvent, TransportFactory,
};
pub use translator::{translate, RemoteEvent};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
