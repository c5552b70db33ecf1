pub mod domain;
pub mod error;
pub mod protocol;

pub use domain::{CommandHistoryItem, ConnectionConfig, ConnectionState, LogEntry, LogKind};
pub use error::ValidationError;
pub use protocol::{Command, CommandType};
