use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request kinds the client knows how to replay.
///
/// The string form is the obs-websocket request name, which is also what ends
/// up in persisted history. Anything outside the known set is kept verbatim in
/// `Unknown` so it can round-trip through storage and be refused at dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandType {
    SetCurrentProgramScene,
    SetSceneItemEnabled,
    StartStream,
    StopStream,
    StartRecord,
    StopRecord,
    StartVirtualCam,
    StopVirtualCam,
    SetInputMute,
    SetInputVolume,
    CreateScene,
    RemoveScene,
    Unknown(String),
}

impl CommandType {
    pub const KNOWN: [CommandType; 12] = [
        CommandType::SetCurrentProgramScene,
        CommandType::SetSceneItemEnabled,
        CommandType::StartStream,
        CommandType::StopStream,
        CommandType::StartRecord,
        CommandType::StopRecord,
        CommandType::StartVirtualCam,
        CommandType::StopVirtualCam,
        CommandType::SetInputMute,
        CommandType::SetInputVolume,
        CommandType::CreateScene,
        CommandType::RemoveScene,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            CommandType::SetCurrentProgramScene => "SetCurrentProgramScene",
            CommandType::SetSceneItemEnabled => "SetSceneItemEnabled",
            CommandType::StartStream => "StartStream",
            CommandType::StopStream => "StopStream",
            CommandType::StartRecord => "StartRecord",
            CommandType::StopRecord => "StopRecord",
            CommandType::StartVirtualCam => "StartVirtualCam",
            CommandType::StopVirtualCam => "StopVirtualCam",
            CommandType::SetInputMute => "SetInputMute",
            CommandType::SetInputVolume => "SetInputVolume",
            CommandType::CreateScene => "CreateScene",
            CommandType::RemoveScene => "RemoveScene",
            CommandType::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CommandType::Unknown(_))
    }

    /// Kinds that take no request data on the wire.
    pub fn is_parameterless(&self) -> bool {
        matches!(
            self,
            CommandType::StartStream
                | CommandType::StopStream
                | CommandType::StartRecord
                | CommandType::StopRecord
                | CommandType::StartVirtualCam
                | CommandType::StopVirtualCam
        )
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let known = CommandType::KNOWN
            .iter()
            .find(|kind| kind.as_str() == s)
            .cloned();
        Ok(known.unwrap_or_else(|| CommandType::Unknown(s.to_string())))
    }
}

impl From<String> for CommandType {
    fn from(value: String) -> Self {
        match value.parse::<CommandType>() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<CommandType> for String {
    fn from(value: CommandType) -> Self {
        match value {
            CommandType::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// A normalized, re-executable request.
///
/// Fields are private; a command is built once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    kind: CommandType,
    #[serde(default)]
    params: Map<String, Value>,
    description: String,
}

impl Command {
    pub fn new(
        kind: CommandType,
        params: Map<String, Value>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            params,
            description: description.into(),
        }
    }

    pub fn without_params(kind: CommandType, description: impl Into<String>) -> Self {
        Self::new(kind, Map::new(), description)
    }

    pub fn kind(&self) -> &CommandType {
        &self.kind
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Deduplication key: `<type>-<params as canonical JSON>`.
    ///
    /// Object keys are sorted recursively before encoding, so two commands
    /// built with the same params in a different insertion order share an
    /// identity.
    pub fn canonical_id(&self) -> String {
        let params = canonicalize(&Value::Object(self.params.clone()));
        format!("{}-{}", self.kind, params)
    }
}

/// Rebuilds `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key.clone(), canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
