use std::sync::Arc;

use serde_json::{json, Value};
use shared::{Command, CommandType, LogKind};
use tracing::{info, warn};

use crate::{
    connection::ConnectionController, error::ClientError, event_log::EventLog,
    history::CommandHistoryStore,
};

/// Dispatches commands over the controller's live transport and records each
/// dispatch in the history.
pub struct CommandExecutor {
    log: Arc<EventLog>,
    history: Arc<CommandHistoryStore>,
}

impl CommandExecutor {
    pub fn new(log: Arc<EventLog>, history: Arc<CommandHistoryStore>) -> Self {
        Self { log, history }
    }

    pub async fn execute(
        &self,
        command: &Command,
        connection: &ConnectionController,
    ) -> Result<Value, ClientError> {
        let Some(transport) = connection.live_transport() else {
            self.log.error("Cannot execute command: not connected to OBS");
            return Err(ClientError::NotConnected);
        };

        let kind = command.kind();
        if !kind.is_known() {
            warn!(kind = %kind, "executor: refusing unknown command type");
            self.log.warning(format!("Unknown command type: {kind}"));
            return Err(ClientError::UnknownCommand(kind.to_string()));
        }

        self.log.append_data(
            LogKind::Request,
            format!("Executing command: {}", command.description()),
            command.params(),
        );

        let params = if kind.is_parameterless() {
            None
        } else {
            Some(Value::Object(command.params().clone()))
        };
        let outcome = transport.call(kind.as_str(), params).await;
        self.history.add_execution(command).await;

        match outcome {
            Ok(response) => {
                info!(kind = %kind, "executor: command succeeded");
                self.log.append_data(LogKind::Info, success_message(command), &response);
                Ok(response)
            }
            Err(err) => {
                warn!(kind = %kind, "executor: command failed: {err}");
                self.log.append_data(
                    LogKind::Error,
                    format!("Failed to execute command: {}", command.description()),
                    &json!({ "error": err.to_string() }),
                );
                Err(ClientError::Transport(err))
            }
        }
    }
}

fn success_message(command: &Command) -> String {
    let scene = || command.param_str("sceneName").unwrap_or_default();
    let input = || command.param_str("inputName").unwrap_or_default();

    match command.kind() {
        CommandType::SetCurrentProgramScene => format!("Scene changed to: {}", scene()),
        CommandType::SetSceneItemEnabled => {
            let action = if command.param_bool("sceneItemEnabled").unwrap_or(false) {
                "shown"
            } else {
                "hidden"
            };
            format!("Scene item {action} in {}", scene())
        }
        CommandType::StartStream => "Stream started".into(),
        CommandType::StopStream => "Stream stopped".into(),
        CommandType::StartRecord => "Recording started".into(),
        CommandType::StopRecord => "Recording stopped".into(),
        CommandType::StartVirtualCam => "Virtual camera started".into(),
        CommandType::StopVirtualCam => "Virtual camera stopped".into(),
        CommandType::SetInputMute => {
            let status = if command.param_bool("inputMuted").unwrap_or(false) {
                "muted"
            } else {
                "unmuted"
            };
            format!("{} {status}", input())
        }
        CommandType::SetInputVolume => format!("Volume set for {}", input()),
        CommandType::CreateScene => format!("Scene created: {}", scene()),
        CommandType::RemoveScene => format!("Scene removed: {}", scene()),
        CommandType::Unknown(kind) => format!("Executed {kind}"),
    }
}

#[cfg(test)]
#[path = "tests/executor_tests.rs"]
mod tests;
