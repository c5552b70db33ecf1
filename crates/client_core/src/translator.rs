//! Maps server-pushed events onto replayable commands.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared::{Command, CommandType};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputState {
    pub output_active: bool,
    #[serde(default)]
    pub output_state: String,
}

impl OutputState {
    fn describe(&self, subject: &str) -> String {
        let verb = if self.output_active { "started" } else { "stopped" };
        if self.output_state.is_empty() {
            format!("{subject} {verb}")
        } else {
            format!("{subject} {verb} ({})", self.output_state)
        }
    }
}

/// The events this client understands, keyed by their obs-websocket name.
///
/// Anything else, including a known name whose payload is missing required
/// fields, becomes [`RemoteEvent::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "eventType", content = "eventData")]
pub enum RemoteEvent {
    #[serde(rename_all = "camelCase")]
    CurrentProgramSceneChanged { scene_name: String },
    #[serde(rename_all = "camelCase")]
    SceneCreated { scene_name: String },
    #[serde(rename_all = "camelCase")]
    SceneRemoved { scene_name: String },
    #[serde(rename_all = "camelCase")]
    SceneItemEnableStateChanged {
        scene_name: String,
        scene_item_id: i64,
        scene_item_enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    SceneItemCreated { scene_name: String },
    #[serde(rename_all = "camelCase")]
    SceneItemRemoved { scene_name: String },
    StreamStateChanged(OutputState),
    RecordStateChanged(OutputState),
    VirtualcamStateChanged(OutputState),
    #[serde(rename_all = "camelCase")]
    InputCreated {
        input_name: String,
        #[serde(default)]
        input_kind: String,
    },
    #[serde(rename_all = "camelCase")]
    InputRemoved { input_name: String },
    #[serde(rename_all = "camelCase")]
    InputMuteStateChanged { input_name: String, input_muted: bool },
    #[serde(rename_all = "camelCase")]
    InputVolumeChanged {
        input_name: String,
        input_volume_mul: f64,
        input_volume_db: f64,
    },
    #[serde(rename_all = "camelCase")]
    MediaInputPlaybackStarted { input_name: String },
    #[serde(rename_all = "camelCase")]
    MediaInputPlaybackEnded { input_name: String },
    #[serde(skip_deserializing)]
    Unrecognized { name: String },
}

impl RemoteEvent {
    pub fn parse(name: &str, payload: &Value) -> Self {
        let tagged = json!({ "eventType": name, "eventData": payload });
        serde_json::from_value(tagged).unwrap_or_else(|_| RemoteEvent::Unrecognized {
            name: name.to_string(),
        })
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, RemoteEvent::Unrecognized { .. })
    }

    /// Human-readable summary written to the event log.
    pub fn log_message(&self) -> String {
        match self {
            RemoteEvent::CurrentProgramSceneChanged { scene_name } => {
                format!("Scene changed to: {scene_name}")
            }
            RemoteEvent::SceneCreated { scene_name } => format!("Scene created: {scene_name}"),
            RemoteEvent::SceneRemoved { scene_name } => format!("Scene removed: {scene_name}"),
            RemoteEvent::SceneItemEnableStateChanged {
                scene_name,
                scene_item_enabled,
                ..
            } => {
                let action = if *scene_item_enabled { "shown" } else { "hidden" };
                format!("Scene item {action} in {scene_name}")
            }
            RemoteEvent::SceneItemCreated { scene_name } => {
                format!("Scene item created in {scene_name}")
            }
            RemoteEvent::SceneItemRemoved { scene_name } => {
                format!("Scene item removed from {scene_name}")
            }
            RemoteEvent::StreamStateChanged(state) => state.describe("Stream"),
            RemoteEvent::RecordStateChanged(state) => state.describe("Recording"),
            RemoteEvent::VirtualcamStateChanged(state) => state.describe("Virtual camera"),
            RemoteEvent::InputCreated {
                input_name,
                input_kind,
            } => format!("Input created: {input_name} ({input_kind})"),
            RemoteEvent::InputRemoved { input_name } => format!("Input removed: {input_name}"),
            RemoteEvent::InputMuteStateChanged {
                input_name,
                input_muted,
            } => {
                let status = if *input_muted { "muted" } else { "unmuted" };
                format!("{input_name} {status}")
            }
            RemoteEvent::InputVolumeChanged {
                input_name,
                input_volume_mul,
                input_volume_db,
            } => format!(
                "{input_name} volume: {}% ({input_volume_db:.1} dB)",
                (input_volume_mul * 100.0).round()
            ),
            RemoteEvent::MediaInputPlaybackStarted { input_name } => {
                format!("Media playback started: {input_name}")
            }
            RemoteEvent::MediaInputPlaybackEnded { input_name } => {
                format!("Media playback ended: {input_name}")
            }
            RemoteEvent::Unrecognized { name } => format!("Event: {name}"),
        }
    }

    /// The request that reproduces this event, if it is a state change worth
    /// replaying. Only the fields needed for the replay are carried over.
    pub fn to_command(&self) -> Option<Command> {
        let command = match self {
            RemoteEvent::CurrentProgramSceneChanged { scene_name } => Command::new(
                CommandType::SetCurrentProgramScene,
                params([("sceneName", json!(scene_name))]),
                format!("Switch to scene \"{scene_name}\""),
            ),
            RemoteEvent::SceneItemEnableStateChanged {
                scene_name,
                scene_item_id,
                scene_item_enabled,
            } => {
                let verb = if *scene_item_enabled { "Show" } else { "Hide" };
                Command::new(
                    CommandType::SetSceneItemEnabled,
                    params([
                        ("sceneName", json!(scene_name)),
                        ("sceneItemId", json!(scene_item_id)),
                        ("sceneItemEnabled", json!(scene_item_enabled)),
                    ]),
                    format!("{verb} scene item in \"{scene_name}\""),
                )
            }
            RemoteEvent::StreamStateChanged(state) => output_toggle(
                state,
                (CommandType::StartStream, "Start streaming"),
                (CommandType::StopStream, "Stop streaming"),
            ),
            RemoteEvent::RecordStateChanged(state) => output_toggle(
                state,
                (CommandType::StartRecord, "Start recording"),
                (CommandType::StopRecord, "Stop recording"),
            ),
            RemoteEvent::VirtualcamStateChanged(state) => output_toggle(
                state,
                (CommandType::StartVirtualCam, "Start virtual camera"),
                (CommandType::StopVirtualCam, "Stop virtual camera"),
            ),
            RemoteEvent::InputMuteStateChanged {
                input_name,
                input_muted,
            } => {
                let verb = if *input_muted { "Mute" } else { "Unmute" };
                Command::new(
                    CommandType::SetInputMute,
                    params([
                        ("inputName", json!(input_name)),
                        ("inputMuted", json!(input_muted)),
                    ]),
                    format!("{verb} \"{input_name}\""),
                )
            }
            RemoteEvent::SceneCreated { .. }
            | RemoteEvent::SceneRemoved { .. }
            | RemoteEvent::SceneItemCreated { .. }
            | RemoteEvent::SceneItemRemoved { .. }
            | RemoteEvent::InputCreated { .. }
            | RemoteEvent::InputRemoved { .. }
            | RemoteEvent::InputVolumeChanged { .. }
            | RemoteEvent::MediaInputPlaybackStarted { .. }
            | RemoteEvent::MediaInputPlaybackEnded { .. }
            | RemoteEvent::Unrecognized { .. } => return None,
        };
        Some(command)
    }
}

/// `(eventName, payload) -> Command`, if the event is replayable.
pub fn translate(event_name: &str, payload: &Value) -> Option<Command> {
    RemoteEvent::parse(event_name, payload).to_command()
}

fn output_toggle(
    state: &OutputState,
    start: (CommandType, &str),
    stop: (CommandType, &str),
) -> Command {
    let (kind, description) = if state.output_active { start } else { stop };
    Command::without_params(kind, description)
}

fn params<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
#[path = "tests/translator_tests.rs"]
mod tests;
