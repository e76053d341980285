//! Typed view of control messages.
//!
//! [`Message::decode`] maps a [`ControlMessage`] onto the payload shape of
//! its tag. Payload keys are read from `data` first and then from top level,
//! because the host application is not consistent about where it puts them.
//! Unrecognised tags survive as [`Message::Unknown`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::ControlMessage;
use crate::error::ProtocolError;
use crate::kind::MessageKind;

/// Commands carried by `simulation_command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationCommand {
    /// Begin a simulation run.
    Start,
    /// Abort the current run.
    Stop,
    /// Pause the current run.
    Pause,
    /// Return the scene to its initial state.
    Reset,
    /// Change playback speed (`parameters.speed`).
    SetSpeed,
    /// Load a workpiece file (`parameters.file_path`).
    LoadWorkpiece,
    /// Any other command string.
    Other(String),
}

impl SimulationCommand {
    /// Parses a command string; unknown values become [`Self::Other`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "pause" => Self::Pause,
            "reset" => Self::Reset,
            "set_speed" => Self::SetSpeed,
            "load_workpiece" => Self::LoadWorkpiece,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the wire spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Reset => "reset",
            Self::SetSpeed => "set_speed",
            Self::LoadWorkpiece => "load_workpiece",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl fmt::Display for SimulationCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A command together with its optional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest<C> {
    /// The command itself.
    pub command: C,
    /// Command parameters; empty when none were sent.
    pub parameters: Map<String, Value>,
}

impl<C> CommandRequest<C> {
    /// Creates a request without parameters.
    pub fn new(command: C) -> Self {
        Self {
            command,
            parameters: Map::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Outcome report for `workpiece_loaded` and `trajectory_displayed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Whether the peer handled the request.
    #[serde(default)]
    pub success: bool,
    /// Free-form status text.
    #[serde(default)]
    pub message: String,
}

impl Acknowledgement {
    /// Successful acknowledgement with a message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Payload of `simulation_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Terminal status, `completed` on success.
    pub status: String,
    /// Simulated run time in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Coating quality estimate in `0.0..=1.0`.
    #[serde(default)]
    pub quality_score: f64,
}

/// Cartesian position in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

/// Payload of `collision_detected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionReport {
    /// Description of the collision.
    pub message: String,
    /// Where the collision happened.
    #[serde(default)]
    pub position: Position,
    /// Severity label, such as `high`.
    #[serde(default)]
    pub severity: String,
}

/// Control message decoded according to its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Workpiece description; opaque to this crate.
    WorkpieceData(Value),
    /// Trajectory description; opaque to this crate.
    TrajectoryData(Value),
    /// Simulation control.
    SimulationCommand(CommandRequest<SimulationCommand>),
    /// Camera control; commands include `set_view` and `reset`.
    CameraCommand(CommandRequest<String>),
    /// Liveness probe.
    Heartbeat,
    /// Reply to a liveness probe.
    HeartbeatResponse,
    /// Workpiece load outcome.
    WorkpieceLoaded(Acknowledgement),
    /// Trajectory display outcome.
    TrajectoryDisplayed(Acknowledgement),
    /// Simulation finished.
    SimulationComplete(SimulationReport),
    /// Collision report.
    CollisionDetected(CollisionReport),
    /// Quality estimate; opaque.
    QualityPrediction(Value),
    /// Scene click; opaque.
    SceneClicked(Value),
    /// Camera view changed.
    CameraViewChanged {
        /// Name of the new view.
        view_type: String,
    },
    /// Record with a tag this crate does not know.
    Unknown {
        /// The unrecognised tag.
        tag: String,
        /// The record as received.
        raw: ControlMessage,
    },
}

impl Message {
    /// Decodes a record into its typed form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] when a known kind carries a payload
    /// of the wrong shape, such as a `simulation_command` without `command`.
    pub fn decode(record: ControlMessage) -> Result<Self, ProtocolError> {
        let Some(kind) = record.kind() else {
            return Ok(Self::Unknown {
                tag: record.tag().to_owned(),
                raw: record,
            });
        };

        let message = match kind {
            MessageKind::WorkpieceData => Self::WorkpieceData(opaque_payload(&record)),
            MessageKind::TrajectoryData => Self::TrajectoryData(opaque_payload(&record)),
            MessageKind::SimulationCommand => {
                let request = command_request(&record)?;
                Self::SimulationCommand(CommandRequest {
                    command: SimulationCommand::parse(&request.command),
                    parameters: request.parameters,
                })
            }
            MessageKind::CameraCommand => Self::CameraCommand(command_request(&record)?),
            MessageKind::Heartbeat => Self::Heartbeat,
            MessageKind::HeartbeatResponse => Self::HeartbeatResponse,
            MessageKind::WorkpieceLoaded => Self::WorkpieceLoaded(structured(&record)?),
            MessageKind::TrajectoryDisplayed => Self::TrajectoryDisplayed(structured(&record)?),
            MessageKind::SimulationComplete => Self::SimulationComplete(structured(&record)?),
            MessageKind::CollisionDetected => Self::CollisionDetected(structured(&record)?),
            MessageKind::QualityPrediction => Self::QualityPrediction(opaque_payload(&record)),
            MessageKind::SceneClicked => Self::SceneClicked(opaque_payload(&record)),
            MessageKind::CameraViewChanged => Self::CameraViewChanged {
                view_type: record
                    .lookup("view_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            },
        };
        Ok(message)
    }

    /// The tag this message is sent under.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Unknown { tag, .. } => tag.as_str(),
            known => known.kind().map_or("", MessageKind::as_str),
        }
    }

    /// The known kind, or `None` for [`Self::Unknown`].
    #[must_use]
    pub const fn kind(&self) -> Option<MessageKind> {
        let kind = match self {
            Self::WorkpieceData(_) => MessageKind::WorkpieceData,
            Self::TrajectoryData(_) => MessageKind::TrajectoryData,
            Self::SimulationCommand(_) => MessageKind::SimulationCommand,
            Self::CameraCommand(_) => MessageKind::CameraCommand,
            Self::Heartbeat => MessageKind::Heartbeat,
            Self::HeartbeatResponse => MessageKind::HeartbeatResponse,
            Self::WorkpieceLoaded(_) => MessageKind::WorkpieceLoaded,
            Self::TrajectoryDisplayed(_) => MessageKind::TrajectoryDisplayed,
            Self::SimulationComplete(_) => MessageKind::SimulationComplete,
            Self::CollisionDetected(_) => MessageKind::CollisionDetected,
            Self::QualityPrediction(_) => MessageKind::QualityPrediction,
            Self::SceneClicked(_) => MessageKind::SceneClicked,
            Self::CameraViewChanged { .. } => MessageKind::CameraViewChanged,
            Self::Unknown { .. } => return None,
        };
        Some(kind)
    }

    /// Builds the unstamped wire record for this message.
    ///
    /// Workpiece and trajectory payloads travel as compact JSON strings and
    /// commands keep `command`/`parameters` at top level, matching what the
    /// host application emits. Peer reports go inside `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Serialize`] if a payload cannot be encoded.
    pub fn encode(&self) -> Result<ControlMessage, ProtocolError> {
        let record = ControlMessage::new(self.tag());
        let record = match self {
            Self::WorkpieceData(payload) | Self::TrajectoryData(payload) => {
                record.with_data(stringified(payload)?)
            }
            Self::SimulationCommand(request) => record
                .with_field("command", Value::String(request.command.as_str().to_owned()))
                .with_field("parameters", Value::Object(request.parameters.clone())),
            Self::CameraCommand(request) => record
                .with_field("command", Value::String(request.command.clone()))
                .with_field("parameters", Value::Object(request.parameters.clone())),
            Self::Heartbeat | Self::HeartbeatResponse => record,
            Self::WorkpieceLoaded(ack) | Self::TrajectoryDisplayed(ack) => {
                record.with_data(to_value(ack)?)
            }
            Self::SimulationComplete(report) => record.with_data(to_value(report)?),
            Self::CollisionDetected(report) => record.with_data(to_value(report)?),
            Self::QualityPrediction(payload) | Self::SceneClicked(payload) => {
                record.with_data(payload.clone())
            }
            Self::CameraViewChanged { view_type } => {
                record.with_field("view_type", Value::String(view_type.clone()))
            }
            Self::Unknown { raw, .. } => raw.clone(),
        };
        Ok(record)
    }
}

#[derive(Deserialize)]
struct RawCommand {
    command: String,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

fn command_request(record: &ControlMessage) -> Result<CommandRequest<String>, ProtocolError> {
    let raw: RawCommand = structured(record)?;
    Ok(CommandRequest {
        command: raw.command,
        parameters: raw.parameters.unwrap_or_default(),
    })
}

/// Deserialises a payload from `data` when it is an object, otherwise from
/// the top-level fields.
fn structured<T>(record: &ControlMessage) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    let source = match record.data().and_then(Value::as_object) {
        Some(object) => {
            let mut merged = record.fields().clone();
            merged.extend(object.clone());
            merged
        }
        None => record.fields().clone(),
    };
    serde_json::from_value(Value::Object(source))
        .map_err(|error| ProtocolError::payload(record.tag(), error))
}

/// Opaque payloads may arrive as a JSON string holding JSON text.
fn opaque_payload(record: &ControlMessage) -> Value {
    match record.data() {
        Some(Value::String(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Some(value) => value.clone(),
        None => Value::Null,
    }
}

fn stringified(payload: &Value) -> Result<Value, ProtocolError> {
    match payload {
        Value::String(_) => Ok(payload.clone()),
        other => serde_json::to_string(other)
            .map(Value::String)
            .map_err(ProtocolError::Serialize),
    }
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(payload).map_err(ProtocolError::Serialize)
}
