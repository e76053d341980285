//! Line commands typed into the host bridge.
//!
//! ```text
//! workpiece <json>
//! trajectory <json>
//! sim start|stop|pause|reset
//! sim set_speed <speed>
//! sim load_workpiece <path>
//! camera set_view <view>
//! camera reset
//! raw <json record>
//! ```

use serde_json::{Value, json};
use thiserror::Error;

use spray_protocol::{CommandRequest, ControlMessage, Message, SimulationCommand};

/// Problems with a console line.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The first word is not a known command.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// A required argument is missing.
    #[error("'{command}' needs {expected}")]
    MissingArgument {
        /// The command being parsed.
        command: &'static str,
        /// Description of the missing argument.
        expected: &'static str,
    },
    /// A speed was not a number.
    #[error("invalid speed '{0}'")]
    InvalidSpeed(String),
    /// A JSON argument did not parse.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A raw record did not parse.
    #[error(transparent)]
    Record(#[from] spray_protocol::ProtocolError),
}

/// Parses one console line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns [`ConsoleError`] describing why the line is not a command.
pub fn parse_console_line(line: &str) -> Result<Option<Message>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(head, tail)| (head, tail.trim()));

    let message = match command {
        "workpiece" => Message::WorkpieceData(json_argument("workpiece", rest)?),
        "trajectory" => Message::TrajectoryData(json_argument("trajectory", rest)?),
        "sim" => Message::SimulationCommand(simulation(rest)?),
        "camera" => Message::CameraCommand(camera(rest)?),
        "raw" => Message::decode(ControlMessage::parse(rest.as_bytes())?)?,
        other => return Err(ConsoleError::UnknownCommand(other.to_owned())),
    };
    Ok(Some(message))
}

fn json_argument(command: &'static str, rest: &str) -> Result<Value, ConsoleError> {
    if rest.is_empty() {
        return Err(ConsoleError::MissingArgument {
            command,
            expected: "a JSON payload",
        });
    }
    Ok(serde_json::from_str(rest)?)
}

fn simulation(rest: &str) -> Result<CommandRequest<SimulationCommand>, ConsoleError> {
    let (name, argument) = split_argument(rest);
    if name.is_empty() {
        return Err(ConsoleError::MissingArgument {
            command: "sim",
            expected: "a simulation command",
        });
    }
    let command = SimulationCommand::parse(name);
    let request = match command {
        SimulationCommand::SetSpeed => {
            let speed: f64 = argument
                .parse()
                .map_err(|_| ConsoleError::InvalidSpeed(argument.to_owned()))?;
            CommandRequest::new(command).with_parameter("speed", json!(speed))
        }
        SimulationCommand::LoadWorkpiece => {
            if argument.is_empty() {
                return Err(ConsoleError::MissingArgument {
                    command: "sim load_workpiece",
                    expected: "a file path",
                });
            }
            CommandRequest::new(command).with_parameter("file_path", json!(argument))
        }
        _ => CommandRequest::new(command),
    };
    Ok(request)
}

fn camera(rest: &str) -> Result<CommandRequest<String>, ConsoleError> {
    let (name, argument) = split_argument(rest);
    match name {
        "" => Err(ConsoleError::MissingArgument {
            command: "camera",
            expected: "a camera command",
        }),
        "set_view" if argument.is_empty() => Err(ConsoleError::MissingArgument {
            command: "camera set_view",
            expected: "a view type",
        }),
        "set_view" => Ok(CommandRequest::new(String::from("set_view"))
            .with_parameter("view_type", json!(argument))),
        other => Ok(CommandRequest::new(other.to_owned())),
    }
}

fn split_argument(rest: &str) -> (&str, &str) {
    rest.split_once(char::is_whitespace)
        .map_or((rest, ""), |(head, tail)| (head, tail.trim()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parsed(line: &str) -> Message {
        parse_console_line(line)
            .expect("parse line")
            .expect("line is a command")
    }

    #[test]
    fn blank_line_is_not_a_command() {
        assert!(parse_console_line("   ").expect("parse blank").is_none());
    }

    #[test]
    fn workpiece_takes_a_json_payload() {
        assert_eq!(
            parsed(r#"workpiece {"name": "door", "size": [1, 2]}"#),
            Message::WorkpieceData(json!({"name": "door", "size": [1, 2]}))
        );
    }

    #[rstest]
    #[case("sim start", SimulationCommand::Start)]
    #[case("sim stop", SimulationCommand::Stop)]
    #[case("sim pause", SimulationCommand::Pause)]
    #[case("sim reset", SimulationCommand::Reset)]
    fn bare_simulation_commands(#[case] line: &str, #[case] expected: SimulationCommand) {
        assert_eq!(
            parsed(line),
            Message::SimulationCommand(CommandRequest::new(expected))
        );
    }

    #[test]
    fn set_speed_carries_the_speed() {
        let Message::SimulationCommand(request) = parsed("sim set_speed 2.5") else {
            panic!("expected a simulation command");
        };
        assert_eq!(request.command, SimulationCommand::SetSpeed);
        assert_eq!(request.parameters.get("speed"), Some(&json!(2.5)));
    }

    #[test]
    fn load_workpiece_carries_the_path() {
        let Message::SimulationCommand(request) = parsed("sim load_workpiece data/model/door.stl")
        else {
            panic!("expected a simulation command");
        };
        assert_eq!(
            request.parameters.get("file_path"),
            Some(&json!("data/model/door.stl"))
        );
    }

    #[test]
    fn camera_set_view_carries_the_view() {
        let Message::CameraCommand(request) = parsed("camera set_view top") else {
            panic!("expected a camera command");
        };
        assert_eq!(request.command, "set_view");
        assert_eq!(request.parameters.get("view_type"), Some(&json!("top")));
    }

    #[test]
    fn raw_records_are_passed_through() {
        assert_eq!(parsed(r#"raw {"type":"heartbeat_response"}"#), Message::HeartbeatResponse);
    }

    #[rstest]
    #[case::unknown("paint now")]
    #[case::speed("sim set_speed fast")]
    #[case::missing_view("camera set_view")]
    #[case::missing_payload("trajectory")]
    #[case::bad_json("workpiece {oops")]
    fn rejects_bad_lines(#[case] line: &str) {
        assert!(parse_console_line(line).is_err());
    }
}
