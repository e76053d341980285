//! Wire protocol of the spraylink control channel.
//!
//! Records are UTF-8 JSON objects, one per line, each carrying a `type` tag,
//! a producer-assigned `timestamp`, and an optional `data` payload. This
//! crate holds the pure parts of the protocol:
//!
//! - [`LineFramer`] turns arbitrary read chunks into complete lines;
//! - [`ControlMessage`] is the untyped wire record;
//! - [`Message`] is the typed view, with [`Message::Unknown`] for tags this
//!   crate does not recognise.
//!
//! Socket handling lives in `spray-link`.

mod envelope;
mod error;
mod framing;
mod kind;
mod message;

pub use envelope::{ControlMessage, unix_timestamp};
pub use error::ProtocolError;
pub use framing::{Frame, LineFramer};
pub use kind::MessageKind;
pub use message::{
    Acknowledgement, CollisionReport, CommandRequest, Message, Position, SimulationCommand,
    SimulationReport,
};

/// Parses and decodes one line.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for records that are not JSON
/// objects with a string tag, and [`ProtocolError::Payload`] for known
/// kinds whose payload has the wrong shape.
pub fn decode_line(line: &[u8]) -> Result<Message, ProtocolError> {
    ControlMessage::parse(line).and_then(Message::decode)
}

/// Encodes a message as a stamped, line-feed terminated record.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] or [`ProtocolError::EmbeddedLineFeed`]
/// when the record cannot be written as a single line.
pub fn encode_line(message: &Message, timestamp: f64) -> Result<Vec<u8>, ProtocolError> {
    message.encode()?.stamped_at(timestamp).to_line()
}
