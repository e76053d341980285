//! The wire envelope: one JSON object per line.
//!
//! Records look like `{"type": <tag>, "timestamp": <seconds>, "data": ...}`.
//! The host application also places some payload fields (`command`,
//! `parameters`, `view_type`, `success`, `message`) at top level, so any
//! extra keys are carried through untouched.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::kind::MessageKind;

/// A single control record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    tag: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl ControlMessage {
    /// Creates an unstamped record with the given tag and no payload.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            timestamp: None,
            data: None,
            fields: Map::new(),
        }
    }

    /// Creates a record for a known kind.
    #[must_use]
    pub fn of_kind(kind: MessageKind) -> Self {
        Self::new(kind.as_str())
    }

    /// Attaches a `data` payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets an additional top-level field.
    ///
    /// The reserved keys `type`, `timestamp`, and `data` are ignored; use the
    /// dedicated setters for those.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let name = key.into();
        if !matches!(name.as_str(), "type" | "timestamp" | "data") {
            self.fields.insert(name, value);
        }
        self
    }

    /// Stamps the record with an explicit UNIX time in seconds.
    #[must_use]
    pub fn stamped_at(mut self, seconds: f64) -> Self {
        self.timestamp = Some(seconds);
        self
    }

    /// Stamps the record with the current wall-clock time.
    #[must_use]
    pub fn stamped_now(self) -> Self {
        self.stamped_at(unix_timestamp())
    }

    /// The `type` tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        self.tag.as_str()
    }

    /// The tag as a known kind, if it is one.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::parse(&self.tag)
    }

    /// Producer-assigned send time.
    #[must_use]
    pub const fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }

    /// The `data` payload, if present and not `null`.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref().filter(|value| !value.is_null())
    }

    /// Extra top-level field by name.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All extra top-level fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Looks a key up at top level first, then inside an object `data`.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.field(key).or_else(|| {
            self.data()
                .and_then(Value::as_object)
                .and_then(|object| object.get(key))
        })
    }

    /// Parses one record.
    ///
    /// Surrounding ASCII whitespace, including the line terminator, is
    /// trimmed before parsing.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the line is blank, is not
    /// valid JSON, or is not an object with a string `type`.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return Err(ProtocolError::malformed("empty record"));
        }
        serde_json::from_slice(trimmed).map_err(ProtocolError::from_json_error)
    }

    /// Serialises the record as one line terminated by exactly one `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Serialize`] when serialisation fails and
    /// [`ProtocolError::EmbeddedLineFeed`] if the output would span lines.
    pub fn to_line(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut line = serde_json::to_vec(self).map_err(ProtocolError::Serialize)?;
        if line.contains(&b'\n') {
            return Err(ProtocolError::EmbeddedLineFeed);
        }
        line.push(b'\n');
        Ok(line)
    }
}

// Producers disagree on the timestamp format; anything but a number reads as
// unstamped rather than rejecting the record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

/// Current UNIX time in fractional seconds.
#[must_use]
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}
