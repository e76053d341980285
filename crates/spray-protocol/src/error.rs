//! Error types for control message parsing and encoding.

use thiserror::Error;

/// Errors surfaced while turning records into control messages and back.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Record was not a JSON object carrying a string `type` tag.
    #[error("malformed record: {message}")]
    Malformed {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying JSON error, when one was produced.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Payload of a known message kind did not match its expected shape.
    #[error("invalid '{tag}' payload: {source}")]
    Payload {
        /// Tag of the offending message.
        tag: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Outbound message could not be serialised.
    #[error("failed to serialise message: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Serialised record would contain a raw line feed.
    #[error("serialised record contains an embedded line feed")]
    EmbeddedLineFeed,
}

impl ProtocolError {
    /// Creates a malformed record error from a serde error.
    #[must_use]
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed record error with a custom message.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a payload error for the given tag.
    #[must_use]
    pub fn payload(tag: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Payload {
            tag: tag.into(),
            source,
        }
    }
}
