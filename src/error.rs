use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Translator error: {0}")]
    Translate(#[from] TranslateError),

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Failures of a single natural-language translation request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// The LLM backend could not be reached or answered with an error status.
    #[error("{0}")]
    Provider(String),

    #[error("LLM request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The LLM answered, but not with a JSON object.
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    NotConfigured(String),
}

/// Inbound frames the router refuses to act on. Always answered to the sender only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid message")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    #[error("{0}")]
    NotPermitted(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Connection {0} is not tracked")]
    UnknownConnection(String),

    #[error("Registration is only available to extension clients")]
    NotAnExtension,
}
