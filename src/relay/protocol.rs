//! JSON envelopes exchanged with web and extension clients.
//!
//! Every frame is `{"type": ..., "payload": ...}`. Inbound frames are parsed
//! in two steps (raw envelope, then type-specific payload) so that a bad
//! payload can be reported precisely without tearing down the connection.

use crate::error::ProtocolError;
use crate::translator::Command;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const READY: &str = "Ready";
pub const PROCESSING: &str = "Processing";
pub const COMMAND_SENT: &str = "Command sent";
pub const EXECUTION_CONFIRMED: &str = "Execution confirmed";
pub const REGISTRATION_SUCCESSFUL: &str = "Registration successful";
pub const NO_EXTENSION: &str = "No extension connected";
pub const UNSUPPORTED_COMMAND: &str = "Unsupported or ambiguous command";
pub const NOT_REGISTERED: &str = "Extension is not registered";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeType {
    VoiceCommand,
    Command,
    Register,
    Ping,
    Pong,
    ExecutionConfirmation,
    ExecutionError,
    Message,
    Error,
}

impl EnvelopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeType::VoiceCommand => "voice_command",
            EnvelopeType::Command => "command",
            EnvelopeType::Register => "register",
            EnvelopeType::Ping => "ping",
            EnvelopeType::Pong => "pong",
            EnvelopeType::ExecutionConfirmation => "execution_confirmation",
            EnvelopeType::ExecutionError => "execution_error",
            EnvelopeType::Message => "message",
            EnvelopeType::Error => "error",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "voice_command" => EnvelopeType::VoiceCommand,
            "command" => EnvelopeType::Command,
            "register" => EnvelopeType::Register,
            "ping" => EnvelopeType::Ping,
            "pong" => EnvelopeType::Pong,
            "execution_confirmation" => EnvelopeType::ExecutionConfirmation,
            "execution_error" => EnvelopeType::ExecutionError,
            "message" => EnvelopeType::Message,
            "error" => EnvelopeType::Error,
            _ => return None,
        })
    }
}

impl std::fmt::Display for EnvelopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelopes the relay sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Envelope {
    Message(String),
    Error(String),
    Command(Command),
    Pong,
}

impl Envelope {
    pub fn message(text: impl Into<String>) -> Self {
        Envelope::Message(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Envelope::Error(text.into())
    }

    pub fn ready() -> Self {
        Envelope::message(READY)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Envelopes the relay accepts, with payloads already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    VoiceCommand(String),
    Register {
        client: Option<String>,
        version: Option<String>,
    },
    Ping,
    Pong,
    /// Echo of the executed command; relayed only as a status.
    ExecutionConfirmation(Value),
    ExecutionError {
        command: Option<Value>,
        error: String,
    },
}

impl Inbound {
    pub fn kind(&self) -> EnvelopeType {
        match self {
            Inbound::VoiceCommand(_) => EnvelopeType::VoiceCommand,
            Inbound::Register { .. } => EnvelopeType::Register,
            Inbound::Ping => EnvelopeType::Ping,
            Inbound::Pong => EnvelopeType::Pong,
            Inbound::ExecutionConfirmation(_) => EnvelopeType::ExecutionConfirmation,
            Inbound::ExecutionError { .. } => EnvelopeType::ExecutionError,
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct RegisterPayload {
    client: Option<String>,
    version: Option<Value>,
}

#[derive(Deserialize)]
struct ExecutionErrorPayload {
    command: Option<Value>,
    error: Option<Value>,
}

/// Parse one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    let raw: RawEnvelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let Some(kind) = EnvelopeType::parse(&raw.kind) else {
        return Err(ProtocolError::UnknownType(raw.kind));
    };

    match kind {
        EnvelopeType::VoiceCommand => match raw.payload {
            Value::String(s) if !s.trim().is_empty() => Ok(Inbound::VoiceCommand(s)),
            Value::String(_) => Err(invalid(kind, "command text is empty")),
            _ => Err(invalid(kind, "expected command text")),
        },
        EnvelopeType::Register => {
            let payload: RegisterPayload = match raw.payload {
                Value::Null => RegisterPayload { client: None, version: None },
                other => serde_json::from_value(other).map_err(|e| invalid(kind, e))?,
            };
            if let Some(client) = payload.client.as_deref() {
                if client != "extension" {
                    return Err(invalid(kind, format!("unexpected client '{}'", client)));
                }
            }
            Ok(Inbound::Register {
                client: payload.client,
                version: payload.version.and_then(scalar_to_string),
            })
        }
        EnvelopeType::Ping => Ok(Inbound::Ping),
        EnvelopeType::Pong => Ok(Inbound::Pong),
        EnvelopeType::ExecutionConfirmation => Ok(Inbound::ExecutionConfirmation(raw.payload)),
        EnvelopeType::ExecutionError => {
            let payload: ExecutionErrorPayload = match raw.payload {
                Value::Null => ExecutionErrorPayload { command: None, error: None },
                Value::String(s) => ExecutionErrorPayload {
                    command: None,
                    error: Some(Value::String(s)),
                },
                other => serde_json::from_value(other).map_err(|e| invalid(kind, e))?,
            };
            let error = payload
                .error
                .and_then(scalar_to_string)
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());
            Ok(Inbound::ExecutionError {
                command: payload.command,
                error,
            })
        }
        // Outbound-only types are never accepted from a client.
        EnvelopeType::Command | EnvelopeType::Message | EnvelopeType::Error => {
            Err(ProtocolError::NotPermitted(format!(
                "Message type '{}' cannot be sent to the relay",
                kind
            )))
        }
    }
}

fn invalid(kind: EnvelopeType, reason: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::InvalidPayload {
        kind: kind.as_str(),
        reason: reason.to_string(),
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::{Action, CommandValue};
    use serde_json::json;

    #[test]
    fn test_outbound_wire_shapes() {
        assert_eq!(
            Envelope::ready().to_json().unwrap(),
            r#"{"type":"message","payload":"Ready"}"#
        );
        assert_eq!(Envelope::Pong.to_json().unwrap(), r#"{"type":"pong"}"#);

        let cmd = Envelope::Command(Command::new(
            Action::OpenUrl,
            CommandValue::Text("youtube.com".to_string()),
        ));
        let v: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({"type": "command", "payload": {"action": "open_url", "value": "youtube.com"}})
        );

        let close = Envelope::Command(Command::new(Action::CloseTab, CommandValue::Empty));
        let v: Value = serde_json::from_str(&close.to_json().unwrap()).unwrap();
        assert_eq!(v["payload"]["value"], Value::Null);
    }

    #[test]
    fn test_parse_voice_command() {
        let inbound = parse_inbound(r#"{"type":"voice_command","payload":"open youtube.com"}"#).unwrap();
        assert_eq!(inbound, Inbound::VoiceCommand("open youtube.com".to_string()));
    }

    #[test]
    fn test_empty_voice_command_is_invalid() {
        for text in [
            r#"{"type":"voice_command","payload":"   "}"#,
            r#"{"type":"voice_command"}"#,
            r#"{"type":"voice_command","payload":42}"#,
        ] {
            let err = parse_inbound(text).unwrap_err();
            assert!(
                matches!(err, ProtocolError::InvalidPayload { kind: "voice_command", .. }),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_parse_register() {
        let inbound =
            parse_inbound(r#"{"type":"register","payload":{"client":"extension","version":"1.0"}}"#)
                .unwrap();
        assert_eq!(
            inbound,
            Inbound::Register {
                client: Some("extension".to_string()),
                version: Some("1.0".to_string())
            }
        );

        let bare = parse_inbound(r#"{"type":"register"}"#).unwrap();
        assert_eq!(bare, Inbound::Register { client: None, version: None });

        let err = parse_inbound(r#"{"type":"register","payload":{"client":"web"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { kind: "register", .. }));
    }

    #[test]
    fn test_parse_execution_error() {
        let inbound = parse_inbound(
            r#"{"type":"execution_error","payload":{"command":{"action":"click","value":".btn"},"error":"Element not found"}}"#,
        )
        .unwrap();
        assert_eq!(
            inbound,
            Inbound::ExecutionError {
                command: Some(json!({"action": "click", "value": ".btn"})),
                error: "Element not found".to_string()
            }
        );

        let missing = parse_inbound(r#"{"type":"execution_error","payload":{}}"#).unwrap();
        assert!(matches!(missing, Inbound::ExecutionError { ref error, .. } if error == "Unknown error"));
    }

    #[test]
    fn test_malformed_and_unknown() {
        assert!(matches!(parse_inbound("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(parse_inbound(r#"{"payload":1}"#), Err(ProtocolError::Malformed(_))));
        assert!(matches!(parse_inbound("[1,2]"), Err(ProtocolError::Malformed(_))));
        assert_eq!(
            parse_inbound(r#"{"type":"teleport"}"#).unwrap_err(),
            ProtocolError::UnknownType("teleport".to_string())
        );
    }

    #[test]
    fn test_outbound_types_are_refused() {
        let err = parse_inbound(r#"{"type":"command","payload":{"action":"close_tab"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::NotPermitted(_)));
    }

    #[test]
    fn test_envelope_type_names() {
        for name in [
            "voice_command",
            "command",
            "register",
            "ping",
            "pong",
            "execution_confirmation",
            "execution_error",
            "message",
            "error",
        ] {
            assert_eq!(EnvelopeType::parse(name).map(|t| t.as_str()), Some(name));
        }
    }
}
