//! Per-message protocol handling: who may send what, and who hears about it.

use crate::config::StatusConfig;
use crate::error::ProtocolError;
use crate::relay::connection::{ClientRole, Connection};
use crate::relay::protocol::{self, parse_inbound, Envelope, Inbound};
use crate::relay::registry::ConnectionRegistry;
use crate::relay::status::StatusBoard;
use crate::translator::{truncate, Command, CommandOutcome, Translate};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What happened to one inbound frame.
#[derive(Debug)]
pub enum RouteOutcome {
    Handled,
    /// Answered with an `error` to the sender only.
    Rejected(ProtocolError),
    /// A translation was spawned for a `voice_command`.
    Translating(JoinHandle<DispatchOutcome>),
}

/// Result of one translate-and-dispatch run.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent { command: Command, recipients: usize },
    NoExtension(Command),
    Unsupported,
    Failed(String),
}

pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    translator: Arc<dyn Translate>,
    status: StatusBoard,
    timings: StatusConfig,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        translator: Arc<dyn Translate>,
        timings: StatusConfig,
    ) -> Self {
        Self {
            status: StatusBoard::new(Arc::clone(&registry)),
            registry,
            translator,
            timings,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Greet a freshly accepted connection. Extensions hear nothing until they register.
    pub fn on_connect(&self, conn: &Connection) {
        if conn.role() == ClientRole::Web {
            conn.send(&Envelope::ready());
        }
    }

    pub fn on_disconnect(&self, conn: &Connection) {
        if self.registry.remove(&conn.id).is_some() {
            tracing::debug!(
                "Connection {} closed after {}s ({} dropped frames)",
                conn.id,
                conn.age().as_secs(),
                conn.dropped_frames()
            );
        }
        conn.close();
    }

    /// Handle one inbound text frame. Never closes the connection.
    pub fn handle_text(self: &Arc<Self>, conn: &Connection, text: &str) -> RouteOutcome {
        tracing::debug!("{} {} -> {}", conn.role(), conn.id, truncate(text, 200));

        let inbound = match parse_inbound(text) {
            Ok(inbound) => inbound,
            Err(e) => return self.reject(conn, e),
        };

        match (conn.role(), inbound) {
            (_, Inbound::Ping) => {
                conn.mark_alive();
                conn.send(&Envelope::Pong);
                RouteOutcome::Handled
            }
            (_, Inbound::Pong) => {
                conn.mark_alive();
                RouteOutcome::Handled
            }

            (ClientRole::Web, Inbound::VoiceCommand(text)) => {
                // Enqueued before the task exists so it always precedes the result.
                self.status.announce(&Envelope::message(protocol::PROCESSING));
                let router = Arc::clone(self);
                RouteOutcome::Translating(tokio::spawn(async move {
                    router.run_voice_command(&text).await
                }))
            }

            (ClientRole::Extension, Inbound::Register { version, .. }) => {
                match self.registry.mark_registered(&conn.id, version) {
                    Ok(_) => {
                        conn.send(&Envelope::message(protocol::REGISTRATION_SUCCESSFUL));
                        RouteOutcome::Handled
                    }
                    Err(e) => self.reject(conn, ProtocolError::NotPermitted(e.to_string())),
                }
            }

            (ClientRole::Extension, Inbound::ExecutionConfirmation(command)) => {
                if !conn.is_registered() {
                    return self.reject(conn, not_registered());
                }
                tracing::info!("Extension {} confirmed {}", conn.id, describe(&command));
                self.status.announce_then_ready(
                    &Envelope::message(protocol::EXECUTION_CONFIRMED),
                    self.timings.confirmation_revert(),
                );
                RouteOutcome::Handled
            }

            (ClientRole::Extension, Inbound::ExecutionError { command, error }) => {
                if !conn.is_registered() {
                    return self.reject(conn, not_registered());
                }
                tracing::warn!(
                    "Extension {} failed {}: {}",
                    conn.id,
                    command.as_ref().map(describe).unwrap_or_else(|| "command".to_string()),
                    error
                );
                self.status.announce_then_ready(
                    &Envelope::error(format!("Extension error: {}", error)),
                    self.timings.error_revert(),
                );
                RouteOutcome::Handled
            }

            (role, inbound) => self.reject(
                conn,
                ProtocolError::NotPermitted(format!(
                    "Message type '{}' is not accepted from {} clients",
                    inbound.kind(),
                    role
                )),
            ),
        }
    }

    /// Binary frames are accepted only when they hold UTF-8 text.
    pub fn handle_binary(self: &Arc<Self>, conn: &Connection, bytes: &[u8]) -> RouteOutcome {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(conn, text),
            Err(e) => self.reject(conn, ProtocolError::Malformed(format!("binary frame: {}", e))),
        }
    }

    /// Same pipeline as a `voice_command`, for callers outside a socket.
    pub async fn submit_command(&self, text: &str) -> DispatchOutcome {
        self.status.announce(&Envelope::message(protocol::PROCESSING));
        self.run_voice_command(text).await
    }

    /// Translate `text` and dispatch the result. Statuses go to every web client.
    pub async fn run_voice_command(&self, text: &str) -> DispatchOutcome {
        let failure_revert = self.timings.failure_revert();

        let outcome = match self.translator.translate(text).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Translation of '{}' failed: {}", truncate(text, 200), e);
                let reason = e.to_string();
                self.status.announce_then_ready(
                    &Envelope::error(format!("Error processing command: {}", reason)),
                    failure_revert,
                );
                return DispatchOutcome::Failed(reason);
            }
        };

        let command = match outcome {
            CommandOutcome::Actionable(command) => command,
            CommandOutcome::Unsupported => {
                tracing::info!("Unsupported or ambiguous command: '{}'", truncate(text, 200));
                self.status
                    .announce_then_ready(&Envelope::error(protocol::UNSUPPORTED_COMMAND), failure_revert);
                return DispatchOutcome::Unsupported;
            }
        };

        let extensions = self.registry.registered_extension_audience();
        if extensions.is_empty() {
            tracing::warn!("No registered extension for {}", command.action);
            self.status
                .announce_then_ready(&Envelope::error(protocol::NO_EXTENSION), failure_revert);
            return DispatchOutcome::NoExtension(command);
        }

        let recipients = extensions.broadcast(&Envelope::Command(command.clone()));
        tracing::info!(
            "Dispatched {} to {}/{} extensions",
            command.action,
            recipients,
            extensions.len()
        );
        self.status.announce(&Envelope::message(protocol::COMMAND_SENT));
        DispatchOutcome::Sent { command, recipients }
    }

    fn reject(&self, conn: &Connection, error: ProtocolError) -> RouteOutcome {
        match &error {
            ProtocolError::Malformed(detail) => {
                tracing::warn!("Malformed message from {}: {}", conn.id, detail)
            }
            other => tracing::warn!("Rejected message from {}: {}", conn.id, other),
        }
        conn.send(&Envelope::error(error.to_string()));
        RouteOutcome::Rejected(error)
    }
}

fn not_registered() -> ProtocolError {
    ProtocolError::NotPermitted(protocol::NOT_REGISTERED.to_string())
}

fn describe(command: &Value) -> String {
    command
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "command".to_string())
}
