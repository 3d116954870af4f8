//! WebSocket relay between web clients, the command translator, and browser extensions.
//! Also serves a small HTTP API for health checks and one-shot commands.

pub mod connection;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod status;
pub mod ws;

use crate::error::{RelayError, Result};
use crate::relay::heartbeat::LivenessMonitor;
use crate::relay::router::DispatchOutcome;
use crate::state::RelayState;
use crate::translator::Command;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub type ApiState = Arc<RelayState>;

// ---------------------------------------------------------------------------
// HTTP side-surface
// ---------------------------------------------------------------------------

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub web_clients: usize,
    pub extensions: usize,
    pub registered_extensions: usize,
    pub extension_path: String,
}

async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let counts = state.registry.counts();
    Json(StatusResponse {
        web_clients: counts.web,
        extensions: counts.extensions,
        registered_extensions: counts.registered_extensions,
        extension_path: state.extension_path(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    /// `sent`, `no_extension`, `unsupported`, or `error`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<usize>,
    pub message: String,
}

impl From<DispatchOutcome> for CommandResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        let (status, command, recipients, message) = match outcome {
            DispatchOutcome::Sent { command, recipients } => {
                ("sent", Some(command), Some(recipients), protocol::COMMAND_SENT.to_string())
            }
            DispatchOutcome::NoExtension(command) => {
                ("no_extension", Some(command), None, protocol::NO_EXTENSION.to_string())
            }
            DispatchOutcome::Unsupported => {
                ("unsupported", None, None, protocol::UNSUPPORTED_COMMAND.to_string())
            }
            DispatchOutcome::Failed(reason) => (
                "error",
                None,
                None,
                format!("Error processing command: {}", reason),
            ),
        };
        Self {
            status: status.to_string(),
            command,
            recipients,
            message,
        }
    }
}

async fn post_command(
    State(state): State<ApiState>,
    Json(req): Json<CommandRequest>,
) -> (StatusCode, Json<CommandResponse>) {
    let text = req.command.unwrap_or_default();
    if text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(CommandResponse {
                status: "error".to_string(),
                command: None,
                recipients: None,
                message: "command is required".to_string(),
            }),
        );
    }

    let outcome = state.router.submit_command(text.trim()).await;
    let code = match outcome {
        DispatchOutcome::Failed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };
    (code, Json(outcome.into()))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app(state: ApiState) -> Router {
    use tower::limit::ConcurrencyLimitLayer;

    let extension_path = {
        let path = state.extension_path();
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
    };

    let api = Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/command", post(post_command))
        .layer(ConcurrencyLimitLayer::new(32));

    Router::new()
        .merge(api)
        .route(&extension_path, get(ws::ws_handler))
        // Any other path upgrades as a web client.
        .fallback(ws::ws_handler)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        )
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` fires.
///
/// Starts the liveness monitor; on shutdown every live connection is closed.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let interval = state.config.read().heartbeat.interval();
    let monitor = LivenessMonitor::new(Arc::clone(&state.registry), interval)
        .spawn(shutdown.child_token());

    let registry = Arc::clone(&state.registry);
    let token = shutdown.clone();
    let result = axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        token.cancelled().await;
        tracing::info!("Shutting down, closing {} connections", registry.len());
        for conn in registry.all() {
            conn.close();
        }
    })
    .await;

    shutdown.cancel();
    let _ = monitor.await;
    result
}

pub async fn run_server(state: ApiState, shutdown: CancellationToken) -> Result<()> {
    let (addr, extension_path) = {
        let config = state.config.read();
        (config.server.bind_addr(), config.server.extension_path.clone())
    };
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Server(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(
        "Relay listening on ws://{} (extensions on {})",
        addr,
        extension_path
    );
    serve(listener, state, shutdown)
        .await
        .map_err(|e| RelayError::Server(e.to_string()))
}
