//! WebSocket endpoint shared by web clients and browser extensions.
//!
//! The request path picks the role; after that every connection runs the
//! same pair of tasks: a writer draining the connection's outbound queue and
//! a reader handing frames to the router.

use crate::relay::connection::{ClientRole, Connection, Frame};
use crate::relay::ApiState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, OriginalUri, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Maximum number of frames buffered per client.
const OUTBOUND_CAPACITY: usize = 64;

/// How long the writer gets to flush its close frame after the reader stops.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// WebSocket upgrade handler for the extension path and every other non-API path.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    OriginalUri(uri): OriginalUri,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<ApiState>,
) -> Response {
    let role = ClientRole::from_path(uri.path(), &state.extension_path());
    let remote = connect_info.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| handle_socket(socket, role, remote, state))
}

async fn handle_socket(
    socket: WebSocket,
    role: ClientRole,
    remote: Option<SocketAddr>,
    state: ApiState,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);

    let conn = Arc::new(Connection::new(role, remote, tx));
    state.registry.add(Arc::clone(&conn));
    state.router.on_connect(&conn);

    let writer_conn = Arc::clone(&conn);
    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    let message = match frame {
                        Frame::Text(text) => Message::Text(text.as_str().to_owned()),
                        Frame::Ping => Message::Ping(Vec::new()),
                    };
                    if sink.send(message).await.is_err() {
                        break; // Client disconnected
                    }
                }
                () = writer_conn.closed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => {
                        state.router.handle_text(&conn, &text);
                    }
                    Message::Binary(bytes) => {
                        state.router.handle_binary(&conn, &bytes);
                    }
                    Message::Pong(_) => conn.mark_alive(),
                    // axum answers pings itself
                    Message::Ping(_) => {}
                    Message::Close(_) => break,
                }
            }
            () = conn.closed() => break,
        }
    }

    state.router.on_disconnect(&conn);
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
}
