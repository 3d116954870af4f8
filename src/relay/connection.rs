//! One live WebSocket peer: its role, registration state, liveness flag, and outbound queue.

use crate::relay::protocol::Envelope;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

pub type ConnectionId = String;

/// Which side of the relay a connection belongs to. Fixed at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRole {
    Web,
    Extension,
}

impl ClientRole {
    /// The extension path selects [`ClientRole::Extension`]; every other path is a web client.
    pub fn from_path(path: &str, extension_path: &str) -> Self {
        fn normalize(p: &str) -> &str {
            match p.trim_end_matches('/') {
                "" => "/",
                trimmed => trimmed,
            }
        }
        if normalize(path) == normalize(extension_path) {
            ClientRole::Extension
        } else {
            ClientRole::Web
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientRole::Web => "web",
            ClientRole::Extension => "extension",
        }
    }
}

impl std::fmt::Display for ClientRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    WebClient,
    Unregistered,
    RegisteredExtension { version: Option<String> },
}

/// Frames queued for the connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(Arc<String>),
    Ping,
}

pub struct Connection {
    pub id: ConnectionId,
    role: ClientRole,
    /// Diagnostic only.
    pub remote: Option<SocketAddr>,
    state: Mutex<ConnectionState>,
    tx: mpsc::Sender<Frame>,
    is_alive: AtomicBool,
    dropped_frames: AtomicU64,
    closed: CancellationToken,
    pub connected_at: Instant,
}

impl Connection {
    pub fn new(role: ClientRole, remote: Option<SocketAddr>, tx: mpsc::Sender<Frame>) -> Self {
        let state = match role {
            ClientRole::Web => ConnectionState::WebClient,
            ClientRole::Extension => ConnectionState::Unregistered,
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            remote,
            state: Mutex::new(state),
            tx,
            is_alive: AtomicBool::new(true),
            dropped_frames: AtomicU64::new(0),
            closed: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    pub fn is_registered(&self) -> bool {
        matches!(*self.state.lock(), ConnectionState::RegisteredExtension { .. })
    }

    /// Transition to `RegisteredExtension`. Only the registry calls this.
    /// Returns `true` the first time.
    pub(crate) fn set_registered(&self, version: Option<String>) -> bool {
        let mut state = self.state.lock();
        let first = !matches!(*state, ConnectionState::RegisteredExtension { .. });
        *state = ConnectionState::RegisteredExtension { version };
        first
    }

    /// Queue a pre-serialized text frame. Never blocks.
    ///
    /// Returns `false` if the queue is full or the writer is gone.
    pub fn send_text(&self, text: Arc<String>) -> bool {
        self.push(Frame::Text(text))
    }

    pub fn send(&self, envelope: &Envelope) -> bool {
        match envelope.to_json() {
            Ok(json) => self.send_text(Arc::new(json)),
            Err(e) => {
                tracing::warn!("Failed to serialize envelope for {}: {}", self.id, e);
                false
            }
        }
    }

    pub fn send_ping(&self) -> bool {
        self.push(Frame::Ping)
    }

    fn push(&self, frame: Frame) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Record a sign of life (pong frame, `ping`/`pong` envelope).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Read and clear the liveness flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Ask the socket tasks to shut down. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once [`Connection::close`] has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .field("remote", &self.remote)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(role: ClientRole) -> (Connection, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(4);
        (Connection::new(role, None, tx), rx)
    }

    #[test]
    fn test_role_from_path() {
        assert_eq!(ClientRole::from_path("/extension", "/extension"), ClientRole::Extension);
        assert_eq!(ClientRole::from_path("/extension/", "/extension"), ClientRole::Extension);
        assert_eq!(ClientRole::from_path("/extensions", "/extension"), ClientRole::Web);
        assert_eq!(ClientRole::from_path("/", "/extension"), ClientRole::Web);
        assert_eq!(ClientRole::from_path("/ws", "/extension"), ClientRole::Web);
    }

    #[test]
    fn test_initial_state_follows_role() {
        let (web, _rx) = make_connection(ClientRole::Web);
        assert_eq!(web.state(), ConnectionState::WebClient);
        let (ext, _rx) = make_connection(ClientRole::Extension);
        assert_eq!(ext.state(), ConnectionState::Unregistered);
        assert!(!ext.is_registered());
    }

    #[test]
    fn test_set_registered_reports_first_transition() {
        let (ext, _rx) = make_connection(ClientRole::Extension);
        assert!(ext.set_registered(Some("1.0".to_string())));
        assert!(!ext.set_registered(Some("1.1".to_string())));
        assert_eq!(
            ext.state(),
            ConnectionState::RegisteredExtension { version: Some("1.1".to_string()) }
        );
    }

    #[tokio::test]
    async fn test_send_envelope() {
        let (conn, mut rx) = make_connection(ClientRole::Web);
        assert!(conn.send(&Envelope::message("Ready")));
        match rx.recv().await.unwrap() {
            Frame::Text(text) => {
                let v: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(v["type"], "message");
                assert_eq!(v["payload"], "Ready");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(ClientRole::Web, None, tx);
        assert!(conn.send_ping());
        assert!(!conn.send_ping());
        assert_eq!(conn.dropped_frames(), 1);
    }

    #[test]
    fn test_closed_connection_refuses_frames() {
        let (conn, _rx) = make_connection(ClientRole::Web);
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert!(!conn.send_ping());
    }

    #[test]
    fn test_liveness_flag() {
        let (conn, _rx) = make_connection(ClientRole::Web);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }
}
