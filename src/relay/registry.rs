//! Registry of live connections and the audiences broadcasts are sent to.

use crate::error::RegistrationError;
use crate::relay::connection::{ClientRole, Connection, ConnectionId};
use crate::relay::protocol::Envelope;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Every live connection, keyed by id. All set mutation goes through here.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    pub web: usize,
    pub extensions: usize,
    pub registered_extensions: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection. Returns `false` if the id was already present.
    pub fn add(&self, conn: Arc<Connection>) -> bool {
        let mut conns = self.connections.write();
        if conns.contains_key(&conn.id) {
            return false;
        }
        tracing::info!(
            "{} client connected: {} ({})",
            conn.role(),
            conn.id,
            conn.remote.map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string())
        );
        conns.insert(conn.id.clone(), conn);
        true
    }

    /// Stop tracking a connection. Only the first call returns it.
    pub fn remove(&self, id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.write().remove(id);
        if let Some(conn) = &removed {
            tracing::info!("{} client disconnected: {}", conn.role(), conn.id);
        }
        removed
    }

    /// Move an extension into `RegisteredExtension`.
    ///
    /// Returns `Ok(true)` on first registration and `Ok(false)` when it was
    /// already registered (the version is refreshed either way).
    pub fn mark_registered(
        &self,
        id: &str,
        version: Option<String>,
    ) -> Result<bool, RegistrationError> {
        let conn = self
            .get(id)
            .ok_or_else(|| RegistrationError::UnknownConnection(id.to_string()))?;
        if conn.role() != ClientRole::Extension {
            return Err(RegistrationError::NotAnExtension);
        }
        let first = conn.set_registered(version.clone());
        if first {
            tracing::info!(
                "Extension {} registered (version {})",
                id,
                version.as_deref().unwrap_or("unknown")
            );
        } else {
            tracing::debug!("Extension {} registered again", id);
        }
        Ok(first)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.get(id).map(|c| c.is_registered()).unwrap_or(false)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.read().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    pub fn all_of_role(&self, role: ClientRole) -> Vec<Arc<Connection>> {
        self.select(|c| c.role() == role)
    }

    pub fn all_registered_extensions(&self) -> Vec<Arc<Connection>> {
        self.select(|c| c.role() == ClientRole::Extension && c.is_registered())
    }

    /// Every web connection.
    pub fn web_audience(&self) -> Audience {
        Audience::new("web clients", self.all_of_role(ClientRole::Web))
    }

    /// Every extension that completed the `register` handshake.
    pub fn registered_extension_audience(&self) -> Audience {
        Audience::new("registered extensions", self.all_registered_extensions())
    }

    pub fn counts(&self) -> RegistryCounts {
        let conns = self.connections.read();
        let mut counts = RegistryCounts::default();
        for conn in conns.values() {
            match conn.role() {
                ClientRole::Web => counts.web += 1,
                ClientRole::Extension => {
                    counts.extensions += 1;
                    if conn.is_registered() {
                        counts.registered_extensions += 1;
                    }
                }
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, pred: impl Fn(&Connection) -> bool) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .values()
            .filter(|c| pred(c))
            .cloned()
            .collect()
    }
}

/// A snapshot of recipients. Taken outside any lock-held section, so sending
/// never contends with registry writers.
pub struct Audience {
    label: &'static str,
    members: Vec<Arc<Connection>>,
}

impl Audience {
    fn new(label: &'static str, members: Vec<Arc<Connection>>) -> Self {
        Self { label, members }
    }

    /// Serialize once and queue the frame on every member.
    ///
    /// Returns how many members accepted the frame.
    pub fn broadcast(&self, envelope: &Envelope) -> usize {
        if self.members.is_empty() {
            return 0;
        }
        let json = match envelope.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                tracing::warn!("Failed to serialize broadcast to {}: {}", self.label, e);
                return 0;
            }
        };
        let mut delivered = 0;
        for conn in &self.members {
            if conn.send_text(Arc::clone(&json)) {
                delivered += 1;
            } else {
                tracing::warn!("Failed to queue frame for {} {}", conn.role(), conn.id);
            }
        }
        tracing::debug!(
            "Broadcast to {}: {}/{} delivered",
            self.label,
            delivered,
            self.members.len()
        );
        delivered
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|c| c.id.clone()).collect()
    }
}
