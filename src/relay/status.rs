//! Status broadcasts to web clients, with a single cancellable "Ready" reversion.

use crate::relay::protocol::Envelope;
use crate::relay::registry::ConnectionRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct StatusBoard {
    registry: Arc<ConnectionRegistry>,
    pending: Arc<Mutex<Reversion>>,
}

/// The one scheduled "Ready". A timer only broadcasts if its generation is
/// still current when it wakes.
#[derive(Default)]
struct Reversion {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Reversion {
    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl StatusBoard {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            pending: Arc::new(Mutex::new(Reversion::default())),
        }
    }

    /// Broadcast to every web client, cancelling any pending reversion first.
    pub fn announce(&self, envelope: &Envelope) -> usize {
        let mut pending = self.pending.lock();
        pending.invalidate();
        self.registry.web_audience().broadcast(envelope)
    }

    /// Broadcast now, then revert web clients to "Ready" after `delay`.
    ///
    /// The broadcast and the schedule happen under one lock, so a concurrent
    /// [`StatusBoard::announce`] lands either before both or after both.
    pub fn announce_then_ready(&self, envelope: &Envelope, delay: Duration) -> usize {
        let mut pending = self.pending.lock();
        pending.invalidate();
        let delivered = self.registry.web_audience().broadcast(envelope);
        self.arm(&mut pending, delay);
        delivered
    }

    /// Replace any pending reversion with a new one.
    pub fn schedule_ready(&self, delay: Duration) {
        let mut pending = self.pending.lock();
        pending.invalidate();
        self.arm(&mut pending, delay);
    }

    fn arm(&self, pending: &mut Reversion, delay: Duration) {
        let generation = pending.generation;
        let registry = Arc::clone(&self.registry);
        let slot = Arc::clone(&self.pending);
        pending.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut pending = slot.lock();
            if pending.generation != generation {
                return;
            }
            pending.handle = None;
            registry.web_audience().broadcast(&Envelope::ready());
        }));
    }

    pub fn cancel_pending(&self) {
        self.pending.lock().invalidate();
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for StatusBoard {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
