//! Periodic ping sweep that evicts connections which stopped answering.

use crate::relay::connection::ConnectionId;
use crate::relay::registry::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections that were alive and got a fresh ping.
    pub pinged: usize,
    pub evicted: Vec<ConnectionId>,
}

pub struct LivenessMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// One heartbeat cycle.
    ///
    /// A connection whose flag is still clear from the previous cycle never
    /// answered that ping and is evicted. Every other connection has its flag
    /// cleared and is pinged again.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for conn in self.registry.all() {
            if conn.check_alive() {
                conn.send_ping();
                report.pinged += 1;
                continue;
            }
            // Only the caller that actually removed it reports the eviction.
            if self.registry.remove(&conn.id).is_some() {
                tracing::info!("Evicting unresponsive {} client {}", conn.role(), conn.id);
                report.evicted.push(conn.id.clone());
            }
            conn.close();
        }
        report
    }

    /// Run [`LivenessMonitor::sweep`] every interval until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let now = Instant::now();
            let first = now.checked_add(self.interval).unwrap_or(now);
            let mut ticker = time::interval_at(first, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("Heartbeat running every {}s", self.interval.as_secs());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.sweep();
                        if report.evicted.is_empty() {
                            tracing::debug!("Heartbeat pinged {} connections", report.pinged);
                        } else {
                            tracing::info!(
                                "Heartbeat pinged {} connections, evicted {}",
                                report.pinged,
                                report.evicted.len()
                            );
                        }
                    }
                    () = cancel.cancelled() => {
                        tracing::debug!("Heartbeat stopped");
                        break;
                    }
                }
            }
        })
    }
}
