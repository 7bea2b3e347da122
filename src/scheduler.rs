//! Periodic re-assertion of the secondary path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::SessionEvent;

/// Suspend-gap guard: re-assert only when the previous tick was recent.
///
/// A gap of two periods or more means the host slept through ticks. On
/// resume the platform is re-establishing its own networks; one beat is
/// skipped instead of fighting that.
pub(crate) fn should_assert(enabled: bool, elapsed: Duration, period: Duration) -> bool {
    enabled && elapsed < period * 2
}

/// Periodic task that keeps the concurrent-secondary gate asserted.
///
/// Two states: idle and running. `start` fires one immediate tick and then
/// reschedules every `period`; `stop` cancels the pending tick. Assertions
/// are dispatched into the session queue rather than run here, so every
/// side effect stays on the session's sequential context.
pub struct KeepAliveScheduler {
    period: Duration,
    enabled: Arc<AtomicBool>,
    events: mpsc::Sender<SessionEvent>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAliveScheduler {
    pub fn new(
        period: Duration,
        enabled: Arc<AtomicBool>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            period,
            enabled,
            events,
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Transition idle → running. A second start is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            warn!("keep-alive scheduler already running");
            return;
        }

        let period = self.period;
        let enabled = Arc::clone(&self.enabled);
        let events = self.events.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut last_tick = Instant::now();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        if should_assert(enabled.load(Ordering::Relaxed), now - last_tick, period) {
                            if events.send(SessionEvent::KeepAlive).await.is_err() {
                                // session gone
                                break;
                            }
                        } else {
                            debug!("skipping keep-alive assertion");
                        }
                        last_tick = now;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            debug!("keep-alive scheduler stopped");
        }));
    }

    /// Transition running → idle. No further ticks fire.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        drop(self.task.lock().take());
    }
}
