//! Session lifecycle and the sequential execution context.
//!
//! All mutable state (the fingerprint map, in-flight probe waits) is
//! confined to one worker task. External wake-ups, scheduler ticks and flag
//! flips enter through a single mpsc queue and are serviced in order, so the
//! monitor needs no locking at all.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cmd::CommandRunner;
use crate::config::Config;
use crate::connectivity::ConnectivityControl;
use crate::error::{Error, Result};
use crate::gateway::GatewayLookup;
use crate::iface::InterfaceProvider;
use crate::keepalive::SecondaryPathKeepAlive;
use crate::monitor::InterfaceMonitor;
use crate::route::PolicyRouteManager;
use crate::scheduler::KeepAliveScheduler;

/// Work items serviced by the session worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// External "network changed" wake-up.
    NetworkChanged,
    /// The scheduler decided the concurrent-secondary gate should be
    /// re-asserted.
    KeepAlive,
    /// Multipath feature flag flipped.
    SetEnabled(bool),
    /// Stop servicing events.
    Shutdown,
}

/// External collaborators a session is wired to.
pub struct Collaborators {
    pub runner: Arc<dyn CommandRunner>,
    pub interfaces: Arc<dyn InterfaceProvider>,
    pub gateway: Arc<dyn GatewayLookup>,
    pub connectivity: Arc<dyn ConnectivityControl>,
}

/// Owned multipath session: monitor, policy routes, keep-alive and scheduler
/// behind one start/stop lifecycle.
pub struct MultipathSession {
    enabled: Arc<AtomicBool>,
    events: mpsc::Sender<SessionEvent>,
    scheduler: Arc<KeepAliveScheduler>,
    keepalive: Arc<SecondaryPathKeepAlive>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MultipathSession {
    /// Wire up and start a session. The worker performs an initial poll
    /// right away; the scheduler fires its first assertion immediately.
    pub fn spawn(config: &Config, collab: Collaborators) -> Self {
        let enabled = Arc::new(AtomicBool::new(config.enabled));

        let keepalive = Arc::new(SecondaryPathKeepAlive::new(
            config.keepalive.clone(),
            Arc::clone(&collab.connectivity),
        ));
        let routes = Arc::new(PolicyRouteManager::new(
            Arc::clone(&collab.runner),
            Arc::clone(&collab.gateway),
            Arc::clone(&keepalive),
            config.secondary_prefixes.clone(),
        ));
        let mut monitor = InterfaceMonitor::new(Arc::clone(&collab.interfaces), routes);

        if config.bounce_on_start {
            bounce_interfaces(&*collab.runner, &*collab.interfaces, &config.bounce_skip);
        }

        let (events, mut rx) = mpsc::channel(64);
        let scheduler = Arc::new(KeepAliveScheduler::new(
            config.keepalive.period,
            Arc::clone(&enabled),
            events.clone(),
        ));

        let poll_interval = config.poll_interval;
        let worker_enabled = Arc::clone(&enabled);
        let worker_keepalive = Arc::clone(&keepalive);

        let worker = tokio::spawn(async move {
            // first tick is immediate: the initial poll happens at startup
            let mut ticker = tokio::time::interval(poll_interval);

            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(SessionEvent::NetworkChanged) => {
                            let enabled = worker_enabled.load(Ordering::Relaxed);
                            worker_keepalive.set_active(enabled);
                            if monitor.poll(enabled).await {
                                info!("interface state changed");
                            }
                        }
                        Some(SessionEvent::KeepAlive) => {
                            worker_keepalive.set_active(worker_enabled.load(Ordering::Relaxed));
                        }
                        Some(SessionEvent::SetEnabled(value)) => {
                            // dedupe here, against worker-owned state: the
                            // handle-side atomic lags behind queued toggles
                            if worker_enabled.load(Ordering::Relaxed) != value {
                                worker_enabled.store(value, Ordering::Relaxed);
                                monitor.poll(value).await;
                            }
                        }
                        Some(SessionEvent::Shutdown) | None => break,
                    },
                    _ = ticker.tick() => {
                        monitor.poll(worker_enabled.load(Ordering::Relaxed)).await;
                    }
                }
            }
            debug!("session worker stopped");
        });

        scheduler.start();

        Self {
            enabled,
            events,
            scheduler,
            keepalive,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Inject an external network-changed wake-up.
    pub async fn notify_network_changed(&self) -> Result<()> {
        self.events
            .send(SessionEvent::NetworkChanged)
            .await
            .map_err(|_| Error::SessionStopped)
    }

    /// Flip the multipath feature flag. Always enqueued; the worker dedupes
    /// against its own state so rapid toggles settle on the last request.
    /// Polls on both transitions, so a disable tears installed rules down
    /// promptly.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.events
            .send(SessionEvent::SetEnabled(enabled))
            .await
            .map_err(|_| Error::SessionStopped)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Stop the scheduler, cancel any in-flight probe wait and join the
    /// worker. In-flight privileged commands are left to finish; cleanup is
    /// best-effort by design.
    pub async fn stop(&self) {
        self.scheduler.stop();
        self.keepalive.cancellation_token().cancel();
        let _ = self.events.send(SessionEvent::Shutdown).await;

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "session worker did not shut down cleanly");
            }
        }
    }
}

/// Cycle every active non-loopback link so established connections come
/// back up under the new policy routes. Skips names in `skip`: bouncing the
/// primary WiFi link would cut the session out from under itself.
fn bounce_interfaces(
    runner: &dyn CommandRunner,
    provider: &dyn InterfaceProvider,
    skip: &[String],
) {
    for iface in provider.interfaces() {
        if iface.is_loopback || !iface.is_up || iface.addrs.is_empty() {
            continue;
        }
        if skip.iter().any(|s| iface.name.contains(s.as_str())) {
            continue;
        }

        info!(iface = %iface.name, "cycling link");
        for op in ["down", "up"] {
            let command = format!("ip link set {} {op}", iface.name);
            if let Err(e) = runner.run_privileged(&command) {
                warn!(command = %command, error = %e, "link cycle command failed");
            }
        }
    }
}
