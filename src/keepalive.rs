//! Secondary-path keep-alive.
//!
//! A secondary transport that carries no default traffic gets powered down
//! by the platform. Two counter-measures: a dedicated route toward a fixed,
//! reserved-but-resolvable host pins the transport to a live route, and the
//! concurrent-usage feature is re-asserted while the gate conditions hold.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::lookup_host;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connectivity::{ConnectivityControl, TransportState};

/// Keep-alive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// Reassertion period for the concurrent-usage gate.
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,

    /// Hostname resolved to anchor the dedicated route. example.org is
    /// IANA-reserved: resolvable everywhere, wanted by nobody.
    #[serde(default = "default_lookup_host")]
    pub lookup_host: String,

    /// Connectivity poll attempts before proceeding anyway.
    #[serde(default = "default_attempts")]
    pub connect_attempts: u32,

    /// Delay between connectivity poll attempts.
    #[serde(default = "default_attempt_interval", with = "humantime_serde")]
    pub attempt_interval: Duration,
}

fn default_period() -> Duration {
    Duration::from_millis(5000)
}
fn default_lookup_host() -> String {
    "example.org".into()
}
fn default_attempts() -> u32 {
    30
}
fn default_attempt_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            lookup_host: default_lookup_host(),
            connect_attempts: default_attempts(),
            attempt_interval: default_attempt_interval(),
        }
    }
}

/// Outcome of a keep-alive probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Transport reported connected; route requested.
    Ready,
    /// Attempts exhausted without a connected report; route requested anyway.
    TimedOut,
    /// Wait cancelled (session shutdown); no route requested.
    Cancelled,
    /// Lookup host did not resolve to an IPv4 address; nothing done.
    Unresolved,
}

/// Keeps the secondary transport usable while the primary carries default
/// traffic.
pub struct SecondaryPathKeepAlive {
    config: KeepAliveConfig,
    control: Arc<dyn ConnectivityControl>,
    cancel: CancellationToken,
}

impl SecondaryPathKeepAlive {
    pub fn new(config: KeepAliveConfig, control: Arc<dyn ConnectivityControl>) -> Self {
        Self {
            config,
            control,
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed by the probe wait; cancel it on session teardown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve the anchor host, wait (bounded) for the secondary transport to
    /// report connected, then request a dedicated route to the resolved
    /// address.
    ///
    /// Blocks the calling context for up to
    /// `connect_attempts * attempt_interval`; only invoke it from a context
    /// where that is acceptable.
    pub async fn probe_and_request_route(&self) -> ProbeOutcome {
        let Some(addr) = self.resolve_anchor().await else {
            debug!(host = %self.config.lookup_host, "anchor host did not resolve");
            return ProbeOutcome::Unresolved;
        };

        let outcome = self.wait_for_secondary().await;
        if outcome == ProbeOutcome::Cancelled {
            return outcome;
        }

        self.control.request_route(addr);
        info!(%addr, ?outcome, "requested dedicated route over secondary transport");
        outcome
    }

    /// Gate for concurrent secondary-transport usage: mobile data enabled,
    /// WiFi connected and the multipath flag must all hold. Idempotent.
    pub fn set_active(&self, enabled: bool) {
        if self.control.is_mobile_data_enabled() && self.control.is_wifi_connected() && enabled {
            self.control.start_secondary();
        } else {
            self.control.stop_secondary();
        }
    }

    async fn resolve_anchor(&self) -> Option<Ipv4Addr> {
        // the port is irrelevant, lookup_host just needs one
        let addrs = lookup_host((self.config.lookup_host.as_str(), 80))
            .await
            .ok()?;
        addrs
            .filter_map(|sa| match sa.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .next()
    }

    async fn wait_for_secondary(&self) -> ProbeOutcome {
        for _ in 0..self.config.connect_attempts {
            if self.control.secondary_state() == TransportState::Connected {
                return ProbeOutcome::Ready;
            }
            tokio::select! {
                () = self.cancel.cancelled() => return ProbeOutcome::Cancelled,
                () = tokio::time::sleep(self.config.attempt_interval) => {}
            }
        }

        warn!(
            attempts = self.config.connect_attempts,
            "secondary transport never reported connected"
        );
        ProbeOutcome::TimedOut
    }
}
