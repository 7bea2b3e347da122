//! Connectivity control surface for the secondary transport.
//!
//! Queries and toggles are platform-owned; this module only defines the
//! seam. Implementations log their own failures — callers never see one.

use std::fmt;
use std::net::Ipv4Addr;

use tracing::debug;

/// Connection state of a transport as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connected,
    Connecting,
    Disconnected,
    /// The platform cannot report a state.
    Unknown,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Connected => write!(f, "connected"),
            TransportState::Connecting => write!(f, "connecting"),
            TransportState::Disconnected => write!(f, "disconnected"),
            TransportState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Platform surface controlling concurrent use of the secondary transport.
pub trait ConnectivityControl: Send + Sync {
    /// Whether mobile data is administratively enabled. Implementations that
    /// cannot determine this must return false.
    fn is_mobile_data_enabled(&self) -> bool;

    /// Whether WiFi currently has (or is establishing) a connection.
    fn is_wifi_connected(&self) -> bool;

    /// Connection state of the secondary transport.
    fn secondary_state(&self) -> TransportState;

    /// Start the concurrent-secondary-transport feature.
    fn start_secondary(&self);

    /// Stop the concurrent-secondary-transport feature.
    fn stop_secondary(&self);

    /// Request a dedicated route to `addr` over the secondary transport.
    fn request_route(&self, addr: Ipv4Addr);
}

/// Safe default for hosts without a connectivity control surface.
///
/// Reports mobile data as disabled and the secondary state as unknown, so
/// the keep-alive gate stays off rather than guessing.
pub struct UnsupportedConnectivity;

impl ConnectivityControl for UnsupportedConnectivity {
    fn is_mobile_data_enabled(&self) -> bool {
        false
    }

    fn is_wifi_connected(&self) -> bool {
        false
    }

    fn secondary_state(&self) -> TransportState {
        TransportState::Unknown
    }

    fn start_secondary(&self) {
        debug!("no connectivity surface; start request ignored");
    }

    fn stop_secondary(&self) {
        debug!("no connectivity surface; stop request ignored");
    }

    fn request_route(&self, addr: Ipv4Addr) {
        debug!(%addr, "no connectivity surface; route request ignored");
    }
}
