//! # mpctl
//!
//! Multipath policy-routing daemon core for multi-homed hosts.
//!
//! A host with WiFi and cellular up at the same time normally sends all
//! outbound traffic over the single default route. mpctl watches every
//! interface and installs source policy routing so traffic bound to an
//! interface's own address leaves through that interface, while a keep-alive
//! loop stops the platform from powering down the idle secondary transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    MultipathSession                     │
//! │        (one worker task, sequential event queue)        │
//! ├───────────────────────────┬─────────────────────────────┤
//! │     InterfaceMonitor      │     KeepAliveScheduler      │
//! │   fingerprint diffing     │  periodic gate re-assertion │
//! ├───────────────────────────┼─────────────────────────────┤
//! │    PolicyRouteManager     │   SecondaryPathKeepAlive    │
//! │  per-iface tables/rules   │   anchor route + usage gate │
//! │  via `ip`                 │                             │
//! ├───────────────────────────┴─────────────────────────────┤
//! │   CommandRunner · InterfaceProvider · GatewayLookup ·   │
//! │   ConnectivityControl      (platform collaborators)     │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all, clippy::pedantic)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)] // ASCII diagram in docs
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_possible_truncation)]

pub mod cmd;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod gateway;
pub mod iface;
pub mod keepalive;
pub mod monitor;
pub mod route;
pub mod scheduler;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use session::{Collaborators, MultipathSession, SessionEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
