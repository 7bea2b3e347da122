//! Error types for mpctl.
//!
//! Routing operations themselves absorb their failures (a long-lived
//! background responsibility has nobody to report to); errors here cover the
//! edges that do have a caller: configuration, lifecycle and I/O.

use std::io;

use thiserror::Error;

/// Result type alias for mpctl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mpctl.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Lifecycle errors
    #[error("session already stopped")]
    SessionStopped,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
