//! mpctl daemon - policy-routed multipath for multi-homed Linux hosts.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use mpctl::cmd::{is_root, CommandRunner, SystemRunner};
use mpctl::config::{init_logging, Config, LoggingConfig};
use mpctl::connectivity::UnsupportedConnectivity;
use mpctl::error::Result;
use mpctl::gateway::PropertyGateway;
use mpctl::iface::SystemInterfaces;
use mpctl::{Collaborators, MultipathSession, VERSION};

#[derive(Debug, Parser)]
#[command(name = "mpctl", version = VERSION, about = "Multipath policy-routing daemon")]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config
    /// file when set.
    #[arg(long)]
    log_level: Option<String>,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Start with multipath routing disabled.
    #[arg(long)]
    disabled: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };
    if cli.disabled {
        config.enabled = false;
    }

    init_logging(&resolve_logging(&cli, &config))?;

    info!(version = VERSION, enabled = config.enabled, "starting mpctl");

    if !is_root() {
        warn!("not running as root; ip commands will likely fail");
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let session = MultipathSession::spawn(
        &config,
        Collaborators {
            runner: Arc::clone(&runner),
            interfaces: Arc::new(SystemInterfaces),
            gateway: Arc::new(PropertyGateway::new(runner)),
            connectivity: Arc::new(UnsupportedConnectivity),
        },
    );

    signal::ctrl_c().await?;
    info!("shutting down");
    session.stop().await;

    Ok(())
}

/// Config-file logging settings with CLI flags layered on top; flags only
/// win when actually passed.
fn resolve_logging(cli: &Cli, config: &Config) -> LoggingConfig {
    let mut logging = config.logging.clone();
    if let Some(ref level) = cli.log_level {
        logging.level = level.clone();
    }
    if cli.no_color {
        logging.color = false;
    }
    logging
}
