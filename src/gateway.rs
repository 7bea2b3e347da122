//! Per-interface gateway resolution.
//!
//! The platform publishes next-hop addresses in its property store under two
//! well-known keys per interface; the first non-empty value wins. Gateways
//! are re-resolved on every setup, never cached.

use std::sync::Arc;

use crate::cmd::CommandRunner;

/// Resolves the next-hop gateway for an interface.
pub trait GatewayLookup: Send + Sync {
    fn gateway(&self, iface: &str) -> Option<String>;
}

/// Property-store lookup through the unprivileged runner (`getprop`).
pub struct PropertyGateway {
    runner: Arc<dyn CommandRunner>,
}

impl PropertyGateway {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn property(&self, key: &str) -> Option<String> {
        let output = self.runner.run(&format!("getprop {key}")).ok()?;
        if !output.success {
            return None;
        }
        let value = output.lines.first()?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

impl GatewayLookup for PropertyGateway {
    fn gateway(&self, iface: &str) -> Option<String> {
        self.property(&format!("net.{iface}.gw"))
            .or_else(|| self.property(&format!("dhcp.{iface}.gateway")))
    }
}
