//! Per-interface policy rule and route management.
//!
//! Every command is best-effort: a failure is logged and the next command
//! still runs. There is no transaction and no rollback — the `ip` tool
//! offers neither, and partially applied state beats none. Neither `setup`
//! nor `reset` ever surfaces an error.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use super::table::table_for;
use crate::cmd::CommandRunner;
use crate::gateway::GatewayLookup;
use crate::iface::{AddrAssignment, NetIface};
use crate::keepalive::SecondaryPathKeepAlive;

/// IP versions policy routes are managed for. IPv4 only for now; `setup` and
/// `reset` both iterate this list so IPv6 slots in without restructuring.
const IP_VERSIONS: &[u8] = &[4];

/// Strip a `%zone` suffix from an address string.
pub fn remove_scope(addr: &str) -> &str {
    match addr.find('%') {
        Some(pos) => &addr[..pos],
        None => addr,
    }
}

/// Network address of `addr`'s `prefix_len`-bit subnet. IPv4 only; other
/// families yield `None` and the caller skips the assignment.
pub fn subnet_of(addr: IpAddr, prefix_len: u8) -> Option<Ipv4Addr> {
    match addr {
        IpAddr::V4(v4) if prefix_len <= 32 => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix_len))
            };
            Some(Ipv4Addr::from(u32::from(v4) & mask))
        }
        _ => None,
    }
}

fn is_link_local(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Synthesizes and tears down per-interface policy routing.
pub struct PolicyRouteManager {
    runner: Arc<dyn CommandRunner>,
    gateway: Arc<dyn GatewayLookup>,
    keepalive: Arc<SecondaryPathKeepAlive>,
    secondary_prefixes: Vec<String>,
}

impl PolicyRouteManager {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        gateway: Arc<dyn GatewayLookup>,
        keepalive: Arc<SecondaryPathKeepAlive>,
        secondary_prefixes: Vec<String>,
    ) -> Self {
        Self {
            runner,
            gateway,
            keepalive,
            secondary_prefixes,
        }
    }

    /// Whether `name` follows the secondary-transport naming convention.
    pub fn is_secondary(&self, name: &str) -> bool {
        self.secondary_prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()))
    }

    /// Install policy rules and routes for `iface`.
    ///
    /// `addrs` is the effective address list decided by the caller — the
    /// monitor passes an empty list to tear down without re-adding. With
    /// `update` the table is reset first; the empty check sits after the
    /// reset for exactly that reason.
    pub async fn setup(&self, iface: &NetIface, addrs: &[AddrAssignment], update: bool) {
        let table = table_for(&iface.name);

        if update {
            self.reset(&iface.name);
        }

        if addrs.is_empty() {
            return;
        }

        for assignment in addrs {
            if is_link_local(assignment.addr) {
                continue;
            }

            let Some(gateway_raw) = self.gateway.gateway(&iface.name) else {
                debug!(iface = %iface.name, addr = %assignment.addr, "no gateway, skipping address");
                continue;
            };
            let gateway = remove_scope(&gateway_raw);

            let host_raw = assignment.addr.to_string();
            let host = remove_scope(&host_raw);

            if host.is_empty() || gateway.is_empty() {
                continue;
            }

            let Some(subnet) = subnet_of(assignment.addr, assignment.prefix_len) else {
                continue;
            };

            self.best_effort(&format!("ip -4 rule add from {host} table {table}"));
            self.best_effort(&format!(
                "ip -4 route add {subnet}/{prefix} dev {name} scope link table {table}",
                prefix = assignment.prefix_len,
                name = iface.name,
            ));
            self.best_effort(&format!(
                "ip -4 route add default via {gateway} dev {name} table {table}",
                name = iface.name,
            ));

            if self.is_secondary(&iface.name) {
                // blocks this context for up to the full probe window
                self.keepalive.probe_and_request_route().await;
            }
        }
    }

    /// Remove every rule and route this manager may have installed for
    /// `name`'s table.
    ///
    /// `ip rule delete table T` is not reliable across iproute2 builds, so
    /// matching rule priorities are collected from `ip rule show` and deleted
    /// one by one after the table flush.
    pub fn reset(&self, name: &str) {
        let table = table_for(name);

        for version in IP_VERSIONS {
            let priorities = self.existing_rules(*version, table);
            self.best_effort(&format!("ip -{version} route flush table {table}"));
            for prio in priorities {
                self.best_effort(&format!("ip -{version} rule delete prio {prio}"));
            }
        }
    }

    /// Priorities of rules whose lookup target is `table`.
    fn existing_rules(&self, version: u8, table: u32) -> Vec<u32> {
        let Ok(pattern) = Regex::new(&format!(r"^(\d+):.*\blookup {table}\s*$")) else {
            return Vec::new();
        };

        let output = match self.runner.run(&format!("ip -{version} rule show")) {
            Ok(output) if output.success => output,
            Ok(_) | Err(_) => {
                debug!(version, table, "rule listing failed");
                return Vec::new();
            }
        };

        output
            .lines
            .iter()
            .filter_map(|line| pattern.captures(line))
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .collect()
    }

    fn best_effort(&self, command: &str) {
        match self.runner.run_privileged(command) {
            Ok(output) if output.success => debug!(command = %command, "applied"),
            Ok(_) => warn!(command = %command, "command exited non-zero"),
            Err(e) => warn!(command = %command, error = %e, "command failed to run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use parking_lot::Mutex;

    use super::*;
    use crate::cmd::CommandOutput;
    use crate::connectivity::UnsupportedConnectivity;
    use crate::keepalive::KeepAliveConfig;

    struct RecordingRunner {
        privileged: Mutex<Vec<String>>,
        rule_lines: Vec<String>,
    }

    impl RecordingRunner {
        fn new(rule_lines: Vec<String>) -> Self {
            Self {
                privileged: Mutex::new(Vec::new()),
                rule_lines,
            }
        }

        fn commands(&self) -> Vec<String> {
            self.privileged.lock().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command_line: &str) -> io::Result<CommandOutput> {
            let lines = if command_line.ends_with("rule show") {
                self.rule_lines.clone()
            } else {
                Vec::new()
            };
            Ok(CommandOutput {
                success: true,
                lines,
            })
        }

        fn run_privileged(&self, command_line: &str) -> io::Result<CommandOutput> {
            self.privileged.lock().push(command_line.to_string());
            Ok(CommandOutput {
                success: true,
                lines: Vec::new(),
            })
        }
    }

    struct FixedGateway(Option<String>);

    impl GatewayLookup for FixedGateway {
        fn gateway(&self, _iface: &str) -> Option<String> {
            self.0.clone()
        }
    }

    fn manager(
        runner: Arc<RecordingRunner>,
        gateway: Option<&str>,
    ) -> PolicyRouteManager {
        let keepalive = Arc::new(SecondaryPathKeepAlive::new(
            KeepAliveConfig::default(),
            Arc::new(UnsupportedConnectivity),
        ));
        PolicyRouteManager::new(
            runner,
            Arc::new(FixedGateway(gateway.map(str::to_string))),
            keepalive,
            vec!["rmnet".to_string()],
        )
    }

    fn iface(name: &str, addrs: &[(&str, u8)]) -> NetIface {
        NetIface {
            name: name.to_string(),
            is_up: true,
            is_loopback: false,
            addrs: addrs
                .iter()
                .map(|(a, p)| AddrAssignment::new(a.parse().unwrap(), *p))
                .collect(),
        }
    }

    #[test]
    fn scope_suffix_is_stripped() {
        assert_eq!(remove_scope("fe80::1%wlan0"), "fe80::1");
        assert_eq!(remove_scope("192.168.1.1"), "192.168.1.1");
        assert_eq!(remove_scope("%eth0"), "");
    }

    #[test]
    fn subnet_masks_host_bits() {
        assert_eq!(
            subnet_of("192.168.1.50".parse().unwrap(), 24),
            Some(Ipv4Addr::new(192, 168, 1, 0))
        );
        assert_eq!(
            subnet_of("10.99.3.7".parse().unwrap(), 8),
            Some(Ipv4Addr::new(10, 0, 0, 0))
        );
        assert_eq!(
            subnet_of("10.0.0.1".parse().unwrap(), 0),
            Some(Ipv4Addr::new(0, 0, 0, 0))
        );
        assert_eq!(subnet_of("fe80::1".parse().unwrap(), 64), None);
    }

    #[tokio::test]
    async fn setup_issues_rule_and_routes_per_address() {
        let runner = Arc::new(RecordingRunner::new(Vec::new()));
        let mgr = manager(Arc::clone(&runner), Some("192.168.1.1"));
        let table = table_for("wlan0");
        let wlan0 = iface("wlan0", &[("192.168.1.50", 24)]);

        mgr.setup(&wlan0, &wlan0.addrs, false).await;

        assert_eq!(
            runner.commands(),
            vec![
                format!("ip -4 rule add from 192.168.1.50 table {table}"),
                format!("ip -4 route add 192.168.1.0/24 dev wlan0 scope link table {table}"),
                format!("ip -4 route add default via 192.168.1.1 dev wlan0 table {table}"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_gateway_skips_address_only() {
        let runner = Arc::new(RecordingRunner::new(Vec::new()));
        let mgr = manager(Arc::clone(&runner), None);
        let wlan0 = iface("wlan0", &[("192.168.1.50", 24)]);

        mgr.setup(&wlan0, &wlan0.addrs, false).await;
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn link_local_addresses_are_skipped() {
        let runner = Arc::new(RecordingRunner::new(Vec::new()));
        let mgr = manager(Arc::clone(&runner), Some("192.168.1.1"));
        let wlan0 = iface("wlan0", &[("169.254.12.7", 16), ("fe80::2", 64)]);

        mgr.setup(&wlan0, &wlan0.addrs, false).await;
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn empty_addresses_with_update_is_teardown_only() {
        let table = table_for("rmnet0");
        let runner = Arc::new(RecordingRunner::new(vec![
            "0:\tfrom all lookup local".to_string(),
            format!("12021:\tfrom 10.32.0.5 lookup {table}"),
        ]));
        let mgr = manager(Arc::clone(&runner), Some("10.32.0.1"));
        let rmnet0 = iface("rmnet0", &[("10.32.0.5", 30)]);

        mgr.setup(&rmnet0, &[], true).await;
        assert_eq!(
            runner.commands(),
            vec![
                format!("ip -4 route flush table {table}"),
                "ip -4 rule delete prio 12021".to_string(),
            ]
        );
    }

    #[test]
    fn reset_matches_only_this_table() {
        let table = table_for("wlan0");
        let other = table + 1;
        let runner = Arc::new(RecordingRunner::new(vec![
            "0:\tfrom all lookup local".to_string(),
            format!("17000:\tfrom 192.168.1.50 lookup {table}"),
            format!("17001:\tfrom 10.0.0.2 lookup {other}"),
            format!("17002:\tfrom 192.168.1.51 lookup {table} "),
            "not a rule line".to_string(),
        ]));
        let mgr = manager(Arc::clone(&runner), Some("192.168.1.1"));

        mgr.reset("wlan0");
        assert_eq!(
            runner.commands(),
            vec![
                format!("ip -4 route flush table {table}"),
                "ip -4 rule delete prio 17000".to_string(),
                "ip -4 rule delete prio 17002".to_string(),
            ]
        );
    }

    #[test]
    fn secondary_prefix_match() {
        let runner = Arc::new(RecordingRunner::new(Vec::new()));
        let mgr = manager(runner, None);
        assert!(mgr.is_secondary("rmnet0"));
        assert!(mgr.is_secondary("rmnet_data1"));
        assert!(!mgr.is_secondary("wlan0"));
    }
}
