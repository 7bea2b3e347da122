//! Network interface enumeration.
//!
//! Snapshots are read fresh from the OS on every poll; nothing here is
//! cached. The `InterfaceProvider` trait is the seam tests substitute
//! fixtures through.

use std::collections::BTreeMap;
use std::net::IpAddr;

/// One address bound to an interface at observation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AddrAssignment {
    pub addr: IpAddr,
    pub prefix_len: u8,
}

impl AddrAssignment {
    pub fn new(addr: IpAddr, prefix_len: u8) -> Self {
        Self { addr, prefix_len }
    }

    /// `addr/prefix` form used for fingerprints.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.addr, self.prefix_len)
    }
}

/// Snapshot of one host interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetIface {
    pub name: String,
    pub is_up: bool,
    pub is_loopback: bool,
    pub addrs: Vec<AddrAssignment>,
}

/// Source of interface snapshots.
pub trait InterfaceProvider: Send + Sync {
    fn interfaces(&self) -> Vec<NetIface>;
}

/// getifaddrs-backed provider.
pub struct SystemInterfaces;

impl InterfaceProvider for SystemInterfaces {
    fn interfaces(&self) -> Vec<NetIface> {
        enumerate()
    }
}

#[cfg(unix)]
fn enumerate() -> Vec<NetIface> {
    use std::ffi::CStr;

    let mut by_name: BTreeMap<String, NetIface> = BTreeMap::new();

    unsafe {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if libc::getifaddrs(std::ptr::addr_of_mut!(ifaddrs)) != 0 {
            return Vec::new();
        }

        let mut current = ifaddrs;
        while !current.is_null() {
            let ifa = &*current;
            current = ifa.ifa_next;

            if ifa.ifa_name.is_null() {
                continue;
            }

            let name = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();
            let flags = ifa.ifa_flags as i32;
            let entry = by_name.entry(name.clone()).or_insert_with(|| NetIface {
                name,
                is_up: flags & libc::IFF_UP != 0,
                is_loopback: flags & libc::IFF_LOOPBACK != 0,
                addrs: Vec::new(),
            });

            if ifa.ifa_addr.is_null() {
                continue;
            }

            #[allow(clippy::cast_ptr_alignment)]
            match i32::from((*ifa.ifa_addr).sa_family) {
                libc::AF_INET => {
                    let sa = ifa.ifa_addr.cast::<libc::sockaddr_in>();
                    let addr = std::net::Ipv4Addr::from(u32::from_be((*sa).sin_addr.s_addr));
                    let prefix_len = if ifa.ifa_netmask.is_null() {
                        32
                    } else {
                        let mask = ifa.ifa_netmask.cast::<libc::sockaddr_in>();
                        u32::from_be((*mask).sin_addr.s_addr).count_ones() as u8
                    };
                    entry
                        .addrs
                        .push(AddrAssignment::new(IpAddr::V4(addr), prefix_len));
                }
                libc::AF_INET6 => {
                    let sa = ifa.ifa_addr.cast::<libc::sockaddr_in6>();
                    let addr = std::net::Ipv6Addr::from((*sa).sin6_addr.s6_addr);
                    let prefix_len = if ifa.ifa_netmask.is_null() {
                        128
                    } else {
                        let mask = ifa.ifa_netmask.cast::<libc::sockaddr_in6>();
                        (*mask)
                            .sin6_addr
                            .s6_addr
                            .iter()
                            .map(|b| b.count_ones() as u8)
                            .sum()
                    };
                    entry
                        .addrs
                        .push(AddrAssignment::new(IpAddr::V6(addr), prefix_len));
                }
                _ => {}
            }
        }

        libc::freeifaddrs(ifaddrs);
    }

    by_name.into_values().collect()
}

#[cfg(not(unix))]
fn enumerate() -> Vec<NetIface> {
    Vec::new()
}
