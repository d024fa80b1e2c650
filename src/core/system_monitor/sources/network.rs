//! Connectivity, private/public addresses and the active interface MAC.
//!
//! Connectivity and public addresses go through the [`LookupCache`]; local
//! interface data comes from sysinfo plus the platform routing tools.

use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use sysinfo::Networks;

use crate::core::system_monitor::cache::{LookupCache, LookupKey};
use crate::core::system_monitor::source::{SharedSource, TelemetrySource};
use crate::core::system_monitor::{Domain, InterfaceAddress, NetworkReading, Reading, UnavailableReason};
use crate::platform::probe::read_trimmed;
use crate::platform::{blocking, CapabilityProfile, OsFamily, Probe, Tool};

pub fn for_platform(os: OsFamily, probe: Probe, cache: Arc<LookupCache>) -> SharedSource<NetworkReading> {
    let route = match os {
        OsFamily::Linux | OsFamily::Android => DefaultRoute::IpRoute,
        OsFamily::MacOs => DefaultRoute::RouteGet,
        OsFamily::Windows => DefaultRoute::NetRoute,
        OsFamily::Other => DefaultRoute::Unknown,
    };
    Arc::new(NetworkSource { probe, cache, route })
}

/// How the default-route interface is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultRoute {
    /// `ip route show default`, then `route -n`
    IpRoute,
    /// `route -n get default`
    RouteGet,
    /// PowerShell `Get-NetRoute`
    NetRoute,
    Unknown,
}

struct NetworkSource {
    probe: Probe,
    cache: Arc<LookupCache>,
    route: DefaultRoute,
}

/// Local interface data captured once per read.
struct InterfaceTable {
    /// interface name -> MAC (only non-zero addresses)
    macs: BTreeMap<String, String>,
    private_ipv4: Vec<InterfaceAddress>,
    private_ipv6: Vec<InterfaceAddress>,
}

impl InterfaceTable {
    fn capture() -> Self {
        let networks = Networks::new_with_refreshed_list();
        let mut macs = BTreeMap::new();
        let mut private_ipv4 = Vec::new();
        let mut private_ipv6 = Vec::new();

        for (name, data) in networks.iter() {
            let mac = data.mac_address();
            if !mac.is_unspecified() && !is_loopback_name(name) {
                macs.insert(name.to_string(), normalize_mac(&mac.to_string()));
            }

            for network in data.ip_networks() {
                let entry = InterfaceAddress {
                    interface: name.to_string(),
                    address: network.addr.to_string(),
                };
                match network.addr {
                    IpAddr::V4(v4) if is_private_ipv4(&v4) => private_ipv4.push(entry),
                    IpAddr::V6(v6) if is_private_ipv6(&v6) => private_ipv6.push(entry),
                    _ => {}
                }
            }
        }

        private_ipv4.sort_by(|a, b| a.interface.cmp(&b.interface).then(a.address.cmp(&b.address)));
        private_ipv6.sort_by(|a, b| a.interface.cmp(&b.interface).then(a.address.cmp(&b.address)));

        Self {
            macs,
            private_ipv4,
            private_ipv6,
        }
    }
}

impl NetworkSource {
    async fn default_interface(&self, caps: &CapabilityProfile) -> Option<String> {
        match self.route {
            DefaultRoute::IpRoute => {
                if let Ok(out) = self.probe.run(caps, Tool::Ip, &["route", "show", "default"]).await {
                    if let Some(iface) = parse_ip_route_default(&out) {
                        return Some(iface);
                    }
                }
                let out = self.probe.run(caps, Tool::Route, &["-n"]).await.ok()?;
                parse_route_table_default(&out)
            }
            DefaultRoute::RouteGet => {
                let out = self
                    .probe
                    .run(caps, Tool::Route, &["-n", "get", "default"])
                    .await
                    .ok()?;
                parse_route_get_interface(&out)
            }
            DefaultRoute::NetRoute => {
                let out = self
                    .probe
                    .powershell(
                        caps,
                        "(Get-NetRoute -DestinationPrefix 0.0.0.0/0 | Sort-Object RouteMetric | Select-Object -First 1).InterfaceAlias",
                    )
                    .await
                    .ok()?;
                let alias = out.trim();
                (!alias.is_empty()).then(|| alias.to_string())
            }
            DefaultRoute::Unknown => None,
        }
    }

    /// Hardware address of `iface` when sysinfo did not report one.
    async fn hardware_address(&self, caps: &CapabilityProfile, iface: &str) -> Option<String> {
        match self.route {
            DefaultRoute::IpRoute => {
                let path = format!("/sys/class/net/{}/address", iface);
                blocking(move || read_trimmed(path))
                    .await
                    .ok()?
                    .ok()
                    .map(|mac| normalize_mac(&mac))
                    .filter(|mac| mac != "00:00:00:00:00:00")
            }
            DefaultRoute::RouteGet => {
                let out = self.probe.run(caps, Tool::Ifconfig, &[iface]).await.ok()?;
                parse_ifconfig_ether(&out)
            }
            DefaultRoute::NetRoute => {
                let out = self
                    .probe
                    .run(caps, Tool::Getmac, &["/fo", "csv", "/nh", "/v"])
                    .await
                    .ok()?;
                parse_getmac_csv(&out, iface)
            }
            DefaultRoute::Unknown => None,
        }
    }

    async fn active_mac(&self, caps: &CapabilityProfile, table: &InterfaceTable) -> Reading<String> {
        if let Some(iface) = self.default_interface(caps).await {
            if let Some(mac) = table.macs.get(&iface) {
                return Reading::Available(mac.clone());
            }
            if let Some(mac) = self.hardware_address(caps, &iface).await {
                return Reading::Available(mac);
            }
            log::debug!("No hardware address found for default interface {}", iface);
        }

        // First non-loopback interface in name order
        Reading::from_option(table.macs.values().next().cloned(), UnavailableReason::QueryFailed)
    }

    async fn lookup_public(&self, connected: &Reading<bool>) -> (Reading<String>, Reading<String>) {
        if connected == &Reading::Available(false) {
            let offline = Reading::Unavailable(UnavailableReason::QueryFailed);
            return (offline.clone(), offline);
        }
        futures_util::future::join(
            self.cache.get(LookupKey::PublicIpv4),
            self.cache.get(LookupKey::PublicIpv6),
        )
        .await
    }
}

impl TelemetrySource for NetworkSource {
    type Output = NetworkReading;

    fn domain(&self) -> Domain {
        Domain::Network
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<NetworkReading>> {
        Box::pin(async move {
            let table = match blocking(InterfaceTable::capture).await {
                Ok(table) => table,
                Err(reason) => return Reading::Unavailable(reason),
            };

            let connected = connectivity_from_lookup(self.cache.get(LookupKey::Connectivity).await);
            let (public_ipv4, public_ipv6) = self.lookup_public(&connected).await;
            let active_mac = self.active_mac(caps, &table).await;

            Reading::Available(NetworkReading {
                connected,
                private_ipv4: table.private_ipv4,
                private_ipv6: table.private_ipv6,
                public_ipv4,
                public_ipv6,
                active_mac,
            })
        })
    }
}

/// Every connectivity endpoint failing means "offline", not "unknown".
pub fn connectivity_from_lookup(lookup: Reading<String>) -> Reading<bool> {
    match lookup {
        Reading::Available(_) => Reading::Available(true),
        Reading::Unavailable(UnavailableReason::QueryFailed) => Reading::Available(false),
        Reading::Unavailable(reason) => Reading::Unavailable(reason),
    }
}

/// RFC1918 ranges.
pub fn is_private_ipv4(addr: &Ipv4Addr) -> bool {
    addr.is_private()
}

/// Unique-local (fc00::/7) and link-local (fe80::/10) addresses.
pub fn is_private_ipv6(addr: &Ipv6Addr) -> bool {
    let first = addr.segments()[0];
    !addr.is_loopback() && ((first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80)
}

fn is_loopback_name(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.to_lowercase().contains("loopback")
}

pub fn normalize_mac(raw: &str) -> String {
    raw.trim().replace('-', ":").to_lowercase()
}

/// `default via 192.168.1.1 dev wlan0 proto dhcp metric 600`
pub fn parse_ip_route_default(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            parts.find(|p| *p == "dev")?;
            parts.next().map(str::to_string)
        })
}

/// Kernel routing table from `route -n`; the default route has destination 0.0.0.0.
pub fn parse_route_table_default(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 8 && parts[0] == "0.0.0.0" {
            parts.last().map(|s| s.to_string())
        } else {
            None
        }
    })
}

/// `interface: en0` line of `route -n get default`.
pub fn parse_route_get_interface(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("interface:")
            .map(|iface| iface.trim().to_string())
            .filter(|iface| !iface.is_empty())
    })
}

/// `ether a4:83:e7:12:34:56` line of `ifconfig <iface>`.
pub fn parse_ifconfig_ether(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("ether") => parts.next().map(normalize_mac),
            _ => None,
        }
    })
}

/// Row of `getmac /fo csv /nh /v` whose connection name is `iface`.
pub fn parse_getmac_csv(output: &str, iface: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split("\",\"").map(|f| f.trim_matches('"')).collect();
        if fields.len() >= 3 && fields[0].eq_ignore_ascii_case(iface) && fields[2].contains('-') {
            Some(normalize_mac(fields[2]))
        } else {
            None
        }
    })
}
