//! Caller IP matching against API key allow-lists.
//!
//! An allow-list entry is either a single address (`192.168.1.5`) or a CIDR
//! network (`10.0.0.0/8`, `2001:db8::/32`). Host bits in a network entry are
//! ignored, so `10.1.2.3/8` means `10.0.0.0/8`. IPv4-mapped IPv6 entries
//! (`::ffff:10.0.0.0/104`) are stored as their IPv4 equivalent.

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net};

/// One parsed allow-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowEntry {
    Address(IpAddr),
    Network(IpNet),
}

impl AllowEntry {
    /// Parse an entry; anything containing `/` is treated as a network.
    pub fn parse(entry: &str) -> Result<Self, String> {
        let entry = entry.trim();
        if entry.contains('/') {
            entry
                .parse::<IpNet>()
                .map(|net| AllowEntry::Network(canonical_network(net)))
                .map_err(|err| format!("invalid network '{entry}': {err}"))
        } else {
            entry
                .parse::<IpAddr>()
                .map(|addr| AllowEntry::Address(addr.to_canonical()))
                .map_err(|err| format!("invalid address '{entry}': {err}"))
        }
    }

    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            AllowEntry::Address(addr) => addr == ip,
            AllowEntry::Network(net) => net.contains(ip),
        }
    }
}

/// `::ffff:a.b.c.d/n` with `n >= 96` becomes `a.b.c.d/(n - 96)`.
fn canonical_network(net: IpNet) -> IpNet {
    let IpNet::V6(v6) = net else {
        return net;
    };
    match v6.addr().to_ipv4_mapped() {
        Some(v4) if v6.prefix_len() >= 96 => {
            Ipv4Net::new(v4, v6.prefix_len() - 96).map_or(net, IpNet::V4)
        }
        _ => net,
    }
}

/// Whether `caller_ip` is covered by at least one entry of `allow_list`.
///
/// Fails closed: an unparseable caller IP is denied. Malformed entries are
/// logged and skipped so the remaining entries still apply.
pub fn ip_allowed(caller_ip: &str, allow_list: &[String]) -> bool {
    let caller = match caller_ip.trim().parse::<IpAddr>() {
        // IPv4-mapped IPv6 callers are compared as plain IPv4
        Ok(ip) => ip.to_canonical(),
        Err(_) => {
            tracing::error!(ip_address = %caller_ip, "Invalid client IP address");
            return false;
        }
    };

    allow_list
        .iter()
        .filter_map(|raw| match AllowEntry::parse(raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::error!(entry = %raw, error = %err, "Invalid IP/network in allowed list");
                None
            }
        })
        .any(|entry| entry.matches(&caller))
}
