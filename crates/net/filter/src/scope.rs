//! IP address scope classification.
//!
//! [`PrivateRanges`] is the fixed set of non-globally-routable IPv4 ranges used
//! to decide whether a peer address is private. It is built once at start-up and
//! cloned into every component that needs it; nothing mutates it afterwards.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use ipnet::IpNet;
use libp2p::Multiaddr;
use libp2p::multiaddr::Protocol;

use crate::error::FilterError;

/// Ranges treated as private unless configured otherwise.
pub const DEFAULT_PRIVATE_CIDRS: [&str; 6] = [
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "100.64.0.0/10",
    "198.18.0.0/15",
    "169.254.0.0/16",
];

/// Classification of IP address scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressScope {
    /// Loopback addresses (127.0.0.0/8, ::1)
    Loopback,
    /// Addresses inside one of the configured private ranges
    Private,
    /// Link-local addresses outside the private ranges (fe80::/10)
    LinkLocal,
    /// Public/global addresses (everything else)
    Public,
}

/// Immutable set of private address ranges.
///
/// Cheap to clone; the ranges are shared.
#[derive(Debug, Clone)]
pub struct PrivateRanges {
    ranges: Arc<[IpNet]>,
}

impl Default for PrivateRanges {
    fn default() -> Self {
        let ranges = DEFAULT_PRIVATE_CIDRS
            .iter()
            .filter_map(|cidr| cidr.parse::<IpNet>().ok())
            .collect::<Vec<_>>();
        Self {
            ranges: ranges.into(),
        }
    }
}

impl PrivateRanges {
    /// Build from explicit ranges.
    pub fn new(ranges: impl IntoIterator<Item = IpNet>) -> Self {
        Self {
            ranges: ranges.into_iter().collect::<Vec<_>>().into(),
        }
    }

    /// Parse ranges from CIDR strings. A malformed entry is a configuration error.
    pub fn from_cidrs<S: AsRef<str>>(cidrs: &[S]) -> Result<Self, FilterError> {
        let ranges = cidrs
            .iter()
            .map(|cidr| parse_cidr(cidr.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(ranges))
    }

    /// The configured ranges.
    pub fn ranges(&self) -> &[IpNet] {
        &self.ranges
    }

    /// Check whether an IP falls inside any private range.
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        self.ranges.iter().any(|net| net.contains(&ip))
    }

    /// Check whether a multiaddr points at a private IP.
    ///
    /// Multiaddrs without an IP component (memory, dns) are never private.
    pub fn is_private(&self, addr: &Multiaddr) -> bool {
        extract_ip(addr)
            .map(|ip| self.contains_ip(ip))
            .unwrap_or(false)
    }

    /// Classify the scope of a multiaddr.
    ///
    /// Returns `None` if the multiaddr doesn't contain an IP address or
    /// if the IP is unspecified (0.0.0.0, ::).
    pub fn classify_multiaddr(&self, addr: &Multiaddr) -> Option<AddressScope> {
        extract_ip(addr).and_then(|ip| self.classify_ip(ip))
    }

    fn classify_ip(&self, ip: IpAddr) -> Option<AddressScope> {
        if ip.is_unspecified() {
            return None;
        }
        if ip.is_loopback() {
            return Some(AddressScope::Loopback);
        }
        if self.contains_ip(ip) {
            return Some(AddressScope::Private);
        }
        match ip {
            IpAddr::V4(v4) => classify_ipv4(v4),
            IpAddr::V6(v6) => classify_ipv6(v6),
        }
    }
}

fn classify_ipv4(ip: Ipv4Addr) -> Option<AddressScope> {
    if ip.is_broadcast() {
        None
    } else if ip.is_link_local() {
        Some(AddressScope::LinkLocal)
    } else {
        Some(AddressScope::Public)
    }
}

fn classify_ipv6(ip: Ipv6Addr) -> Option<AddressScope> {
    if ip.is_unicast_link_local() {
        Some(AddressScope::LinkLocal)
    } else {
        Some(AddressScope::Public)
    }
}

/// Extract the IP address from a multiaddr.
///
/// Returns `None` if the multiaddr doesn't contain an IP protocol.
pub fn extract_ip(addr: &Multiaddr) -> Option<IpAddr> {
    addr.iter().find_map(|proto| match proto {
        Protocol::Ip4(ip) => Some(IpAddr::V4(ip)),
        Protocol::Ip6(ip) => Some(IpAddr::V6(ip)),
        _ => None,
    })
}

/// The single-host range enclosing an IP (/32 for IPv4, /128 for IPv6).
pub fn host_range(ip: IpAddr) -> IpNet {
    IpNet::from(ip)
}

/// Parse a CIDR string into a network range.
pub fn parse_cidr(cidr: &str) -> Result<IpNet, FilterError> {
    cidr.trim()
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|source| FilterError::InvalidCidr {
            cidr: cidr.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_ranges_are_private() {
        let ranges = PrivateRanges::default();
        assert_eq!(ranges.ranges().len(), 6);

        for s in [
            "/ip4/10.0.0.1/tcp/8302",
            "/ip4/10.255.255.255/tcp/8302",
            "/ip4/172.16.0.1/tcp/8302",
            "/ip4/172.31.255.255/tcp/8302",
            "/ip4/192.168.1.20/tcp/8302",
            "/ip4/100.64.0.1/tcp/8302",
            "/ip4/100.127.255.255/tcp/8302",
            "/ip4/198.18.0.1/tcp/8302",
            "/ip4/198.19.255.255/tcp/8302",
            "/ip4/169.254.10.10/udp/8302/quic-v1",
        ] {
            assert!(ranges.is_private(&addr(s)), "{s} should be private");
        }
    }

    #[test]
    fn test_public_addresses() {
        let ranges = PrivateRanges::default();
        for s in [
            "/ip4/8.8.8.8/tcp/8302",
            "/ip4/172.15.255.255/tcp/8302",
            "/ip4/172.32.0.0/tcp/8302",
            "/ip4/100.128.0.1/tcp/8302",
            "/ip4/198.20.0.1/tcp/8302",
            "/ip6/2001:db8::1/tcp/8302",
        ] {
            assert!(!ranges.is_private(&addr(s)), "{s} should be public");
        }
    }

    #[test]
    fn test_non_ip_addresses_are_not_private() {
        let ranges = PrivateRanges::default();
        assert!(!ranges.is_private(&addr("/memory/1234")));
        assert!(!ranges.is_private(&addr("/dns4/example.com/tcp/8302")));
    }

    #[test]
    fn test_classify_multiaddr() {
        let ranges = PrivateRanges::default();
        assert_eq!(
            ranges.classify_multiaddr(&addr("/ip4/127.0.0.1/tcp/1")),
            Some(AddressScope::Loopback)
        );
        assert_eq!(
            ranges.classify_multiaddr(&addr("/ip4/10.1.2.3/tcp/1")),
            Some(AddressScope::Private)
        );
        // 169.254/16 is one of the configured private ranges
        assert_eq!(
            ranges.classify_multiaddr(&addr("/ip4/169.254.1.1/tcp/1")),
            Some(AddressScope::Private)
        );
        assert_eq!(
            ranges.classify_multiaddr(&addr("/ip6/fe80::1/tcp/1")),
            Some(AddressScope::LinkLocal)
        );
        assert_eq!(
            ranges.classify_multiaddr(&addr("/ip4/1.1.1.1/tcp/1")),
            Some(AddressScope::Public)
        );
        assert_eq!(ranges.classify_multiaddr(&addr("/ip4/0.0.0.0/tcp/1")), None);
        assert_eq!(ranges.classify_multiaddr(&addr("/memory/1")), None);
    }

    #[test]
    fn test_custom_ranges() {
        let ranges = PrivateRanges::from_cidrs(&["203.0.113.0/24"]).unwrap();
        assert!(ranges.is_private(&addr("/ip4/203.0.113.9/tcp/1")));
        assert!(!ranges.is_private(&addr("/ip4/10.0.0.1/tcp/1")));
    }

    #[test]
    fn test_parse_cidr_rejects_garbage() {
        assert!(matches!(
            parse_cidr("10.0.0.0/33"),
            Err(FilterError::InvalidCidr { .. })
        ));
        assert!(parse_cidr("not-a-cidr").is_err());
        // host bits are truncated
        assert_eq!(
            parse_cidr("10.1.2.3/8").unwrap(),
            "10.0.0.0/8".parse::<IpNet>().unwrap()
        );
    }

    #[test]
    fn test_host_range() {
        let v4 = host_range("192.168.1.5".parse().unwrap());
        assert_eq!(v4.prefix_len(), 32);
        let v6 = host_range("fd00::5".parse().unwrap());
        assert_eq!(v6.prefix_len(), 128);
    }
}
