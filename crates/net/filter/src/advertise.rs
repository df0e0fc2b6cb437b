//! Selection of the addresses a node advertises to the wider network.

use libp2p::Multiaddr;
use tracing::trace;

use crate::error::FilterError;
use crate::scope::PrivateRanges;

/// Addresses worth advertising: the listen addresses plus the configured
/// external address, minus anything inside a private range.
pub fn advertised_addrs(
    listen_addrs: &[Multiaddr],
    external_addr: Option<&Multiaddr>,
    private: &PrivateRanges,
) -> Vec<Multiaddr> {
    listen_addrs
        .iter()
        .chain(external_addr)
        .filter(|addr| {
            let keep = !private.is_private(addr);
            if !keep {
                trace!(%addr, "not advertising private address");
            }
            keep
        })
        .cloned()
        .collect()
}

/// Parse a multiaddr from configuration input.
pub fn parse_multiaddr(s: &str) -> Result<Multiaddr, FilterError> {
    s.trim()
        .parse::<Multiaddr>()
        .map_err(|e| FilterError::InvalidMultiaddr {
            addr: s.to_string(),
            reason: e.to_string(),
        })
}
