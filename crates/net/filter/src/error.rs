//! Filter construction errors.

use thiserror::Error;

/// Errors raised while building address filters from configuration.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid CIDR range {cidr:?}: {source}")]
    InvalidCidr {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },
    #[error("invalid multiaddr {addr:?}: {reason}")]
    InvalidMultiaddr { addr: String, reason: String },
}
