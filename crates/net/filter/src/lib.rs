//! Address classification and filtering for libp2p multiaddrs.
//!
//! - [`scope`] - private range membership and scope classification
//! - [`filter`] - ordered (range, action) filter sets
//! - [`advertise`] - selection of externally advertised addresses

pub mod advertise;
pub mod error;
pub mod filter;
pub mod scope;

pub use advertise::{advertised_addrs, parse_multiaddr};
pub use error::FilterError;
pub use filter::{Action, FilterRule, FilterSet};
pub use scope::{
    AddressScope, DEFAULT_PRIVATE_CIDRS, PrivateRanges, extract_ip, host_range, parse_cidr,
};
