//! Offline admission decisions.

use bastion_net_gating::{AcceptGate, DialGate, Direction, GatingState};
use tracing::debug;

use super::Verdict;
use crate::cli::{AcceptArgs, DialArgs};

/// `can_dial_peer`, then `can_dial_addr` when an address is given.
pub(crate) fn dial(state: &GatingState, args: &DialArgs) -> Verdict {
    if !state.can_dial_peer(&args.peer) {
        return Verdict::Deny;
    }
    let allowed = args
        .addr
        .as_ref()
        .is_none_or(|addr| state.can_dial_addr(&args.peer, addr));
    Verdict::from_allowed(allowed)
}

/// `can_accept_raw`, then `can_accept_authenticated` when a peer is given.
pub(crate) fn accept(state: &GatingState, args: &AcceptArgs) -> Verdict {
    if !state.can_accept_raw(&args.addr) {
        return Verdict::Deny;
    }
    let allowed = args.peer.as_ref().is_none_or(|peer| {
        state.can_accept_authenticated(Direction::Inbound, peer, &args.addr)
    });
    debug!(known_private_addrs = state.snapshot().known_private_addrs, "after accept");
    Verdict::from_allowed(allowed)
}
