//! Ordered CIDR filter sets.
//!
//! A [`FilterSet`] maps an address to [`Action::Accept`] or [`Action::Deny`].
//! Among the rules whose range contains the address, the longest prefix wins;
//! rules of equal prefix length resolve to the most recently added one. When no
//! rule matches, or the address carries no IP component, the set's default
//! action applies.
//!
//! Rules are only ever appended.

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use libp2p::Multiaddr;

use crate::error::FilterError;
use crate::scope::{extract_ip, parse_cidr};

/// Outcome attached to a filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accept,
    Deny,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// A single (range, action) rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterRule {
    pub range: IpNet,
    pub action: Action,
}

/// Ordered, append-only collection of filter rules with a default action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    default_action: Action,
    rules: Vec<FilterRule>,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::accept_by_default()
    }
}

impl FilterSet {
    /// Empty set with the given default action.
    pub fn new(default_action: Action) -> Self {
        Self {
            default_action,
            rules: Vec::new(),
        }
    }

    /// Empty set that accepts anything no rule denies.
    pub fn accept_by_default() -> Self {
        Self::new(Action::Accept)
    }

    /// Empty set that denies anything no rule accepts.
    pub fn deny_by_default() -> Self {
        Self::new(Action::Deny)
    }

    /// Build a set where every CIDR gets the same action.
    pub fn from_cidrs<S: AsRef<str>>(
        cidrs: &[S],
        action: Action,
        default_action: Action,
    ) -> Result<Self, FilterError> {
        let mut set = Self::new(default_action);
        for cidr in cidrs {
            set.add_rule(parse_cidr(cidr.as_ref())?, action);
        }
        Ok(set)
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule.
    pub fn add_rule(&mut self, range: IpNet, action: Action) {
        self.rules.push(FilterRule { range, action });
    }

    /// Append a rule unless the identical rule is already present.
    ///
    /// Returns `true` if the rule was added.
    pub fn add_rule_unique(&mut self, range: IpNet, action: Action) -> bool {
        let rule = FilterRule { range, action };
        if self.rules.contains(&rule) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Resolve the action for an IP.
    pub fn action_for_ip(&self, ip: IpAddr) -> Action {
        let mut best: Option<(u8, Action)> = None;
        for rule in &self.rules {
            if !rule.range.contains(&ip) {
                continue;
            }
            let len = rule.range.prefix_len();
            match best {
                // later rules win ties
                Some((best_len, _)) if len < best_len => {}
                _ => best = Some((len, rule.action)),
            }
        }
        best.map(|(_, action)| action)
            .unwrap_or(self.default_action)
    }

    /// Resolve the action for a multiaddr.
    pub fn action_for(&self, addr: &Multiaddr) -> Action {
        match extract_ip(addr) {
            Some(ip) => self.action_for_ip(ip),
            None => self.default_action,
        }
    }

    /// Whether the address resolves to [`Action::Deny`].
    pub fn blocked(&self, addr: &Multiaddr) -> bool {
        self.action_for(addr) == Action::Deny
    }

    /// Whether the IP resolves to [`Action::Deny`].
    pub fn ip_blocked(&self, ip: IpAddr) -> bool {
        self.action_for_ip(ip) == Action::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_set_uses_default() {
        let accept = FilterSet::accept_by_default();
        assert!(!accept.blocked(&addr("/ip4/10.0.0.1/tcp/1")));

        let deny = FilterSet::deny_by_default();
        assert!(deny.blocked(&addr("/ip4/10.0.0.1/tcp/1")));
        assert!(deny.blocked(&addr("/ip6/2001:db8::1/tcp/1")));
    }

    #[test]
    fn test_non_ip_address_uses_default() {
        let mut set = FilterSet::accept_by_default();
        set.add_rule(net("0.0.0.0/0"), Action::Deny);
        assert!(!set.blocked(&addr("/memory/42")));

        let set = FilterSet::deny_by_default();
        assert!(set.blocked(&addr("/memory/42")));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut set = FilterSet::accept_by_default();
        set.add_rule(net("10.1.2.0/24"), Action::Accept);
        set.add_rule(net("10.0.0.0/8"), Action::Deny);

        // The /24 is more specific even though the /8 was added later
        assert!(!set.blocked(&addr("/ip4/10.1.2.3/tcp/1")));
        assert!(set.blocked(&addr("/ip4/10.9.9.9/tcp/1")));
        assert!(!set.blocked(&addr("/ip4/11.0.0.1/tcp/1")));
    }

    #[test]
    fn test_equal_prefix_last_added_wins() {
        let mut set = FilterSet::accept_by_default();
        set.add_rule(net("192.168.0.0/16"), Action::Deny);
        assert!(set.blocked(&addr("/ip4/192.168.4.4/tcp/1")));

        set.add_rule(net("192.168.0.0/16"), Action::Accept);
        assert!(!set.blocked(&addr("/ip4/192.168.4.4/tcp/1")));
    }

    #[test]
    fn test_families_do_not_cross_match() {
        let mut set = FilterSet::accept_by_default();
        set.add_rule(net("0.0.0.0/0"), Action::Deny);
        assert!(set.blocked(&addr("/ip4/1.2.3.4/tcp/1")));
        assert!(!set.blocked(&addr("/ip6/2001:db8::1/tcp/1")));

        set.add_rule(net("::/0"), Action::Deny);
        assert!(set.blocked(&addr("/ip6/2001:db8::1/tcp/1")));
    }

    #[test]
    fn test_add_rule_unique_is_idempotent() {
        let mut set = FilterSet::deny_by_default();
        assert!(set.add_rule_unique(net("10.0.0.7/32"), Action::Accept));
        let once = set.clone();
        assert!(!set.add_rule_unique(net("10.0.0.7/32"), Action::Accept));
        assert_eq!(set, once);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_from_cidrs() {
        let set =
            FilterSet::from_cidrs(&["10.0.0.0/8", "192.168.1.0/24"], Action::Accept, Action::Deny)
                .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.default_action(), Action::Deny);
        assert!(!set.blocked(&addr("/ip4/192.168.1.9/tcp/1")));
        assert!(set.blocked(&addr("/ip4/192.168.2.9/tcp/1")));

        let err = FilterSet::from_cidrs(&["10.0.0.0/8", "bogus"], Action::Deny, Action::Accept);
        assert!(matches!(err, Err(FilterError::InvalidCidr { .. })));
    }
}
