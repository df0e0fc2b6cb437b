//! Gating Metrics

use metrics::Counter;

use crate::gate::Gate;

#[derive(Clone, Debug)]
struct GateCounters {
    allowed: Counter,
    denied: Counter,
}

impl GateCounters {
    fn new(gate: Gate) -> Self {
        Self {
            allowed: metrics::counter!("gating.allowed_total", "gate" => gate.as_str()),
            denied: metrics::counter!("gating.denied_total", "gate" => gate.as_str()),
        }
    }
}

/// Gating Metrics
#[derive(Clone, Debug)]
pub(crate) struct GatingMetrics {
    dial_peer: GateCounters,
    dial_addr: GateCounters,
    accept_raw: GateCounters,
    accept_secured: GateCounters,
    /// Number of private addresses learned from inbound connections
    private_addrs_learned_total: Counter,
}

impl Default for GatingMetrics {
    fn default() -> Self {
        Self {
            dial_peer: GateCounters::new(Gate::DialPeer),
            dial_addr: GateCounters::new(Gate::DialAddr),
            accept_raw: GateCounters::new(Gate::AcceptRaw),
            accept_secured: GateCounters::new(Gate::AcceptSecured),
            private_addrs_learned_total: metrics::counter!("gating.private_addrs_learned_total"),
        }
    }
}

impl GatingMetrics {
    fn counters(&self, gate: Gate) -> &GateCounters {
        match gate {
            Gate::DialPeer => &self.dial_peer,
            Gate::DialAddr => &self.dial_addr,
            Gate::AcceptRaw => &self.accept_raw,
            Gate::AcceptSecured => &self.accept_secured,
        }
    }

    /// Count one decision at a checkpoint.
    pub(crate) fn record(&self, gate: Gate, allowed: bool) {
        let counters = self.counters(gate);
        if allowed {
            counters.allowed.increment(1);
        } else {
            counters.denied.increment(1);
        }
    }

    pub(crate) fn inc_private_addrs_learned(&self) {
        self.private_addrs_learned_total.increment(1);
    }
}
