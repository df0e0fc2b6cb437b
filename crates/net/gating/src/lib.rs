//! Connection gating for libp2p hosts.
//!
//! [`GatingState`] decides, at four checkpoints of a connection's lifetime,
//! whether the connection may proceed. Decisions combine peer ban/trust sets
//! with banned, trusted and learned-private address filters.
//!
//! [`GatingBehaviour`] plugs any [`DialGate`] + [`AcceptGate`] into a swarm.

mod behaviour;
mod error;
mod events;
mod gate;
mod metrics;
mod state;

pub use behaviour::GatingBehaviour;
pub use error::GatingError;
pub use events::{EventEmitter, GatingEvent};
pub use gate::{AcceptGate, DialGate, Direction, Gate, TrustPolicy};
pub use state::{GatingSnapshot, GatingState};
