//! Connection lifecycle management for libp2p hosts.
//!
//! - [`BasicConnManager`] - tags, protection, watermark trimming and decaying tags
//! - [`LifecycleManager`] - proxies a manager and runs connect/disconnect hooks
//! - [`ConnManagerBehaviour`] - wires a [`Notifiee`] into a swarm and executes trim closes

mod basic;
mod behaviour;
mod closer;
mod config;
pub mod decay;
mod error;
mod lifecycle;
mod metrics;
mod traits;
mod types;

pub use basic::BasicConnManager;
pub use behaviour::{ConnManagerBehaviour, ConnectionPhase};
pub use closer::{ChannelCloser, close_channel};
pub use config::{
    ConnManagerConfig, DEFAULT_DECAY_RESOLUTION, DEFAULT_GRACE_PERIOD, DEFAULT_HIGH_WATER,
    DEFAULT_LOW_WATER, DEFAULT_SILENCE_PERIOD,
};
pub use decay::{BumpFn, DecayFn, DecayingTag, DecayingValue};
pub use error::ConnManagerError;
pub use lifecycle::{ConnHook, LifecycleManager};
pub use traits::{ConnManager, ConnectionCloser, Decayer, Notifiee};
pub use types::{
    CloseRequest, ConnManagerInfo, ConnectionInfo, StreamInfo, TagInfo, TrimContext, TrimReport,
    TrimSkip,
};
