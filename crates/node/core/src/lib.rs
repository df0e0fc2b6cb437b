//! Node infrastructure library.
//!
//! This crate assembles the networking crates into a node:
//! - [`args`] - CLI argument structs
//! - [`config`] - TOML configuration loading
//! - [`builder`] - Gating, connection management and swarm behaviour from a configuration
//! - [`logging`] - Logging initialization
//! - [`validator`] - DHT record validation

pub mod args;
pub mod builder;
pub mod config;
pub mod error;
pub mod logging;
pub mod validator;

pub use builder::{BastionBehaviour, NodeComponents, NodeConnManager};
pub use config::BastionConfig;
pub use error::ConfigError;
