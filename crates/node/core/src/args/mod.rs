//! CLI argument structs shared by bastion binaries.

mod log;

pub use log::LogArgs;
