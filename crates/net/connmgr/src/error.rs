//! Connection manager errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnManagerError {
    #[error("decaying tag {name:?} is already registered")]
    DuplicateDecayingTag { name: String },
    #[error("decaying tag {name:?} is closed")]
    TagClosed { name: String },
    #[error("connection manager is closed")]
    Closed,
    #[error("connection manager was already closed")]
    AlreadyClosed,
    #[error("low water mark ({low}) exceeds high water mark ({high})")]
    InvalidWatermarks { low: usize, high: usize },
}
