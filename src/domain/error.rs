//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of tree-building rules.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("partition has no items: {0}")]
    EmptyPartition(String),

    #[error("no root candidate in partition: {0}")]
    NoRootCandidate(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("cycle detected in partition {partition}: {path}")]
    CycleDetected { partition: String, path: String },

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("invalid item record: {message}")]
    InvalidItem { message: String },
}
