//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and defines the serialized tree record.

pub mod error;
pub mod error_ext;
pub mod output;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use output::{
    fingerprint, tree_from_output, BranchOutput, ConfigUsed, NodeOutput, PartitionOutput,
    TreeOutput, ValidationSummary, FORMAT_VERSION,
};
pub use services::{PartitionReport, ScoreService, TreeBuildService};
