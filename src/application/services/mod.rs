//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services are plain structs; file access stays in the infrastructure layer.

mod build;
mod score;

pub use build::{PartitionReport, TreeBuildService};
pub use score::ScoreService;
