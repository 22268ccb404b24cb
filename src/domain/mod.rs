//! Domain layer: entities and tree-building logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod build_config;
pub mod builder;
pub mod colors;
pub mod entities;
pub mod error;
pub mod grouper;
pub mod nlp;
pub mod prereq;
pub mod rng;
pub mod similarity;
pub mod themes;
pub mod validate;

pub use arena::{NodeId, SkillTree, TreeNode};
pub use build_config::{BuildConfig, GridHint, RootOverride};
pub use builder::{
    pick_root, BranchRecord, BuilderKind, ClassicBuilder, PartitionBuild, PartitionInput,
    ThematicBuilder, TreeBuilder,
};
pub use entities::*;
pub use error::DomainError;
pub use grouper::{group_items, primary_theme, ThemeGroups, MIN_THEME_SCORE};
pub use similarity::{Channel, SimilarityMatrix};
pub use themes::{discover_themes, merge_with_hints, themes_for_partition, vanilla_theme_hints};
pub use validate::{
    detect_cycles, find_unreachable, fix_unreachable, simulate_unlocks, validate_partition,
    ValidationResult, MAX_REPAIR_PASSES,
};
