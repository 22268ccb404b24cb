//! skilltree: procedural skill trees over item pools
//!
//! Items (spells) are grouped by partition (school); each partition becomes a
//! prerequisite graph with a single root, built either tier-first or
//! theme-first from TF-IDF and fuzzy similarity between items.
//!
//! Layers, innermost first: `domain` (pure tree building), `application`
//! (services and the serialized tree record), `infrastructure` (file access,
//! corpus loading, wiring) and `cli`.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
