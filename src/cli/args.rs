//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::domain::BuilderKind;

/// Procedural skill trees from item pools: build, validate, inspect
#[derive(Parser, Debug)]
#[command(name = "skilltree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Turn debugging information on (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Local config file (TOML), layered over the global one
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build skill trees from an item corpus
    Build {
        /// Corpus file or directory of JSON files
        #[arg(value_hint = ValueHint::AnyPath)]
        items: PathBuf,
        /// Construction strategy: classic | thematic | tree
        #[arg(short, long)]
        builder: Option<BuilderKind>,
        /// Random seed (0 derives one from the clock)
        #[arg(short, long)]
        seed: Option<u64>,
        /// Maximum children per node
        #[arg(long)]
        max_children: Option<usize>,
        /// Write the tree here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Check a tree for unreachable nodes and cycles
    Validate {
        /// Tree file written by `build`
        #[arg(value_hint = ValueHint::FilePath)]
        tree: PathBuf,
        /// Repair unreachable nodes and write the file back
        #[arg(long)]
        fix: bool,
        /// Maximum children per node
        #[arg(long)]
        max_children: Option<usize>,
    },

    /// Print a tree as an indented outline
    Show {
        /// Tree file written by `build`
        #[arg(value_hint = ValueHint::FilePath)]
        tree: PathBuf,
        /// Only this partition
        #[arg(short, long)]
        partition: Option<String>,
    },

    /// List discovered and merged themes per partition
    Themes {
        /// Corpus file or directory of JSON files
        #[arg(value_hint = ValueHint::AnyPath)]
        items: PathBuf,
        /// Themes per partition
        #[arg(long)]
        top: Option<usize>,
    },

    /// Score prerequisite candidates for a request
    Score {
        /// Request file
        #[arg(value_hint = ValueHint::FilePath)]
        request: PathBuf,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,
}
