//! Tree builders and the helpers they share.
//!
//! A builder turns one partition's items into a [`SkillTree`] with a single
//! root. Builders only ever add edges from a shallower connected node to a
//! deeper one, so their output is acyclic by construction.

pub mod classic;
pub mod round_robin;
pub mod thematic;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::arena::{NodeId, SkillTree, TreeNode};
use crate::domain::build_config::BuildConfig;
use crate::domain::entities::{is_vanilla_id, ItemRecord, Tier};
use crate::domain::error::DomainError;
use crate::domain::similarity::SimilarityMatrix;

pub use classic::ClassicBuilder;
pub use round_robin::RoundRobinBuilder;
pub use thematic::ThematicBuilder;

/// Available construction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderKind {
    /// Tier-first greedy attachment
    #[default]
    Classic,
    /// Theme-first breadth-first branches
    Thematic,
    /// Round-robin over themes with convergence gates
    Tree,
}

impl BuilderKind {
    pub fn layout_style(&self) -> &'static str {
        match self {
            BuilderKind::Classic => "tier_first",
            BuilderKind::Thematic => "thematic_bfs",
            BuilderKind::Tree => "radial",
        }
    }

    /// Builder implementing this strategy.
    pub fn builder(&self) -> Box<dyn TreeBuilder> {
        match self {
            BuilderKind::Classic => Box::new(ClassicBuilder),
            BuilderKind::Thematic => Box::new(ThematicBuilder),
            BuilderKind::Tree => Box::new(RoundRobinBuilder),
        }
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderKind::Classic => write!(f, "classic"),
            BuilderKind::Thematic => write!(f, "thematic"),
            BuilderKind::Tree => write!(f, "tree"),
        }
    }
}

impl FromStr for BuilderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" | "tier_first" => Ok(BuilderKind::Classic),
            "thematic" | "thematic_bfs" => Ok(BuilderKind::Thematic),
            "tree" | "radial" | "round_robin" => Ok(BuilderKind::Tree),
            other => Err(format!("unknown builder: {}", other)),
        }
    }
}

/// Everything a builder needs about one partition.
#[derive(Debug, Clone, Copy)]
pub struct PartitionInput<'a> {
    pub partition: &'a str,
    /// Items of this partition, each with an identifier
    pub items: &'a [ItemRecord],
    /// Merged theme list for this partition
    pub themes: &'a [String],
    pub sims: &'a SimilarityMatrix,
    /// Base color of the partition
    pub color: &'a str,
}

/// Branch metadata of a thematic build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRecord {
    pub theme: String,
    pub attachment_point: String,
    pub member_ids: Vec<String>,
    pub color: String,
}

/// Result of building one partition.
#[derive(Debug, Clone)]
pub struct PartitionBuild {
    pub tree: SkillTree,
    pub kind: BuilderKind,
    pub branches: Vec<BranchRecord>,
    /// Per-theme colors; empty for classic builds
    pub theme_colors: BTreeMap<String, String>,
}

/// A construction strategy. Implementations must be sequential within a
/// partition and draw all randomness from `rng`.
pub trait TreeBuilder: Send + Sync {
    fn kind(&self) -> BuilderKind;

    fn build(
        &self,
        input: &PartitionInput<'_>,
        config: &BuildConfig,
        rng: &mut StdRng,
    ) -> Result<PartitionBuild, DomainError>;
}

/// Choose the partition root.
///
/// A configured override wins when present in the partition. Otherwise the
/// lowest tier with items is used (unknown tiers count as Novice), picking
/// uniformly among base-content identifiers when preferred and available,
/// else among all items of that tier. Returns an index into `items`.
pub fn pick_root(
    items: &[ItemRecord],
    config: &BuildConfig,
    partition: &str,
    rng: &mut StdRng,
) -> Option<usize> {
    if let Some(wanted) = config.root_override(partition) {
        if let Some(idx) = items.iter().position(|i| i.item_id() == Some(wanted)) {
            debug!(partition, root = wanted, "using configured root");
            return Some(idx);
        }
        debug!(partition, root = wanted, "configured root not in partition, picking");
    }

    for tier in 0..Tier::ORDERED.len() {
        let members: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.tier.group_index() == tier)
            .map(|(idx, _)| idx)
            .collect();
        if members.is_empty() {
            continue;
        }
        if config.prefer_vanilla_roots {
            let vanilla: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&idx| items[idx].item_id().is_some_and(is_vanilla_id))
                .collect();
            if let Some(&idx) = vanilla.choose(rng) {
                return Some(idx);
            }
        }
        return members.choose(rng).copied();
    }
    None
}

/// Tier (unknown last), then cost, then name.
pub fn compare_tier_and_cost(a: &ItemRecord, b: &ItemRecord) -> Ordering {
    a.tier
        .sort_rank()
        .cmp(&b.tier.sort_rank())
        .then_with(|| {
            a.effective_cost()
                .partial_cmp(&b.effective_cost())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.name.cmp(&b.name))
}

/// Insert one node per item, in item order. Returns the node index of every
/// item (same positions as `items`).
pub(crate) fn populate(tree: &mut SkillTree, items: &[ItemRecord]) -> Vec<Option<NodeId>> {
    items
        .iter()
        .map(|item| TreeNode::from_item(item).map(|node| tree.insert(node)))
        .collect()
}

/// Connected nodes in attachment order plus a membership set.
#[derive(Debug, Default)]
pub(crate) struct Connected {
    order: Vec<NodeId>,
    members: HashSet<NodeId>,
}

impl Connected {
    pub(crate) fn insert(&mut self, idx: NodeId) -> bool {
        if self.members.insert(idx) {
            self.order.push(idx);
            true
        } else {
            false
        }
    }

    pub(crate) fn contains(&self, idx: &NodeId) -> bool {
        self.members.contains(idx)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// Extra weights of the orphan sweep beyond tier, effect and theme terms.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SweepWeights {
    pub text: f32,
    pub name: f32,
}

/// Attach every unconnected node to its best connected parent.
///
/// A candidate at or below the orphan's tier scores `100 - 5 * gap`; one
/// above it `-200`. Effect similarity adds `30x`, a shared theme `+15`, and
/// each existing child costs 8. Returns the swept node indices.
pub(crate) fn sweep_orphans(
    tree: &mut SkillTree,
    connected: &mut Connected,
    sims: &SimilarityMatrix,
    weights: SweepWeights,
) -> Vec<NodeId> {
    let orphans: Vec<NodeId> = tree
        .node_ids()
        .iter()
        .copied()
        .filter(|idx| !connected.contains(idx))
        .collect();
    let mut swept = Vec::new();

    for orphan in orphans {
        let Some(node) = tree.get(orphan) else {
            continue;
        };
        let orphan_tier = node.tier.group_index() as f32;
        let orphan_id = node.id.clone();
        let orphan_theme = node.theme.clone();

        let mut best: Option<(NodeId, f32)> = None;
        for candidate in connected.iter() {
            let Some(cnode) = tree.get(candidate) else {
                continue;
            };
            let cand_tier = cnode.tier.group_index() as f32;
            let mut score = if cand_tier <= orphan_tier {
                100.0 - (orphan_tier - cand_tier) * 5.0
            } else {
                -200.0
            };
            score += sims.effect(&orphan_id, &cnode.id) * 30.0;
            score += sims.text(&orphan_id, &cnode.id) * weights.text;
            score += sims.name(&orphan_id, &cnode.id) * weights.name;
            if orphan_theme.agrees_with(&cnode.theme) == Some(true) {
                score += 15.0;
            }
            score -= cnode.children.len() as f32 * 8.0;

            if best.map_or(true, |(_, b)| score > b) {
                best = Some((candidate, score));
            }
        }

        if let Some((parent, score)) = best {
            trace!(orphan = %orphan_id, parent = tree.id_of(parent), score, "orphan attached");
            if tree.link(parent, orphan) {
                connected.insert(orphan);
                swept.push(orphan);
            }
        }
    }
    if !swept.is_empty() {
        debug!(count = swept.len(), "orphans swept");
    }
    swept
}
