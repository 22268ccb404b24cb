//! Tier-first greedy builder.
//!
//! Tiers are processed from Novice to Master. Each item of a tier attaches to
//! the best-scoring parent among the "available" nodes of lower tiers;
//! whatever is left over is handled by the orphan sweep.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::domain::arena::{NodeId, SkillTree};
use crate::domain::build_config::BuildConfig;
use crate::domain::builder::{
    pick_root, populate, sweep_orphans, BuilderKind, Connected, PartitionBuild, PartitionInput,
    SweepWeights, TreeBuilder,
};
use crate::domain::entities::{Theme, Tier};
use crate::domain::error::DomainError;
use crate::domain::grouper::{primary_theme, MIN_THEME_SCORE};
use crate::domain::similarity::SimilarityMatrix;

const TIER_COUNT: usize = Tier::ORDERED.len();
/// Distance added to every overflow candidate.
const OVERFLOW_DISTANCE: usize = 5;
/// Extra children an overflow candidate may already carry.
const OVERFLOW_SLACK: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicBuilder;

impl TreeBuilder for ClassicBuilder {
    fn kind(&self) -> BuilderKind {
        BuilderKind::Classic
    }

    #[instrument(level = "debug", skip_all, fields(partition = input.partition, items = input.items.len()))]
    fn build(
        &self,
        input: &PartitionInput<'_>,
        config: &BuildConfig,
        rng: &mut StdRng,
    ) -> Result<PartitionBuild, DomainError> {
        let mut tree = SkillTree::new(input.partition);
        let node_of = populate(&mut tree, input.items);
        if tree.is_empty() {
            return Err(DomainError::EmptyPartition(input.partition.to_string()));
        }

        let root = pick_root(input.items, config, input.partition, rng)
            .and_then(|idx| node_of[idx])
            .ok_or_else(|| DomainError::NoRootCandidate(input.partition.to_string()))?;
        tree.set_root(root);
        debug!(root = tree.id_of(root), "root picked");

        for (item, node) in input.items.iter().zip(&node_of) {
            let Some(node) = node else { continue };
            let (theme, score) = primary_theme(item, input.themes);
            if let Some(n) = tree.get_mut(*node) {
                n.theme = if score > MIN_THEME_SCORE { theme } else { Theme::None };
            }
        }

        let max_children = config.effective_max_children();
        let mut state = TierState::new(root);
        let mut connected = Connected::default();
        connected.insert(root);

        for tier in 0..TIER_COUNT {
            let mut pending: Vec<NodeId> = tree
                .iter()
                .filter(|(idx, n)| {
                    n.tier.group_index() == tier && *idx != root && !connected.contains(idx)
                })
                .map(|(idx, _)| idx)
                .collect();
            pending.shuffle(rng);

            let mut placed = Vec::new();
            for node in pending {
                let Some(parent) =
                    state.best_parent(&tree, node, tier, max_children, input.sims, rng)
                else {
                    trace!(node = tree.id_of(node), tier, "no parent available");
                    continue;
                };
                if !tree.link(parent, node) {
                    continue;
                }
                connected.insert(node);
                state.placed_tier.insert(node, tier);
                placed.push(node);
                if tree.child_count(parent) >= max_children {
                    state.retire(parent);
                }
            }

            debug!(tier, placed = placed.len(), "tier processed");
            for node in placed {
                if tree.child_count(node) < max_children {
                    state.available[tier].push(node);
                }
            }
        }

        sweep_orphans(
            &mut tree,
            &mut connected,
            input.sims,
            SweepWeights::default(),
        );

        Ok(PartitionBuild {
            tree,
            kind: BuilderKind::Classic,
            branches: Vec::new(),
            theme_colors: BTreeMap::new(),
        })
    }
}

/// Per-tier pools of nodes that may still take children.
struct TierState {
    available: Vec<Vec<NodeId>>,
    placed_tier: HashMap<NodeId, usize>,
}

impl TierState {
    fn new(root: NodeId) -> Self {
        let mut available = vec![Vec::new(); TIER_COUNT];
        available[0].push(root);
        Self {
            available,
            placed_tier: HashMap::from([(root, 0)]),
        }
    }

    /// Drop a full node from every pool.
    fn retire(&mut self, node: NodeId) {
        for pool in &mut self.available {
            pool.retain(|&n| n != node);
        }
    }

    /// Candidate parents with their tier distance.
    ///
    /// Searches lower tiers nearest first; tier 0 may also use its own
    /// peers; as a last resort any pooled node below `max + 2` children is
    /// accepted at a penalised distance.
    fn candidates(
        &self,
        tree: &SkillTree,
        node: NodeId,
        tier: usize,
        max_children: usize,
    ) -> Vec<(NodeId, usize)> {
        let mut found = Vec::new();
        for dist in 1..=tier {
            found.extend(
                self.available[tier - dist]
                    .iter()
                    .filter(|&&c| tree.child_count(c) < max_children)
                    .map(|&c| (c, dist)),
            );
            if !found.is_empty() {
                return found;
            }
        }

        if tier == 0 {
            found.extend(
                self.available[0]
                    .iter()
                    .filter(|&&c| c != node && tree.child_count(c) < max_children)
                    .map(|&c| (c, 0)),
            );
            if !found.is_empty() {
                return found;
            }
        }

        for (pool_tier, pool) in self.available.iter().enumerate() {
            found.extend(
                pool.iter()
                    .filter(|&&c| c != node && tree.child_count(c) < max_children + OVERFLOW_SLACK)
                    .map(|&c| (c, tier.abs_diff(pool_tier) + OVERFLOW_DISTANCE)),
            );
            if !found.is_empty() {
                debug!(node = tree.id_of(node), tier, "using overflow parent pool");
                break;
            }
        }
        found
    }

    fn best_parent(
        &self,
        tree: &SkillTree,
        node: NodeId,
        tier: usize,
        max_children: usize,
        sims: &SimilarityMatrix,
        rng: &mut StdRng,
    ) -> Option<NodeId> {
        let child = tree.get(node)?;
        let mut best: Option<(NodeId, f32)> = None;

        for (candidate, dist) in self.candidates(tree, node, tier, max_children) {
            let Some(parent) = tree.get(candidate) else {
                continue;
            };
            let effect = sims.effect(&child.id, &parent.id);
            let text = sims.text(&child.id, &parent.id);
            let name = sims.name(&child.id, &parent.id);

            let mut score = -5.0 * dist.saturating_sub(1) as f32;
            score += effect * 40.0;
            score += match child.theme.agrees_with(&parent.theme) {
                Some(true) if effect > 0.5 => 25.0,
                Some(true) => 15.0,
                Some(false) => -10.0,
                None => 0.0,
            };
            score += 30.0 * (0.4 * text + 0.6 * name);
            score -= 8.0 * parent.children.len() as f32;
            score += match self.placed_tier.get(&candidate) {
                Some(&pt) if pt + 1 == tier => 10.0,
                Some(&pt) if pt + 2 == tier => 5.0,
                _ => 0.0,
            };
            score += rng.gen_range(-2.0..=2.0);

            if best.map_or(true, |(_, b)| score > b) {
                best = Some((candidate, score));
            }
        }
        best.map(|(parent, _)| parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{EffectEntry, ItemRecord};
    use crate::domain::validate::{detect_cycles, validate_partition};
    use rand::SeedableRng;

    fn spell(id: &str, name: &str, tier: &str, effect: &str) -> ItemRecord {
        ItemRecord {
            id: Some(id.into()),
            name: name.into(),
            partition: "Destruction".into(),
            tier: Tier::from(tier),
            cost: 10.0,
            description: format!("{} the target", effect),
            effects: vec![EffectEntry::Label(effect.into())],
            ..Default::default()
        }
    }

    fn corpus() -> Vec<ItemRecord> {
        vec![
            spell("00000001", "Flames", "Novice", "Fire Damage"),
            spell("00000002", "Frostbite", "Novice", "Frost Damage"),
            spell("00000003", "Firebolt", "Apprentice", "Fire Damage"),
            spell("00000004", "Ice Spike", "Apprentice", "Frost Damage"),
            spell("00000005", "Fireball", "Adept", "Fire Damage"),
            spell("00000006", "Ice Storm", "Adept", "Frost Damage"),
            spell("00000007", "Incinerate", "Expert", "Fire Damage"),
            spell("00000008", "Fire Storm", "Master", "Fire Damage"),
        ]
    }

    fn build(items: &[ItemRecord], config: &BuildConfig, seed: u64) -> PartitionBuild {
        let sims = SimilarityMatrix::build(items);
        let themes = vec!["fire".to_string(), "frost".to_string()];
        let input = PartitionInput {
            partition: "Destruction",
            items,
            themes: &themes,
            sims: &sims,
            color: "#ef4444",
        };
        let mut rng = StdRng::seed_from_u64(seed);
        ClassicBuilder.build(&input, config, &mut rng).unwrap()
    }

    #[test]
    fn test_builds_single_rooted_acyclic_tree() {
        let items = corpus();
        let config = BuildConfig {
            max_children_per_node: 2,
            ..Default::default()
        };
        let result = build(&items, &config, 7);
        let tree = &result.tree;

        assert_eq!(tree.len(), 8);
        let roots: Vec<_> = tree.iter().filter(|(_, n)| n.prerequisites.is_empty()).collect();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].1.is_root);
        assert!(detect_cycles(tree).is_empty());
        assert!(validate_partition(tree, 2).all_valid);
        for (_, node) in tree.iter() {
            assert!(node.children.len() <= 2 + OVERFLOW_SLACK);
            if !node.is_root {
                assert_eq!(node.prerequisites.len(), 1);
            }
        }
    }

    #[test]
    fn test_children_sit_at_or_above_parent_tier() {
        let items = corpus();
        let result = build(&items, &BuildConfig::default(), 11);
        let tree = &result.tree;
        for (_, node) in tree.iter() {
            for &p in &node.prerequisites {
                let parent = tree.get(p).unwrap();
                assert!(parent.tier.group_index() <= node.tier.group_index());
            }
        }
    }

    #[test]
    fn test_same_seed_same_edges() {
        let items = corpus();
        let config = BuildConfig::default();
        let edges = |b: &PartitionBuild| {
            let mut e: Vec<(String, String)> = b
                .tree
                .iter()
                .flat_map(|(_, n)| {
                    n.children
                        .iter()
                        .map(|&c| (n.id.clone(), b.tree.id_of(c).to_string()))
                        .collect::<Vec<_>>()
                })
                .collect();
            e.sort();
            e
        };
        assert_eq!(edges(&build(&items, &config, 5)), edges(&build(&items, &config, 5)));
    }

    #[test]
    fn test_themes_need_score_above_threshold() {
        let items = corpus();
        let result = build(&items, &BuildConfig::default(), 1);
        let flames = result.tree.find("00000001").unwrap();
        assert_eq!(result.tree.get(flames).unwrap().theme, Theme::named("fire"));
        assert!(result.branches.is_empty());
    }

    #[test]
    fn test_item_without_text_is_still_placed() {
        let mut items = corpus();
        items.push(ItemRecord {
            id: Some("00000009".into()),
            tier: Tier::from("Adept"),
            ..Default::default()
        });
        let result = build(&items, &BuildConfig::default(), 3);
        let blank = result.tree.find("00000009").unwrap();
        assert_eq!(result.tree.get(blank).unwrap().prerequisites.len(), 1);
    }

    #[test]
    fn test_partition_without_ids_is_empty() {
        let items = vec![ItemRecord::default()];
        let sims = SimilarityMatrix::build(&items);
        let input = PartitionInput {
            partition: "Void",
            items: &items,
            themes: &[],
            sims: &sims,
            color: "#000000",
        };
        let mut rng = StdRng::seed_from_u64(0);
        let err = ClassicBuilder
            .build(&input, &BuildConfig::default(), &mut rng)
            .unwrap_err();
        assert_eq!(err, DomainError::EmptyPartition("Void".into()));
    }
}
