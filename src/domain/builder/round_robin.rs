//! Round-robin builder with convergence gates.
//!
//! Themes take turns: each round attaches the next item (lowest tier first)
//! of every theme, so no single theme runs ahead of the others. Expert and
//! Master items then gain extra prerequisites from other reachable nodes,
//! which turns the tree into a DAG with convergence points.

use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::domain::arena::{NodeId, SkillTree};
use crate::domain::build_config::BuildConfig;
use crate::domain::builder::{
    pick_root, populate, sweep_orphans, BuilderKind, Connected, PartitionBuild, PartitionInput,
    SweepWeights, TreeBuilder,
};
use crate::domain::entities::Theme;
use crate::domain::error::DomainError;
use crate::domain::grouper::{group_items, MIN_THEME_SCORE};
use crate::domain::similarity::SimilarityMatrix;
use crate::domain::validate::{simulate_unlocks, OVERFLOW_TOLERANCE};

/// Tier index from which a node needs two prerequisites (Expert).
const TWO_PREREQ_TIER: usize = 3;
/// Tier index from which a node needs three prerequisites (Master).
const THREE_PREREQ_TIER: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinBuilder;

impl TreeBuilder for RoundRobinBuilder {
    fn kind(&self) -> BuilderKind {
        BuilderKind::Tree
    }

    #[instrument(level = "debug", skip_all, fields(partition = input.partition, items = input.items.len()))]
    fn build(
        &self,
        input: &PartitionInput<'_>,
        config: &BuildConfig,
        rng: &mut StdRng,
    ) -> Result<PartitionBuild, DomainError> {
        let items = input.items;
        let mut tree = SkillTree::new(input.partition);
        let node_of = populate(&mut tree, items);
        if tree.is_empty() {
            return Err(DomainError::EmptyPartition(input.partition.to_string()));
        }

        let groups = group_items(items, input.themes, MIN_THEME_SCORE);
        for bucket in &groups.buckets {
            for &m in &bucket.members {
                if let Some(n) = node_of[m].and_then(|idx| tree.get_mut(idx)) {
                    n.theme = Theme::named(&bucket.theme);
                }
            }
        }

        let root = pick_root(items, config, input.partition, rng)
            .and_then(|idx| node_of[idx])
            .ok_or_else(|| DomainError::NoRootCandidate(input.partition.to_string()))?;
        tree.set_root(root);
        debug!(root = tree.id_of(root), "root picked");

        let max_children = config.effective_max_children();
        let mut state = RoundState::new(root, max_children);
        let mut connected = Connected::default();
        connected.insert(root);

        // Largest theme first, each queue ordered by tier (unknown last)
        let mut queues: Vec<Vec<NodeId>> = groups
            .buckets
            .iter()
            .filter(|b| !b.members.is_empty())
            .map(|b| {
                let mut members = b.members.clone();
                members.sort_by_key(|&m| items[m].tier.sort_rank());
                members.into_iter().filter_map(|m| node_of[m]).collect()
            })
            .collect();
        queues.sort_by(|a, b| b.len().cmp(&a.len()));
        let rounds = queues.iter().map(Vec::len).max().unwrap_or(0);

        for round in 0..rounds {
            for queue in &queues {
                let Some(&node) = queue.get(round) else {
                    continue;
                };
                if connected.contains(&node) {
                    continue;
                }
                let parent = state
                    .best_parent(&tree, node, input.sims, Some(&mut *rng))
                    .or_else(|| state.fallback_parent(&tree, node));
                if let Some(parent) = parent {
                    state.attach(&mut tree, &mut connected, parent, node);
                }
            }
        }
        debug!(rounds, themes = queues.len(), placed = connected.len(), "rounds done");

        for &m in &groups.unassigned {
            let Some(node) = node_of[m] else { continue };
            if connected.contains(&node) {
                continue;
            }
            if let Some(parent) = state.best_parent(&tree, node, input.sims, None) {
                state.attach(&mut tree, &mut connected, parent, node);
            }
        }

        sweep_orphans(
            &mut tree,
            &mut connected,
            input.sims,
            SweepWeights::default(),
        );

        let gates = add_convergence(&mut tree, input.sims, config, max_children, rng);
        assign_sections(&mut tree);
        debug!(gates, "round-robin build done");

        Ok(PartitionBuild {
            tree,
            kind: BuilderKind::Tree,
            branches: Vec::new(),
            theme_colors: BTreeMap::new(),
        })
    }
}

/// Parents with spare capacity, bucketed by depth.
struct RoundState {
    available: BTreeMap<usize, Vec<NodeId>>,
    max_children: usize,
}

impl RoundState {
    fn new(root: NodeId, max_children: usize) -> Self {
        Self {
            available: BTreeMap::from([(0, vec![root])]),
            max_children,
        }
    }

    /// Best parent at a depth within two levels above the node's tier.
    ///
    /// Shared theme `+170`, conflicting theme `-50`; a parent one/two levels
    /// up `+50`/`+30`, on the same level `+10`; text similarity `60x`; load
    /// costs up to 30. Theme and tier terms and the jitter only apply with
    /// an `rng` (themed rounds); unassigned items score on tier gap, text
    /// and load.
    fn best_parent(
        &self,
        tree: &SkillTree,
        node: NodeId,
        sims: &SimilarityMatrix,
        mut rng: Option<&mut StdRng>,
    ) -> Option<NodeId> {
        let target = tree.get(node)?;
        let tier = target.tier.group_index();
        let themed = rng.is_some();
        let mut best: Option<(NodeId, f32)> = None;

        for (_, candidates) in self.available.range(tier.saturating_sub(2)..=tier) {
            for &candidate in candidates {
                let Some(cand) = tree.get(candidate) else {
                    continue;
                };
                if cand.children.len() >= self.max_children {
                    continue;
                }
                let mut score = 0.0;
                if themed {
                    match target.theme.agrees_with(&cand.theme) {
                        Some(true) => score += 170.0,
                        Some(false) => score -= 50.0,
                        None => {}
                    }
                }
                score += match tier as i64 - cand.depth as i64 {
                    0 => 10.0,
                    1 => 50.0,
                    2 if themed => 30.0,
                    gap if gap > 2 && themed => -20.0,
                    _ => 0.0,
                };
                score += sims.text(&target.id, &cand.id) * 60.0;
                score -= cand.children.len() as f32 / self.max_children as f32 * 30.0;
                if let Some(rng) = rng.as_deref_mut() {
                    score += rng.gen_range(-2.0..=2.0);
                }

                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((candidate, score));
                }
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// First node above the node's tier with fewer than `max + 2` children,
    /// nearest level first.
    fn fallback_parent(&self, tree: &SkillTree, node: NodeId) -> Option<NodeId> {
        let tier = tree.get(node)?.tier.group_index();
        self.available
            .range(..tier)
            .rev()
            .flat_map(|(_, candidates)| candidates.iter().copied())
            .find(|&c| tree.child_count(c) < self.max_children + OVERFLOW_TOLERANCE)
    }

    fn attach(
        &mut self,
        tree: &mut SkillTree,
        connected: &mut Connected,
        parent: NodeId,
        node: NodeId,
    ) {
        if !tree.link(parent, node) {
            return;
        }
        connected.insert(node);
        trace!(node = tree.id_of(node), parent = tree.id_of(parent), "attached");
        if let Some(n) = tree.get(node) {
            if n.children.len() < self.max_children {
                self.available.entry(n.depth).or_default().push(node);
            }
        }
    }
}

/// Prerequisites an Expert (2) or Master (3) node should carry.
fn required_prerequisites(tier: usize) -> usize {
    if tier >= THREE_PREREQ_TIER {
        3
    } else if tier >= TWO_PREREQ_TIER {
        2
    } else {
        0
    }
}

/// `true` when `ancestor` is reachable from `node` along child edges.
fn is_descendant(tree: &SkillTree, node: NodeId, ancestor: NodeId) -> bool {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([node]);
    while let Some(current) = queue.pop_front() {
        if current == ancestor {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(n) = tree.get(current) {
            queue.extend(n.children.iter().copied());
        }
    }
    false
}

/// Give Expert and Master nodes extra prerequisites.
///
/// Each under-gated node is considered with probability
/// `config.convergence_chance`. Candidates are reachable, shallower, not
/// below the node, and under `max_children + 2` children; they score
/// `40x` text similarity, up to 20 for a small depth gap, and 10 for a
/// different theme. Returns the number of edges added.
fn add_convergence(
    tree: &mut SkillTree,
    sims: &SimilarityMatrix,
    config: &BuildConfig,
    max_children: usize,
    rng: &mut StdRng,
) -> usize {
    let chance = match config.convergence_chance {
        c if c.is_nan() => 0.0,
        c => f64::from(c.clamp(0.0, 1.0)),
    };
    let reachable = simulate_unlocks(tree);
    let root = tree.root();
    let mut added = 0;

    let nodes: Vec<NodeId> = tree.node_ids().to_vec();
    for idx in nodes {
        if Some(idx) == root {
            continue;
        }
        let Some(node) = tree.get(idx) else { continue };
        let needed = required_prerequisites(node.tier.group_index())
            .saturating_sub(node.prerequisites.len());
        if needed == 0 || !rng.gen_bool(chance) {
            continue;
        }

        let mut candidates: Vec<(NodeId, f32)> = tree
            .iter()
            .filter(|(c, cand)| {
                *c != idx
                    && !node.prerequisites.contains(c)
                    && reachable.contains(c)
                    && cand.depth < node.depth
                    && cand.children.len() < max_children + OVERFLOW_TOLERANCE
            })
            .filter(|(c, _)| !is_descendant(tree, idx, *c))
            .map(|(c, cand)| {
                let gap = node.depth.abs_diff(cand.depth) as f32;
                let mut score = sims.text(&node.id, &cand.id) * 40.0;
                score += (20.0 - gap * 10.0).max(0.0);
                if cand.theme != node.theme {
                    score += 10.0;
                }
                (c, score)
            })
            .collect();
        // stable: equal scores keep insertion order
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (candidate, score) in candidates.into_iter().take(needed) {
            trace!(node = tree.id_of(idx), gate = tree.id_of(candidate), score, "convergence");
            if tree.link(candidate, idx) {
                added += 1;
            }
        }
    }
    added
}

/// Tag nodes by relative depth: the top fifth is `root`, down to 70% is
/// `trunk`, the rest `branch`.
fn assign_sections(tree: &mut SkillTree) {
    let root = tree.root();
    let max_depth = tree.depth().saturating_sub(1);
    let root_cutoff = (max_depth as f32 * 0.2) as usize;
    let trunk_cutoff = (root_cutoff + 1).max((max_depth as f32 * 0.7) as usize);

    let nodes: Vec<NodeId> = tree.node_ids().to_vec();
    for idx in nodes {
        let is_root = Some(idx) == root;
        if let Some(node) = tree.get_mut(idx) {
            let section = if max_depth == 0 || is_root || node.depth <= root_cutoff {
                "root"
            } else if node.depth <= trunk_cutoff {
                "trunk"
            } else {
                "branch"
            };
            node.section = Some(section.to_string());
        }
    }
}
