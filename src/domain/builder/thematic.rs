//! Theme-first builder.
//!
//! The most populated theme becomes the trunk, grown breadth-first from the
//! root. Every other theme grows as its own branch from the connected node
//! that fits it best.

use std::collections::{BTreeMap, HashSet, VecDeque};

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::domain::arena::{NodeId, SkillTree};
use crate::domain::build_config::BuildConfig;
use crate::domain::builder::{
    compare_tier_and_cost, pick_root, populate, sweep_orphans, BranchRecord, BuilderKind,
    Connected, PartitionBuild, PartitionInput, SweepWeights, TreeBuilder,
};
use crate::domain::colors::{derive_theme_colors, OTHER_THEME_COLOR};
use crate::domain::entities::{ItemRecord, Theme};
use crate::domain::error::DomainError;
use crate::domain::grouper::{group_items, MIN_THEME_SCORE};
use crate::domain::similarity::SimilarityMatrix;

/// Theme of items no bucket claimed, and of the trailing branch.
pub const OTHER_THEME: &str = "other";
/// Single bucket used when grouping produced nothing.
pub const ALL_THEME: &str = "all";

const ORPHAN_WEIGHTS: SweepWeights = SweepWeights {
    text: 15.0,
    name: 10.0,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ThematicBuilder;

impl TreeBuilder for ThematicBuilder {
    fn kind(&self) -> BuilderKind {
        BuilderKind::Thematic
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
        let mut ranked: Vec<(String, Vec<usize>)> = groups
            .buckets
            .iter()
            .filter(|b| !b.members.is_empty())
            .map(|b| (b.theme.clone(), b.members.clone()))
            .collect();
        let unassigned = if ranked.is_empty() {
            ranked.push((ALL_THEME.to_string(), (0..items.len()).collect()));
            Vec::new()
        } else {
            groups.unassigned.clone()
        };
        // stable: equal sizes keep theme order
        ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let root = pick_root(items, config, input.partition, rng)
            .and_then(|idx| node_of[idx])
            .ok_or_else(|| DomainError::NoRootCandidate(input.partition.to_string()))?;

        for (theme, members) in &ranked {
            for &m in members {
                set_theme(&mut tree, node_of[m], theme);
            }
        }
        for &m in &unassigned {
            set_theme(&mut tree, node_of[m], OTHER_THEME);
        }
        tree.set_root(root);
        if let Some(n) = tree.get_mut(root) {
            n.theme = Theme::named(&ranked[0].0);
            n.section = Some("root".to_string());
        }
        debug!(root = tree.id_of(root), trunk = %ranked[0].0, themes = ranked.len(), "trunk chosen");

        let max_children = config.effective_max_children();
        let mut connected = Connected::default();
        connected.insert(root);
        let mut branches: Vec<BranchRecord> = Vec::new();

        let (trunk_theme, trunk_members) = &ranked[0];
        let trunk_nodes = sorted_nodes(items, trunk_members, &node_of)
            .into_iter()
            .filter(|&n| n != root)
            .collect::<Vec<_>>();
        let trunk_placed =
            grow_branch(&mut tree, &mut connected, root, &trunk_nodes, max_children);
        for &n in &trunk_placed {
            if let Some(node) = tree.get_mut(n) {
                node.section = Some("trunk".to_string());
            }
        }
        branches.push(BranchRecord {
            theme: trunk_theme.clone(),
            attachment_point: tree.id_of(root).to_string(),
            member_ids: std::iter::once(root)
                .chain(trunk_placed)
                .map(|n| tree.id_of(n).to_string())
                .collect(),
            color: String::new(),
        });

        for (theme, members) in ranked.iter().skip(1) {
            let nodes = sorted_nodes(items, members, &node_of);
            let Some(&representative) = nodes.first() else {
                continue;
            };
            let attachment = attachment_point(
                &tree,
                &connected,
                representative,
                input.sims,
                config.chaos,
                rng,
            )
            .unwrap_or(root);
            let placed = grow_branch(&mut tree, &mut connected, attachment, &nodes, max_children);
            trace!(%theme, attachment = tree.id_of(attachment), placed = placed.len(), "branch grown");
            branches.push(BranchRecord {
                theme: theme.clone(),
                attachment_point: tree.id_of(attachment).to_string(),
                member_ids: placed.iter().map(|&n| tree.id_of(n).to_string()).collect(),
                color: String::new(),
            });
        }

        sweep_orphans(&mut tree, &mut connected, input.sims, ORPHAN_WEIGHTS);

        let covered: HashSet<&str> = branches
            .iter()
            .flat_map(|b| b.member_ids.iter().map(String::as_str))
            .collect();
        let others: Vec<String> = connected
            .iter()
            .map(|n| tree.id_of(n))
            .filter(|id| !covered.contains(id))
            .map(str::to_string)
            .collect();
        if !others.is_empty() {
            branches.push(BranchRecord {
                theme: OTHER_THEME.to_string(),
                attachment_point: tree.id_of(root).to_string(),
                member_ids: others,
                color: String::new(),
            });
        }

        let theme_colors = paint(&mut tree, &mut branches, input.color);
        let branch_nodes: Vec<NodeId> = tree
            .iter()
            .filter(|(_, n)| n.section.is_none())
            .map(|(idx, _)| idx)
            .collect();
        for idx in branch_nodes {
            if let Some(node) = tree.get_mut(idx) {
                node.section = Some("branch".to_string());
            }
        }

        debug!(
            connected = connected.len(),
            branches = branches.len(),
            "thematic build done"
        );
        Ok(PartitionBuild {
            tree,
            kind: BuilderKind::Thematic,
            branches,
            theme_colors,
        })
    }
}

fn set_theme(tree: &mut SkillTree, node: Option<NodeId>, theme: &str) {
    if let Some(n) = node.and_then(|idx| tree.get_mut(idx)) {
        n.theme = Theme::named(theme);
    }
}

/// Node indices of `members`, ordered by tier, cost and name.
fn sorted_nodes(items: &[ItemRecord], members: &[usize], node_of: &[Option<NodeId>]) -> Vec<NodeId> {
    let mut members = members.to_vec();
    members.sort_by(|&a, &b| compare_tier_and_cost(&items[a], &items[b]));
    members.into_iter().filter_map(|m| node_of[m]).unique().collect()
}

/// Breadth-first walk from `start` over prerequisites then children for the
/// first node with spare capacity.
fn find_parent_with_capacity(tree: &SkillTree, start: NodeId, max_children: usize) -> Option<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        let Some(node) = tree.get(current) else {
            continue;
        };
        if node.children.len() < max_children {
            return Some(current);
        }
        queue.extend(
            node.prerequisites
                .iter()
                .chain(&node.children)
                .filter(|n| !visited.contains(*n)),
        );
    }
    None
}

/// Attach `nodes` breadth-first below `attachment`.
///
/// Parents come from a queue seeded with the attachment point; every placed
/// node joins the back of the queue. Full parents are popped; an empty queue
/// is refilled by [`find_parent_with_capacity`]. Returns the placed nodes.
fn grow_branch(
    tree: &mut SkillTree,
    connected: &mut Connected,
    attachment: NodeId,
    nodes: &[NodeId],
    max_children: usize,
) -> Vec<NodeId> {
    let mut placed = Vec::new();
    let mut parents: VecDeque<NodeId> = VecDeque::new();
    if tree.child_count(attachment) < max_children {
        parents.push_back(attachment);
    }

    for &node in nodes {
        if connected.contains(&node) {
            continue;
        }
        while let Some(&front) = parents.front() {
            if tree.child_count(front) < max_children {
                break;
            }
            parents.pop_front();
        }
        if parents.is_empty() {
            match find_parent_with_capacity(tree, attachment, max_children) {
                Some(found) => parents.push_back(found),
                None => continue,
            }
        }
        let Some(&parent) = parents.front() else {
            continue;
        };
        if tree.link(parent, node) {
            connected.insert(node);
            placed.push(node);
            parents.push_back(node);
        }
    }
    placed
}

/// Connected node that best fits a theme's representative.
fn attachment_point(
    tree: &SkillTree,
    connected: &Connected,
    representative: NodeId,
    sims: &SimilarityMatrix,
    chaos: f32,
    rng: &mut StdRng,
) -> Option<NodeId> {
    let rep_id = tree.get(representative)?.id.as_str();
    let mut best: Option<(NodeId, f32)> = None;

    for candidate in connected.iter() {
        let Some(node) = tree.get(candidate) else {
            continue;
        };
        let mut score = sims.effect(rep_id, &node.id) * 35.0
            + sims.text(rep_id, &node.id) * 25.0
            + sims.name(rep_id, &node.id) * 20.0;
        score -= node.tier.attachment_rank() as f32 * 5.0;
        score -= node.children.len() as f32 * 8.0;
        if chaos > 0.0 {
            score += rng.gen_range(-20.0..=20.0) * chaos;
        }
        score += rng.gen_range(-1.0..=1.0);

        if best.map_or(true, |(_, b)| score > b) {
            best = Some((candidate, score));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Derive theme colors and apply them to nodes and branches.
fn paint(
    tree: &mut SkillTree,
    branches: &mut [BranchRecord],
    base: &str,
) -> BTreeMap<String, String> {
    let mut active: Vec<String> = Vec::new();
    for (_, node) in tree.iter() {
        if let Some(theme) = node.theme.name() {
            if !active.iter().any(|t| t == theme) {
                active.push(theme.to_string());
            }
        }
    }
    let mut colors = derive_theme_colors(base, &active);
    colors
        .entry(OTHER_THEME.to_string())
        .or_insert_with(|| OTHER_THEME_COLOR.to_string());

    let color_of = |theme: Option<&str>| {
        theme
            .and_then(|t| colors.get(t))
            .cloned()
            .unwrap_or_else(|| base.to_string())
    };
    let ids: Vec<NodeId> = tree.node_ids().to_vec();
    for idx in ids {
        if let Some(node) = tree.get_mut(idx) {
            node.theme_color = Some(color_of(node.theme.name()));
        }
    }
    for branch in branches.iter_mut() {
        branch.color = color_of(Some(&branch.theme));
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{EffectEntry, Tier};
    use crate::domain::validate::{detect_cycles, validate_partition};
    use rand::SeedableRng;

    fn spell(id: &str, name: &str, tier: &str, effect: &str) -> ItemRecord {
        ItemRecord {
            id: Some(id.into()),
            name: name.into(),
            partition: "Destruction".into(),
            tier: Tier::from(tier),
            cost: 10.0,
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
            spell("00000008", "Zzyx", "Master", "Qwv"),
        ]
    }

    fn build_with(items: &[ItemRecord], themes: &[String], seed: u64) -> PartitionBuild {
        let sims = SimilarityMatrix::build(items);
        let input = PartitionInput {
            partition: "Destruction",
            items,
            themes,
            sims: &sims,
            color: "#ef4444",
        };
        let config = BuildConfig {
            max_children_per_node: 2,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(seed);
        ThematicBuilder.build(&input, &config, &mut rng).unwrap()
    }

    fn themes() -> Vec<String> {
        vec!["fire".to_string(), "frost".to_string()]
    }

    #[test]
    fn test_largest_theme_becomes_trunk() {
        let result = build_with(&corpus(), &themes(), 4);
        assert_eq!(result.branches[0].theme, "fire");
        assert_eq!(result.branches[0].attachment_point, result.tree.id_of(result.tree.root().unwrap()));
        assert_eq!(result.branches[0].member_ids[0], result.branches[0].attachment_point);
    }

    #[test]
    fn test_root_carries_trunk_theme() {
        for seed in 0..6 {
            let result = build_with(&corpus(), &themes(), seed);
            let root = result.tree.get(result.tree.root().unwrap()).unwrap();
            assert_eq!(root.theme, Theme::named(&result.branches[0].theme));
            assert_eq!(
                root.theme_color.as_ref(),
                Some(&result.theme_colors[&result.branches[0].theme])
            );
        }
    }

    #[test]
    fn test_tree_is_valid_and_bounded() {
        let result = build_with(&corpus(), &themes(), 9);
        let tree = &result.tree;
        assert!(detect_cycles(tree).is_empty());
        assert!(validate_partition(tree, 2).all_valid);
        for (_, node) in tree.iter() {
            // the orphan sweep may exceed the cap by one
            assert!(node.children.len() <= 3);
            assert!(node.section.is_some());
            assert!(node.theme_color.is_some());
        }
    }

    #[test]
    fn test_unassigned_item_lands_in_other_branch() {
        let result = build_with(&corpus(), &themes(), 2);
        let zzyx = result.tree.find("00000008").unwrap();
        let node = result.tree.get(zzyx).unwrap();
        assert_eq!(node.theme, Theme::named(OTHER_THEME));
        let other_color = &result.theme_colors[OTHER_THEME];
        assert_eq!(node.theme_color.as_ref(), Some(other_color));
        let other = result.branches.last().unwrap();
        assert_eq!(other.theme, OTHER_THEME);
        assert!(other.member_ids.contains(&"00000008".to_string()));
        assert_eq!(&other.color, other_color);
    }

    #[test]
    fn test_other_keeps_fixed_color_when_not_active() {
        let items: Vec<ItemRecord> = corpus().into_iter().take(7).collect();
        let result = build_with(&items, &themes(), 2);
        assert_eq!(result.theme_colors[OTHER_THEME], OTHER_THEME_COLOR);
    }

    #[test]
    fn test_without_themes_everything_is_one_bucket() {
        let result = build_with(&corpus(), &[], 2);
        assert_eq!(result.branches.len(), 1);
        assert_eq!(result.branches[0].theme, ALL_THEME);
        assert_eq!(result.branches[0].member_ids.len(), 8);
        assert!(result.theme_colors.contains_key(ALL_THEME));
    }

    #[test]
    fn test_grow_branch_refills_from_capacity_search() {
        let items = corpus();
        let mut tree = SkillTree::new("Destruction");
        let nodes: Vec<NodeId> = populate(&mut tree, &items).into_iter().flatten().collect();
        tree.set_root(nodes[0]);
        let mut connected = Connected::default();
        connected.insert(nodes[0]);

        let placed = grow_branch(&mut tree, &mut connected, nodes[0], &nodes[1..], 1);

        assert_eq!(placed.len(), 7);
        // capacity 1 turns the branch into a chain
        for window in placed.windows(2) {
            assert_eq!(tree.get(window[1]).unwrap().prerequisites, vec![window[0]]);
        }
    }
}
