//! Structural validation and repair of a partition tree.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::arena::{NodeId, SkillTree};

/// Upper bound on repair passes.
pub const MAX_REPAIR_PASSES: usize = 20;

/// Children beyond `max_children` tolerated before a warning.
pub const OVERFLOW_TOLERANCE: usize = 2;

/// Outcome of [`validate_partition`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub total_nodes: usize,
    pub reachable_nodes: usize,
    pub unreachable_ids: Vec<String>,
    pub cycle_count: usize,
    pub cycles: Vec<Vec<String>>,
    pub warnings: Vec<String>,
    pub all_valid: bool,
}

impl ValidationResult {
    pub fn unreachable_count(&self) -> usize {
        self.total_nodes - self.reachable_nodes
    }
}

/// Forward closure from the root: a node unlocks once it has prerequisites
/// and all of them are unlocked. Iterates to a fixed point.
pub fn simulate_unlocks(tree: &SkillTree) -> HashSet<NodeId> {
    let mut unlocked = HashSet::new();
    let Some(root) = tree.root() else {
        return unlocked;
    };
    unlocked.insert(root);

    let mut changed = true;
    while changed {
        changed = false;
        for (idx, node) in tree.iter() {
            if unlocked.contains(&idx) || node.prerequisites.is_empty() {
                continue;
            }
            if node.prerequisites.iter().all(|p| unlocked.contains(p)) {
                unlocked.insert(idx);
                changed = true;
            }
        }
    }
    unlocked
}

/// Nodes not unlocked from the root, in insertion order.
pub fn find_unreachable(tree: &SkillTree) -> Vec<NodeId> {
    let unlocked = simulate_unlocks(tree);
    tree.node_ids()
        .iter()
        .copied()
        .filter(|idx| !unlocked.contains(idx))
        .collect()
}

/// Depth-first search over child edges with an explicit stack; every back
/// edge to a node on the current path yields one cycle (path plus the
/// repeated node).
pub fn detect_cycles(tree: &SkillTree) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut on_path: HashSet<NodeId> = HashSet::new();

    for &start in tree.node_ids() {
        if visited.contains(&start) {
            continue;
        }
        // (node, next child position)
        let mut frames: Vec<(NodeId, usize)> = vec![(start, 0)];
        let mut path: Vec<NodeId> = vec![start];
        visited.insert(start);
        on_path.insert(start);

        while let Some(&(node, pos)) = frames.last() {
            let next = tree.get(node).and_then(|n| n.children.get(pos)).copied();
            match next {
                Some(child) => {
                    if let Some(top) = frames.last_mut() {
                        top.1 += 1;
                    }
                    if on_path.contains(&child) {
                        let from = path.iter().position(|&p| p == child).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            path[from..].iter().map(|&p| tree.id_of(p).to_string()).collect();
                        cycle.push(tree.id_of(child).to_string());
                        cycles.push(cycle);
                    } else if visited.insert(child) {
                        on_path.insert(child);
                        path.push(child);
                        frames.push((child, 0));
                    }
                }
                None => {
                    frames.pop();
                    path.pop();
                    on_path.remove(&node);
                }
            }
        }
    }
    cycles
}

/// Reachability, cycles and branching report for one partition.
#[instrument(level = "debug", skip(tree), fields(partition = tree.partition()))]
pub fn validate_partition(tree: &SkillTree, max_children: usize) -> ValidationResult {
    let mut result = ValidationResult {
        total_nodes: tree.len(),
        ..Default::default()
    };
    if tree.root().is_none() {
        result.warnings.push("root node not found".to_string());
        result.unreachable_ids = tree.iter().map(|(_, n)| n.id.clone()).collect();
        return result;
    }

    let unlocked = simulate_unlocks(tree);
    result.reachable_nodes = unlocked.len();
    result.unreachable_ids = tree
        .iter()
        .filter(|(idx, _)| !unlocked.contains(idx))
        .map(|(_, n)| n.id.clone())
        .collect();

    result.cycles = detect_cycles(tree);
    result.cycle_count = result.cycles.len();

    for (_, node) in tree.iter() {
        if node.children.len() > max_children + OVERFLOW_TOLERANCE {
            result.warnings.push(format!(
                "node {} has {} children (max {})",
                node.id,
                node.children.len(),
                max_children
            ));
        }
    }

    result.all_valid = result.unreachable_ids.is_empty() && result.cycle_count == 0;
    result
}

/// Make unreachable nodes reachable, in at most [`MAX_REPAIR_PASSES`] passes.
///
/// Per unreachable node: strip prerequisites that are themselves locked;
/// a node without prerequisites attaches to the least-loaded unlocked node
/// under `max_children`, or, when none has capacity, to the root regardless
/// of its load. Returns the number of fixes applied.
#[instrument(level = "debug", skip(tree), fields(partition = tree.partition()))]
pub fn fix_unreachable(tree: &mut SkillTree, max_children: usize) -> usize {
    let Some(root) = tree.root() else {
        return 0;
    };
    let mut total_fixes = 0;

    for pass in 0..MAX_REPAIR_PASSES {
        let mut unlocked = simulate_unlocks(tree);
        let unreachable: Vec<NodeId> = tree
            .node_ids()
            .iter()
            .copied()
            .filter(|idx| !unlocked.contains(idx))
            .collect();
        if unreachable.is_empty() {
            break;
        }
        debug!(pass, unreachable = unreachable.len(), "repair pass");

        // Stripping locked edges keeps the unlocked set; attached nodes join it
        let mut fixed_any = false;
        for idx in unreachable {
            let blocking: Vec<NodeId> = tree
                .get(idx)
                .map(|n| {
                    n.prerequisites
                        .iter()
                        .copied()
                        .filter(|p| !unlocked.contains(p))
                        .collect()
                })
                .unwrap_or_default();

            if !blocking.is_empty() {
                for parent in blocking {
                    tree.unlink(parent, idx);
                }
                total_fixes += 1;
                fixed_any = true;
                continue;
            }

            let has_prereqs = tree.get(idx).is_some_and(|n| !n.prerequisites.is_empty());
            if has_prereqs {
                continue;
            }

            let mut best: Option<(NodeId, usize)> = None;
            for (candidate, node) in tree.iter() {
                if candidate == idx || !unlocked.contains(&candidate) {
                    continue;
                }
                let load = node.children.len();
                if load < max_children && best.map_or(true, |(_, b)| load < b) {
                    best = Some((candidate, load));
                }
            }

            let parent = match best {
                Some((parent, _)) => parent,
                None => {
                    warn!(
                        node = tree.id_of(idx),
                        "no reachable node has capacity, forcing attachment to root"
                    );
                    root
                }
            };
            if tree.link(parent, idx) {
                unlocked.insert(idx);
                total_fixes += 1;
                fixed_any = true;
            }
        }

        if !fixed_any {
            break;
        }
    }

    if total_fixes > 0 {
        refresh_depths(tree);
    }
    total_fixes
}

/// Recompute every depth as `max(prerequisite depth) + 1` in topological
/// order. Nodes on a cycle keep their depth.
pub fn refresh_depths(tree: &mut SkillTree) {
    let mut pending: HashMap<NodeId, usize> = tree
        .iter()
        .map(|(idx, n)| (idx, n.prerequisites.len()))
        .collect();
    let mut queue: VecDeque<NodeId> = tree
        .iter()
        .filter(|(_, n)| n.prerequisites.is_empty())
        .map(|(idx, _)| idx)
        .collect();

    while let Some(idx) = queue.pop_front() {
        let (depth, children) = match tree.get(idx) {
            Some(node) => {
                let depth = node
                    .prerequisites
                    .iter()
                    .filter_map(|&p| tree.get(p).map(|pn| pn.depth + 1))
                    .max()
                    .unwrap_or(0);
                (depth, node.children.clone())
            }
            None => continue,
        };
        if let Some(node) = tree.get_mut(idx) {
            node.depth = depth;
        }
        for child in children {
            if let Some(count) = pending.get_mut(&child) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    queue.push_back(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::arena::TreeNode;
    use crate::domain::entities::ItemRecord;

    fn tree_with(ids: &[&str]) -> (SkillTree, Vec<NodeId>) {
        let mut tree = SkillTree::new("Test");
        let idxs = ids
            .iter()
            .map(|id| {
                let item = ItemRecord {
                    id: Some(id.to_string()),
                    name: id.to_string(),
                    ..Default::default()
                };
                tree.insert(TreeNode::from_item(&item).unwrap())
            })
            .collect::<Vec<_>>();
        tree.set_root(idxs[0]);
        (tree, idxs)
    }

    #[test]
    fn test_unlock_requires_all_prerequisites() {
        let (mut tree, n) = tree_with(&["r", "a", "b", "c"]);
        tree.link(n[0], n[1]);
        tree.link(n[1], n[3]);
        tree.link(n[2], n[3]);
        let unlocked = simulate_unlocks(&tree);
        assert!(unlocked.contains(&n[0]) && unlocked.contains(&n[1]));
        assert!(!unlocked.contains(&n[2]));
        assert!(!unlocked.contains(&n[3]), "c waits for unreachable b");
    }

    #[test]
    fn test_detect_cycles_reports_back_edge() {
        let (mut tree, n) = tree_with(&["r", "a", "b"]);
        tree.link(n[0], n[1]);
        tree.link(n[1], n[2]);
        tree.link(n[2], n[1]);
        let cycles = detect_cycles(&tree);
        assert_eq!(cycles, vec![vec!["a".to_string(), "b".into(), "a".into()]]);
    }

    #[test]
    fn test_acyclic_diamond_has_no_cycles() {
        let (mut tree, n) = tree_with(&["r", "a", "b", "c"]);
        tree.link(n[0], n[1]);
        tree.link(n[0], n[2]);
        tree.link(n[1], n[3]);
        tree.link(n[2], n[3]);
        assert!(detect_cycles(&tree).is_empty());
    }

    #[test]
    fn test_validation_flags_overloaded_nodes() {
        let (mut tree, n) = tree_with(&["r", "a", "b", "c", "d"]);
        for &child in &n[1..] {
            tree.link(n[0], child);
        }
        let result = validate_partition(&tree, 1);
        assert!(result.all_valid);
        assert_eq!(result.reachable_nodes, 5);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_fix_attaches_isolated_node_to_least_loaded() {
        let (mut tree, n) = tree_with(&["r", "a", "b", "x"]);
        tree.link(n[0], n[1]);
        tree.link(n[0], n[2]);
        tree.link(n[1], n[3]);
        tree.unlink(n[1], n[3]);

        let fixes = fix_unreachable(&mut tree, 3);

        assert_eq!(fixes, 1);
        // a and b both have 0 children; the first in insertion order wins
        assert_eq!(tree.get(n[3]).unwrap().prerequisites, vec![n[1]]);
        assert_eq!(tree.get(n[3]).unwrap().depth, 2);
        assert!(validate_partition(&tree, 3).all_valid);
    }

    #[test]
    fn test_nodes_attached_in_a_pass_take_later_orphans() {
        let (mut tree, n) = tree_with(&["r", "a", "x", "y"]);
        tree.link(n[0], n[1]);

        let fixes = fix_unreachable(&mut tree, 1);

        assert_eq!(fixes, 2);
        assert_eq!(tree.get(n[2]).unwrap().prerequisites, vec![n[1]]);
        assert_eq!(tree.get(n[3]).unwrap().prerequisites, vec![n[2]]);
        assert_eq!(tree.get(n[3]).unwrap().depth, 3);
        assert_eq!(tree.child_count(n[0]), 1, "root stays within the cap");
    }

    #[test]
    fn test_refresh_depths_follows_longest_prerequisite_chain() {
        let (mut tree, n) = tree_with(&["r", "a", "b"]);
        tree.link(n[0], n[2]);
        tree.link(n[0], n[1]);
        tree.link(n[1], n[2]);
        if let Some(node) = tree.get_mut(n[2]) {
            node.depth = 7;
        }
        refresh_depths(&mut tree);
        assert_eq!(tree.get(n[2]).unwrap().depth, 2);
    }
}
