//! Arena-backed skill tree: nodes addressed by stable generational indices.

use std::collections::HashMap;
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::{ItemRecord, Theme, Tier};

/// Stable handle of a node inside a [`SkillTree`].
pub type NodeId = Index;

/// Tree node built from one item record.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Item identifier
    pub id: String,
    /// Display name
    pub name: String,
    pub tier: Tier,
    /// Zero-indexed depth below the root
    pub depth: usize,
    pub theme: Theme,
    /// Layout section tag ("root", "trunk", "branch")
    pub section: Option<String>,
    /// Derived theme color, thematic builds only
    pub theme_color: Option<String>,
    /// Child nodes in discovery order, each unique
    pub children: Vec<NodeId>,
    /// Prerequisite nodes, each unique
    pub prerequisites: Vec<NodeId>,
    pub is_root: bool,
    /// Source record, echoed back on serialization
    pub item: ItemRecord,
}

impl TreeNode {
    /// Create a node from an item; items without identifier yield `None`.
    pub fn from_item(item: &ItemRecord) -> Option<Self> {
        let id = item.item_id()?.to_string();
        let name = if item.name.is_empty() {
            id.clone()
        } else {
            item.name.clone()
        };
        Some(Self {
            id,
            name,
            tier: item.tier.clone(),
            depth: 0,
            theme: Theme::None,
            section: None,
            theme_color: None,
            children: Vec::new(),
            prerequisites: Vec::new(),
            is_root: false,
            item: item.clone(),
        })
    }

    fn add_child(&mut self, child: NodeId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    fn add_prerequisite(&mut self, prereq: NodeId) {
        if !self.prerequisites.contains(&prereq) {
            self.prerequisites.push(prereq);
        }
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.theme.name() {
            Some(theme) => write!(f, "{} [{}] ({})", self.name, self.tier, theme),
            None => write!(f, "{} [{}]", self.name, self.tier),
        }
    }
}

/// One partition's tree. Nodes live in an arena; parent/child links are
/// arena indices, so inserting never invalidates existing references.
#[derive(Debug, Clone)]
pub struct SkillTree {
    partition: String,
    arena: Arena<TreeNode>,
    lookup: HashMap<String, NodeId>,
    /// Insertion order, used for every deterministic walk
    order: Vec<NodeId>,
    root: Option<NodeId>,
}

impl SkillTree {
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            arena: Arena::new(),
            lookup: HashMap::new(),
            order: Vec::new(),
            root: None,
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Insert a node; a duplicate identifier keeps the first node.
    #[instrument(level = "trace", skip(self, node), fields(id = %node.id))]
    pub fn insert(&mut self, node: TreeNode) -> NodeId {
        if let Some(&existing) = self.lookup.get(&node.id) {
            return existing;
        }
        let id = node.id.clone();
        let idx = self.arena.insert(node);
        self.lookup.insert(id, idx);
        self.order.push(idx);
        idx
    }

    pub fn get(&self, idx: NodeId) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: NodeId) -> Option<&mut TreeNode> {
        self.arena.get_mut(idx)
    }

    /// Look up a node index by item identifier.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.lookup.get(id).copied()
    }

    /// Identifier of a node, empty for stale indices.
    pub fn id_of(&self, idx: NodeId) -> &str {
        self.arena.get(idx).map(|n| n.id.as_str()).unwrap_or("")
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Mark `idx` as the single root of this tree.
    pub fn set_root(&mut self, idx: NodeId) {
        if let Some(old) = self.root.take() {
            if let Some(node) = self.arena.get_mut(old) {
                node.is_root = false;
            }
        }
        if let Some(node) = self.arena.get_mut(idx) {
            node.is_root = true;
            node.depth = 0;
            self.root = Some(idx);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node indices in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> + '_ {
        self.order
            .iter()
            .filter_map(move |&idx| self.arena.get(idx).map(|n| (idx, n)))
    }

    pub fn child_count(&self, idx: NodeId) -> usize {
        self.arena.get(idx).map(|n| n.children.len()).unwrap_or(0)
    }

    /// Link `parent -> child`: child edge, prerequisite edge, and
    /// `child.depth = max(prerequisite depth) + 1`. Returns `false` for
    /// self-links or stale indices.
    #[instrument(level = "trace", skip(self))]
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child {
            return false;
        }
        match self.arena.get2_mut(parent, child) {
            (Some(p), Some(c)) => {
                let depth = p.depth + 1;
                c.depth = if c.prerequisites.is_empty() {
                    depth
                } else {
                    c.depth.max(depth)
                };
                p.add_child(child);
                c.add_prerequisite(parent);
                true
            }
            _ => false,
        }
    }

    /// Remove both sides of the `parent -> child` edge.
    #[instrument(level = "trace", skip(self))]
    pub fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.arena.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.arena.get_mut(child) {
            c.prerequisites.retain(|&p| p != parent);
        }
    }

    /// Greatest node depth plus one; 0 for an empty tree.
    pub fn depth(&self) -> usize {
        self.iter().map(|(_, n)| n.depth + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, tier: &str) -> ItemRecord {
        ItemRecord {
            id: Some(id.to_string()),
            name: format!("Item {}", id),
            partition: "Destruction".into(),
            tier: Tier::from(tier),
            ..Default::default()
        }
    }

    #[test]
    fn test_link_sets_depth_and_both_edges() {
        let mut tree = SkillTree::new("Destruction");
        let a = tree.insert(TreeNode::from_item(&item("a", "Novice")).unwrap());
        let b = tree.insert(TreeNode::from_item(&item("b", "Apprentice")).unwrap());
        let c = tree.insert(TreeNode::from_item(&item("c", "Adept")).unwrap());
        tree.set_root(a);

        assert!(tree.link(a, b));
        assert!(tree.link(b, c));
        assert!(tree.link(a, b), "relinking is idempotent");

        assert_eq!(tree.get(a).unwrap().children, vec![b]);
        assert_eq!(tree.get(c).unwrap().prerequisites, vec![b]);
        assert_eq!(tree.get(c).unwrap().depth, 2);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_second_prerequisite_keeps_deepest_depth() {
        let mut tree = SkillTree::new("Destruction");
        let a = tree.insert(TreeNode::from_item(&item("a", "Novice")).unwrap());
        let b = tree.insert(TreeNode::from_item(&item("b", "Apprentice")).unwrap());
        let c = tree.insert(TreeNode::from_item(&item("c", "Adept")).unwrap());
        tree.set_root(a);
        tree.link(a, b);
        tree.link(b, c);

        assert!(tree.link(a, c));

        assert_eq!(tree.get(c).unwrap().prerequisites, vec![b, a]);
        assert_eq!(tree.get(c).unwrap().depth, 2);
    }

    #[test]
    fn test_self_link_is_rejected() {
        let mut tree = SkillTree::new("Destruction");
        let a = tree.insert(TreeNode::from_item(&item("a", "Novice")).unwrap());
        assert!(!tree.link(a, a));
        assert!(tree.get(a).unwrap().children.is_empty());
    }

    #[test]
    fn test_unlink_removes_both_sides() {
        let mut tree = SkillTree::new("Destruction");
        let a = tree.insert(TreeNode::from_item(&item("a", "Novice")).unwrap());
        let b = tree.insert(TreeNode::from_item(&item("b", "Novice")).unwrap());
        tree.link(a, b);
        tree.unlink(a, b);
        assert!(tree.get(a).unwrap().children.is_empty());
        assert!(tree.get(b).unwrap().prerequisites.is_empty());
    }

    #[test]
    fn test_duplicate_insert_keeps_first() {
        let mut tree = SkillTree::new("Destruction");
        let first = tree.insert(TreeNode::from_item(&item("a", "Novice")).unwrap());
        let second = tree.insert(TreeNode::from_item(&item("a", "Master")).unwrap());
        assert_eq!(first, second);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(first).unwrap().tier, Tier::Novice);
    }
}
