//! Serialized tree records: what a build writes and `validate`/`show` read back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::domain::{
    BranchRecord, BuildConfig, BuilderKind, DomainError, ItemRecord, NodeId, PartitionBuild,
    SkillTree, Theme, Tier, TreeNode,
};

pub const FORMAT_VERSION: &str = "1.0";

/// One node of a serialized partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(rename = "formId", alias = "id")]
    pub form_id: String,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Depth plus one
    #[serde(default)]
    pub tier: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "skillLevel", default, skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(rename = "themeColor", default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
}

impl NodeOutput {
    fn from_node(tree: &SkillTree, node: &TreeNode) -> Self {
        let ids = |list: &[NodeId]| -> Vec<String> {
            list.iter().map(|&i| tree.id_of(i).to_string()).collect()
        };
        Self {
            form_id: node.id.clone(),
            children: ids(&node.children),
            prerequisites: ids(&node.prerequisites),
            tier: node.depth + 1,
            name: Some(node.name.clone()).filter(|n| !n.is_empty()),
            skill_level: match &node.tier {
                Tier::Unknown(label) if label.is_empty() || label == "Unknown" => None,
                tier => Some(tier.to_string()),
            },
            section: node.section.clone(),
            theme: node.theme.name().map(str::to_string),
            theme_color: node.theme_color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutput {
    pub theme: String,
    #[serde(rename = "attachmentPoint")]
    pub attachment_point: String,
    #[serde(rename = "spellIds", default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub color: String,
}

impl From<&BranchRecord> for BranchOutput {
    fn from(b: &BranchRecord) -> Self {
        Self {
            theme: b.theme.clone(),
            attachment_point: b.attachment_point.clone(),
            member_ids: b.member_ids.clone(),
            color: b.color.clone(),
        }
    }
}

/// Parameters a partition was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigUsed {
    pub shape: String,
    pub density: f32,
    pub symmetry: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ConfigUsed {
    pub fn new(kind: BuilderKind, config: &BuildConfig) -> Self {
        let thematic = kind == BuilderKind::Thematic;
        Self {
            shape: kind.layout_style().to_string(),
            density: config.density,
            symmetry: config.symmetry,
            chaos: thematic.then_some(config.chaos),
            branch_style: thematic.then(|| config.branch_style.clone()),
            source: None,
        }
    }

    fn with_source(mut self, kind: BuilderKind) -> Self {
        self.source = Some(kind.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionOutput {
    pub root: String,
    #[serde(rename = "layoutStyle")]
    pub layout_style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub nodes: Vec<NodeOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_used: Option<ConfigUsed>,
}

impl PartitionOutput {
    pub fn from_build(build: &PartitionBuild, config: &BuildConfig, color: &str) -> Self {
        let thematic = build.kind == BuilderKind::Thematic;
        Self {
            root: build
                .tree
                .root()
                .map(|r| build.tree.id_of(r).to_string())
                .unwrap_or_default(),
            layout_style: build.kind.layout_style().to_string(),
            color: thematic.then(|| color.to_string()),
            nodes: nodes_of(&build.tree),
            branches: build.branches.iter().map(BranchOutput::from).collect(),
            config_used: Some(ConfigUsed::new(build.kind, config).with_source(build.kind)),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeOutput> {
        self.nodes.iter().find(|n| n.form_id == id)
    }
}

/// Serialized nodes of a tree, in insertion order.
pub fn nodes_of(tree: &SkillTree) -> Vec<NodeOutput> {
    tree.iter()
        .map(|(_, node)| NodeOutput::from_node(tree, node))
        .collect()
}

/// Outcome of validation over all partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub all_valid: bool,
    pub total_nodes: usize,
    pub reachable_nodes: usize,
    #[serde(default)]
    pub repairs: usize,
    /// Unreachable node count per partition, non-zero entries only
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unreachable: BTreeMap<String, usize>,
    #[serde(default)]
    pub fingerprint: String,
}

/// A complete build result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeOutput {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub generator: String,
    #[serde(rename = "generatedAt", default)]
    pub generated_at: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigUsed>,
    #[serde(rename = "schools", alias = "partitions")]
    pub partitions: BTreeMap<String, PartitionOutput>,
    #[serde(default)]
    pub validation: ValidationSummary,
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// Rebuild an arena tree from its serialized form.
///
/// Edges are taken from both `children` and `prerequisites`; references to
/// unknown nodes are dropped with a warning. Depths are recomputed.
pub fn tree_from_output(partition: &str, output: &PartitionOutput) -> Result<SkillTree, DomainError> {
    let mut tree = SkillTree::new(partition);
    for node in &output.nodes {
        let item = ItemRecord {
            id: Some(node.form_id.clone()),
            name: node.name.clone().unwrap_or_default(),
            partition: partition.to_string(),
            tier: node
                .skill_level
                .as_deref()
                .map(Tier::from)
                .unwrap_or_default(),
            ..Default::default()
        };
        let Some(mut tree_node) = TreeNode::from_item(&item) else {
            continue;
        };
        tree_node.theme = node.theme.clone().map(Theme::Named).unwrap_or_default();
        tree_node.section = node.section.clone();
        tree_node.theme_color = node.theme_color.clone();
        tree.insert(tree_node);
    }

    let root = tree
        .find(&output.root)
        .ok_or_else(|| DomainError::UnknownNode(output.root.clone()))?;
    tree.set_root(root);

    for node in &output.nodes {
        let Some(idx) = tree.find(&node.form_id) else {
            continue;
        };
        for child in &node.children {
            match tree.find(child) {
                Some(c) => {
                    tree.link(idx, c);
                }
                None => warn!(partition, node = %node.form_id, child = %child, "unknown child dropped"),
            }
        }
        for prereq in &node.prerequisites {
            match tree.find(prereq) {
                Some(p) => {
                    tree.link(p, idx);
                }
                None => warn!(partition, node = %node.form_id, prereq = %prereq, "unknown prerequisite dropped"),
            }
        }
    }
    crate::domain::validate::refresh_depths(&mut tree);
    Ok(tree)
}

/// SHA-256 over every partition's root, sorted edges and node themes.
pub fn fingerprint(partitions: &BTreeMap<String, PartitionOutput>) -> String {
    let mut hasher = Sha256::new();
    for (name, partition) in partitions {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(partition.root.as_bytes());
        hasher.update(b"\0");

        let mut edges: Vec<(&str, &str)> = partition
            .nodes
            .iter()
            .flat_map(|n| n.children.iter().map(move |c| (n.form_id.as_str(), c.as_str())))
            .collect();
        edges.sort_unstable();
        for (parent, child) in edges {
            hasher.update(format!("{}>{}\n", parent, child).as_bytes());
        }

        let mut themes: Vec<(&str, &str)> = partition
            .nodes
            .iter()
            .map(|n| (n.form_id.as_str(), n.theme.as_deref().unwrap_or("")))
            .collect();
        themes.sort_unstable();
        for (id, theme) in themes {
            hasher.update(format!("{}={}\n", id, theme).as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}
