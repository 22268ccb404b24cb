//! Build configuration consumed by the tree builders

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Manual root override for one partition.
///
/// Hosts send either the bare identifier or `{ "formId": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RootOverride {
    Id(String),
    Record {
        #[serde(alias = "formId", alias = "id")]
        form_id: String,
    },
}

impl RootOverride {
    pub fn id(&self) -> &str {
        match self {
            RootOverride::Id(id) => id,
            RootOverride::Record { form_id } => form_id,
        }
    }
}

/// Rendering hint that may tighten or loosen the children cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "snake_case")]
pub struct GridHint {
    /// Layout mode, e.g. "sun" or "flat"
    pub mode: String,
    #[serde(alias = "partitionCount", alias = "schoolCount")]
    pub partition_count: usize,
    #[serde(alias = "avgPointsPerPartition", alias = "avgPointsPerSchool")]
    pub avg_points_per_partition: f32,
}

/// Parameters of one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BuildConfig {
    /// Random seed; 0 derives one from the clock
    pub seed: u64,
    #[serde(alias = "maxChildrenPerNode")]
    pub max_children_per_node: usize,
    #[serde(alias = "topThemesPerPartition", alias = "topThemesPerSchool")]
    pub top_themes_per_partition: usize,
    pub density: f32,
    pub symmetry: f32,
    pub chaos: f32,
    #[serde(alias = "forceBalance")]
    pub force_balance: f32,
    #[serde(alias = "convergenceChance")]
    pub convergence_chance: f32,
    #[serde(alias = "branchStyle")]
    pub branch_style: String,
    #[serde(alias = "chainStyle")]
    pub chain_style: String,
    #[serde(alias = "autoFixUnreachable")]
    pub auto_fix_unreachable: bool,
    #[serde(alias = "preferVanillaRoots")]
    pub prefer_vanilla_roots: bool,
    #[serde(alias = "selectedRoots")]
    pub selected_roots: BTreeMap<String, RootOverride>,
    #[serde(alias = "gridHint", skip_serializing_if = "Option::is_none")]
    pub grid_hint: Option<GridHint>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_children_per_node: 3,
            top_themes_per_partition: 8,
            density: 0.6,
            symmetry: 0.3,
            chaos: 0.0,
            force_balance: 0.5,
            convergence_chance: 0.4,
            branch_style: "chain".into(),
            chain_style: "linear".into(),
            auto_fix_unreachable: true,
            prefer_vanilla_roots: true,
            selected_roots: BTreeMap::new(),
            grid_hint: None,
        }
    }
}

impl BuildConfig {
    /// Children cap after applying the grid hint.
    ///
    /// A dense "sun" layout with few points per partition tightens the cap
    /// to 2; a sparse "flat" layout with many points loosens it to 4.
    pub fn effective_max_children(&self) -> usize {
        let max = self.max_children_per_node.max(1);
        match &self.grid_hint {
            Some(hint) if hint.mode == "sun" && max > 2 && hint.avg_points_per_partition < 40.0 => 2,
            Some(hint) if hint.mode == "flat" && max < 4 && hint.avg_points_per_partition > 60.0 => 4,
            _ => max,
        }
    }

    /// Root override identifier for a partition, if any.
    pub fn root_override(&self, partition: &str) -> Option<&str> {
        self.selected_roots
            .get(partition)
            .map(RootOverride::id)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let cfg = BuildConfig::default();
        assert_eq!(cfg.max_children_per_node, 3);
        assert_eq!(cfg.top_themes_per_partition, 8);
        assert!(cfg.auto_fix_unreachable);
        assert!(cfg.prefer_vanilla_roots);
        assert_eq!(cfg.effective_max_children(), 3);
    }

    #[test]
    fn test_deserializes_host_shape() {
        let json = r#"{
            "seed": 42,
            "maxChildrenPerNode": 2,
            "selectedRoots": {
                "Destruction": "0x00012FCD",
                "Illusion": {"formId": "0x0001A4CC"}
            },
            "gridHint": {"mode": "flat", "partitionCount": 5, "avgPointsPerPartition": 80}
        }"#;
        let cfg: BuildConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.root_override("Destruction"), Some("0x00012FCD"));
        assert_eq!(cfg.root_override("Illusion"), Some("0x0001A4CC"));
        assert_eq!(cfg.root_override("Alteration"), None);
        assert_eq!(cfg.effective_max_children(), 4);
        assert_eq!(cfg.chain_style, "linear");
    }

    #[rstest]
    #[case("sun", 3, 20.0, 2)]
    #[case("sun", 3, 50.0, 3)]
    #[case("sun", 2, 20.0, 2)]
    #[case("flat", 3, 80.0, 4)]
    #[case("flat", 5, 80.0, 5)]
    #[case("flat", 3, 30.0, 3)]
    #[case("radial", 3, 10.0, 3)]
    fn test_grid_hint_adjusts_cap(
        #[case] mode: &str,
        #[case] max: usize,
        #[case] avg: f32,
        #[case] expected: usize,
    ) {
        let cfg = BuildConfig {
            max_children_per_node: max,
            grid_hint: Some(GridHint {
                mode: mode.into(),
                partition_count: 5,
                avg_points_per_partition: avg,
            }),
            ..Default::default()
        };
        assert_eq!(cfg.effective_max_children(), expected);
    }
}
