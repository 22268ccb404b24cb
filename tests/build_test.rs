//! Integration tests for tree building across both strategies.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use rstest::rstest;

use common::{destruction_six, parent_counts, roots, spell, two_schools};
use skilltree::application::TreeBuildService;
use skilltree::config::Settings;
use skilltree::domain::{BuildConfig, BuilderKind, ItemRecord, RootOverride};
use skilltree::util::testing;

fn service_without_hints() -> TreeBuildService {
    let settings = Settings {
        theme_hints: BTreeMap::new(),
        ..Default::default()
    };
    TreeBuildService::new(Arc::new(settings))
}

fn seeded(seed: u64) -> BuildConfig {
    BuildConfig {
        seed,
        ..Default::default()
    }
}

#[rstest]
fn given_six_items_and_cap_two_when_building_then_single_rooted_reachable_tree(
    #[values(BuilderKind::Classic, BuilderKind::Thematic)] kind: BuilderKind,
) {
    testing::init_test_setup();
    // Arrange
    let service = service_without_hints();
    let config = BuildConfig {
        max_children_per_node: 2,
        ..seeded(7)
    };

    // Act
    let output = service.build(&destruction_six(), kind, &config).unwrap();

    // Assert
    let partition = &output.partitions["Destruction"];
    assert_eq!(partition.nodes.len(), 6);
    assert_eq!(roots(partition), vec![partition.root.as_str()]);
    for (id, parents) in parent_counts(partition) {
        if id != partition.root {
            assert_eq!(parents, 1, "{} should have exactly one parent", id);
        }
    }
    assert!(output.validation.all_valid);
    assert_eq!(output.validation.reachable_nodes, 6);
}

#[test]
fn given_cap_two_when_building_classic_then_only_overflow_exceeds_cap() {
    // Arrange
    let service = service_without_hints();
    let config = BuildConfig {
        max_children_per_node: 2,
        ..seeded(11)
    };

    // Act
    let output = service
        .build(&destruction_six(), BuilderKind::Classic, &config)
        .unwrap();

    // Assert: the overflow fallback may go two past the cap, never further
    for node in &output.partitions["Destruction"].nodes {
        assert!(node.children.len() <= 4, "{} has {} children", node.form_id, node.children.len());
    }
}

#[rstest]
fn given_item_without_text_when_building_then_it_is_placed(
    #[values(BuilderKind::Classic, BuilderKind::Thematic, BuilderKind::Tree)] kind: BuilderKind,
) {
    // Arrange
    let mut items = destruction_six();
    items.push(spell("mod-blank", "Destruction", "", "Adept", "", ""));
    let service = service_without_hints();

    // Act
    let output = service.build(&items, kind, &seeded(3)).unwrap();

    // Assert
    let partition = &output.partitions["Destruction"];
    let blank = partition.node("mod-blank").expect("blank item in tree");
    assert_eq!(blank.prerequisites.len(), 1);
    assert!(output.validation.all_valid);
}

#[rstest]
#[case(BuilderKind::Classic, 1)]
#[case(BuilderKind::Classic, 42)]
#[case(BuilderKind::Thematic, 1)]
#[case(BuilderKind::Thematic, 42)]
#[case(BuilderKind::Tree, 1)]
#[case(BuilderKind::Tree, 42)]
fn given_same_seed_when_building_twice_then_identical_trees(
    #[case] kind: BuilderKind,
    #[case] seed: u64,
) {
    // Arrange
    let service = TreeBuildService::new(Arc::new(Settings::default()));
    let items = two_schools();

    // Act
    let first = service.build(&items, kind, &seeded(seed)).unwrap();
    let second = service.build(&items, kind, &seeded(seed)).unwrap();

    // Assert
    assert_eq!(first.validation.fingerprint, second.validation.fingerprint);
    assert_eq!(first.partitions, second.partitions);
}

#[test]
fn given_two_schools_when_building_then_each_partition_is_independent() {
    // Arrange
    let service = TreeBuildService::new(Arc::new(Settings::default()));
    let config = seeded(5);

    // Act
    let together = service
        .build(&two_schools(), BuilderKind::Thematic, &config)
        .unwrap();
    let alone = service
        .build(&destruction_six(), BuilderKind::Thematic, &config)
        .unwrap();

    // Assert: adding a partition does not disturb another partition's substream
    assert_eq!(
        together.partitions.keys().collect::<Vec<_>>(),
        vec!["Destruction", "Restoration"]
    );
    assert_eq!(
        together.partitions["Destruction"],
        alone.partitions["Destruction"]
    );
}

#[test]
fn given_selected_root_when_building_then_override_wins() {
    // Arrange
    let service = service_without_hints();
    let mut config = seeded(9);
    config.selected_roots.insert(
        "Destruction".into(),
        RootOverride::Record {
            form_id: "mod-d3".into(),
        },
    );

    // Act
    let output = service
        .build(&destruction_six(), BuilderKind::Classic, &config)
        .unwrap();

    // Assert
    let partition = &output.partitions["Destruction"];
    assert_eq!(partition.root, "mod-d3");
    assert_eq!(roots(partition), vec!["mod-d3"]);
    assert!(output.validation.all_valid);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(4)]
fn given_vanilla_novices_when_building_then_root_is_vanilla(#[case] seed: u64) {
    // Arrange
    let mut items = destruction_six();
    items.push(spell("mod-n1", "Destruction", "Sparks", "Novice", "Shock Damage", "Sparks of shock."));
    let service = service_without_hints();

    // Act
    let output = service.build(&items, BuilderKind::Classic, &seeded(seed)).unwrap();

    // Assert
    let root = &output.partitions["Destruction"].root;
    assert!(root.starts_with("0x"), "root {} should be base content", root);
}

#[test]
fn given_thematic_build_when_serialized_then_branches_and_colors_present() {
    // Arrange
    let service = TreeBuildService::new(Arc::new(Settings::default()));

    // Act
    let output = service
        .build(&destruction_six(), BuilderKind::Thematic, &seeded(21))
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&TreeBuildService::render_tree(&output).unwrap()).unwrap();

    // Assert
    let school = &json["schools"]["Destruction"];
    assert_eq!(school["layoutStyle"], "thematic_bfs");
    assert!(!school["branches"].as_array().unwrap().is_empty());
    assert!(school["branches"][0]["spellIds"].is_array());
    assert_eq!(school["nodes"][0]["tier"].as_u64().map(|t| t >= 1), Some(true));
    assert_eq!(json["seed"], 21);
    assert_eq!(json["validation"]["all_valid"], true);
}

#[test]
fn given_items_without_partition_or_id_when_building_then_they_are_dropped() {
    // Arrange
    let mut items = destruction_six();
    items.push(spell("orphan", "", "Nowhere", "Novice", "Fire Damage", ""));
    items.push(ItemRecord {
        name: "Nameless".into(),
        partition: "Destruction".into(),
        ..Default::default()
    });
    let service = service_without_hints();

    // Act
    let output = service.build(&items, BuilderKind::Classic, &seeded(2)).unwrap();

    // Assert
    assert_eq!(output.partitions.len(), 1);
    assert_eq!(output.validation.total_nodes, 6);
}

#[test]
fn given_empty_corpus_when_building_then_empty_valid_output() {
    let output = service_without_hints()
        .build(&[], BuilderKind::Thematic, &seeded(1))
        .unwrap();
    assert!(output.partitions.is_empty());
    assert!(output.validation.all_valid);
}

#[rstest]
fn given_chaos_when_building_thematic_then_deterministic_and_bounded(
    #[values(0.35, 0.7, 1.0)] chaos: f32,
) {
    // Arrange
    let service = TreeBuildService::new(Arc::new(Settings::default()));
    let config = BuildConfig {
        chaos,
        max_children_per_node: 2,
        ..seeded(17)
    };
    let cap = config.effective_max_children() + 2;

    // Act
    let first = service
        .build(&two_schools(), BuilderKind::Thematic, &config)
        .unwrap();
    let second = service
        .build(&two_schools(), BuilderKind::Thematic, &config)
        .unwrap();

    // Assert
    assert_eq!(first.partitions, second.partitions);
    assert!(first.validation.all_valid);
    for (name, partition) in &first.partitions {
        for node in &partition.nodes {
            assert!(
                node.children.len() <= cap,
                "{}/{} has {} children",
                name,
                node.form_id,
                node.children.len()
            );
        }
    }
}

#[test]
fn given_vanilla_preference_off_when_building_then_any_novice_can_be_root() {
    // Arrange
    let mut items = destruction_six();
    items.push(spell("mod-n1", "Destruction", "Sparks", "Novice", "Shock Damage", "Sparks of shock."));
    let novices = ["0x00012fcd", "0x0002b96b", "mod-n1"];
    let service = service_without_hints();

    // Act
    let roots: Vec<String> = (1..=32)
        .map(|seed| {
            let config = BuildConfig {
                prefer_vanilla_roots: false,
                ..seeded(seed)
            };
            let output = service.build(&items, BuilderKind::Classic, &config).unwrap();
            output.partitions["Destruction"].root.clone()
        })
        .collect();

    // Assert
    assert!(roots.iter().all(|r| novices.contains(&r.as_str())), "{:?}", roots);
    assert!(roots.iter().any(|r| r == "mod-n1"), "{:?}", roots);
}

#[rstest]
#[case(true)]
#[case(false)]
fn given_auto_fix_setting_when_building_then_repairs_follow_setting(#[case] auto_fix: bool) {
    // Arrange
    let service = service_without_hints();
    let config = BuildConfig {
        auto_fix_unreachable: auto_fix,
        ..seeded(13)
    };

    // Act
    let output = service.build(&two_schools(), BuilderKind::Thematic, &config).unwrap();

    // Assert: builders connect everything, so nothing needs repair either way
    assert_eq!(output.validation.repairs, 0);
    assert!(output.validation.all_valid);
    assert!(output.validation.unreachable.is_empty());
}

#[test]
fn given_broken_tree_without_fix_when_revalidating_then_unreachable_nodes_listed() {
    // Arrange
    let service = service_without_hints();
    let mut output = TreeBuildService::parse_tree(
        r#"{"schools": {"Alteration": {
            "root": "a",
            "layoutStyle": "tier_first",
            "nodes": [
                {"formId": "a", "children": ["b"]},
                {"formId": "b", "prerequisites": ["a"]},
                {"formId": "c", "prerequisites": ["x"]},
                {"formId": "x", "children": ["c"]}
            ]
        }}}"#,
    )
    .unwrap();

    // Act
    let reports = service.revalidate(&mut output, false, 3).unwrap();

    // Assert
    assert_eq!(reports[0].repairs, 0);
    assert_eq!(reports[0].validation.unreachable_ids, vec!["c", "x"]);
    assert!(!output.validation.all_valid);
    assert_eq!(output.validation.unreachable.get("Alteration"), Some(&2));
    assert_eq!(output.partitions["Alteration"].node("c").unwrap().prerequisites, vec!["x"]);
}

#[test]
fn given_tree_builder_when_building_then_rooted_valid_and_gated() {
    // Arrange
    let service = service_without_hints();
    let config = BuildConfig {
        convergence_chance: 1.0,
        ..seeded(23)
    };

    // Act
    let output = service
        .build(&destruction_six(), BuilderKind::Tree, &config)
        .unwrap();

    // Assert
    let partition = &output.partitions["Destruction"];
    assert_eq!(partition.layout_style, "radial");
    assert_eq!(partition.nodes.len(), 6);
    assert_eq!(roots(partition), vec![partition.root.as_str()]);
    assert!(output.validation.all_valid);
    let expert = partition.node("mod-d4").expect("expert spell placed");
    assert!(expert.prerequisites.len() >= 2, "{:?}", expert.prerequisites);
}
