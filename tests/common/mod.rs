//! Shared corpus fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;

use skilltree::application::PartitionOutput;
use skilltree::domain::{EffectEntry, ItemRecord, Tier};

pub fn spell(id: &str, school: &str, name: &str, tier: &str, effect: &str, desc: &str) -> ItemRecord {
    ItemRecord {
        id: Some(id.into()),
        name: name.into(),
        partition: school.into(),
        tier: Tier::from(tier),
        cost: 10.0,
        description: desc.into(),
        effects: if effect.is_empty() {
            Vec::new()
        } else {
            vec![EffectEntry::Label(effect.into())]
        },
        ..Default::default()
    }
}

/// Six Destruction spells over three elements and four tiers.
pub fn destruction_six() -> Vec<ItemRecord> {
    vec![
        spell("0x00012fcd", "Destruction", "Flames", "Novice", "Fire Damage", "A gout of fire that burns the target."),
        spell("0x0002b96b", "Destruction", "Frostbite", "Novice", "Frost Damage", "A blast of cold that freezes the target."),
        spell("mod-d1", "Destruction", "Firebolt", "Apprentice", "Fire Damage", "A bolt of fire that burns and ignites."),
        spell("mod-d2", "Destruction", "Ice Spike", "Apprentice", "Frost Damage", "A spike of ice that freezes and slows."),
        spell("mod-d3", "Destruction", "Lightning Bolt", "Adept", "Shock Damage", "A bolt of shock that drains magicka."),
        spell("mod-d4", "Destruction", "Fireball", "Expert", "Fire Damage", "An explosion of fire that burns everything nearby."),
    ]
}

/// Two partitions: Destruction plus a small Restoration set.
pub fn two_schools() -> Vec<ItemRecord> {
    let mut items = destruction_six();
    items.extend([
        spell("r01", "Restoration", "Healing", "Novice", "Restore Health", "Heals the caster over time."),
        spell("r02", "Restoration", "Fast Healing", "Apprentice", "Restore Health", "Heals the caster instantly."),
        spell("r03", "Restoration", "Turn Undead", "Adept", "Turn Undead", "Undead flee from the caster."),
        spell("r04", "Restoration", "Ward", "Apprentice", "Ward", "A ward that absorbs spell damage."),
    ]);
    items
}

/// Parent count per node identifier.
pub fn parent_counts(partition: &PartitionOutput) -> HashMap<&str, usize> {
    partition
        .nodes
        .iter()
        .map(|n| (n.form_id.as_str(), n.prerequisites.len()))
        .collect()
}

/// Nodes without prerequisites.
pub fn roots(partition: &PartitionOutput) -> Vec<&str> {
    partition
        .nodes
        .iter()
        .filter(|n| n.prerequisites.is_empty())
        .map(|n| n.form_id.as_str())
        .collect()
}
