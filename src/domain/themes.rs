//! Theme discovery: salient TF-IDF terms per partition merged with curated hints.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::entities::ItemRecord;
use crate::domain::nlp::{is_stop_word, theme_text, tokenize_filtered, TfIdf};

/// Slots added on top of the discovery breadth when merging with hints.
pub const HINT_HEADROOM: usize = 4;

/// Curated theme hints for the five base-game schools.
pub fn vanilla_theme_hints() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, [&str; 8]); 5] = [
        (
            "Destruction",
            ["fire", "frost", "shock", "cloak", "rune", "wall", "bolt", "storm"],
        ),
        (
            "Conjuration",
            ["conjure", "summon", "bound", "atronach", "zombie", "raise", "reanimate", "dremora"],
        ),
        (
            "Alteration",
            [
                "flesh",
                "armor",
                "paralyze",
                "detect",
                "light",
                "transmute",
                "waterbreathing",
                "telekinesis",
            ],
        ),
        (
            "Illusion",
            ["fury", "fear", "calm", "courage", "invisibility", "muffle", "frenzy", "pacify"],
        ),
        (
            "Restoration",
            ["heal", "healing", "ward", "turn", "undead", "cure", "bane", "circle"],
        ),
    ];
    table
        .iter()
        .map(|(school, hints)| {
            (
                school.to_string(),
                hints.iter().map(|h| h.to_string()).collect(),
            )
        })
        .collect()
}

/// Top `top_n` salient terms of one partition.
///
/// Partitions with fewer than two items have no meaningful corpus and yield
/// no themes.
#[instrument(level = "debug", skip(items), fields(items = items.len()))]
pub fn discover_themes(items: &[ItemRecord], top_n: usize) -> Vec<String> {
    if items.len() < 2 || top_n == 0 {
        return Vec::new();
    }
    let documents: Vec<Vec<String>> = items
        .iter()
        .map(|i| tokenize_filtered(&theme_text(i)))
        .collect();
    let model = TfIdf::fit(&documents);
    let themes: Vec<String> = model
        .term_scores()
        .into_iter()
        .map(|(term, _)| term)
        .filter(|term| !is_stop_word(term) && term.chars().count() > 2)
        .take(top_n)
        .collect();
    debug!(?themes, "discovered themes");
    themes
}

/// Hints first (case-insensitively deduplicated against discovered terms),
/// then discovered themes until `max_themes` is reached.
///
/// Without hints the discovered list is truncated to `max_themes`; with
/// hints but nothing discovered the hints are returned unchanged.
pub fn merge_with_hints(discovered: &[String], hints: &[String], max_themes: usize) -> Vec<String> {
    if hints.is_empty() {
        return discovered.iter().take(max_themes).cloned().collect();
    }
    if discovered.is_empty() {
        return hints.to_vec();
    }
    let mut result: Vec<String> = hints.to_vec();
    let mut seen: HashSet<String> = hints.iter().map(|h| h.to_lowercase()).collect();
    for theme in discovered {
        if result.len() >= max_themes {
            break;
        }
        if seen.insert(theme.to_lowercase()) {
            result.push(theme.clone());
        }
    }
    result.truncate(max_themes);
    result
}

/// Final theme list for one partition.
pub fn themes_for_partition(
    items: &[ItemRecord],
    hints: Option<&Vec<String>>,
    top_n: usize,
) -> Vec<String> {
    let discovered = discover_themes(items, top_n);
    let hints: &[String] = hints.map(Vec::as_slice).unwrap_or(&[]);
    merge_with_hints(&discovered, hints, top_n + HINT_HEADROOM)
}
