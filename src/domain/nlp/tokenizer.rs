//! Tokenization and field-weighted text assembly.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::entities::{EffectEntry, ItemRecord};

const STOP_WORDS: &[&str] = &[
    // generic spell vocabulary
    "spell", "magic", "magical", "target", "targets", "effect", "effects", "damage", "point",
    "points", "second", "seconds", "per", "for", "the", "does", "causes", "cast", "caster",
    "casting", "level", "levels", "health", "magicka", "stamina", "drain", "drains",
    // effect description fragments
    "deals", "deal", "dur", "duration", "mag", "magnitude", "nearby", "enemies", "enemy",
    "increased", "increases", "increase", "decreased", "decreases", "decrease", "reduces",
    "reduced", "reduce", "restores", "restore", "restored", "absorb", "absorbs", "absorbed",
    "extra", "takes", "take", "time", "over", "while", "also", "resistance", "chance", "once",
    "each", "within", "range", "stronger", "powerful", "greater", "lesser", "more", "less",
    // tier labels
    "novice", "apprentice", "adept", "expert", "master",
    // english function words
    "to", "a", "an", "of", "in", "on", "at", "is", "are", "be", "with", "that", "this", "their",
    "your", "and", "or", "but", "not", "all", "was", "were", "been", "being", "have", "has",
    "had", "do", "did", "will", "would", "could", "should", "may", "might", "can", "shall",
    "from", "by", "as", "if", "its", "it", "they", "them", "he", "she", "his", "her", "we",
    "you", "who", "which", "when", "where", "how", "what", "than", "then", "into", "about",
    "up", "out", "no", "so", "just", "very", "too", "any", "some", "such",
];

/// Keyword prefix stripped before camel-case splitting.
const KEYWORD_PREFIX: &str = "Magic";

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

pub fn is_stop_word(word: &str) -> bool {
    stop_words().contains(word)
}

/// Lowercase, replace every non-alphanumeric character by a space, split,
/// and keep tokens longer than two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// [`tokenize`] followed by stop-word removal.
pub fn tokenize_filtered(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// Text used for item-to-item similarity: name twice, description, effect labels.
pub fn item_text(item: &ItemRecord) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !item.name.is_empty() {
        parts.push(&item.name);
        parts.push(&item.name);
    }
    if !item.description.is_empty() {
        parts.push(&item.description);
    }
    parts.extend(item.effect_labels());
    parts.join(" ")
}

/// Text used for theme discovery and scoring.
///
/// Name three times, effect labels three times, detailed effect name and
/// description once, keywords with the `Magic` prefix stripped and split at
/// camel-case boundaries.
pub fn theme_text(item: &ItemRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !item.name.is_empty() {
        parts.extend(std::iter::repeat(item.name.clone()).take(3));
    }
    for label in item.effect_labels() {
        parts.extend(std::iter::repeat(label.to_string()).take(3));
    }
    for effect in &item.effects {
        if let EffectEntry::Detailed { name, description } = effect {
            parts.extend(name.iter().cloned());
            parts.extend(description.iter().cloned());
        }
    }
    for keyword in &item.keywords {
        parts.push(split_keyword(keyword));
    }
    parts.join(" ")
}

fn camel_boundary() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\p{Ll}|\d)(\p{Lu})").ok())
        .as_ref()
}

/// `MagicDamageFire` -> `Damage Fire`
pub fn split_keyword(keyword: &str) -> String {
    let stripped = match keyword.strip_prefix(KEYWORD_PREFIX) {
        Some(rest) if keyword.len() > KEYWORD_PREFIX.len() => rest,
        _ => keyword,
    };
    match camel_boundary() {
        Some(re) => re.replace_all(stripped, "$1 $2").into_owned(),
        None => stripped.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EffectEntry;

    #[test]
    fn test_tokenize_drops_short_tokens_and_punctuation() {
        let tokens = tokenize("Fire-ball II: a gout of FLAME!");
        assert_eq!(tokens, vec!["fire", "ball", "gout", "flame"]);
    }

    #[test]
    fn test_tokenize_filtered_removes_stop_words() {
        let tokens = tokenize_filtered("Deals fire damage to the target");
        assert_eq!(tokens, vec!["fire"]);
    }

    #[test]
    fn test_split_keyword() {
        assert_eq!(split_keyword("MagicDamageFire"), "Damage Fire");
        assert_eq!(split_keyword("Magic"), "Magic");
        assert_eq!(split_keyword("SummonAtronach"), "Summon Atronach");
    }

    #[test]
    fn test_item_text_weights_name() {
        let item = ItemRecord {
            name: "Flames".into(),
            description: "Burns".into(),
            effects: vec![EffectEntry::Label("Fire Damage".into())],
            ..Default::default()
        };
        assert_eq!(item_text(&item), "Flames Flames Burns Fire Damage");
    }

    #[test]
    fn test_theme_text_includes_detailed_effects_and_keywords() {
        let item = ItemRecord {
            name: "Frostbite".into(),
            effects: vec![EffectEntry::Detailed {
                name: Some("Frost".into()),
                description: Some("Chills".into()),
            }],
            keywords: vec!["MagicDamageFrost".into()],
            ..Default::default()
        };
        let text = theme_text(&item);
        assert_eq!(
            text,
            "Frostbite Frostbite Frostbite Frost Frost Frost Frost Chills Damage Frost"
        );
    }

    #[test]
    fn test_empty_item_gives_empty_text() {
        let item = ItemRecord::default();
        assert!(item_text(&item).is_empty());
        assert!(theme_text(&item).is_empty());
    }
}
