//! Domain entities: item records, tiers and themes

use std::fmt;

use serde::{Deserialize, Serialize};

/// One entry of an item's effect list.
///
/// Hosts send either bare labels or `{name, description}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectEntry {
    Label(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl EffectEntry {
    /// Label of the effect, if it has a non-empty one.
    pub fn label(&self) -> Option<&str> {
        let label = match self {
            EffectEntry::Label(s) => Some(s.as_str()),
            EffectEntry::Detailed { name, .. } => name.as_deref(),
        };
        label.filter(|s| !s.is_empty())
    }
}

/// External item record (a spell). Immutable input to a build.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    #[serde(default, alias = "formId", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "school")]
    pub partition: String,
    #[serde(default, alias = "skillLevel")]
    pub tier: Tier,
    #[serde(default, alias = "magickaCost")]
    pub cost: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_cost: Option<f32>,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default)]
    pub effects: Vec<EffectEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effect_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, rename = "llm_keyword", skip_serializing_if = "Option::is_none")]
    pub llm_keyword: Option<String>,
    #[serde(
        default,
        rename = "llm_keyword_parent",
        skip_serializing_if = "Option::is_none"
    )]
    pub llm_keyword_parent: Option<String>,
}

impl ItemRecord {
    /// Identifier, treating an empty string as missing.
    pub fn item_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }

    /// Cost used for ordering: explicit cost, else base cost.
    pub fn effective_cost(&self) -> f32 {
        if self.cost != 0.0 {
            self.cost
        } else {
            self.base_cost.unwrap_or(0.0)
        }
    }

    /// All effect labels: labels/names from `effects`, then `effectNames`.
    pub fn effect_labels(&self) -> Vec<&str> {
        self.effects
            .iter()
            .filter_map(EffectEntry::label)
            .chain(
                self.effect_names
                    .iter()
                    .map(String::as_str)
                    .filter(|s| !s.is_empty()),
            )
            .collect()
    }
}

/// Ordinal skill level of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    Novice,
    Apprentice,
    Adept,
    Expert,
    Master,
    Unknown(String),
}

impl Tier {
    /// Known tiers in construction order.
    pub const ORDERED: [Tier; 5] = [
        Tier::Novice,
        Tier::Apprentice,
        Tier::Adept,
        Tier::Expert,
        Tier::Master,
    ];

    /// Zero-based ordinal, `None` for unknown labels.
    pub fn index(&self) -> Option<usize> {
        match self {
            Tier::Novice => Some(0),
            Tier::Apprentice => Some(1),
            Tier::Adept => Some(2),
            Tier::Expert => Some(3),
            Tier::Master => Some(4),
            Tier::Unknown(_) => None,
        }
    }

    /// Ordinal used when grouping by tier: unknown labels join Novice.
    pub fn group_index(&self) -> usize {
        self.index().unwrap_or(0)
    }

    /// Ordinal used when sorting: unknown labels sort last.
    pub fn sort_rank(&self) -> usize {
        self.index().unwrap_or(99)
    }

    /// Ordinal used when scoring attachment points: unknown counts as Adept.
    pub fn attachment_rank(&self) -> usize {
        self.index().unwrap_or(2)
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Unknown("Unknown".to_string())
    }
}

impl From<String> for Tier {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Novice" => Tier::Novice,
            "Apprentice" => Tier::Apprentice,
            "Adept" => Tier::Adept,
            "Expert" => Tier::Expert,
            "Master" => Tier::Master,
            _ => Tier::Unknown(s),
        }
    }
}

impl From<&str> for Tier {
    fn from(s: &str) -> Self {
        Tier::from(s.to_string())
    }
}

impl From<Tier> for String {
    fn from(t: Tier) -> Self {
        t.to_string()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Novice => write!(f, "Novice"),
            Tier::Apprentice => write!(f, "Apprentice"),
            Tier::Adept => write!(f, "Adept"),
            Tier::Expert => write!(f, "Expert"),
            Tier::Master => write!(f, "Master"),
            Tier::Unknown(label) => write!(f, "{}", label),
        }
    }
}

/// Theme assigned to a node or bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    /// No theme scored high enough.
    #[default]
    None,
    Named(String),
}

impl Theme {
    pub fn named(name: impl Into<String>) -> Self {
        Theme::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Theme::None => None,
            Theme::Named(n) => Some(n.as_str()),
        }
    }

    /// Compare two themes; `None` when either side is unassigned.
    pub fn agrees_with(&self, other: &Theme) -> Option<bool> {
        match (self, other) {
            (Theme::Named(a), Theme::Named(b)) => Some(a == b),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::None => write!(f, "-"),
            Theme::Named(n) => write!(f, "{}", n),
        }
    }
}

/// Whether an identifier belongs to base game content.
///
/// Identifiers are hexadecimal form ids; the top byte is the load-order
/// slot and the first five slots hold the base game and its official
/// add-ons.
pub fn is_vanilla_id(id: &str) -> bool {
    let digits = id.trim_start_matches("0x").trim_start_matches("0X");
    match u32::from_str_radix(digits, 16) {
        Ok(val) => (val >> 24) < 0x05,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_roundtrip_and_unknown() {
        assert_eq!(Tier::from("Adept"), Tier::Adept);
        assert_eq!(Tier::from("Legendary"), Tier::Unknown("Legendary".into()));
        assert_eq!(Tier::from("Legendary").group_index(), 0);
        assert_eq!(Tier::from("Legendary").sort_rank(), 99);
        assert_eq!(Tier::from("Legendary").attachment_rank(), 2);
        assert_eq!(Tier::Master.to_string(), "Master");
    }

    #[test]
    fn test_is_vanilla_id() {
        assert!(is_vanilla_id("0x00012FCD"));
        assert!(is_vanilla_id("04012FCD"));
        assert!(!is_vanilla_id("0x05012FCD"));
        assert!(!is_vanilla_id("FE000800"));
        assert!(!is_vanilla_id("not-hex"));
    }

    #[test]
    fn test_item_record_accepts_host_aliases() {
        let json = r#"{
            "formId": "0x00012FCD",
            "name": "Flames",
            "school": "Destruction",
            "skillLevel": "Novice",
            "magickaCost": 14,
            "desc": "A gout of fire.",
            "effects": ["Fire Damage", {"name": "Burn", "description": "Sets on fire"}],
            "llm_keyword": "fire"
        }"#;
        let item: ItemRecord = serde_json::from_str(json).unwrap();
        assert_eq!(item.item_id(), Some("0x00012FCD"));
        assert_eq!(item.partition, "Destruction");
        assert_eq!(item.tier, Tier::Novice);
        assert_eq!(item.effective_cost(), 14.0);
        assert_eq!(item.effect_labels(), vec!["Fire Damage", "Burn"]);
        assert_eq!(item.llm_keyword.as_deref(), Some("fire"));
    }

    #[test]
    fn test_theme_agreement() {
        let fire = Theme::named("fire");
        assert_eq!(fire.agrees_with(&Theme::named("fire")), Some(true));
        assert_eq!(fire.agrees_with(&Theme::named("frost")), Some(false));
        assert_eq!(fire.agrees_with(&Theme::None), None);
    }
}
