//! Assigns items to their best-fit theme.

use rayon::prelude::*;
use tracing::{debug, instrument, trace};

use crate::domain::entities::{ItemRecord, Theme};
use crate::domain::nlp::fuzzy::{partial_ratio, token_set_ratio};
use crate::domain::nlp::theme_text;

/// Minimum score for a best-fit assignment.
pub const MIN_THEME_SCORE: u32 = 30;

const NAME_SUBSTRING_BONUS: f32 = 40.0;
const TEXT_SUBSTRING_BONUS: f32 = 30.0;

/// Lowercased texts an item is scored against.
struct ScoringText {
    text: String,
    name: String,
}

impl ScoringText {
    fn of(item: &ItemRecord) -> Self {
        Self {
            text: theme_text(item).to_lowercase(),
            name: item.name.to_lowercase(),
        }
    }

    fn score(&self, theme: &str) -> u32 {
        let theme = theme.to_lowercase();
        if theme.is_empty() {
            return 0;
        }
        let bonus = if self.name.contains(&theme) {
            NAME_SUBSTRING_BONUS
        } else if self.text.contains(&theme) {
            TEXT_SUBSTRING_BONUS
        } else {
            0.0
        };
        let partial = partial_ratio(&theme, &self.text) as f32;
        let token = token_set_ratio(&theme, &self.text) as f32;
        let name = partial_ratio(&theme, &self.name) as f32 * 1.2;

        let combined = partial * 0.25 + token * 0.25 + name * 0.3 + bonus;
        (combined as u32).min(100)
    }
}

/// Blended 0-100 fit of an item to a theme label.
pub fn theme_score(item: &ItemRecord, theme: &str) -> u32 {
    ScoringText::of(item).score(theme)
}

/// Highest-scoring theme and its score; ties keep the earlier theme and a
/// best score of 0 means no theme.
pub fn primary_theme(item: &ItemRecord, themes: &[String]) -> (Theme, u32) {
    best_of(&ScoringText::of(item), themes)
}

fn best_of(text: &ScoringText, themes: &[String]) -> (Theme, u32) {
    let mut best = (Theme::None, 0);
    for theme in themes {
        let score = text.score(theme);
        if score > best.1 {
            best = (Theme::named(theme.clone()), score);
        }
    }
    best
}

/// One named bucket of item indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeBucket {
    pub theme: String,
    pub members: Vec<usize>,
}

/// Partition of one partition's items (by index) into theme buckets plus
/// the unassigned rest. Buckets keep the theme list order and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeGroups {
    pub buckets: Vec<ThemeBucket>,
    pub unassigned: Vec<usize>,
}

impl ThemeGroups {
    pub fn bucket(&self, theme: &str) -> Option<&ThemeBucket> {
        self.buckets.iter().find(|b| b.theme == theme)
    }

    /// Theme of the item at `idx`.
    pub fn theme_of(&self, idx: usize) -> Theme {
        self.buckets
            .iter()
            .find(|b| b.members.contains(&idx))
            .map(|b| Theme::named(b.theme.clone()))
            .unwrap_or(Theme::None)
    }

    fn position(&self, theme: &str) -> Option<usize> {
        self.buckets.iter().position(|b| b.theme == theme)
    }
}

/// Group items by best-fit theme.
///
/// Items scoring below `min_score` go to `unassigned`; a second pass moves
/// unassigned items whose `llm_keyword` (else its `llm_keyword_parent`) names
/// a known theme into that bucket. The parent is only consulted when a
/// keyword is present.
#[instrument(level = "debug", skip(items, themes), fields(items = items.len(), themes = themes.len()))]
pub fn group_items(items: &[ItemRecord], themes: &[String], min_score: u32) -> ThemeGroups {
    let mut groups = ThemeGroups::default();
    for theme in themes {
        if groups.position(theme).is_none() {
            groups.buckets.push(ThemeBucket {
                theme: theme.clone(),
                members: Vec::new(),
            });
        }
    }

    let best: Vec<(Theme, u32)> = items
        .par_iter()
        .map(|item| best_of(&ScoringText::of(item), themes))
        .collect();

    for (idx, (theme, score)) in best.into_iter().enumerate() {
        trace!(item = %items[idx].name, %theme, score, "theme fit");
        match theme.name().and_then(|t| groups.position(t)) {
            Some(pos) if score >= min_score => groups.buckets[pos].members.push(idx),
            _ => groups.unassigned.push(idx),
        }
    }

    let mut still_unassigned = Vec::new();
    for idx in std::mem::take(&mut groups.unassigned) {
        let item = &items[idx];
        let target = match item.llm_keyword.as_deref().filter(|kw| !kw.is_empty()) {
            Some(keyword) => groups.position(keyword).or_else(|| {
                item.llm_keyword_parent
                    .as_deref()
                    .filter(|kw| !kw.is_empty())
                    .and_then(|parent| groups.position(parent))
            }),
            None => None,
        };
        match target {
            Some(pos) => {
                debug!(item = %item.name, theme = %groups.buckets[pos].theme, "reclassified by keyword");
                groups.buckets[pos].members.push(idx);
            }
            None => still_unassigned.push(idx),
        }
    }
    groups.unassigned = still_unassigned;
    groups
}
