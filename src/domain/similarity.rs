//! Per-partition pairwise similarity matrices (text, name, effect).

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::domain::entities::ItemRecord;
use crate::domain::nlp::ngram::{best_pair_similarity, jaccard_sorted};
use crate::domain::nlp::{item_text, packed_ngrams, simd, tokenize, TfIdf, TRIGRAM};

/// Similarity channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// TF-IDF cosine over name, description and effect labels
    Text,
    /// Trigram Jaccard over display names
    Name,
    /// Best trigram Jaccard over effect-label pairs
    Effect,
}

/// Dense symmetric n×n matrices keyed by item identifier.
///
/// Values lie in [0,1]; the diagonal is unused and stored as 0.
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatrix {
    index: HashMap<String, usize>,
    n: usize,
    text: Vec<f32>,
    name: Vec<f32>,
    effect: Vec<f32>,
}

struct PairScores {
    j: usize,
    text: f32,
    name: f32,
    effect: f32,
}

impl SimilarityMatrix {
    /// Compute all three channels for the items carrying an identifier.
    #[instrument(level = "debug", skip(items), fields(items = items.len()))]
    pub fn build(items: &[ItemRecord]) -> Self {
        let items: Vec<&ItemRecord> = items.iter().filter(|i| i.item_id().is_some()).collect();
        let n = items.len();

        let mut index = HashMap::with_capacity(n);
        for (i, item) in items.iter().enumerate() {
            if let Some(id) = item.item_id() {
                index.entry(id.to_string()).or_insert(i);
            }
        }

        let documents: Vec<Vec<String>> = items.iter().map(|i| tokenize(&item_text(i))).collect();
        let model = TfIdf::fit(&documents);
        let width = simd::padded_width(model.vocabulary.len());
        let rows = model.normalized_rows(width);

        let names: Vec<Vec<u32>> = items
            .iter()
            .map(|i| packed_ngrams(&i.name, TRIGRAM))
            .collect();
        let effects: Vec<Vec<Vec<u32>>> = items
            .iter()
            .map(|i| {
                i.effect_labels()
                    .into_iter()
                    .map(|label| packed_ngrams(label, TRIGRAM))
                    .collect()
            })
            .collect();

        // Each worker owns row i of the upper triangle; nothing is shared
        let upper: Vec<Vec<PairScores>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| PairScores {
                        j,
                        text: simd::dot(&rows[i], &rows[j]).clamp(0.0, 1.0),
                        name: jaccard_sorted(&names[i], &names[j]),
                        effect: best_pair_similarity(&effects[i], &effects[j]),
                    })
                    .collect()
            })
            .collect();

        let mut matrix = Self {
            index,
            n,
            text: vec![0.0; n * n],
            name: vec![0.0; n * n],
            effect: vec![0.0; n * n],
        };
        for (i, row) in upper.into_iter().enumerate() {
            for pair in row {
                matrix.set_pair(i, pair.j, Channel::Text, pair.text);
                matrix.set_pair(i, pair.j, Channel::Name, pair.name);
                matrix.set_pair(i, pair.j, Channel::Effect, pair.effect);
            }
        }

        debug!(
            n,
            vocabulary = model.vocabulary.len(),
            kernel = simd::kernel_name(),
            "similarity matrix built"
        );
        matrix
    }

    fn channel(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Text => &self.text,
            Channel::Name => &self.name,
            Channel::Effect => &self.effect,
        }
    }

    fn set_pair(&mut self, i: usize, j: usize, channel: Channel, value: f32) {
        let n = self.n;
        let cells = match channel {
            Channel::Text => &mut self.text,
            Channel::Name => &mut self.name,
            Channel::Effect => &mut self.effect,
        };
        cells[i * n + j] = value;
        cells[j * n + i] = value;
    }

    /// Number of items in the matrix.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Similarity of two items; 0 for unknown identifiers.
    pub fn get(&self, channel: Channel, a: &str, b: &str) -> f32 {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&i), Some(&j)) => self.channel(channel)[i * self.n + j],
            _ => 0.0,
        }
    }

    pub fn text(&self, a: &str, b: &str) -> f32 {
        self.get(Channel::Text, a, b)
    }

    pub fn name(&self, a: &str, b: &str) -> f32 {
        self.get(Channel::Name, a, b)
    }

    pub fn effect(&self, a: &str, b: &str) -> f32 {
        self.get(Channel::Effect, a, b)
    }

    /// Identifiers in matrix order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<(&str, usize)> = self.index.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        ids.sort_by_key(|&(_, i)| i);
        ids.into_iter().map(|(k, _)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EffectEntry;

    fn item(id: &str, name: &str, desc: &str, effects: &[&str]) -> ItemRecord {
        ItemRecord {
            id: Some(id.into()),
            name: name.into(),
            description: desc.into(),
            effects: effects.iter().map(|e| EffectEntry::Label(e.to_string())).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_related_items_score_higher() {
        let items = vec![
            item("a", "Flames", "A gout of fire", &["Fire Damage"]),
            item("b", "Firebolt", "A bolt of fire", &["Fire Damage"]),
            item("c", "Healing", "Heals the caster", &["Restore Health"]),
        ];
        let m = SimilarityMatrix::build(&items);
        assert!(m.text("a", "b") > m.text("a", "c"));
        assert!((m.effect("a", "b") - 1.0).abs() < 1e-6);
        assert!(m.effect("a", "c") < 0.5);
    }

    #[test]
    fn test_unknown_ids_score_zero() {
        let m = SimilarityMatrix::build(&[item("a", "Flames", "", &[])]);
        assert_eq!(m.text("a", "zzz"), 0.0);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_items_without_id_are_skipped() {
        let mut anonymous = item("", "Ghost", "", &[]);
        anonymous.id = None;
        let m = SimilarityMatrix::build(&[item("a", "Flames", "", &[]), anonymous]);
        assert_eq!(m.len(), 1);
        assert_eq!(m.ids(), vec!["a"]);
    }

    #[test]
    fn test_empty_item_has_zero_similarity_not_nan() {
        let items = vec![
            item("a", "Flames", "A gout of fire", &["Fire Damage"]),
            item("b", "", "", &[]),
        ];
        let m = SimilarityMatrix::build(&items);
        for ch in [Channel::Text, Channel::Name, Channel::Effect] {
            let v = m.get(ch, "a", "b");
            assert_eq!(v, 0.0);
            assert!(!v.is_nan());
        }
    }
}
