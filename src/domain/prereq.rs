//! Prerequisite candidate scoring.
//!
//! Ranks candidate nodes as prerequisites for an item by TF-IDF cosine over a
//! per-request corpus, optionally blended with spatial proximity.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::entities::ItemRecord;
use crate::domain::nlp::{cosine_similarity, item_text, tokenize, TfIdf};

/// Candidates kept per item unless a request overrides it.
pub const DEFAULT_TOP_N: usize = 5;

/// Scoring knobs of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrmSettings {
    /// Weight of proximity against text similarity, 0..=1
    pub proximity_bias: f32,
    /// "nearby" enables proximity blending
    pub pool_source: String,
    /// Distance at which proximity reaches 0
    #[serde(rename = "distance")]
    pub max_distance: f32,
    pub top_n: usize,
}

impl Default for PrmSettings {
    fn default() -> Self {
        Self {
            proximity_bias: 0.5,
            pool_source: "nearby".into(),
            max_distance: 5.0,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl PrmSettings {
    fn blends_proximity(&self) -> bool {
        self.pool_source == "nearby" && self.proximity_bias > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrmCandidate {
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub distance: Option<f32>,
    #[serde(flatten)]
    pub item: ItemRecord,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrmPair {
    #[serde(default)]
    pub spell_id: String,
    #[serde(default, alias = "item")]
    pub spell: ItemRecord,
    #[serde(default)]
    pub candidates: Vec<PrmCandidate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct PrmRequest {
    pub pairs: Vec<PrmPair>,
    pub settings: PrmSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub node_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrmScore {
    pub spell_id: String,
    pub best_match: String,
    pub score: f32,
    pub top_candidates: Vec<ScoredCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrmResponse {
    pub success: bool,
    pub scores: Vec<PrmScore>,
    pub count: usize,
}

fn round4(x: f32) -> f32 {
    (x * 10_000.0).round() / 10_000.0
}

/// Score candidates for one item, best first, at most `settings.top_n`.
pub fn score_candidates(
    item: &ItemRecord,
    candidates: &[PrmCandidate],
    settings: &PrmSettings,
) -> Vec<ScoredCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let documents: Vec<Vec<String>> = std::iter::once(item)
        .chain(candidates.iter().map(|c| &c.item))
        .map(|i| tokenize(&item_text(i)))
        .collect();
    let model = TfIdf::fit(&documents);
    let target = &model.vectors[0];

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .zip(&model.vectors[1..])
        .map(|(candidate, vector)| {
            let nlp = cosine_similarity(target, vector);
            let score = if settings.blends_proximity() {
                let dist = candidate.distance.unwrap_or(settings.max_distance);
                let proximity = if settings.max_distance > 0.0 {
                    (1.0 - dist / settings.max_distance).max(0.0)
                } else {
                    0.0
                };
                (1.0 - settings.proximity_bias) * nlp + settings.proximity_bias * proximity
            } else {
                nlp
            };
            ScoredCandidate {
                node_id: candidate.node_id.clone(),
                score: round4(score),
            }
        })
        .collect();

    // stable: equal scores keep candidate order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(settings.top_n.max(1));
    scored
}

/// Score every pair of a request; pairs without candidates are omitted.
#[instrument(level = "debug", skip(request), fields(pairs = request.pairs.len()))]
pub fn process_request(request: &PrmRequest) -> PrmResponse {
    let scores: Vec<PrmScore> = request
        .pairs
        .iter()
        .filter_map(|pair| {
            let ranked = score_candidates(&pair.spell, &pair.candidates, &request.settings);
            let best = ranked.first()?.clone();
            Some(PrmScore {
                spell_id: pair.spell_id.clone(),
                best_match: best.node_id,
                score: best.score,
                top_candidates: ranked,
            })
        })
        .collect();
    debug!(scored = scores.len(), "prerequisite scoring done");
    PrmResponse {
        success: true,
        count: scores.len(),
        scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> PrmRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_text_only_scoring_ranks_similar_first() {
        let req = request(
            r#"{
            "settings": {"poolSource": "all", "proximityBias": 0.5},
            "pairs": [{
                "spellId": "s1",
                "spell": {"name": "Fireball", "desc": "explosive fire"},
                "candidates": [
                    {"nodeId": "n1", "name": "Healing", "desc": "restore health"},
                    {"nodeId": "n2", "name": "Firebolt", "desc": "bolt of fire"}
                ]
            }]
        }"#,
        );
        let resp = process_request(&req);
        assert!(resp.success);
        assert_eq!(resp.count, 1);
        assert_eq!(resp.scores[0].best_match, "n2");
        assert_eq!(resp.scores[0].top_candidates.len(), 2);
    }

    #[test]
    fn test_proximity_blending_and_missing_distance() {
        let settings = PrmSettings {
            proximity_bias: 1.0,
            ..Default::default()
        };
        let candidates: Vec<PrmCandidate> = serde_json::from_str(
            r#"[
                {"nodeId": "far", "name": "x"},
                {"nodeId": "near", "name": "y", "distance": 1.0}
            ]"#,
        )
        .unwrap();
        let item = ItemRecord {
            name: "z".into(),
            ..Default::default()
        };
        let ranked = score_candidates(&item, &candidates, &settings);
        assert_eq!(ranked[0].node_id, "near");
        assert!((ranked[0].score - 0.8).abs() < 1e-4);
        assert_eq!(ranked[1].score, 0.0);
    }

    #[test]
    fn test_pairs_without_candidates_are_omitted() {
        let resp = process_request(&request(r#"{"pairs": [{"spellId": "s1", "spell": {}}]}"#));
        assert_eq!(resp.count, 0);
        assert!(resp.scores.is_empty());
    }

    #[test]
    fn test_top_n_truncates() {
        let settings = PrmSettings {
            top_n: 1,
            pool_source: "all".into(),
            ..Default::default()
        };
        let candidates: Vec<PrmCandidate> =
            serde_json::from_str(r#"[{"nodeId": "a"}, {"nodeId": "b"}]"#).unwrap();
        let ranked = score_candidates(&ItemRecord::default(), &candidates, &settings);
        assert_eq!(ranked.len(), 1);
    }
}
