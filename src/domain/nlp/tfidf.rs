//! TF-IDF vectorization with smoothed IDF and L2 norms.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Sparse weight vector keyed by vocabulary index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub weights: BTreeMap<usize, f32>,
    pub norm: f32,
}

impl SparseVector {
    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    /// Dense, zero-padded copy of this vector of length `width`.
    pub fn to_dense(&self, width: usize) -> Vec<f32> {
        let mut row = vec![0.0f32; width];
        for (&idx, &w) in &self.weights {
            if idx < width {
                row[idx] = w;
            }
        }
        row
    }
}

/// Fitted TF-IDF model over one document set.
#[derive(Debug, Clone, Default)]
pub struct TfIdf {
    /// Terms in first-seen order; the position is the vocabulary index
    pub vocabulary: Vec<String>,
    pub idf: Vec<f32>,
    pub vectors: Vec<SparseVector>,
}

impl TfIdf {
    /// Fit over tokenized documents.
    ///
    /// `idf = ln((N + 1) / (df + 1)) + 1`, `tf = count / doc_len`; an empty
    /// document yields the zero vector.
    pub fn fit(documents: &[Vec<String>]) -> Self {
        if documents.is_empty() {
            return Self::default();
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut vocabulary: Vec<String> = Vec::new();
        let mut df: Vec<usize> = Vec::new();
        for doc in documents {
            let mut seen: HashSet<usize> = HashSet::new();
            for token in doc {
                let idx = *index.entry(token.as_str()).or_insert_with(|| {
                    vocabulary.push(token.clone());
                    df.push(0);
                    vocabulary.len() - 1
                });
                if seen.insert(idx) {
                    df[idx] += 1;
                }
            }
        }

        let n_docs = documents.len() as f32;
        let idf: Vec<f32> = df
            .iter()
            .map(|&freq| ((n_docs + 1.0) / (freq as f32 + 1.0)).ln() + 1.0)
            .collect();

        let vectors = documents
            .iter()
            .map(|doc| {
                if doc.is_empty() {
                    return SparseVector::default();
                }
                let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
                for token in doc {
                    if let Some(&idx) = index.get(token.as_str()) {
                        *counts.entry(idx).or_insert(0) += 1;
                    }
                }
                let total = doc.len() as f32;
                let weights: BTreeMap<usize, f32> = counts
                    .into_iter()
                    .map(|(idx, count)| (idx, (count as f32 / total) * idf[idx]))
                    .collect();
                let norm_sq: f32 = weights.values().map(|w| w * w).sum();
                SparseVector {
                    weights,
                    norm: if norm_sq > 0.0 { norm_sq.sqrt() } else { 0.0 },
                }
            })
            .collect();

        Self {
            vocabulary,
            idf,
            vectors,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Sum of raw weights per term across all documents, best first.
    /// Ties are ordered by term.
    pub fn term_scores(&self) -> Vec<(String, f32)> {
        let mut sums = vec![0.0f32; self.vocabulary.len()];
        for vector in &self.vectors {
            for (&idx, &w) in &vector.weights {
                sums[idx] += w;
            }
        }
        let mut scored: Vec<(String, f32)> = self.vocabulary.iter().cloned().zip(sums).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored
    }

    /// Dense rows normalized to unit length, each padded to `width`.
    pub fn normalized_rows(&self, width: usize) -> Vec<Vec<f32>> {
        self.vectors
            .iter()
            .map(|v| {
                let mut row = v.to_dense(width);
                if v.norm > 0.0 {
                    row.iter_mut().for_each(|x| *x /= v.norm);
                }
                row
            })
            .collect()
    }
}

/// Cosine similarity; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    if a.is_zero() || b.is_zero() {
        return 0.0;
    }
    let (fewer, more) = if a.weights.len() <= b.weights.len() {
        (a, b)
    } else {
        (b, a)
    };
    let dot: f32 = fewer
        .weights
        .iter()
        .filter_map(|(idx, wa)| more.weights.get(idx).map(|wb| wa * wb))
        .sum();
    (dot / (a.norm * b.norm)).clamp(0.0, 1.0)
}
