//! Character n-gram Jaccard similarity over packed integer grams.

/// Gram length used for names and effect labels.
pub const TRIGRAM: usize = 3;

/// Sorted, deduplicated packed n-grams of `text`.
///
/// Case-folded and whitespace-stripped; each gram's bytes are packed
/// big-endian into a `u32`, so `n` must not exceed 4.
pub fn packed_ngrams(text: &str, n: usize) -> Vec<u32> {
    debug_assert!((1..=4).contains(&n));
    let folded: Vec<u8> = text
        .to_lowercase()
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if folded.len() < n {
        return Vec::new();
    }
    let mut grams: Vec<u32> = folded
        .windows(n)
        .map(|w| w.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
        .collect();
    grams.sort_unstable();
    grams.dedup();
    grams
}

/// Jaccard index of two sorted, deduplicated gram sets.
pub fn jaccard_sorted(a: &[u32], b: &[u32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - shared;
    if union == 0 {
        0.0
    } else {
        shared as f32 / union as f32
    }
}

/// Character n-gram Jaccard similarity; 0 when either string is shorter than `n`.
pub fn ngram_similarity(a: &str, b: &str, n: usize) -> f32 {
    jaccard_sorted(&packed_ngrams(a, n), &packed_ngrams(b, n))
}

/// Best trigram similarity over all pairs of pre-packed effect labels.
pub fn best_pair_similarity(a: &[Vec<u32>], b: &[Vec<u32>]) -> f32 {
    a.iter()
        .flat_map(|ga| b.iter().map(move |gb| jaccard_sorted(ga, gb)))
        .fold(0.0f32, f32::max)
}
