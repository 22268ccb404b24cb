//! Fuzzy string scores on a 0-100 scale.

use std::collections::BTreeSet;

use similar::TextDiff;

/// Normalized sequence similarity of two strings, 0..=100.
pub fn ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    raw_ratio(a, b).round() as u32
}

fn raw_ratio(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio() * 100.0
}

/// Best [`ratio`] of the shorter string against every equally long window
/// of the longer one. Inputs are lowercased.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if long.contains(short.as_str()) {
        return 100;
    }

    let long_chars: Vec<char> = long.chars().collect();
    let width = short.chars().count();
    let mut best = 0.0f32;
    for start in 0..=(long_chars.len() - width) {
        let window: String = long_chars[start..start + width].iter().collect();
        best = best.max(raw_ratio(&short, &window));
        if best >= 100.0 {
            break;
        }
    }
    best.round() as u32
}

/// Token-set comparison: insensitive to word order and repeated words.
pub fn token_set_ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let join = |set: Vec<&str>| set.join(" ");
    let sect = join(tokens_a.intersection(&tokens_b).copied().collect());
    let only_a = join(tokens_a.difference(&tokens_b).copied().collect());
    let only_b = join(tokens_b.difference(&tokens_a).copied().collect());

    if !sect.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100;
    }

    let combine = |rest: &str| {
        if sect.is_empty() {
            rest.to_string()
        } else {
            format!("{} {}", sect, rest)
        }
    };
    let combined_a = combine(&only_a);
    let combined_b = combine(&only_b);

    let mut best = raw_ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best
            .max(raw_ratio(&sect, &combined_a))
            .max(raw_ratio(&sect, &combined_b));
    }
    best.round() as u32
}
