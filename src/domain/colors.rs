//! Partition base colors and per-theme color derivation in HLS space.

use std::collections::BTreeMap;

use crate::domain::error::DomainError;

/// Color for partitions without a configured base color.
pub const DEFAULT_PARTITION_COLOR: &str = "#94a3b8";
/// Color of the catch-all `other` branch.
pub const OTHER_THEME_COLOR: &str = "#6b7280";

const FALLBACK_RGB: Rgb = Rgb(0.6, 0.6, 0.6);

/// Base colors of the five base-game schools.
pub fn default_partition_colors() -> BTreeMap<String, String> {
    [
        ("Destruction", "#ef4444"),
        ("Conjuration", "#a855f7"),
        ("Alteration", "#22c55e"),
        ("Illusion", "#3b82f6"),
        ("Restoration", "#eab308"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rgb(f32, f32, f32);

/// Parse `#rrggbb` (leading `#` optional).
fn parse_hex(color: &str) -> Result<Rgb, DomainError> {
    let digits = color.strip_prefix('#').unwrap_or(color);
    let bytes = Some(digits)
        .filter(|d| d.len() == 6)
        .and_then(|d| hex::decode(d).ok())
        .ok_or_else(|| DomainError::InvalidColor(color.to_string()))?;
    Ok(Rgb(
        bytes[0] as f32 / 255.0,
        bytes[1] as f32 / 255.0,
        bytes[2] as f32 / 255.0,
    ))
}

/// Validate a configured color.
pub fn validate_hex(color: &str) -> Result<(), DomainError> {
    parse_hex(color).map(|_| ())
}

fn to_hex(Rgb(r, g, b): Rgb) -> String {
    // Channels truncate, they are not rounded
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0) as u8;
    format!("#{}", hex::encode([channel(r), channel(g), channel(b)]))
}

/// (hue, lightness, saturation), all in [0,1].
fn rgb_to_hls(Rgb(r, g, b): Rgb) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, l, 0.0);
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, l, s)
}

fn hue_to_channel(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn hls_to_rgb(h: f32, l: f32, s: f32) -> Rgb {
    if s == 0.0 {
        return Rgb(l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Rgb(
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    )
}

/// One color per theme, rotating the base hue evenly over the sorted theme
/// names. Saturation scales from 0.85 to 1.15 of the base and lightness is
/// clamped to [0.25, 0.75]. An unparsable base color falls back to grey.
pub fn derive_theme_colors(base: &str, themes: &[String]) -> BTreeMap<String, String> {
    let mut colors = BTreeMap::new();
    if themes.is_empty() {
        return colors;
    }
    let rgb = parse_hex(base).unwrap_or_else(|e| {
        tracing::warn!("{}, using grey", e);
        FALLBACK_RGB
    });
    let (h, l, s) = rgb_to_hls(rgb);

    let mut sorted: Vec<&String> = themes.iter().collect();
    sorted.sort();
    sorted.dedup();
    let count = sorted.len();

    for (i, theme) in sorted.into_iter().enumerate() {
        let hue = if count == 1 {
            h
        } else {
            (h + i as f32 / count as f32) % 1.0
        };
        let spread = i as f32 / (count.saturating_sub(1).max(1)) as f32;
        let sat = (s * (0.85 + 0.3 * spread)).clamp(0.2, 1.0);
        let lit = l.clamp(0.25, 0.75);
        colors.insert(theme.clone(), to_hex(hls_to_rgb(hue, lit, sat)));
    }
    colors
}
