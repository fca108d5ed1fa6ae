//! Word-wrap against an external font-metric oracle (spec §4.2a).
//!
//! `measure` is delegated to whatever tool the caller wires up (the
//! production path shells out to an image-rendering tool's font-metric
//! query; tests use a deterministic stand-in). `pack` only knows the
//! oracle's contract: a string and a point size in, a pixel width out.

use crate::error::FontMetricError;

/// The font-metric oracle contract: a string and a point size in, a pixel
/// width out. Implemented by the real external-tool wrapper in
/// `compose_ffmpeg` and by fakes in tests.
pub trait FontMetric {
    fn measure(&self, text: &str, point_size: f64) -> Result<f64, FontMetricError>;
}

/// Greedily packs `s` (split on `separator`) into lines no wider than
/// `max_width` at `point_size`. A token that alone exceeds `max_width` is
/// recursively packed character-by-character (`separator = ""`), and the
/// last character-level fragment is requeued as the start of the next line
/// so a following word may still join it.
pub fn pack(
    s: &str,
    separator: &str,
    point_size: f64,
    max_width: f64,
    font: &dyn FontMetric,
) -> Result<Vec<String>, FontMetricError> {
    let tokens: Vec<String> = if separator.is_empty() {
        s.chars().map(|c| c.to_string()).collect()
    } else {
        s.split(separator).map(String::from).collect()
    };
    pack_tokens(&tokens, separator, point_size, max_width, font)
}

fn pack_tokens(
    tokens: &[String],
    separator: &str,
    point_size: f64,
    max_width: f64,
    font: &dyn FontMetric,
) -> Result<Vec<String>, FontMetricError> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for token in tokens {
        let candidate = if current.is_empty() {
            token.clone()
        } else {
            format!("{current}{separator}{token}")
        };

        if font.measure(&candidate, point_size)? <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if font.measure(token, point_size)? <= max_width {
            current = token.clone();
            continue;
        }

        // This single token overflows on its own: fall back to
        // char-level packing and requeue the trailing fragment.
        let char_lines = pack(token, "", point_size, max_width, font)?;
        let n = char_lines.len();
        for (i, line) in char_lines.into_iter().enumerate() {
            if i + 1 == n {
                current = line;
            } else {
                lines.push(line);
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    Ok(lines)
}

#[cfg(test)]
pub(crate) struct FixedWidthFont {
    pub width_per_char: f64,
}

#[cfg(test)]
impl FontMetric for FixedWidthFont {
    fn measure(&self, text: &str, _point_size: f64) -> Result<f64, FontMetricError> {
        Ok(text.chars().count() as f64 * self.width_per_char)
    }
}
