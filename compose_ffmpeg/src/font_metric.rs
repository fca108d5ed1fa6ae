//! External font-metric tool wrapper. `compose_engine::FontMetric` needs a
//! real implementation to turn `(text, point_size)` into a pixel width when
//! wrapping XHTML shape text (spec §4.2a); this shells out the same way the
//! teacher's silence-detection pass shells out to `ffmpeg`, parsing the
//! child process's stderr with a regex instead of hand-rolling a font
//! rasterizer.

use compose_engine::{FontMetric, FontMetricError};
use regex::Regex;
use std::process::Command;
use std::sync::OnceLock;
use tracing::instrument;

fn width_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"width:\s*(?<width>[0-9]+(?:\.[0-9]+)?)").expect("static pattern"))
}

/// Shells out to `magick`'s text-annotation debug trace to measure the
/// rendered pixel width of one line of text at a given point size.
pub struct ExternalFontMetric {
    font_family: String,
}

impl ExternalFontMetric {
    #[must_use]
    pub fn new(font_family: impl Into<String>) -> Self {
        Self { font_family: font_family.into() }
    }
}

impl FontMetric for ExternalFontMetric {
    #[instrument(skip(self, text))]
    fn measure(&self, text: &str, point_size: f64) -> Result<f64, FontMetricError> {
        if text.is_empty() {
            return Ok(0.0);
        }

        let output = Command::new("magick")
            .arg("-debug")
            .arg("annotate")
            .arg("-font")
            .arg(&self.font_family)
            .arg("-pointsize")
            .arg(point_size.to_string())
            .arg("-size")
            .arg("0x0")
            .arg("label:")
            .arg(text)
            .arg("null:")
            .output()
            .map_err(FontMetricError::Spawn)?;

        if !output.status.success() {
            return Err(FontMetricError::NonZeroExit);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let captures = width_pattern()
            .captures(&stderr)
            .ok_or_else(|| FontMetricError::UnparseableOutput(stderr.to_string()))?;
        captures["width"]
            .parse()
            .map_err(|_| FontMetricError::UnparseableOutput(stderr.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_pattern_extracts_decimal_width() {
        let captures = width_pattern().captures("Metrics: text width: 123.5 height: 20").unwrap();
        assert_eq!(&captures["width"], "123.5");
    }

    #[test]
    fn width_pattern_rejects_lines_without_width() {
        assert!(width_pattern().captures("no measurements here").is_none());
    }
}
