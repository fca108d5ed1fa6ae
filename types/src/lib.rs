//! Shared data model for the meeting recording composer.
//!
//! These types cross the boundaries between the ingest, layout, and
//! encoding crates, so they carry no behavior beyond small geometry/time
//! helpers and stay plain-data and `Serialize`/`Deserialize` where a
//! document format needs it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Seconds from the start of the recording. Always finite and non-negative
/// in valid documents; ingest is responsible for rejecting anything else.
pub type Time = f64;

/// The active logical window over the whiteboard canvas, `x y w h` in the
/// whiteboard's own coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl ViewBox {
    #[must_use]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Parses the `"x y w h"` text content of a `<viewBox>` element.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let w = parts.next()?.parse().ok()?;
        let h = parts.next()?.parse().ok()?;
        Some(Self { x, y, w, h })
    }
}

impl std::fmt::Display for ViewBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} {}", self.x, self.y, self.w, self.h)
    }
}

/// A viewport change: the `viewBox` at `t` becomes active at `t` and stays
/// active until the next event's `t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanzoomEvent {
    pub t: Time,
    pub view_box: ViewBox,
}

/// A whiteboard vector annotation with the interval during which it is
/// visible. `begin <= end` is an invariant enforced at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeAnnotation {
    pub begin: Time,
    pub end: Time,
    pub value: String,
    pub id: String,
}

impl ShapeAnnotation {
    /// # Panics
    /// If `begin > end`; ingest is expected to clamp before constructing.
    #[must_use]
    pub fn new(begin: Time, end: Time, value: String, id: String) -> Self {
        assert!(begin <= end, "shape annotation with begin > end: {id}");
        Self { begin, end, value, id }
    }
}

/// A slide or poll image visible for a contiguous span of time.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSegment {
    pub href: String,
    pub begin: Time,
    pub end: Time,
    pub width: f64,
    pub height: f64,
}

impl SlideSegment {
    #[must_use]
    pub fn is_deskshare(&self) -> bool {
        self.href.contains("deskshare")
    }
}

/// A normalized cursor position in `[0, 1]` relative to the active
/// viewBox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorSample {
    pub t: Time,
    pub nx: f64,
    pub ny: f64,
}

/// A single chat message, already sanitized to plain NFC text.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub t: Time,
    pub name: String,
    pub text: String,
}

/// Compile-time-constant layout in the source; threaded as data here per
/// the "explicit config record" design note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConstants {
    pub output_width: u32,
    pub output_height: u32,

    pub slides_x: u32,
    pub slides_y: u32,
    pub slides_width: u32,
    pub slides_height: u32,

    pub webcams_x: u32,
    pub webcams_y: u32,
    pub webcams_width: u32,
    pub webcams_height: u32,

    pub chat_width: u32,
    pub chat_canvas_height: u32,
    pub chat_font_size: u32,
    pub chat_starting_offset: u32,
    pub chat_outer_x: u32,
    pub chat_outer_y: u32,

    pub cursor_radius: u32,
    pub border_radius: u32,
    pub component_margin: u32,
}

impl LayoutConstants {
    /// `CHAT_FONT_SIZE_X = floor(0.6 * CHAT_FONT_SIZE)`, the 3:5 monospace
    /// aspect assumption used to turn a pixel width into a character
    /// budget for chat word-wrap.
    #[must_use]
    pub fn chat_font_size_x(&self) -> u32 {
        (0.6 * f64::from(self.chat_font_size)) as u32
    }

    /// `floor(CHAT_WIDTH / CHAT_FONT_SIZE_X) - 1`
    #[must_use]
    pub fn chat_max_line_chars(&self) -> usize {
        (self.chat_width / self.chat_font_size_x()) as usize - 1
    }
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            output_width: 1920,
            output_height: 1080,

            slides_x: 0,
            slides_y: 0,
            slides_width: 1520,
            slides_height: 1080,

            webcams_x: 1520,
            webcams_y: 0,
            webcams_width: 400,
            webcams_height: 600,

            chat_width: 400,
            chat_canvas_height: 3600,
            chat_font_size: 15,
            chat_starting_offset: 10,
            chat_outer_x: 1520,
            chat_outer_y: 600,

            cursor_radius: 6,
            border_radius: 8,
            component_margin: 4,
        }
    }
}

/// Feature flags controlling optional branches of the pipeline. These are
/// compile-time constants in the source system; here they are config so
/// tests can flip them without rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub svgz_compression: bool,
    pub ffmpeg_reference_support: bool,
    pub caption_support: bool,
    pub remove_redundant_shapes: bool,
    pub hide_deskshare: bool,
    pub hide_chat: bool,
    pub hide_chat_names: bool,
    pub benchmark_ffmpeg: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            svgz_compression: true,
            ffmpeg_reference_support: false,
            caption_support: true,
            remove_redundant_shapes: false,
            hide_deskshare: false,
            hide_chat: false,
            hide_chat_names: false,
            benchmark_ffmpeg: false,
        }
    }
}

/// The immutable configuration record threaded through every pipeline
/// stage in place of the source's module-level constants.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub meeting_id: String,
    pub published_root: PathBuf,
    pub scratch_root: PathBuf,
    pub video_root: PathBuf,
    pub output_path: PathBuf,

    pub flags: FeatureFlags,
    pub layout: LayoutConstants,

    pub constant_rate_factor: u8,
    pub cpu_threads: usize,
}

/// One entry of `captions.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub locale: String,
    pub locale_name: String,
}

/// The subset of `metadata.xml` the pipeline reads and, on success,
/// rewrites.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingMetadata {
    pub duration_ms: f64,
    pub meeting_name: String,
    pub format: Option<String>,
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_box_parses_and_displays() {
        let vb = ViewBox::parse("0 0 1600 900").unwrap();
        assert_eq!(vb, ViewBox::new(0.0, 0.0, 1600.0, 900.0));
        assert_eq!(vb.to_string(), "0 0 1600 900");
    }

    #[test]
    fn view_box_rejects_malformed_text() {
        assert!(ViewBox::parse("0 0 1600").is_none());
        assert!(ViewBox::parse("not a viewbox").is_none());
    }

    #[test]
    fn chat_font_size_x_uses_three_fifths_ratio() {
        let layout = LayoutConstants::default();
        assert_eq!(layout.chat_font_size_x(), 9);
    }

    #[test]
    #[should_panic(expected = "begin > end")]
    fn shape_annotation_rejects_inverted_interval() {
        ShapeAnnotation::new(5.0, 1.0, "<g/>".into(), "shape-1".into());
    }
}
