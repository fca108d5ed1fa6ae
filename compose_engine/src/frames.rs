//! Whiteboard frame emitter (spec §4.7): renders one SVG per breakpoint
//! interval and the concat playlist that stitches them into a video track.

use crate::breakpoints::BreakpointSet;
use crate::interval_tree::IntervalTree;
use flate2::write::GzEncoder;
use flate2::Compression;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::Write as _;
use types::{LayoutConstants, PanzoomEvent, ShapeAnnotation, SlideSegment, Time, ViewBox};

pub struct Frame {
    pub index: usize,
    pub svg: String,
    pub duration: Time,
    pub svgz: bool,
}

impl Frame {
    #[must_use]
    pub fn extension(&self) -> &'static str {
        if self.svgz {
            "svgz"
        } else {
            "svg"
        }
    }

    /// Gzips `svg` when `svgz` is set; this is the `.svgz` scratch content.
    #[must_use]
    pub fn encoded(&self) -> Vec<u8> {
        if !self.svgz {
            return self.svg.as_bytes().to_vec();
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(self.svg.as_bytes()).ok();
        encoder.finish().unwrap_or_default()
    }
}

/// Expands `active` so its aspect ratio matches `slides_w / slides_h`,
/// growing whichever axis is short and keeping `active` centered — this is
/// `OUTER`, computed once per frame instead of leaning on the renderer's
/// own `preserveAspectRatio` handling.
fn compute_outer(active: ViewBox, slides_w: f64, slides_h: f64) -> ViewBox {
    let target_aspect = slides_w / slides_h;
    let active_aspect = active.w / active.h;

    if (active_aspect - target_aspect).abs() < 1e-9 {
        return active;
    }
    if active_aspect > target_aspect {
        let new_h = active.w / target_aspect;
        let dy = (new_h - active.h) / 2.0;
        ViewBox::new(active.x, active.y - dy, active.w, new_h)
    } else {
        let new_w = active.h * target_aspect;
        let dx = (new_w - active.w) / 2.0;
        ViewBox::new(active.x - dx, active.y, new_w, active.h)
    }
}

/// Drops any shape whose `id` equals the next shape's `id` in z-order,
/// keeping the later one (it supersedes the earlier redraw).
fn dedup_adjacent<'a>(shapes: Vec<&'a ShapeAnnotation>) -> Vec<&'a ShapeAnnotation> {
    let mut out = Vec::with_capacity(shapes.len());
    for i in 0..shapes.len() {
        if i + 1 < shapes.len() && shapes[i].id == shapes[i + 1].id {
            continue;
        }
        out.push(shapes[i]);
    }
    out
}

/// Renders one frame per adjacent breakpoint pair, tracking the active
/// slide and viewBox as rolling pointers across the (time-sorted) inputs.
#[must_use]
pub fn emit_frames(
    breakpoints: &BreakpointSet,
    slides: &[SlideSegment],
    panzooms: &[PanzoomEvent],
    shape_tree: &IntervalTree<ShapeAnnotation>,
    layout: &LayoutConstants,
    remove_redundant_shapes: bool,
    svgz: bool,
) -> Vec<Frame> {
    let slides_w = f64::from(layout.slides_width);
    let slides_h = f64::from(layout.slides_height);

    let mut panzoom_idx = 0usize;
    let mut slide_idx = 0usize;
    let mut frames = Vec::new();

    for (n, (t_a, t_b)) in breakpoints.intervals().enumerate() {
        while panzoom_idx + 1 < panzooms.len() && panzooms[panzoom_idx + 1].t <= t_a {
            panzoom_idx += 1;
        }
        let active_view = panzooms
            .get(panzoom_idx)
            .map_or_else(|| ViewBox::new(0.0, 0.0, slides_w, slides_h), |p| p.view_box);

        while slide_idx + 1 < slides.len() && t_a >= slides[slide_idx + 1].begin {
            slide_idx += 1;
        }
        let slide = slides.get(slide_idx);

        let visible = shape_tree.query(t_a);
        let visible = if remove_redundant_shapes { dedup_adjacent(visible) } else { visible };

        let outer = compute_outer(active_view, slides_w, slides_h);

        let mut svg = String::new();
        write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"{}\">",
            layout.slides_width, layout.slides_height, outer
        )
        .ok();
        write!(svg, "<svg viewBox=\"{active_view}\">").ok();
        if let Some(slide) = slide {
            write!(
                svg,
                "<image xlink:href=\"{}\" width=\"{}\" height=\"{}\"/>",
                escape(&slide.href),
                slide.width,
                slide.height
            )
            .ok();
        }
        for shape in &visible {
            svg.push_str(&shape.value);
        }
        svg.push_str("</svg></svg>");

        frames.push(Frame { index: n, svg, duration: t_b - t_a, svgz });
    }

    frames
}

/// Builds the ffmpeg concat-demuxer playlist: one `file`/`duration` pair
/// per frame, with the final `file` line repeated bare per convention.
#[must_use]
pub fn build_concat_playlist(frames: &[Frame]) -> String {
    let mut out = String::new();
    for frame in frames {
        writeln!(out, "file ../frames/frame{}.{}", frame.index, frame.extension()).ok();
        writeln!(out, "duration {:.1}", frame.duration).ok();
    }
    if let Some(last) = frames.last() {
        writeln!(out, "file ../frames/frame{}.{}", last.index, last.extension()).ok();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::merge;
    use pretty_assertions::assert_eq;

    fn layout() -> LayoutConstants {
        LayoutConstants::default()
    }

    #[test]
    fn outer_expands_short_axis_to_match_slide_aspect() {
        // Slide box 1520x1080 (aspect ~1.407); active is 1600x900 (aspect ~1.778, wider).
        let outer = compute_outer(ViewBox::new(0.0, 0.0, 1600.0, 900.0), 1520.0, 1080.0);
        assert!((outer.w - 1600.0).abs() < 1e-6);
        assert!(outer.h > 900.0);
        assert!((outer.w / outer.h - 1520.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn dedup_adjacent_keeps_the_later_redraw() {
        let shapes = vec![
            ShapeAnnotation::new(0.0, 10.0, "<g/>".into(), "x".into()),
            ShapeAnnotation::new(0.0, 10.0, "<g/>".into(), "x".into()),
            ShapeAnnotation::new(0.0, 10.0, "<g/>".into(), "y".into()),
        ];
        let refs: Vec<&ShapeAnnotation> = shapes.iter().collect();
        let deduped = dedup_adjacent(refs);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, "x");
        assert_eq!(deduped[1].id, "y");
    }

    #[test]
    fn emits_one_frame_per_breakpoint_interval_with_playlist() {
        let breakpoints = merge(&[], &[], &[], 10.0);
        let slides = vec![SlideSegment {
            href: "slide1.png".into(),
            begin: 0.0,
            end: 10.0,
            width: 1600.0,
            height: 900.0,
        }];
        let panzooms = vec![PanzoomEvent { t: 0.0, view_box: ViewBox::new(0.0, 0.0, 1600.0, 900.0) }];
        let tree = IntervalTree::build(Vec::new());
        let frames = emit_frames(&breakpoints, &slides, &panzooms, &tree, &layout(), false, false);
        assert_eq!(frames.len(), breakpoints.intervals().count());
        let playlist = build_concat_playlist(&frames);
        assert!(playlist.starts_with("file ../frames/frame0.svg\n"));
        assert!(playlist.trim_end().ends_with(&format!("frame{}.svg", frames.len() - 1)));
    }
}
