//! Unions slide in/out, shape visibility, and panzoom timestamps into the
//! minimal sorted set of re-render breakpoints a whiteboard frame must be
//! emitted at.

use types::{PanzoomEvent, ShapeAnnotation, SlideSegment, Time};

/// A strictly increasing, duration-clamped set of moments at which the
/// whiteboard must be re-rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointSet(Vec<Time>);

impl BreakpointSet {
    #[must_use]
    pub fn as_slice(&self) -> &[Time] {
        &self.0
    }

    /// Adjacent pairs `(t_a, t_b)`, the intervals the frame emitter walks.
    pub fn intervals(&self) -> impl Iterator<Item = (Time, Time)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Merges every `begin`/`end`/panzoom-`t` plus `duration` itself into one
/// sorted, deduplicated, `<= duration`-clamped breakpoint set.
#[must_use]
pub fn merge(
    slides: &[SlideSegment],
    shapes: &[ShapeAnnotation],
    panzooms: &[PanzoomEvent],
    duration: Time,
) -> BreakpointSet {
    let mut points = Vec::with_capacity(
        slides.len() * 2 + shapes.len() * 2 + panzooms.len() + 1,
    );

    for slide in slides {
        points.push(slide.begin);
        points.push(slide.end);
    }
    for shape in shapes {
        points.push(shape.begin);
        points.push(shape.end);
    }
    for pz in panzooms {
        points.push(pz.t);
    }
    points.push(duration);

    points.retain(|&t| t <= duration && t.is_finite());
    points.sort_unstable_by(Time::total_cmp);
    points.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);

    BreakpointSet(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(begin: Time, end: Time) -> SlideSegment {
        SlideSegment {
            href: "data:image/png;base64,".to_string(),
            begin,
            end,
            width: 1600.0,
            height: 900.0,
        }
    }

    fn shape(begin: Time, end: Time, id: &str) -> ShapeAnnotation {
        ShapeAnnotation::new(begin, end, "<g/>".to_string(), id.to_string())
    }

    #[test]
    fn single_slide_no_shapes() {
        let bps = merge(&[slide(0.0, 10.0)], &[], &[], 10.0);
        assert_eq!(bps.as_slice(), &[0.0, 10.0]);
    }

    #[test]
    fn two_shapes_on_one_slide() {
        let bps = merge(
            &[slide(0.0, 10.0)],
            &[shape(1.0, 5.0, "a"), shape(3.0, 8.0, "b")],
            &[],
            10.0,
        );
        assert_eq!(bps.as_slice(), &[0.0, 1.0, 3.0, 5.0, 8.0, 10.0]);
    }

    #[test]
    fn panzoom_adds_breakpoint() {
        let bps = merge(
            &[slide(0.0, 10.0)],
            &[],
            &[types::PanzoomEvent {
                t: 4.0,
                view_box: types::ViewBox::new(0.0, 0.0, 800.0, 600.0),
            }],
            10.0,
        );
        assert_eq!(bps.as_slice(), &[0.0, 4.0, 10.0]);
    }

    #[test]
    fn breakpoints_beyond_duration_are_dropped() {
        let bps = merge(
            &[slide(0.0, 10.0)],
            &[shape(1.0, 20.0, "a")],
            &[],
            10.0,
        );
        assert_eq!(bps.as_slice(), &[0.0, 1.0, 10.0]);
    }

    #[test]
    fn is_strictly_increasing() {
        let bps = merge(
            &[slide(0.0, 10.0)],
            &[shape(5.0, 5.0, "a"), shape(5.0, 7.0, "b")],
            &[],
            10.0,
        );
        let points = bps.as_slice();
        for w in points.windows(2) {
            assert!(w[0] < w[1]);
        }
    }
}
