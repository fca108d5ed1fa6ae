//! Cursor ingest and projection (spec §4.5).
//!
//! `ingest_cursor_samples` streams `cursor.xml`; `project_cursor` walks the
//! sorted panzoom and cursor streams in lockstep to turn normalized
//! `(nx, ny)` samples into composite pixel coordinates and the
//! `sendcmd`-ready overlay-command text.

use crate::error::IngestError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fmt::Write as _;
use types::{CursorSample, LayoutConstants, PanzoomEvent, Time};

/// Streams `cursor.xml`, pairing each `<cursor>` sample with its nearest
/// enclosing `<event timestamp="...">`.
pub fn ingest_cursor_samples(xml: &str) -> Result<Vec<CursorSample>, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut samples = Vec::new();
    let mut event_stack: Vec<f64> = Vec::new();
    let mut in_cursor = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"event" => {
                let t = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == b"timestamp")
                    .and_then(|a| a.unescape_value().ok())
                    .and_then(|v| v.parse().ok());
                event_stack.push(t.unwrap_or(0.0));
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"event" => {
                event_stack.pop();
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"cursor" => {
                in_cursor = true;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cursor" => {
                in_cursor = false;
            }
            Ok(Event::Text(t)) if in_cursor => {
                let text = t.unescape().map_err(|e| IngestError::Malformed {
                    document: "cursor.xml",
                    reason: e.to_string(),
                })?;
                let Some(&t) = event_stack.last() else {
                    return Err(IngestError::Malformed {
                        document: "cursor.xml",
                        reason: "cursor sample outside of an event".to_string(),
                    });
                };
                let mut parts = text.split_whitespace();
                let nx: f64 = parts
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| IngestError::Malformed {
                        document: "cursor.xml",
                        reason: format!("unparseable cursor sample: {text}"),
                    })?;
                let ny: f64 = parts
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| IngestError::Malformed {
                        document: "cursor.xml",
                        reason: format!("unparseable cursor sample: {text}"),
                    })?;
                samples.push(CursorSample { t, nx, ny });
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IngestError::Malformed {
                    document: "cursor.xml",
                    reason: e.to_string(),
                })
            }
        }
    }

    samples.sort_by(|a, b| a.t.total_cmp(&b.t));
    Ok(samples)
}

/// Walks `panzooms` (must already be time-sorted) and `cursors` in
/// lockstep, emitting one `sendcmd` line per cursor sample.
#[must_use]
pub fn project_cursor(
    panzooms: &[PanzoomEvent],
    cursors: &[CursorSample],
    layout: &LayoutConstants,
) -> String {
    let mut out = String::new();
    let mut panzoom_idx = 0usize;

    for sample in cursors {
        while panzoom_idx + 1 < panzooms.len() && panzooms[panzoom_idx + 1].t <= sample.t {
            panzoom_idx += 1;
        }
        let view_box = panzooms.get(panzoom_idx).map_or_else(
            || types::ViewBox::new(0.0, 0.0, f64::from(layout.slides_width), f64::from(layout.slides_height)),
            |p| p.view_box,
        );

        let (cx, cy) = project_point(sample.nx, sample.ny, view_box, layout);
        writeln!(
            out,
            "{:.3} overlay@m x {:.3}, overlay@m y {:.3};",
            round3(sample.t),
            cx,
            cy
        )
        .ok();
    }
    out
}

fn project_point(nx: f64, ny: f64, view_box: types::ViewBox, layout: &LayoutConstants) -> (Time, Time) {
    let (w, h) = (view_box.w, view_box.h);
    let (cx, cy) = (nx * w, ny * h);

    let slides_w = f64::from(layout.slides_width);
    let slides_h = f64::from(layout.slides_height);
    let scale = (slides_w / w).min(slides_h / h);
    let offset_x = (slides_w - scale * w) / 2.0;
    let offset_y = (slides_h - scale * h) / 2.0;

    let px = cx * scale + offset_x - f64::from(layout.cursor_radius) + f64::from(layout.webcams_width);
    let py = cy * scale + offset_y - f64::from(layout.cursor_radius);
    (round3(px), round3(py))
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// The cursor sprite: a red circle of radius `CURSOR_RADIUS` on a
/// `2 * CURSOR_RADIUS` square canvas.
#[must_use]
pub fn cursor_sprite_svg(layout: &LayoutConstants) -> String {
    let r = layout.cursor_radius;
    let d = 2 * r;
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{d}\" height=\"{d}\">\
<circle cx=\"{r}\" cy=\"{r}\" r=\"{r}\" fill=\"red\"/></svg>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ingests_cursor_samples_paired_with_enclosing_event() {
        let xml = r#"<recording>
            <event timestamp="0"><cursor>0.5 0.5</cursor></event>
            <event timestamp="4"><cursor>0.0 1.0</cursor></event>
        </recording>"#;
        let samples = ingest_cursor_samples(xml).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], CursorSample { t: 0.0, nx: 0.5, ny: 0.5 });
        assert_eq!(samples[1], CursorSample { t: 4.0, nx: 0.0, ny: 1.0 });
    }

    #[test]
    fn project_cursor_centers_in_letterboxed_slide_box() {
        let layout = LayoutConstants::default();
        let panzooms = vec![PanzoomEvent {
            t: 0.0,
            view_box: types::ViewBox::new(0.0, 0.0, 1600.0, 900.0),
        }];
        // Slide box is 1520x1080; scale = min(1520/1600, 1080/900) = 0.95.
        let cursors = vec![CursorSample { t: 1.0, nx: 0.5, ny: 0.5 }];
        let out = project_cursor(&panzooms, &cursors, &layout);
        assert!(out.starts_with("1.000 overlay@m x "));
        assert!(out.trim_end().ends_with(';'));
    }

    #[test]
    fn project_cursor_advances_panzoom_pointer_over_time() {
        let layout = LayoutConstants::default();
        let panzooms = vec![
            PanzoomEvent { t: 0.0, view_box: types::ViewBox::new(0.0, 0.0, 1600.0, 900.0) },
            PanzoomEvent { t: 4.0, view_box: types::ViewBox::new(0.0, 0.0, 800.0, 450.0) },
        ];
        let cursors = vec![
            CursorSample { t: 1.0, nx: 0.0, ny: 0.0 },
            CursorSample { t: 5.0, nx: 0.0, ny: 0.0 },
        ];
        let out = project_cursor(&panzooms, &cursors, &layout);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1.000"));
        assert!(lines[1].starts_with("5.000"));
    }

    #[test]
    fn sprite_is_centered_circle_on_square_canvas() {
        let layout = LayoutConstants::default();
        let svg = cursor_sprite_svg(&layout);
        assert!(svg.contains("width=\"12\""));
        assert!(svg.contains("cx=\"6\" cy=\"6\" r=\"6\""));
    }
}
