//! Shape ingest (spec §4.2/§4.2a) and the co-located whiteboard timeline
//! ingest (spec §4.4).
//!
//! Both passes share one in-memory tree built once from `shapes.svg`: the
//! normalization pass (§4.2) rewrites it in place — stripping forced
//! visibility, inlining poll images, converting XHTML text annotations to
//! measured SVG `<text>` — and the timeline pass (§4.4) then walks the
//! *same* tree to read off slide/shape timing, because it needs each
//! shape's already-normalized inner fragment for `ShapeAnnotation::value`.
//! `panzoom.rs`, `cursor.rs`, and `chat.rs` are the genuinely streaming
//! readers the design notes call for; this one format needs the rewrite
//! first.

use crate::error::IngestError;
use crate::text_wrap::{pack, FontMetric};
use crate::xmltree::{self, Element, Node};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::escape::{escape, partial_escape};
use std::fmt::Write as _;
use types::{ShapeAnnotation, SlideSegment, Time};

/// Resolves a relative image reference to bytes. The filesystem-backed
/// implementation lives at the job-orchestration boundary; tests supply an
/// in-memory fake.
pub trait ImageSource {
    fn load(&self, href: &str) -> Result<Vec<u8>, IngestError>;
}

fn mime_for(href: &str) -> &'static str {
    let ext = href.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Rewrites a local image reference to either a `file://` path or a
/// base64 `data:` URI, per the `FFMPEG_REFERENCE_SUPPORT` policy flag.
pub fn resolve_image_ref(
    href: &str,
    reference_support: bool,
    images: &dyn ImageSource,
) -> Result<String, IngestError> {
    if reference_support {
        Ok(format!("file://{href}"))
    } else {
        let bytes = images.load(href)?;
        Ok(format!("data:{};base64,{}", mime_for(href), STANDARD.encode(bytes)))
    }
}

/// Runs the §4.2 normalization pass over `shapes.svg`, returning the
/// rewritten document text (the `shapes_modified.svg` scratch artifact).
pub fn normalize_document(
    svg_xml: &str,
    reference_support: bool,
    images: &dyn ImageSource,
    font: &dyn FontMetric,
) -> Result<String, IngestError> {
    let mut root = xmltree::parse(svg_xml)?;
    strip_hidden_visibility(&mut root);

    let mut first_err = None;
    root.visit_descendants_mut("g", &mut |g: &mut Element| {
        if first_err.is_some() {
            return;
        }
        if let Err(e) = normalize_group(g, reference_support, images, font) {
            first_err = Some(e);
        }
    });
    if let Some(e) = first_err {
        return Err(e);
    }

    let mut out = String::new();
    root.write(&mut out);
    Ok(out)
}

fn strip_hidden_visibility(el: &mut Element) {
    if let Some(style) = el.attr("style") {
        if style.contains("visibility:hidden") {
            let cleaned = style
                .split(';')
                .filter(|chunk| !chunk.trim().starts_with("visibility:hidden"))
                .collect::<Vec<_>>()
                .join(";");
            el.set_attr("style", cleaned);
        }
    }
    for child in el.child_elements_mut() {
        strip_hidden_visibility(child);
    }
}

fn normalize_group(
    g: &mut Element,
    reference_support: bool,
    images: &dyn ImageSource,
    font: &dyn FontMetric,
) -> Result<(), IngestError> {
    let shape = g.attr("shape").unwrap_or("").to_string();
    if shape.contains("poll") {
        normalize_poll(g, reference_support, images)
    } else if shape.contains("text") {
        normalize_text(g, font)
    } else {
        Ok(())
    }
}

fn normalize_poll(
    g: &mut Element,
    reference_support: bool,
    images: &dyn ImageSource,
) -> Result<(), IngestError> {
    g.set_attr("xmlns:xlink", "http://www.w3.org/1999/xlink");
    if let Some(img) = g.child_elements_mut().next() {
        if let Some(href) = img.attr("href").map(str::to_string) {
            let resolved = resolve_image_ref(&href, reference_support, images)?;
            img.remove_attr("href");
            img.set_attr("xlink:href", resolved);
        }
    }
    Ok(())
}

enum Token {
    Text(String),
    Break,
}

enum TspanLine {
    Text(String),
    /// Consecutive `<br/>` markers render as a literal `<br/>` placeholder
    /// tspan rather than an empty one, matching the source's behavior.
    BreakPlaceholder,
}

fn flatten_xhtml(el: &Element, tokens: &mut Vec<Token>) {
    for child in &el.children {
        match child {
            Node::Text(t) => {
                let trimmed = t.trim();
                if !trimmed.is_empty() {
                    tokens.push(Token::Text(trimmed.to_string()));
                }
            }
            Node::Element(e) if e.name.eq_ignore_ascii_case("br") => {
                tokens.push(Token::Break);
            }
            Node::Element(e) => flatten_xhtml(e, tokens),
        }
    }
}

fn merge_text_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::new();
    for token in tokens {
        match (&token, merged.last_mut()) {
            (Token::Text(s), Some(Token::Text(prev))) => {
                prev.push(' ');
                prev.push_str(s);
            }
            _ => merged.push(token),
        }
    }
    merged
}

fn extract_style_number(style: &str, key: &str) -> Option<f64> {
    style.split(';').find_map(|decl| {
        let mut parts = decl.splitn(2, ':');
        let k = parts.next()?.trim();
        let v = parts.next()?.trim();
        k.eq_ignore_ascii_case(key)
            .then(|| v.trim_end_matches("px").parse().ok())
            .flatten()
    })
}

fn normalize_text(g: &mut Element, font: &dyn FontMetric) -> Result<(), IngestError> {
    let style = g.attr("style").unwrap_or("").to_string();
    let font_size = extract_style_number(&style, "font-size").unwrap_or(16.0);

    let Some(switch_idx) = g.children.iter().position(
        |c| matches!(c, Node::Element(e) if e.name == "switch"),
    ) else {
        return Ok(());
    };

    let (fo_x, fo_y, fo_width, tokens) = {
        let Node::Element(switch) = &g.children[switch_idx] else {
            unreachable!()
        };
        let Some(fo) = switch.find_child("foreignObject") else {
            return Ok(());
        };
        let fo_x = fo.attr("x").unwrap_or("0").to_string();
        let fo_y = fo.attr("y").unwrap_or("0").to_string();
        let fo_width: f64 =
            fo.attr("width").and_then(|w| w.parse().ok()).unwrap_or(200.0);
        let mut tokens = Vec::new();
        flatten_xhtml(fo, &mut tokens);
        (fo_x, fo_y, fo_width, merge_text_tokens(tokens))
    };

    let mut lines = Vec::new();
    let mut have_content = false;
    let mut prev_was_break = false;
    for token in tokens {
        match token {
            Token::Text(s) => {
                for wrapped in pack(&s, " ", font_size, fo_width, font)? {
                    lines.push(TspanLine::Text(wrapped));
                }
                have_content = true;
                prev_was_break = false;
            }
            Token::Break => {
                if !have_content {
                    // Leading break: the first text line is implicit.
                    continue;
                }
                lines.push(if prev_was_break {
                    TspanLine::BreakPlaceholder
                } else {
                    TspanLine::Text(String::new())
                });
                prev_was_break = true;
            }
        }
    }

    let mut text_el = Element::new("text");
    text_el.set_attr("x", fo_x.clone());
    text_el.set_attr("y", fo_y.clone());
    text_el.set_attr("xml:space", "preserve");
    text_el.set_attr("style", format!("{style};fill:currentcolor"));
    for line in lines {
        let mut tspan = Element::new("tspan");
        tspan.set_attr("x", fo_x.clone());
        tspan.set_attr("dy", "1.0em");
        let content = match line {
            TspanLine::Text(t) => t,
            TspanLine::BreakPlaceholder => "<br/>".to_string(),
        };
        tspan.children.push(Node::Text(content));
        text_el.children.push(Node::Element(tspan));
    }

    g.children[switch_idx] = Node::Element(text_el);
    Ok(())
}

/// §4.4: walks the (already normalized) tree, tracking the active slide's
/// `in`/`out` window, to build the slide and shape-annotation timelines.
pub fn ingest_shape_timeline(
    root: &Element,
    reference_support: bool,
    images: &dyn ImageSource,
) -> Result<(Vec<SlideSegment>, Vec<ShapeAnnotation>), IngestError> {
    let canvas = root.find_child("g").ok_or_else(|| IngestError::Malformed {
        document: "shapes.svg",
        reason: "missing canvas group".to_string(),
    })?;

    let mut slides = Vec::new();
    let mut shapes = Vec::new();
    let mut current_slide: Option<(Time, Time)> = None;
    walk_timeline(
        canvas,
        reference_support,
        images,
        &mut current_slide,
        &mut slides,
        &mut shapes,
    )?;
    Ok((slides, shapes))
}

fn required_attr(el: &Element, name: &str) -> Result<f64, IngestError> {
    el.attr(name)
        .ok_or_else(|| IngestError::Malformed {
            document: "shapes.svg",
            reason: format!("missing `{name}` attribute"),
        })?
        .parse()
        .map_err(|_| IngestError::Malformed {
            document: "shapes.svg",
            reason: format!("`{name}` is not a number"),
        })
}

fn walk_timeline(
    el: &Element,
    reference_support: bool,
    images: &dyn ImageSource,
    current_slide: &mut Option<(Time, Time)>,
    slides: &mut Vec<SlideSegment>,
    shapes: &mut Vec<ShapeAnnotation>,
) -> Result<(), IngestError> {
    for child in el.child_elements() {
        if child.name == "image" && child.attr("class") == Some("slide") {
            let begin = required_attr(child, "in")?;
            let end = required_attr(child, "out")?;
            let width = required_attr(child, "width")?;
            let height = required_attr(child, "height")?;
            let raw_href = child
                .attr("href")
                .or_else(|| child.attr("xlink:href"))
                .unwrap_or_default()
                .to_string();
            let href = resolve_image_ref(&raw_href, reference_support, images)?;
            *current_slide = Some((begin, end));
            slides.push(SlideSegment { href, begin, end, width, height });
        } else if child.name == "g" && child.attr("class") == Some("shape") {
            if let Some((slide_in, slide_out)) = *current_slide {
                let timestamp = required_attr(child, "timestamp")?;
                let undo = required_attr(child, "undo")?;
                let undo_time = if undo < 0.0 { slide_out } else { undo };
                let enter = timestamp.max(slide_in);
                let leave = undo_time.max(slide_in).min(slide_out);
                if enter <= leave {
                    shapes.push(ShapeAnnotation::new(
                        enter,
                        leave,
                        render_shape_fragment(child),
                        shape_id_tail(child),
                    ));
                }
            }
            walk_timeline(
                child,
                reference_support,
                images,
                current_slide,
                slides,
                shapes,
            )?;
        } else {
            walk_timeline(
                child,
                reference_support,
                images,
                current_slide,
                slides,
                shapes,
            )?;
        }
    }
    Ok(())
}

fn shape_id_tail(g: &Element) -> String {
    g.attr("shape")
        .unwrap_or("shape")
        .rsplit('-')
        .next()
        .unwrap_or("shape")
        .to_string()
}

fn render_shape_fragment(g: &Element) -> String {
    let mut out = String::new();
    match g.attr("style") {
        Some(style) => {
            write!(out, "<g style=\"{}\">", partial_escape(style)).ok();
        }
        None => out.push_str("<g>"),
    }
    for child in &g.children {
        match child {
            Node::Element(e) => e.write(&mut out),
            Node::Text(t) => out.push_str(&escape(t)),
        }
    }
    out.push_str("</g>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_wrap::FixedWidthFont;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FakeImages(HashMap<&'static str, Vec<u8>>);
    impl ImageSource for FakeImages {
        fn load(&self, href: &str) -> Result<Vec<u8>, IngestError> {
            self.0
                .get(href)
                .cloned()
                .ok_or_else(|| IngestError::InputMissing(href.to_string()))
        }
    }

    #[test]
    fn strips_visibility_hidden_everywhere() {
        let font = FixedWidthFont { width_per_char: 5.0 };
        let images = FakeImages(HashMap::new());
        let xml = r#"<svg><g><g shape="line" style="color:red;visibility:hidden;stroke:1"/></g></svg>"#;
        let out = normalize_document(xml, true, &images, &font).unwrap();
        assert!(!out.contains("visibility:hidden"));
        assert!(out.contains("color:red"));
        assert!(out.contains("stroke:1"));
    }

    #[test]
    fn poll_shape_gets_xlink_href_and_namespace() {
        let font = FixedWidthFont { width_per_char: 5.0 };
        let mut files = HashMap::new();
        files.insert("poll1.png", vec![1, 2, 3]);
        let images = FakeImages(files);
        let xml = r#"<svg><g><g shape="poll"><image href="poll1.png"/></g></g></svg>"#;
        let out = normalize_document(xml, false, &images, &font).unwrap();
        assert!(out.contains("xmlns:xlink=\"http://www.w3.org/1999/xlink\""));
        assert!(out.contains("xlink:href=\"data:image/png;base64,"));
        assert!(!out.contains("href=\"poll1.png\""));
    }

    #[test]
    fn text_shape_wraps_and_converts_to_tspans() {
        let font = FixedWidthFont { width_per_char: 10.0 };
        let images = FakeImages(HashMap::new());
        let xml = r#"<svg><g><g shape="text" style="color:#000000;font-size:12">
            <switch><foreignObject x="10" y="20" width="50">
                <div xmlns="http://www.w3.org/1999/xhtml">aaaa bbbb</div>
            </foreignObject></switch>
        </g></g></svg>"#;
        let out = normalize_document(xml, true, &images, &font).unwrap();
        assert!(!out.contains("switch"));
        assert!(out.contains("fill:currentcolor"));
        assert!(out.contains("<tspan x=\"10\" dy=\"1.0em\">aaaa</tspan>"));
        assert!(out.contains("<tspan x=\"10\" dy=\"1.0em\">bbbb</tspan>"));
    }

    #[test]
    fn leading_break_is_suppressed() {
        let font = FixedWidthFont { width_per_char: 1.0 };
        let images = FakeImages(HashMap::new());
        let xml = r#"<svg><g><g shape="text" style="font-size:12">
            <switch><foreignObject x="0" y="0" width="500">
                <div xmlns="http://www.w3.org/1999/xhtml"><br/>hello</div>
            </foreignObject></switch>
        </g></g></svg>"#;
        let out = normalize_document(xml, true, &images, &font).unwrap();
        // one tspan only: the leading <br/> must not add a blank line.
        assert_eq!(out.matches("<tspan").count(), 1);
    }

    #[test]
    fn timeline_ingest_clamps_to_slide_window_and_undo() {
        let images = FakeImages(HashMap::new());
        let xml = r#"<svg><g>
            <image class="slide" in="0" out="10" width="1600" height="900" href="slide1.png"/>
            <g class="shape" timestamp="1" undo="5" shape="draw-line-42" style="stroke:red">
                <line x1="0" y1="0" x2="1" y2="1"/>
            </g>
            <g class="shape" timestamp="6" undo="-1" shape="draw-line-43" style="stroke:blue">
                <line x1="0" y1="0" x2="1" y2="1"/>
            </g>
        </g></svg>"#;
        let root = xmltree::parse(xml).unwrap();
        let (slides, shapes) = ingest_shape_timeline(&root, true, &images).unwrap();

        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].begin, 0.0);
        assert_eq!(slides[0].end, 10.0);

        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].begin, 1.0);
        assert_eq!(shapes[0].end, 5.0);
        assert_eq!(shapes[0].id, "42");

        // undo = -1 inherits slide.out as leave.
        assert_eq!(shapes[1].begin, 6.0);
        assert_eq!(shapes[1].end, 10.0);
        assert_eq!(shapes[1].id, "43");
    }

    #[test]
    fn shape_missing_timestamp_is_malformed() {
        let images = FakeImages(HashMap::new());
        let xml = r#"<svg><g>
            <image class="slide" in="0" out="10" width="1" height="1" href="a.png"/>
            <g class="shape" undo="-1" shape="draw-1" style="stroke:red">
                <line/>
            </g>
        </g></svg>"#;
        let root = xmltree::parse(xml).unwrap();
        let err = ingest_shape_timeline(&root, true, &images).unwrap_err();
        assert!(matches!(err, IngestError::Malformed { document: "shapes.svg", .. }));
    }

    #[test]
    fn shape_fragment_keeps_only_style_attribute() {
        let images = FakeImages(HashMap::new());
        let xml = r#"<svg><g>
            <image class="slide" in="0" out="10" width="1" height="1" href="a.png"/>
            <g class="shape" timestamp="0" undo="-1" shape="draw-1" style="stroke:red" data-extra="drop-me">
                <line/>
            </g>
        </g></svg>"#;
        let root = xmltree::parse(xml).unwrap();
        let (_, shapes) = ingest_shape_timeline(&root, true, &images).unwrap();
        assert_eq!(shapes[0].value, "<g style=\"stroke:red\"><line/></g>");
    }
}
