//! A minimal, mutable XML element tree.
//!
//! The only place in the pipeline that needs an actual DOM is the shape
//! normalization pass (spec §9 design notes: "only the initial shape
//! normalization pass... uses a mutable tree"). Everything else reads the
//! shapes/panzoom/cursor/chat documents with a streaming pull reader.
//! Ownership here is a plain recursive tree — no parent pointers, nothing
//! shared — so there's nothing to get cyclic.

use crate::error::IngestError;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// `true` for a self-closing / empty tag in the source (`<br/>`),
    /// preserved so a round-trip doesn't turn it into `<br></br>`.
    pub self_closing: bool,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self.attrs.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value;
        } else {
            self.attrs.push((key.to_string(), value));
        }
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| k != key);
    }

    #[must_use]
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == name)
    }

    /// Depth-first, pre-order: every `<g>` element anywhere under (but not
    /// including) `self`.
    pub fn descendants_named<'a>(&'a self, name: &'a str, out: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if child.name == name {
                out.push(child);
            }
            child.descendants_named(name, out);
        }
    }

    /// Depth-first, pre-order mutating visit of every descendant element
    /// named `name` (not including `self`).
    pub fn visit_descendants_mut(&mut self, name: &str, f: &mut impl FnMut(&mut Element)) {
        for child in self.child_elements_mut() {
            if child.name == name {
                f(child);
            }
            child.visit_descendants_mut(name, f);
        }
    }

    /// Serializes this element (and its subtree) back to XML text.
    pub fn write(&self, out: &mut String) {
        write!(out, "<{}", self.name).ok();
        for (k, v) in &self.attrs {
            write!(out, " {}=\"{}\"", k, partial_escape(v)).ok();
        }
        if self.children.is_empty() && self.self_closing {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write(out),
                Node::Text(t) => out.push_str(&escape(t)),
            }
        }
        write!(out, "</{}>", self.name).ok();
    }
}

/// Parses `xml` into a tree rooted at the outermost element.
pub fn parse(xml: &str) -> Result<Element, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let mut el = element_from_start(&e)?;
                el.self_closing = true;
                attach(&mut stack, &mut root, Node::Element(el));
            }
            Ok(Event::End(_)) => {
                if let Some(finished) = stack.pop() {
                    attach(&mut stack, &mut root, Node::Element(finished));
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| IngestError::Malformed {
                    document: "shapes.svg",
                    reason: e.to_string(),
                })?;
                if !text.is_empty() {
                    attach(&mut stack, &mut root, Node::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                attach(&mut stack, &mut root, Node::Text(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IngestError::Malformed {
                    document: "shapes.svg",
                    reason: e.to_string(),
                })
            }
        }
    }

    root.ok_or_else(|| IngestError::Malformed {
        document: "shapes.svg",
        reason: "empty document".to_string(),
    })
}

fn element_from_start(e: &BytesStart) -> Result<Element, IngestError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| IngestError::Malformed {
            document: "shapes.svg",
            reason: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| IngestError::Malformed {
                document: "shapes.svg",
                reason: e.to_string(),
            })?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element { name, attrs, children: Vec::new(), self_closing: false })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    } else if let Node::Element(e) = node {
        *root = Some(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attrs() {
        let root = parse(r#"<svg a="1"><g b="2"><image href="x.png"/></g></svg>"#).unwrap();
        assert_eq!(root.name, "svg");
        assert_eq!(root.attr("a"), Some("1"));
        let g = root.find_child("g").unwrap();
        assert_eq!(g.attr("b"), Some("2"));
        let image = g.find_child("image").unwrap();
        assert_eq!(image.attr("href"), Some("x.png"));
        assert!(image.self_closing);
    }

    #[test]
    fn round_trips_text_content() {
        let root = parse("<text>hello &amp; world</text>").unwrap();
        let mut out = String::new();
        root.write(&mut out);
        assert_eq!(out, "<text>hello &amp; world</text>");
    }

    #[test]
    fn descendants_named_finds_nested_groups() {
        let root = parse("<svg><g><g/><g><g/></g></g></svg>").unwrap();
        let mut out = Vec::new();
        root.descendants_named("g", &mut out);
        assert_eq!(out.len(), 4);
    }
}
