//! Panzoom ingest (spec §4.3): a streaming reader over `panzooms.xml`
//! tracking the enclosing `<event timestamp="...">` and emitting one
//! `PanzoomEvent` per `<viewBox>` text node.

use crate::error::IngestError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use types::{PanzoomEvent, ViewBox};

pub fn ingest_panzooms(xml: &str) -> Result<Vec<PanzoomEvent>, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut events = Vec::new();
    let mut current_timestamp: Option<f64> = None;
    let mut in_view_box = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"event" => {
                current_timestamp = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == b"timestamp")
                    .and_then(|a| a.unescape_value().ok())
                    .and_then(|v| v.parse().ok());
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"viewBox" => {
                in_view_box = true;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"viewBox" => {
                in_view_box = false;
            }
            Ok(Event::Text(t)) if in_view_box => {
                let text = t.unescape().map_err(|e| IngestError::Malformed {
                    document: "panzooms.xml",
                    reason: e.to_string(),
                })?;
                let Some(t) = current_timestamp else {
                    return Err(IngestError::Malformed {
                        document: "panzooms.xml",
                        reason: "viewBox outside of an event".to_string(),
                    });
                };
                let view_box = ViewBox::parse(&text).ok_or_else(|| IngestError::Malformed {
                    document: "panzooms.xml",
                    reason: format!("unparseable viewBox: {text}"),
                })?;
                events.push(PanzoomEvent { t, view_box });
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IngestError::Malformed {
                    document: "panzooms.xml",
                    reason: e.to_string(),
                })
            }
        }
    }

    events.sort_by(|a, b| a.t.total_cmp(&b.t));
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_viewbox_per_event() {
        let xml = r#"<recording>
            <event timestamp="0"><viewBox>0 0 1600 900</viewBox></event>
            <event timestamp="4"><viewBox>100 50 800 450</viewBox></event>
        </recording>"#;
        let events = ingest_panzooms(xml).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].t, 0.0);
        assert_eq!(events[0].view_box, ViewBox { x: 0.0, y: 0.0, w: 1600.0, h: 900.0 });
        assert_eq!(events[1].t, 4.0);
        assert_eq!(events[1].view_box, ViewBox { x: 100.0, y: 50.0, w: 800.0, h: 450.0 });
    }

    #[test]
    fn results_are_time_sorted() {
        let xml = r#"<recording>
            <event timestamp="4"><viewBox>0 0 1 1</viewBox></event>
            <event timestamp="0"><viewBox>0 0 2 2</viewBox></event>
        </recording>"#;
        let events = ingest_panzooms(xml).unwrap();
        assert_eq!(events[0].t, 0.0);
        assert_eq!(events[1].t, 4.0);
    }

    #[test]
    fn view_box_without_event_is_malformed() {
        let xml = r#"<recording><viewBox>0 0 1 1</viewBox></recording>"#;
        assert!(ingest_panzooms(xml).is_err());
    }
}
