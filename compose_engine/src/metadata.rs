//! Metadata ingest and rewrite (spec §6): a streaming reader over
//! `metadata.xml` tracking the enclosing element path, pulling
//! `recording/playback/duration` (milliseconds) and
//! `recording/meta/meetingName`, the same reader shape as
//! `panzoom::ingest_panzooms`. On a successful run, `render_metadata`
//! produces the sibling document the finished recording is published
//! with: `format` set to `video` and `link` rewritten to the composite's
//! final location.

use crate::error::IngestError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use types::MeetingMetadata;

pub fn ingest_metadata(xml: &str) -> Result<MeetingMetadata, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut duration_ms = None;
    let mut meeting_name = None;
    let mut format = None;
    let mut link = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| IngestError::Malformed {
                    document: "metadata.xml",
                    reason: e.to_string(),
                })?;
                match path.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                    ["recording", "playback", "duration"] => {
                        duration_ms = text.parse().ok();
                    }
                    ["recording", "playback", "format"] => {
                        format = Some(text.into_owned());
                    }
                    ["recording", "playback", "link"] => {
                        link = Some(text.into_owned());
                    }
                    ["recording", "meta", "meetingName"] => {
                        meeting_name = Some(text.into_owned());
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IngestError::Malformed { document: "metadata.xml", reason: e.to_string() })
            }
        }
    }

    let duration_ms = duration_ms.ok_or_else(|| IngestError::Malformed {
        document: "metadata.xml",
        reason: "missing recording/playback/duration".to_string(),
    })?;
    let meeting_name = meeting_name.ok_or_else(|| IngestError::Malformed {
        document: "metadata.xml",
        reason: "missing recording/meta/meetingName".to_string(),
    })?;

    Ok(MeetingMetadata { duration_ms, meeting_name, format, link })
}

/// Renders the rewritten `metadata.xml` written to
/// `<video-root>/<meeting_id>/metadata.xml` on success: same duration and
/// meeting name, `format` forced to `video`, `link` pointed at the
/// finished composite.
#[must_use]
pub fn render_metadata(original: &MeetingMetadata, link: &str) -> String {
    format!(
        "<recording>\n  <playback>\n    <format>video</format>\n    <link>{}</link>\n    <duration>{}</duration>\n  </playback>\n  <meta>\n    <meetingName>{}</meetingName>\n  </meta>\n</recording>\n",
        escape_xml(link),
        original.duration_ms,
        escape_xml(&original.meeting_name),
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ingest_reads_duration_and_meeting_name() {
        let xml = r#"<recording>
            <playback>
                <format>presentation</format>
                <duration>123456</duration>
            </playback>
            <meta>
                <meetingName>Weekly Standup</meetingName>
            </meta>
        </recording>"#;
        let meta = ingest_metadata(xml).unwrap();
        assert_eq!(meta.duration_ms, 123456.0);
        assert_eq!(meta.meeting_name, "Weekly Standup");
        assert_eq!(meta.format.as_deref(), Some("presentation"));
    }

    #[test]
    fn ingest_rejects_missing_duration() {
        let xml = r#"<recording><meta><meetingName>x</meetingName></meta></recording>"#;
        assert!(ingest_metadata(xml).is_err());
    }

    #[test]
    fn render_sets_format_video_and_link() {
        let original = MeetingMetadata {
            duration_ms: 5000.0,
            meeting_name: "Team Sync".to_string(),
            format: Some("presentation".to_string()),
            link: None,
        };
        let xml = render_metadata(&original, "https://example.invalid/video/abc/video.mp4");
        assert!(xml.contains("<format>video</format>"));
        assert!(xml.contains("<link>https://example.invalid/video/abc/video.mp4</link>"));
        assert!(xml.contains("<duration>5000</duration>"));
        assert!(xml.contains("<meetingName>Team Sync</meetingName>"));
    }
}
