//! Chapter and caption muxing pass (spec §4.9): runs after the encoder has
//! produced the silent composite, stamping `[CHAPTER]` markers for slide and
//! screen-share transitions and, when captions are enabled, attaching one
//! `mov_text` subtitle track per locale. Both steps re-mux with
//! `-codec copy` so the already-encoded video/audio streams are untouched.

use std::path::Path;
use tokio::process::Command;
use types::{CaptionEntry, SlideSegment, Time};

pub struct ChapterEntry {
    pub start: Time,
    pub end: Time,
    pub title: String,
}

/// Builds one chapter per slide/deskshare segment whose length exceeds
/// `min_duration` and whose start is strictly before `duration`, titled
/// `Slide {k}` or `Screen sharing {k}` with `k` counted separately per kind
/// in the order the segments occur.
#[must_use]
pub fn build_chapters(slides: &[SlideSegment], min_duration: Time, duration: Time) -> Vec<ChapterEntry> {
    let mut slide_count = 0u32;
    let mut deskshare_count = 0u32;
    let mut chapters = Vec::new();

    for segment in slides {
        if segment.end - segment.begin <= min_duration {
            continue;
        }
        if segment.begin >= duration {
            continue;
        }
        let title = if segment.is_deskshare() {
            deskshare_count += 1;
            format!("Screen sharing {deskshare_count}")
        } else {
            slide_count += 1;
            format!("Slide {slide_count}")
        };
        chapters.push(ChapterEntry { start: segment.begin, end: segment.end, title });
    }

    chapters
}

/// Renders an ffmpeg `ffmetadata` document (millisecond timebase) with one
/// `[CHAPTER]` block per entry, for `-map_metadata`-based muxing.
#[must_use]
pub fn render_ffmetadata(chapters: &[ChapterEntry]) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    for chapter in chapters {
        out.push_str("[CHAPTER]\n");
        out.push_str("TIMEBASE=1/1000\n");
        out.push_str(&format!("START={}\n", (chapter.start * 1000.0).round() as i64));
        out.push_str(&format!("END={}\n", (chapter.end * 1000.0).round() as i64));
        out.push_str(&format!("title={}\n", chapter.title));
    }
    out
}

/// Re-muxes `input` with the chapter metadata at `metadata_path`, copying
/// streams rather than re-encoding.
#[must_use]
pub fn build_chapter_remux_command(input: &Path, metadata_path: &Path, output: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-f")
        .arg("ffmetadata")
        .arg("-i")
        .arg(metadata_path)
        .arg("-map_metadata")
        .arg("1")
        .arg("-codec")
        .arg("copy")
        .arg(output);
    cmd
}

/// Attaches one `mov_text` subtitle stream per caption entry, labeling each
/// with its locale.
#[must_use]
pub fn build_caption_mux_command(input: &Path, captions: &[(CaptionEntry, &Path)], output: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y").arg("-i").arg(input);
    for (_, vtt_path) in captions {
        cmd.arg("-i").arg(vtt_path);
    }
    cmd.arg("-map").arg("0");
    for (index, _) in captions.iter().enumerate() {
        cmd.arg("-map").arg((index + 1).to_string());
    }
    cmd.arg("-c").arg("copy").arg("-c:s").arg("mov_text");
    for (index, (caption, _)) in captions.iter().enumerate() {
        cmd.arg(format!("-metadata:s:s:{index}")).arg(format!("language={}", caption.locale));
    }
    cmd.arg(output);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slide(begin: Time, end: Time, href: &str) -> SlideSegment {
        SlideSegment { href: href.into(), begin, end, width: 1600.0, height: 900.0 }
    }

    #[test]
    fn short_segments_are_dropped_and_counters_are_per_kind() {
        let slides = vec![
            slide(0.0, 10.0, "slide1.png"),
            slide(10.0, 10.2, "slide2.png"),
            slide(10.2, 30.0, "deskshare1.mp4"),
            slide(30.0, 45.0, "slide3.png"),
        ];
        let chapters = build_chapters(&slides, 1.0, 45.0);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Slide 1", "Screen sharing 1", "Slide 2"]);
    }

    #[test]
    fn segments_starting_at_or_past_duration_are_dropped() {
        let slides = vec![
            slide(0.0, 10.0, "slide1.png"),
            slide(10.0, 20.0, "slide2.png"),
        ];
        let chapters = build_chapters(&slides, 0.25, 10.0);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Slide 1"]);
    }

    #[test]
    fn ffmetadata_uses_millisecond_timebase() {
        let chapters =
            vec![ChapterEntry { start: 1.5, end: 4.25, title: "Slide 1".into() }];
        let text = render_ffmetadata(&chapters);
        assert!(text.starts_with(";FFMETADATA1\n"));
        assert!(text.contains("START=1500\n"));
        assert!(text.contains("END=4250\n"));
        assert!(text.contains("title=Slide 1\n"));
    }

    #[test]
    fn caption_command_maps_one_subtitle_stream_per_locale() {
        let captions = vec![
            (CaptionEntry { locale: "en".into(), locale_name: "English".into() }, Path::new("en.vtt")),
            (CaptionEntry { locale: "fr".into(), locale_name: "French".into() }, Path::new("fr.vtt")),
        ];
        let cmd = build_caption_mux_command(Path::new("in.mp4"), &captions, Path::new("out.mp4"));
        let args: Vec<String> =
            cmd.as_std().get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert!(args.iter().any(|a| a == "language=en"));
        assert!(args.iter().any(|a| a == "language=fr"));
        assert!(args.iter().filter(|a| a.as_str() == "mov_text").count() == 1);
    }
}
