//! Chat layout engine (spec §4.6) — the largest single component. Turns a
//! stream of `ChatMessage` into `chat.svg` plus the `chat_timestamps`
//! overlay-command stream the encoder's `sendcmd` filter consumes to crop
//! the sprite as new messages arrive.

use crate::error::IngestError;
use crate::rtl::is_rtl_message;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use sha1::{Digest, Sha1};
use std::collections::VecDeque;
use std::fmt::Write as _;
use types::{ChatMessage, LayoutConstants, Time};
use unicode_normalization::UnicodeNormalization;

/// Streams `slides_new.xml`'s flat list of
/// `<chattimeline target="..." name="..." message="..." in="..."/>`
/// entries into arrival-ordered `ChatMessage`s, keeping only the ones
/// targeting the chat pod, the same reader shape as
/// `panzoom::ingest_panzooms`.
pub fn ingest_chat_messages(xml: &str) -> Result<Vec<ChatMessage>, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut messages = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"chattimeline" => {
                let mut target = None;
                let mut name = None;
                let mut message = None;
                let mut t = None;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().map_err(|e| IngestError::Malformed {
                        document: "slides_new.xml",
                        reason: e.to_string(),
                    })?;
                    match attr.key.local_name().as_ref() {
                        b"target" => target = Some(value.into_owned()),
                        b"name" => name = Some(value.into_owned()),
                        b"message" => message = Some(value.into_owned()),
                        b"in" => t = value.parse().ok(),
                        _ => {}
                    }
                }
                if target.as_deref() != Some("chat") {
                    continue;
                }
                let t = t.ok_or_else(|| IngestError::Malformed {
                    document: "slides_new.xml",
                    reason: "chattimeline missing in attribute".to_string(),
                })?;
                let name = name.ok_or_else(|| IngestError::Malformed {
                    document: "slides_new.xml",
                    reason: "chattimeline missing name attribute".to_string(),
                })?;
                let message = message.ok_or_else(|| IngestError::Malformed {
                    document: "slides_new.xml",
                    reason: "chattimeline missing message attribute".to_string(),
                })?;
                messages.push(ChatMessage { t, name, text: message });
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IngestError::Malformed {
                    document: "slides_new.xml",
                    reason: e.to_string(),
                })
            }
        }
    }

    messages.sort_by(|a, b| a.t.total_cmp(&b.t));
    Ok(messages)
}

const BUBBLE_VOWELS: [char; 6] = ['a', 'e', 'i', 'o', 'u', 'y'];
const BUBBLE_CONSONANTS: [char; 17] =
    ['b', 'c', 'd', 'f', 'g', 'h', 'k', 'l', 'm', 'n', 'p', 'r', 's', 't', 'v', 'z', 'x'];

/// Bubble-babble encodes `bytes` into a pronounceable, checksummed string.
fn bubble_babble(bytes: &[u8]) -> String {
    let mut out = String::from("x");
    let mut seed: u32 = 1;
    let rounds = bytes.len() / 2 + 1;

    for i in 0..rounds {
        if i + 1 < rounds || bytes.len() % 2 != 0 {
            let b1 = u32::from(bytes[2 * i]);
            out.push(BUBBLE_VOWELS[(((b1 >> 6) & 3) + seed) as usize % 6]);
            out.push(BUBBLE_CONSONANTS[((b1 >> 2) & 15) as usize]);
            out.push(BUBBLE_VOWELS[((b1 & 3) + seed / 6) as usize % 6]);
            if i + 1 < rounds {
                let b2 = u32::from(bytes[2 * i + 1]);
                out.push(BUBBLE_CONSONANTS[((b2 >> 4) & 15) as usize]);
                out.push('-');
                out.push(BUBBLE_CONSONANTS[(b2 & 15) as usize]);
                seed = (seed * 5 + b1 * 7 + b2) % 36;
            }
        } else {
            out.push(BUBBLE_VOWELS[(seed % 6) as usize]);
            out.push(BUBBLE_CONSONANTS[16]);
            out.push(BUBBLE_VOWELS[(seed / 6) as usize]);
        }
    }
    out.push('x');
    out
}

/// Replaces `name` with the first 11 characters of a bubble-babble-encoded
/// SHA-1 of `name ∥ salt`. `salt` is expected to be a process-startup
/// constant so the same name maps to the same pseudonym within one run.
#[must_use]
pub fn pseudonymize_name(name: &str, salt: u64) -> String {
    let mut hasher = Sha1::new();
    hasher.update(name.as_bytes());
    hasher.update(salt.to_le_bytes());
    let digest = hasher.finalize();
    let encoded = bubble_babble(&digest);
    encoded.chars().take(11).collect()
}

fn sanitize(text: &str) -> String {
    let flattened: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    flattened.nfc().collect()
}

fn format_hms(t: Time) -> String {
    let total = t.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Fixed-character-count greedy word-wrap (spec §4.6 step 3): breaks at
/// the last seen space once a line would exceed `max_chars`, or at the
/// current position if no space has appeared yet on that line.
fn wrap_fixed_width(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }

    let mut lines = Vec::new();
    let mut line_start = 0usize;
    let mut last_space: Option<usize> = None;
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i] == ' ' {
            last_space = Some(i);
        }
        if i - line_start + 1 > max_chars {
            let break_at = last_space.filter(|&s| s >= line_start).unwrap_or(i);
            lines.push(chars[line_start..break_at].iter().collect());
            line_start = if chars.get(break_at) == Some(&' ') { break_at + 1 } else { break_at };
            last_space = None;
            i = line_start;
            continue;
        }
        i += 1;
    }
    if line_start < chars.len() {
        lines.push(chars[line_start..].iter().collect());
    }
    lines
}

struct TailEntry {
    header: String,
    lines: Vec<String>,
    x: f64,
    rtl: bool,
}

fn tail_buffer_capacity(layout: &LayoutConstants) -> usize {
    let font = f64::from(layout.chat_font_size);
    let canvas = f64::from(layout.chat_canvas_height);
    (canvas / (3.0 * font)).ceil() as usize + 1
}

fn text_x_and_anchor(rtl: bool, x: f64, chat_width: u32) -> (f64, &'static str) {
    if rtl {
        (x + f64::from(chat_width), "end")
    } else {
        (x, "start")
    }
}

fn emit_block(svg: &mut String, entry_x: f64, rtl: bool, header: &str, lines: &[String], top_y: f64, layout: &LayoutConstants) {
    let (text_x, anchor) = text_x_and_anchor(rtl, entry_x, layout.chat_width);
    let fs = layout.chat_font_size;
    writeln!(
        svg,
        "<text x=\"{text_x}\" y=\"{top_y}\" font-weight=\"bold\" font-size=\"{fs}\" text-anchor=\"{anchor}\">{}</text>",
        escape(header)
    )
    .ok();
    for (i, line) in lines.iter().enumerate() {
        let line_y = top_y + f64::from(fs) * (i as f64 + 1.0);
        writeln!(
            svg,
            "<text x=\"{text_x}\" y=\"{line_y}\" font-size=\"{fs}\" text-anchor=\"{anchor}\">{}</text>",
            escape(line)
        )
        .ok();
    }
}

pub struct ChatLayout {
    pub svg: String,
    pub overlay_commands: String,
}

/// Lays out `messages` (already in arrival order) into `chat.svg`'s body
/// and the `chat_timestamps` crop-command stream.
#[must_use]
pub fn layout_chat(
    messages: &[ChatMessage],
    layout: &LayoutConstants,
    hide_names: bool,
    name_salt: u64,
) -> ChatLayout {
    let max_chars = layout.chat_max_line_chars();
    let capacity = tail_buffer_capacity(layout);

    let mut body = String::new();
    let mut overlay_commands = String::new();
    let mut tail: VecDeque<TailEntry> = VecDeque::with_capacity(capacity);

    let mut svg_x: f64 = 0.0;
    let mut svg_y: f64 = f64::from(layout.chat_starting_offset);
    let mut chat_x: f64 = 0.0;
    let mut chat_y: f64 = 0.0;
    let mut columns = 1u32;

    for message in messages {
        let name = sanitize(&message.name);
        let name = if hide_names { pseudonymize_name(&name, name_salt) } else { name };
        let text = sanitize(&message.text);
        let rtl = is_rtl_message(&text);
        let lines = wrap_fixed_width(&text, max_chars);
        let height = f64::from(layout.chat_font_size) * (lines.len() as f64 + 2.0);

        if svg_y + height > f64::from(layout.chat_canvas_height) {
            let mut cursor = f64::from(layout.chat_canvas_height);
            for entry in &tail {
                let entry_height = f64::from(layout.chat_font_size) * (entry.lines.len() as f64 + 2.0);
                cursor -= entry_height;
                if cursor < 0.0 {
                    break;
                }
                emit_block(&mut body, entry.x, entry.rtl, &entry.header, &entry.lines, cursor, layout);
            }

            svg_y = f64::from(layout.chat_starting_offset);
            svg_x += f64::from(layout.chat_width);
            chat_x += f64::from(layout.chat_width);
            chat_y = height;
            columns += 1;
        } else {
            chat_y += height;
        }

        let header = format!("{name}    {}", format_hms(message.t));
        emit_block(&mut body, svg_x, rtl, &header, &lines, svg_y, layout);
        writeln!(
            overlay_commands,
            "{:.3} crop@c x {:.3}, crop@c y {:.3};",
            message.t, chat_x, chat_y
        )
        .ok();

        svg_y += height;

        tail.push_front(TailEntry { header, lines, x: svg_x, rtl });
        if tail.len() > capacity {
            tail.pop_back();
        }
    }

    let width = svg_x + f64::from(layout.chat_width);
    let height = if columns == 1 { svg_y } else { f64::from(layout.chat_canvas_height) };

    let svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\">{body}</svg>"
    );

    ChatLayout { svg, overlay_commands }
}
