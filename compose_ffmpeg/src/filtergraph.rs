//! Filter-graph assembly and the final encoder invocation (spec §4.8).
//!
//! Adapts the `Filter`/`FilterChannel`/`FilterPipe`/`FilterGraph` pattern
//! used for cut-list assembly: small `Display` types that stringify into
//! one `-filter_complex` argument, built up as a flat list of pipes joined
//! by `;`. Here the channels are named labels rather than numbered
//! per-track streams, since the composite has a fixed cast of inputs
//! (background, whiteboard, cursor, webcams, optional deskshare/chat)
//! instead of an arbitrary cut list.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::Path;
use std::rc::Rc;
use tokio::process::Command;
use types::{LayoutConstants, PipelineConfig, Time};

#[derive(Clone)]
struct Label(Rc<str>);

impl Label {
    fn named(name: &str) -> Self {
        Self(name.into())
    }

    fn source(index: usize) -> Self {
        Self(format!("{index}:v").into())
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// One ffmpeg filter, optionally bound to an instance name (`geq@c`) so a
/// later `sendcmd` can address it.
struct Filter {
    name: Rc<str>,
    instance: Option<Rc<str>>,
    options: HashMap<Rc<str>, Rc<str>>,
}

impl Filter {
    fn new(name: &str, options: Vec<(&str, String)>) -> Self {
        Self {
            name: name.into(),
            instance: None,
            options: options.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn with_instance(mut self, instance: &str) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .options
            .iter()
            .map(|(k, v)| if k.is_empty() { v.to_string() } else { format!("{k}={v}") })
            .collect();
        parts.sort();

        let named = match &self.instance {
            Some(instance) => format!("{}@{instance}", self.name),
            None => self.name.to_string(),
        };
        if parts.is_empty() {
            write!(f, "{named}")
        } else {
            write!(f, "{named}={}", parts.join(":"))
        }
    }
}

struct FilterPipe {
    filters: Vec<Filter>,
    inputs: Vec<Label>,
    output: Label,
}

impl FilterPipe {
    fn new(filters: Vec<Filter>, inputs: Vec<Label>, output: Label) -> Self {
        Self { filters, inputs, output }
    }
}

impl Display for FilterPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.inputs.iter().map(ToString::to_string).collect::<Vec<_>>().join(""),
            self.filters.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            self.output,
        )
    }
}

/// Which optional inputs are present; this, plus the fixed order (spec
/// §4.8), determines every input's stream index.
pub struct FilterGraphSpec {
    pub has_deskshare: bool,
    pub has_chat: bool,
}

impl FilterGraphSpec {
    const BACKGROUND: usize = 0;
    const WHITEBOARD: usize = 1;
    const CURSOR: usize = 2;
    const WEBCAMS: usize = 3;

    #[must_use]
    pub fn deskshare_input(&self) -> Option<usize> {
        self.has_deskshare.then_some(4)
    }

    #[must_use]
    pub fn chat_bg_input(&self) -> Option<usize> {
        self.has_chat.then_some(if self.has_deskshare { 5 } else { 4 })
    }

    #[must_use]
    pub fn chat_sprite_input(&self) -> Option<usize> {
        self.chat_bg_input().map(|i| i + 1)
    }

    /// Every input path, in the stable order the encoder's `-i` args follow.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.chat_sprite_input().map_or_else(
            || self.deskshare_input().map_or(4, |i| i + 1),
            |i| i + 1,
        )
    }
}

fn rounded_corner_alpha_expr(w: u32, h: u32, r: u32, alpha_max: u8) -> String {
    let tl = format!("lte(X,{r})*lte(Y,{r})*gt(hypot({r}-X,{r}-Y),{r})");
    let tr = format!("gte(X,{w}-{r})*lte(Y,{r})*gt(hypot(X-({w}-{r}),{r}-Y),{r})");
    let bl = format!("lte(X,{r})*gte(Y,{h}-{r})*gt(hypot({r}-X,Y-({h}-{r})),{r})");
    let br = format!("gte(X,{w}-{r})*gte(Y,{h}-{r})*gt(hypot(X-({w}-{r}),Y-({h}-{r})),{r})");
    format!("if(({tl})+({tr})+({bl})+({br}),0,{alpha_max})")
}

fn rounded_corner_pipe(input: Label, w: u32, h: u32, r: u32, alpha_max: u8, output: Label) -> FilterPipe {
    FilterPipe::new(
        vec![
            Filter::new("format", vec![("", "yuva420p".to_string())]),
            Filter::new(
                "geq",
                vec![
                    ("lum", "lum(X,Y)".to_string()),
                    ("cb", "cb(X,Y)".to_string()),
                    ("cr", "cr(X,Y)".to_string()),
                    ("a", rounded_corner_alpha_expr(w, h, r, alpha_max)),
                ],
            ),
        ],
        vec![input],
        output,
    )
}

/// Assembles the `-filter_complex` expression and returns it along with
/// the output label to `-map`. `cursor_timestamps`/`chat_timestamps` are
/// absolute scratch-file paths: `sendcmd`'s `f=` option is resolved by the
/// ffmpeg process itself, not relative to any playlist file, so the paths
/// baked into the graph must be absolute rather than bare filenames.
#[must_use]
pub fn build_filter_complex(
    spec: &FilterGraphSpec,
    layout: &LayoutConstants,
    cursor_timestamps: &Path,
    chat_timestamps: &Path,
) -> (String, &'static str) {
    let mut pipes = Vec::new();

    let cursor_cmd = Label::named("cursor_cmd");
    pipes.push(FilterPipe::new(
        vec![Filter::new("sendcmd", vec![("f", cursor_timestamps.display().to_string())])],
        vec![Label::source(FilterGraphSpec::CURSOR)],
        cursor_cmd.clone(),
    ));

    let webcams_scaled = Label::named("wc_scaled");
    pipes.push(FilterPipe::new(
        vec![Filter::new(
            "scale",
            vec![("w", layout.webcams_width.to_string()), ("h", layout.webcams_height.to_string())],
        )],
        vec![Label::source(FilterGraphSpec::WEBCAMS)],
        webcams_scaled.clone(),
    ));
    let webcams_rounded = Label::named("wc_round");
    pipes.push(rounded_corner_pipe(
        webcams_scaled,
        layout.webcams_width,
        layout.webcams_height,
        layout.border_radius,
        255,
        webcams_rounded.clone(),
    ));

    let main = if let Some(deskshare_idx) = spec.deskshare_input() {
        let deskshare_scaled = Label::named("ds_scaled");
        pipes.push(FilterPipe::new(
            vec![Filter::new(
                "scale",
                vec![
                    ("w", layout.slides_width.to_string()),
                    ("h", layout.slides_height.to_string()),
                    ("force_original_aspect_ratio", "1".to_string()),
                ],
            )],
            vec![Label::source(deskshare_idx)],
            deskshare_scaled.clone(),
        ));
        let composed = Label::named("main_ds");
        pipes.push(FilterPipe::new(
            vec![Filter::new("overlay", vec![])],
            vec![deskshare_scaled, Label::source(FilterGraphSpec::WHITEBOARD)],
            composed.clone(),
        ));
        composed
    } else {
        Label::source(FilterGraphSpec::WHITEBOARD)
    };

    let main_with_cursor = Label::named("main_cursor");
    pipes.push(FilterPipe::new(
        vec![Filter::new("overlay", vec![]).with_instance("m")],
        vec![main, cursor_cmd],
        main_with_cursor.clone(),
    ));
    let main_rounded = Label::named("main_round");
    pipes.push(rounded_corner_pipe(
        main_with_cursor,
        layout.slides_width,
        layout.slides_height,
        layout.border_radius,
        255,
        main_rounded.clone(),
    ));

    let mut composite = Label::named("composite_slides");
    pipes.push(FilterPipe::new(
        vec![Filter::new(
            "overlay",
            vec![("x", layout.slides_x.to_string()), ("y", layout.slides_y.to_string())],
        )],
        vec![Label::source(FilterGraphSpec::BACKGROUND), main_rounded],
        composite.clone(),
    ));

    if let (Some(chat_bg_idx), Some(chat_sprite_idx)) = (spec.chat_bg_input(), spec.chat_sprite_input()) {
        let chat_cropped = Label::named("chat_cropped");
        pipes.push(FilterPipe::new(
            vec![
                Filter::new("sendcmd", vec![("f", chat_timestamps.display().to_string())]),
                Filter::new(
                    "crop",
                    vec![
                        ("w", layout.chat_width.to_string()),
                        ("h", layout.chat_canvas_height.to_string()),
                        ("x", "0".to_string()),
                        ("y", "0".to_string()),
                    ],
                )
                .with_instance("c"),
            ],
            vec![Label::source(chat_sprite_idx)],
            chat_cropped.clone(),
        ));

        let chat_bg_rounded = Label::named("chat_bg_round");
        pipes.push(rounded_corner_pipe(
            Label::source(chat_bg_idx),
            layout.chat_width,
            layout.chat_canvas_height,
            layout.border_radius,
            153,
            chat_bg_rounded.clone(),
        ));

        let chat_composite = Label::named("chat_composite");
        pipes.push(FilterPipe::new(
            vec![Filter::new("overlay", vec![])],
            vec![chat_bg_rounded, chat_cropped],
            chat_composite.clone(),
        ));

        let with_chat = Label::named("composite_chat");
        pipes.push(FilterPipe::new(
            vec![Filter::new(
                "overlay",
                vec![("x", layout.chat_outer_x.to_string()), ("y", layout.chat_outer_y.to_string())],
            )],
            vec![composite, chat_composite],
            with_chat.clone(),
        ));
        composite = with_chat;
    }

    let out = Label::named("out");
    pipes.push(FilterPipe::new(
        vec![Filter::new(
            "overlay",
            vec![("x", layout.webcams_x.to_string()), ("y", layout.webcams_y.to_string())],
        )],
        vec![composite, webcams_rounded],
        out,
    ));

    let graph = pipes.iter().map(ToString::to_string).collect::<Vec<_>>().join(";");
    (graph, "out")
}

/// Builds the single encoder invocation (spec §4.8 output clause).
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn build_encode_command(
    spec: &FilterGraphSpec,
    config: &PipelineConfig,
    inputs: &[std::path::PathBuf],
    cursor_timestamps: &Path,
    chat_timestamps: &Path,
    meeting_name: &str,
    duration: Time,
    output_path: &std::path::Path,
) -> Command {
    let (filter_complex, out_label) =
        build_filter_complex(spec, &config.layout, cursor_timestamps, chat_timestamps);

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y");
    for input in inputs {
        cmd.arg("-i").arg(input);
    }
    cmd.arg("-filter_complex").arg(filter_complex);
    cmd.arg("-map").arg(format!("[{out_label}]"));
    cmd.arg("-map").arg(format!("{}:a", FilterGraphSpec::WEBCAMS));
    cmd.arg("-c:v").arg("libx264");
    cmd.arg("-crf").arg(config.constant_rate_factor.to_string());
    cmd.arg("-threads").arg(config.cpu_threads.to_string());
    cmd.arg("-shortest");
    cmd.arg("-t").arg(duration.to_string());
    cmd.arg("-metadata").arg(format!("title={meeting_name}"));
    cmd.arg(output_path);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layout() -> LayoutConstants {
        LayoutConstants::default()
    }

    fn cursor_ts() -> std::path::PathBuf {
        std::path::PathBuf::from("/scratch/timestamps/cursor_timestamps")
    }

    fn chat_ts() -> std::path::PathBuf {
        std::path::PathBuf::from("/scratch/timestamps/chat_timestamps")
    }

    #[test]
    fn minimal_graph_has_no_deskshare_or_chat_labels() {
        let spec = FilterGraphSpec { has_deskshare: false, has_chat: false };
        let (graph, out) = build_filter_complex(&spec, &layout(), &cursor_ts(), &chat_ts());
        assert_eq!(out, "out");
        assert!(!graph.contains("ds_scaled"));
        assert!(!graph.contains("chat_composite"));
        assert!(graph.contains("sendcmd=f=/scratch/timestamps/cursor_timestamps"));
        assert!(graph.contains("overlay@m"));
    }

    #[test]
    fn deskshare_input_index_is_four() {
        let spec = FilterGraphSpec { has_deskshare: true, has_chat: false };
        assert_eq!(spec.deskshare_input(), Some(4));
        assert_eq!(spec.chat_bg_input(), None);
        let (graph, _) = build_filter_complex(&spec, &layout(), &cursor_ts(), &chat_ts());
        assert!(graph.contains("[4:v]"));
    }

    #[test]
    fn chat_inputs_shift_past_deskshare() {
        let spec = FilterGraphSpec { has_deskshare: true, has_chat: true };
        assert_eq!(spec.chat_bg_input(), Some(5));
        assert_eq!(spec.chat_sprite_input(), Some(6));
        assert_eq!(spec.input_count(), 7);
        let (graph, _) = build_filter_complex(&spec, &layout(), &cursor_ts(), &chat_ts());
        assert!(graph.contains("crop@c="));
        assert!(graph.contains("chat_composite"));
        assert!(graph.contains("sendcmd=f=/scratch/timestamps/chat_timestamps"));
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            meeting_id: "abc123".into(),
            published_root: "/published".into(),
            scratch_root: "/scratch".into(),
            video_root: "/video".into(),
            output_path: "out.mp4".into(),
            flags: types::FeatureFlags::default(),
            layout: layout(),
            constant_rate_factor: 23,
            cpu_threads: 4,
        }
    }

    #[test]
    fn encode_command_maps_audio_from_webcams_input() {
        let spec = FilterGraphSpec { has_deskshare: false, has_chat: false };
        let cmd = build_encode_command(
            &spec,
            &config(),
            &[std::path::PathBuf::from("bg.mp4"), std::path::PathBuf::from("wb.txt")],
            &cursor_ts(),
            &chat_ts(),
            "Weekly Standup",
            120.0,
            std::path::Path::new("composite.mp4"),
        );
        let args: Vec<String> =
            cmd.as_std().get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert!(args.iter().any(|a| a == "3:a"));
        assert!(args.iter().any(|a| a == "title=Weekly Standup"));
    }
}
