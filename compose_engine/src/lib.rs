//! Temporal composition engine: turns the BigBlueButton-style recording
//! documents (shapes, panzooms, cursor, chat) into the whiteboard frame
//! set, cursor/chat overlay-command streams, and concat playlist that
//! `compose_ffmpeg` assembles into one encoder invocation.
//!
//! The pipeline stages run in the order spec'd for the concurrency model:
//! ingest every document, merge breakpoints, then emit frames/cursor/chat.
//! Nothing here touches the filesystem or spawns a process directly — the
//! orchestration binary (`compose_job`) owns I/O and threads a `FontMetric`
//! implementation in from `compose_ffmpeg`.

pub mod breakpoints;
pub mod chat;
pub mod cursor;
pub mod error;
pub mod frames;
pub mod interval_tree;
pub mod metadata;
pub mod panzoom;
pub mod rtl;
pub mod shapes;
pub mod text_wrap;
pub mod xmltree;

pub use breakpoints::{merge as merge_breakpoints, BreakpointSet};
pub use chat::{ingest_chat_messages, layout_chat, pseudonymize_name, ChatLayout};
pub use cursor::{cursor_sprite_svg, ingest_cursor_samples, project_cursor};
pub use error::{FontMetricError, IngestError, LayoutError};
pub use frames::{build_concat_playlist, emit_frames, Frame};
pub use interval_tree::IntervalTree;
pub use metadata::{ingest_metadata, render_metadata};
pub use panzoom::ingest_panzooms;
pub use shapes::{ingest_shape_timeline, normalize_document, ImageSource};
pub use text_wrap::FontMetric;

use types::{PipelineConfig, ShapeAnnotation};

/// Everything the frame/cursor/chat emitters need once ingest has run.
pub struct Timeline {
    pub breakpoints: BreakpointSet,
    pub slides: Vec<types::SlideSegment>,
    pub shape_tree: IntervalTree<ShapeAnnotation>,
    pub panzooms: Vec<types::PanzoomEvent>,
}

/// Builds the merged timeline from already-ingested documents. Ingest
/// itself (parsing `shapes.svg`/`panzooms.xml`) happens one level up,
/// since it needs an `ImageSource`/`FontMetric` the caller owns.
#[must_use]
pub fn build_timeline(
    slides: Vec<types::SlideSegment>,
    shapes: Vec<ShapeAnnotation>,
    panzooms: Vec<types::PanzoomEvent>,
    duration: types::Time,
) -> Timeline {
    let breakpoints = merge_breakpoints(&slides, &shapes, &panzooms, duration);
    let shape_tree = IntervalTree::build(shapes);
    Timeline { breakpoints, slides, shape_tree, panzooms }
}

impl Timeline {
    /// Renders every whiteboard frame and the concat playlist text.
    #[must_use]
    pub fn render_frames(&self, config: &PipelineConfig) -> (Vec<Frame>, String) {
        let frames = emit_frames(
            &self.breakpoints,
            &self.slides,
            &self.panzooms,
            &self.shape_tree,
            &config.layout,
            config.flags.remove_redundant_shapes,
            config.flags.svgz_compression,
        );
        let playlist = build_concat_playlist(&frames);
        (frames, playlist)
    }
}
