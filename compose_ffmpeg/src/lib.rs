//! Filter-graph assembly, the encoder invocation, and the chapter/caption
//! muxing pass that turns `compose_engine`'s timeline into the final MP4
//! (spec §4.8-§4.9). `font_metric` supplies the real `FontMetric` the ingest
//! stage needs when wrapping shape text.

pub mod chapters;
pub mod filtergraph;
pub mod font_metric;

pub use chapters::{
    build_caption_mux_command, build_chapter_remux_command, build_chapters, render_ffmetadata, ChapterEntry,
};
pub use filtergraph::{build_encode_command, build_filter_complex, FilterGraphSpec};
pub use font_metric::ExternalFontMetric;
