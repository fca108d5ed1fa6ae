//! Deployment-wide configuration: filesystem roots plus every setting that
//! used to be a per-invocation CLI flag before the CLI surface shrank to
//! `--meeting-id`/`--format`/`--log-stdout`. Feature flags and layout
//! constants fall back to their source-derived defaults when the
//! environment doesn't set them.

use serde::Deserialize;
use std::path::PathBuf;
use types::{FeatureFlags, LayoutConstants};

fn default_crf() -> u8 {
    23
}

fn default_cpu_threads() -> usize {
    std::thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(1)
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvConfig {
    pub published_root: PathBuf,
    pub scratch_root: PathBuf,
    pub video_root: PathBuf,

    #[serde(default)]
    pub flags: FeatureFlags,
    #[serde(default)]
    pub layout: LayoutConstants,

    #[serde(default = "default_crf")]
    pub constant_rate_factor: u8,
    #[serde(default = "default_cpu_threads")]
    pub cpu_threads: usize,
}
