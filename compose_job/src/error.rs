//! Top-level pipeline error (spec §7): composes every subsystem's error
//! type and maps each to a distinct process exit code so a calling
//! supervisor can tell ingest failures from tool failures from I/O faults.

use compose_engine::{IngestError, LayoutError};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("failed to spawn {tool}: {source}")]
    Spawn { tool: &'static str, source: std::io::Error },
    #[error("{tool} exited with a failure status")]
    ToolFailed { tool: &'static str },
    #[error("scratch I/O error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

impl PipelineError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Ingest(_) => ExitCode::from(10),
            Self::Layout(_) => ExitCode::from(11),
            Self::Spawn { .. } | Self::ToolFailed { .. } => ExitCode::from(12),
            Self::Io { .. } => ExitCode::from(13),
        }
    }
}
