//! Per-subsystem error types (spec §7). Each enum covers one failure
//! taxonomy; `compose_job` composes them into one top-level pipeline
//! error at the orchestration edge.

use thiserror::Error;

/// The font-metric oracle is an external collaborator (spec §6); failures
/// calling it are "external tool failure" in spec §7's taxonomy.
#[derive(Debug, Error)]
pub enum FontMetricError {
    #[error("failed to spawn font-metric tool: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("font-metric tool exited with a failure status")]
    NonZeroExit,
    #[error("could not parse font-metric tool output: {0}")]
    UnparseableOutput(String),
}

/// Errors from document ingest: shapes, panzoom, cursor, chat timeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("required input missing: {0}")]
    InputMissing(String),
    #[error("malformed XML in {document}: {reason}")]
    Malformed { document: &'static str, reason: String },
    #[error(transparent)]
    FontMetric(#[from] FontMetricError),
    #[error("I/O error reading {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

/// Errors from chat/whiteboard layout and emission.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    FontMetric(#[from] FontMetricError),
    #[error("failed to write scratch output {path}: {source}")]
    Output { path: String, #[source] source: std::io::Error },
}
