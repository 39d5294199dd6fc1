//! Error taxonomy for the per-file plotting pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failures that can occur while turning one input into a chart.
///
/// Whether an error ends the run or only skips a file is decided by the
/// caller: `NotFound` is fatal for fixed inputs and a skip in a batch.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("input not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cell {value:?} in column {column} is not numeric")]
    MalformedCell { column: String, value: String },

    #[error("malformed input {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("no recognized series in {} (expected one of: {})", path.display(), expected.join(", "))]
    EmptySeries { path: PathBuf, expected: Vec<String> },

    #[error("failed to export {}: {reason}", path.display())]
    ExportFailure { path: PathBuf, reason: String },

    #[error("unknown mode {token:?} (expected one of: {})", expected.join(", "))]
    UnknownMode { token: String, expected: Vec<String> },
}

