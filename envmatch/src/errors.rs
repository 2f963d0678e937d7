use std::path::PathBuf;

use envcore::error::{CompositionError, EnvelopeError, MatchError};
use thiserror::Error;

/// Errors that abort a whole run before or after the rows are processed.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error("error reading file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error in peptide table: {0}")]
    Csv(#[from] csv::Error),
    #[error("error parsing config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing column {column:?} in {path}, required by {reason}")]
    MissingColumn {
        column: &'static str,
        path: PathBuf,
        reason: &'static str,
    },
    #[error("{path}:{line}: {msg}")]
    Ms1Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("{path}: {msg}")]
    MzmlParse { path: PathBuf, msg: String },
    #[error("could not find .{extension} file for {parent_file:?}")]
    RawFileNotFound {
        parent_file: String,
        extension: &'static str,
    },
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors confined to a single peptide row, the run continues with the next row.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("invalid value {value:?} in column {column:?}")]
    InvalidField { column: &'static str, value: String },
    #[error("{0:?} is an invalid sequence")]
    InvalidSequence(String),
    #[error("no spectra loaded for {0:?}")]
    UnknownParentFile(String),
    #[error("scan {scan} not found in {file}")]
    ScanNotFound { scan: u32, file: String },
    #[error("no precursor scan for scan {scan} in {file}")]
    PrecursorNotFound { scan: u32, file: String },
}
