//! Typed error kinds for the analysis pass.
//!
//! Per-record and per-sample problems are modelled here so that callers can
//! match on them. Only [`AnalysisError::UnreadableBatch`] aborts a whole pass;
//! everything else is handled where it occurs and counted in the pass
//! diagnostics.

use thiserror::Error;

/// A raw record that could not be turned into an [`Event`](crate::event::Event).
///
/// The record is dropped and processing continues with the next one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing mandatory field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has non-integral value `{value}`")]
    MalformedField { field: &'static str, value: String },

    #[error("{cameras} camera markers but {frames} frame markers")]
    MarkerCountMismatch { cameras: usize, frames: usize },

    #[error("end time {end} precedes start time {start}")]
    InvertedInterval { start: i64, end: i64 },
}

/// Failures surfaced to the caller of the statistics layer or the analyzer.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Aggregating zero values is refused rather than producing a degenerate row.
    #[error("cannot compute statistics over an empty sample")]
    EmptySample,

    /// Every record of a non-empty batch failed to parse.
    #[error("none of the {records} records in the batch could be parsed")]
    UnreadableBatch { records: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("configuration could not be decoded: {0}")]
    ConfigDecode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
