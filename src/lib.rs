//! # Pipeline Latency Analysis Library
//!
//! Reconstructs end-to-end latency metrics for an instrumented multi-camera
//! perception/control pipeline from the per-stage timing records it emits.
//! No single stage can report how long a frame took from camera capture to
//! final actuation, or how long it sat in an intermediate buffer; this library
//! recovers both by correlating stages on their shared `(camera, frame)`
//! identity.
//!
//! ## Architecture Overview
//!
//! - `event`: parsing raw records into typed events and warm-up filtering
//! - `correlation`: joining terminal events with origin events
//! - `metrics`: nearest-rank order statistics over a sample
//! - `results`: grouping into the aggregate table and the pass report
//! - `analysis`: the `TraceAnalyzer` that runs one full pass
//! - `cli`: configuration and flattenable command-line options
//! - `logging`: tracing subscriber setup
//!
//! ## Usage Example
//!
//! ```rust
//! use pipeline_latency::{AnalysisConfig, CameraLabel, RawRecord, TraceAnalyzer};
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = vec![
//!     RawRecord::new(
//!         "perception_iteration_from_noidle_till_writebuffer-cam_id_1-frame_id_40",
//!         100,
//!         110,
//!         10,
//!     ),
//!     RawRecord::new("ssm_iteration_action-cam_id_1-frame_id_40", 150, 200, 50),
//! ];
//!
//! let analyzer = TraceAnalyzer::new(AnalysisConfig::default())?;
//! let report = analyzer.analyze(&records)?;
//!
//! let runtime = report.table.get("pipeline_runtime", &CameraLabel::All).unwrap();
//! assert_eq!(runtime.stats.p50, 100);
//! # Ok(())
//! # }
//! ```
//!
//! ## Determinism
//!
//! A pass has no hidden state: no randomness, no clocks apart from the
//! report timestamp, and group order follows first appearance in the input.
//! Analyzing the same batch twice yields identical tables.

pub mod analysis;

/// Configuration and command-line options
///
/// `AnalysisArgs` can be flattened into a front end's clap parser and
/// converted into the `AnalysisConfig` that drives a pass.
pub mod cli;

/// Cross-stage correlation of origin and terminal events
pub mod correlation;

pub mod error;

/// Raw record parsing, typed identifiers and warm-up filtering
pub mod event;

pub mod logging;

/// Order statistics over duration samples
pub mod metrics;

/// Aggregate rows, the aggregate table and the pass report
pub mod results;

pub use analysis::TraceAnalyzer;
pub use cli::{AnalysisArgs, AnalysisConfig};
pub use correlation::{correlate, CorrelatedSample, Correlation, CorrelationRule};
pub use error::{AnalysisError, ParseError};
pub use event::{CameraId, CorrelationKey, Event, EventParser, EventSet, FrameId, RawRecord, RawValue, TimerType};
pub use metrics::{Statistics, STAT_COLUMNS};
pub use results::{AggregateRow, AggregateTable, AnalysisReport, CameraBreakdown, CameraLabel, TypeMatcher};

/// The current version of the analysis library
///
/// Recorded in every report so results can be traced to the code that
/// produced them.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// These match the instrumentation of the multi-camera perception pipeline
/// the library was built for.
pub mod defaults {
    /// Frames below this index are warm-up.
    ///
    /// The first 30 frames of a run cover camera start-up and model loading
    /// and are not representative of steady-state latency.
    pub const WARMUP_THRESHOLD: i64 = 30;

    /// Stage that covers a frame from camera read until it is written to the buffer
    pub const ORIGIN_TIMER_TYPE: &str = "perception_iteration_from_noidle_till_writebuffer";

    /// Stage that acts on one or more buffered frames
    pub const TERMINAL_TIMER_TYPE: &str = "ssm_iteration_action";

    /// Timer types containing this text get per-camera rows
    pub const PER_CAMERA_MARKER: &str = "perception";

    /// Aggregate row name of the end-to-end runtime
    pub const PIPELINE_RUNTIME_TYPE: &str = "pipeline_runtime";

    /// Aggregate row name of the buffer wait
    pub const BUFFER_WAIT_TYPE: &str = "pipeline_wait_in_buffer";
}
