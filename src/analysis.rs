//! # Analysis Pass
//!
//! Runs one complete pass over a batch of raw timing records:
//!
//! 1. **Normalize**: parse every record and drop warm-up events
//! 2. **Correlate**: join terminal events with their origins
//! 3. **Aggregate**: reduce every group to order statistics
//!
//! Each stage borrows the output of the previous one and returns a new owned
//! collection, so the same batch can be analyzed any number of times with
//! identical results.

use crate::{
    cli::AnalysisConfig,
    correlation::correlate,
    error::AnalysisError,
    event::{EventParser, RawRecord},
    results::{AggregateTable, AnalysisReport, Diagnostics, ReportMetadata},
};
use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, info};

/// Displays the configuration of a pass in the log.
struct AnalysisConfigDisplay<'a>(&'a AnalysisConfig);

impl<'a> fmt::Display for AnalysisConfigDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.0;
        let per_camera: Vec<String> = config
            .per_camera
            .rules
            .iter()
            .map(|rule| format!("{:?}", rule))
            .collect();

        writeln!(f, "Analysis configuration:")?;
        writeln!(f, "  Warm-up Threshold:  {}", config.warmup_threshold)?;
        writeln!(f, "  Origin Type:        {}", config.correlation.origin)?;
        writeln!(f, "  Terminal Type:      {}", config.correlation.terminal)?;
        write!(f, "  Per-camera Rules:   {}", per_camera.join(", "))
    }
}

/// Runs analysis passes with a fixed configuration.
///
/// Holds no per-pass state; one analyzer can serve any number of batches,
/// including from several threads.
#[derive(Debug, Clone)]
pub struct TraceAnalyzer {
    config: AnalysisConfig,
    parser: EventParser,
}

impl TraceAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate().context("Rejected analysis configuration")?;
        let parser = EventParser::new().context("Failed to compile marker patterns")?;
        Ok(Self { config, parser })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one batch.
    ///
    /// Problems with single records or samples are logged and counted in the
    /// report's diagnostics. The pass fails only if none of the records of a
    /// non-empty batch can be parsed.
    pub fn analyze(&self, records: &[RawRecord]) -> Result<AnalysisReport> {
        debug!("{}", AnalysisConfigDisplay(&self.config));
        info!("Analyzing {} records", records.len());

        let outcome = self
            .parser
            .normalize(records, self.config.warmup_threshold);
        if outcome.records_seen > 0 && outcome.parse_failures == outcome.records_seen {
            return Err(AnalysisError::UnreadableBatch {
                records: outcome.records_seen,
            })
            .context("Aborting analysis pass");
        }
        info!(
            "Retained {} events ({} warm-up, {} unparsable)",
            outcome.events.len(),
            outcome.warmup_dropped,
            outcome.parse_failures
        );

        let correlation = correlate(&outcome.events, &self.config.correlation);
        let table = AggregateTable::build(&outcome.events, &correlation, &self.config.per_camera)
            .context("Failed to aggregate statistics")?;
        for row in &table {
            debug!("{}", row);
        }

        let diagnostics = Diagnostics {
            records_seen: outcome.records_seen,
            parse_failures: outcome.parse_failures,
            warmup_dropped: outcome.warmup_dropped,
            events_retained: outcome.events.len(),
            correlation: correlation.stats,
        };

        Ok(AnalysisReport {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                config: self.config.clone(),
            },
            events: outcome.events,
            correlation,
            table,
            diagnostics,
        })
    }
}
