use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Percentiles reported for every sample, in column order.
pub const REPORTED_PERCENTILES: [u32; 5] = [10, 25, 50, 75, 90];

/// Statistic column names, in the order downstream writers must emit them.
pub const STAT_COLUMNS: [&str; 9] = [
    "num", "min", "p10", "p25", "p50", "p75", "p90", "max", "avg",
];

/// Order statistics over one sample of durations
///
/// Field order is the column contract: `num, min, p10, p25, p50, p75, p90, max, avg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub num: usize,
    pub min: i64,
    pub p10: i64,
    pub p25: i64,
    pub p50: i64,
    pub p75: i64,
    pub p90: i64,
    pub max: i64,
    pub avg: f64,
}

impl Statistics {
    /// Compute statistics over a sample
    ///
    /// Percentiles use the nearest-rank rule described in [`nearest_rank`].
    /// An empty sample is refused with [`AnalysisError::EmptySample`].
    pub fn from_sample(values: &[i64]) -> Result<Self> {
        if values.is_empty() {
            return Err(AnalysisError::EmptySample);
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let n = sorted.len();
        let sum: i128 = sorted.iter().map(|&v| v as i128).sum();

        Ok(Self {
            num: n,
            min: sorted[0],
            p10: sorted[nearest_rank(10, n)],
            p25: sorted[nearest_rank(25, n)],
            p50: sorted[nearest_rank(50, n)],
            p75: sorted[nearest_rank(75, n)],
            p90: sorted[nearest_rank(90, n)],
            max: sorted[n - 1],
            avg: sum as f64 / n as f64,
        })
    }

    /// Look up one of the reported percentiles
    pub fn percentile(&self, percentile: u32) -> Option<i64> {
        match percentile {
            10 => Some(self.p10),
            25 => Some(self.p25),
            50 => Some(self.p50),
            75 => Some(self.p75),
            90 => Some(self.p90),
            _ => None,
        }
    }
}

/// Index of percentile `p` in a sorted sample of length `n`
///
/// `floor(p / 100 * n)`, evaluated in integer arithmetic and clamped to the
/// last element. No interpolation, so small samples lean towards the upper
/// neighbour: the median of ten values is the sixth.
pub fn nearest_rank(percentile: u32, n: usize) -> usize {
    let index = percentile as usize * n / 100;
    index.min(n.saturating_sub(1))
}

/// Utility functions for presenting metric values
pub mod utils {
    /// Format a microsecond value for human-readable output
    ///
    /// Timestamps in the recorded traces are microseconds; values are shown
    /// in the largest unit that keeps them above one. Negative values are
    /// anomalies but are still formatted.
    pub fn format_micros(value_us: i64) -> String {
        let sign = if value_us < 0 { "-" } else { "" };
        let magnitude = value_us.unsigned_abs();

        if magnitude < 1_000 {
            format!("{}{}μs", sign, magnitude)
        } else if magnitude < 1_000_000 {
            format!("{}{:.2}ms", sign, magnitude as f64 / 1_000.0)
        } else {
            format!("{}{:.2}s", sign, magnitude as f64 / 1_000_000.0)
        }
    }
}
