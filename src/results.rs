use crate::{
    cli::AnalysisConfig,
    correlation::{Correlation, CorrelationStats},
    error::Result,
    event::{CameraId, EventSet, TimerType},
    metrics::{utils::format_micros, Statistics, REPORTED_PERCENTILES},
};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tracing::{debug, warn};

/// Camera column of an aggregate row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CameraLabel {
    /// Every event of the type, regardless of camera
    All,
    /// Events whose camera-id sequence equals this one
    Cameras(Vec<CameraId>),
}

impl CameraLabel {
    pub fn camera(id: i64) -> Self {
        CameraLabel::Cameras(vec![CameraId(id)])
    }
}

impl fmt::Display for CameraLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraLabel::All => f.write_str("all"),
            CameraLabel::Cameras(ids) => {
                let ids: Vec<String> = ids.iter().map(CameraId::to_string).collect();
                f.write_str(&ids.join("+"))
            }
        }
    }
}

impl Serialize for CameraLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One rule deciding whether a timer type gets per-camera rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "match", content = "value")]
pub enum TypeMatcher {
    Contains(String),
    Prefix(String),
    Exact(String),
}

impl TypeMatcher {
    pub fn matches(&self, timer_type: &str) -> bool {
        match self {
            TypeMatcher::Contains(needle) => timer_type.contains(needle.as_str()),
            TypeMatcher::Prefix(prefix) => timer_type.starts_with(prefix.as_str()),
            TypeMatcher::Exact(name) => timer_type == name.as_str(),
        }
    }
}

/// Classifier selecting the timer types that are broken down per camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraBreakdown {
    pub rules: Vec<TypeMatcher>,
}

impl CameraBreakdown {
    /// A classifier that never breaks down
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn applies_to(&self, timer_type: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(timer_type))
    }
}

impl Default for CameraBreakdown {
    fn default() -> Self {
        Self {
            rules: vec![TypeMatcher::Contains(
                crate::defaults::PER_CAMERA_MARKER.to_string(),
            )],
        }
    }
}

/// Statistics for one `(timer type, camera)` group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(rename = "type")]
    pub timer_type: TimerType,
    #[serde(rename = "camera_id")]
    pub camera: CameraLabel,
    #[serde(flatten)]
    pub stats: Statistics,
}

impl AggregateRow {
    pub fn new(timer_type: TimerType, camera: CameraLabel, values: &[i64]) -> Result<Self> {
        Ok(Self {
            timer_type,
            camera,
            stats: Statistics::from_sample(values)?,
        })
    }
}

impl fmt::Display for AggregateRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: n={} min={}",
            self.timer_type,
            self.camera,
            self.stats.num,
            format_micros(self.stats.min)
        )?;
        for p in REPORTED_PERCENTILES {
            if let Some(value) = self.stats.percentile(p) {
                write!(f, " p{}={}", p, format_micros(value))?;
            }
        }
        write!(f, " max={}", format_micros(self.stats.max))
    }
}

/// Durations of every event of `timer_type`, one `all` row plus per-camera rows if classified
pub fn aggregate_type(
    events: &EventSet,
    timer_type: &TimerType,
    breakdown: &CameraBreakdown,
) -> Result<Vec<AggregateRow>> {
    let durations: Vec<i64> = events
        .of_type(timer_type.as_str())
        .map(|(_, event)| event.duration())
        .collect();
    let mut rows = vec![AggregateRow::new(
        timer_type.clone(),
        CameraLabel::All,
        &durations,
    )?];

    if breakdown.applies_to(timer_type.as_str()) {
        for cameras in events.camera_groups(timer_type.as_str()) {
            let durations: Vec<i64> = events
                .of_type(timer_type.as_str())
                .filter(|(_, event)| event.camera_ids() == cameras)
                .map(|(_, event)| event.duration())
                .collect();
            rows.push(AggregateRow::new(
                timer_type.clone(),
                CameraLabel::Cameras(cameras.to_vec()),
                &durations,
            )?);
        }
    }

    Ok(rows)
}

/// The aggregate table of one analysis pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregateTable {
    rows: Vec<AggregateRow>,
}

impl AggregateTable {
    /// Aggregate every timer type of the batch, then the two derived metrics
    ///
    /// A derived metric without samples gets no row, and neither does one
    /// whose name is already taken by an input timer type.
    pub fn build(
        events: &EventSet,
        correlation: &Correlation,
        breakdown: &CameraBreakdown,
    ) -> Result<Self> {
        let mut rows = Vec::new();
        for timer_type in events.timer_types() {
            rows.extend(aggregate_type(events, timer_type, breakdown)?);
        }

        let derived = [
            (crate::defaults::PIPELINE_RUNTIME_TYPE, correlation.pipeline_runtimes()),
            (crate::defaults::BUFFER_WAIT_TYPE, correlation.buffer_waits()),
        ];
        for (name, values) in derived {
            if values.is_empty() {
                warn!("No correlated samples; skipping '{}' row", name);
                continue;
            }
            if events.timer_types().iter().any(|timer_type| timer_type.as_str() == name) {
                warn!(
                    "Input already has a '{}' timer type; skipping the derived row",
                    name
                );
                continue;
            }
            rows.push(AggregateRow::new(TimerType::new(name), CameraLabel::All, &values)?);
        }

        debug!("Built aggregate table with {} rows", rows.len());
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AggregateRow> {
        self.rows.iter()
    }

    pub fn get(&self, timer_type: &str, camera: &CameraLabel) -> Option<&AggregateRow> {
        self.rows
            .iter()
            .find(|row| row.timer_type == *timer_type && row.camera == *camera)
    }

    /// `all` rows of the requested types, in request order
    ///
    /// Types without a row are skipped.
    pub fn overview(&self, timer_types: &[&str]) -> Vec<&AggregateRow> {
        timer_types
            .iter()
            .filter_map(|timer_type| self.get(timer_type, &CameraLabel::All))
            .collect()
    }
}

impl<'a> IntoIterator for &'a AggregateTable {
    type Item = &'a AggregateRow;
    type IntoIter = std::slice::Iter<'a, AggregateRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Counters collected over one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub records_seen: usize,
    pub parse_failures: usize,
    pub warmup_dropped: usize,
    pub events_retained: usize,
    pub correlation: CorrelationStats,
}

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub config: AnalysisConfig,
}

/// Everything one analysis pass produces
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub events: EventSet,
    pub correlation: Correlation,
    pub table: AggregateTable,
    pub diagnostics: Diagnostics,
}
