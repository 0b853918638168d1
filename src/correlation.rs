//! # Cross-Stage Correlation
//!
//! Reconstructs end-to-end latency for frames that pass through several
//! pipeline stages. Each stage reports its own interval; only by joining the
//! stages on a shared `(camera, frame)` identity can the total runtime of a
//! frame be recovered.
//!
//! ## Roles
//!
//! - **Origin** events mark a frame becoming available (camera read through
//!   buffer write). Each origin refers to exactly one `(camera, frame)` pair.
//! - **Terminal** events mark the end of the pipeline for one or more frames.
//!   A terminal event may consume frames from several cameras at once.
//!
//! ## Derived metrics
//!
//! For a terminal event matched against origins `O`:
//!
//! - `pipeline_runtime = terminal.end_time - min(O.start_time)`
//! - `buffer_wait = terminal.start_time - max(O.end_time)`
//!
//! Values are never clamped; a negative value means the timestamps disagree
//! and is left for the statistics layer to expose.
//!
//! The origin index is built completely before any terminal event is
//! resolved, so the min/max reduction sees every candidate regardless of
//! input order.

use crate::event::{CorrelationKey, Event, EventSet, TimerType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Which stage opens and which stage closes a frame's journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRule {
    pub origin: TimerType,
    pub terminal: TimerType,
}

impl Default for CorrelationRule {
    fn default() -> Self {
        Self {
            origin: TimerType::new(crate::defaults::ORIGIN_TIMER_TYPE),
            terminal: TimerType::new(crate::defaults::TERMINAL_TIMER_TYPE),
        }
    }
}

/// Origin events of one batch, keyed by their single `(camera, frame)` pair.
pub struct OriginIndex<'a> {
    by_key: HashMap<CorrelationKey, Vec<&'a Event>>,
    multi_key_origins: usize,
}

impl<'a> OriginIndex<'a> {
    /// Index every event of the origin stage.
    ///
    /// Origins that refer to more than one pair cannot be attributed to a
    /// single frame and are left out of the index.
    pub fn build(events: &'a EventSet, origin: &TimerType) -> Self {
        let mut by_key: HashMap<CorrelationKey, Vec<&'a Event>> = HashMap::new();
        let mut multi_key_origins = 0;

        for (_, event) in events.of_type(origin.as_str()) {
            match event.single_key() {
                Some(key) => by_key.entry(key).or_default().push(event),
                None => {
                    warn!(
                        "Origin event '{}' refers to {} frames; it is not indexed",
                        event.raw_description(),
                        event.frame_ids().len()
                    );
                    multi_key_origins += 1;
                }
            }
        }

        Self {
            by_key,
            multi_key_origins,
        }
    }

    pub fn lookup(&self, key: &CorrelationKey) -> &[&'a Event] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct keys in the index.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Keys served by more than one origin event.
    pub fn duplicate_keys(&self) -> usize {
        self.by_key.values().filter(|origins| origins.len() > 1).count()
    }
}

/// Both derived metrics for one terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatedSample {
    /// Position of the terminal event in the batch.
    pub event_index: usize,
    /// Number of the terminal event's pairs that found an origin.
    pub matched_keys: usize,
    pub pipeline_runtime: i64,
    pub buffer_wait: i64,
}

/// Counters describing one correlation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationStats {
    pub origin_events: usize,
    pub terminal_events: usize,
    pub unmatched_keys: usize,
    pub unmatched_terminals: usize,
    pub duplicate_origin_keys: usize,
    pub multi_key_origins: usize,
    /// Matched terminals whose derived metrics do not fit an `i64`.
    pub overflowed_samples: usize,
}

/// Output of a correlation pass, in terminal batch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub samples: Vec<CorrelatedSample>,
    pub stats: CorrelationStats,
}

impl Correlation {
    pub fn pipeline_runtimes(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.pipeline_runtime).collect()
    }

    pub fn buffer_waits(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.buffer_wait).collect()
    }
}

/// Tightest bounds over every origin matched by one terminal event.
#[derive(Debug, Clone, Copy)]
struct OriginBounds {
    oldest_start: i64,
    newest_end: i64,
}

impl OriginBounds {
    fn widen(bounds: Option<Self>, origin: &Event) -> Option<Self> {
        Some(match bounds {
            None => Self {
                oldest_start: origin.start_time(),
                newest_end: origin.end_time(),
            },
            Some(b) => Self {
                oldest_start: b.oldest_start.min(origin.start_time()),
                newest_end: b.newest_end.max(origin.end_time()),
            },
        })
    }

    /// `(pipeline_runtime, buffer_wait)` of `terminal`, or `None` on overflow.
    fn derive(&self, terminal: &Event) -> Option<(i64, i64)> {
        let pipeline_runtime = terminal.end_time().checked_sub(self.oldest_start)?;
        let buffer_wait = terminal.start_time().checked_sub(self.newest_end)?;
        Some((pipeline_runtime, buffer_wait))
    }
}

/// Correlate every terminal event of the batch with its origins.
pub fn correlate(events: &EventSet, rule: &CorrelationRule) -> Correlation {
    let index = OriginIndex::build(events, &rule.origin);
    let mut stats = CorrelationStats {
        origin_events: events.of_type(rule.origin.as_str()).count(),
        duplicate_origin_keys: index.duplicate_keys(),
        multi_key_origins: index.multi_key_origins,
        ..CorrelationStats::default()
    };
    if stats.duplicate_origin_keys > 0 {
        debug!(
            "{} keys are served by more than one '{}' event",
            stats.duplicate_origin_keys, rule.origin
        );
    }

    let mut samples = Vec::new();
    for (event_index, terminal) in events.of_type(rule.terminal.as_str()) {
        stats.terminal_events += 1;

        let mut bounds = None;
        let mut matched_keys = 0;
        for key in terminal.keys() {
            let origins = index.lookup(&key);
            if origins.is_empty() {
                warn!(
                    "No '{}' event found for {} referenced by '{}'",
                    rule.origin,
                    key,
                    terminal.raw_description()
                );
                stats.unmatched_keys += 1;
                continue;
            }
            matched_keys += 1;
            bounds = origins.iter().fold(bounds, |b, origin| OriginBounds::widen(b, origin));
        }

        match bounds {
            Some(b) => match b.derive(terminal) {
                Some((pipeline_runtime, buffer_wait)) => samples.push(CorrelatedSample {
                    event_index,
                    matched_keys,
                    pipeline_runtime,
                    buffer_wait,
                }),
                None => {
                    warn!(
                        "Derived metrics of '{}' overflow; it yields no sample",
                        terminal.raw_description()
                    );
                    stats.overflowed_samples += 1;
                }
            },
            None => {
                warn!(
                    "Terminal event '{}' matched no origin; it yields no sample",
                    terminal.raw_description()
                );
                stats.unmatched_terminals += 1;
            }
        }
    }

    info!(
        "Correlated {} of {} '{}' events against {} '{}' keys",
        samples.len(),
        stats.terminal_events,
        rule.terminal,
        index.len(),
        rule.origin
    );

    Correlation { samples, stats }
}
