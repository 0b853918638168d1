//! # Event Parsing and Normalization
//!
//! Turns raw timing records into strongly typed [`Event`]s. A raw record is a
//! free-text description plus three scalar timestamps, for example:
//!
//! ```text
//! perception_writebuffer-cam_id_1-frame_id_26,1744882792782243,1744882792782247,4
//! ```
//!
//! The description carries the stage name and any number of `cam_id_<N>` /
//! `frame_id_<N>` markers. Parsing extracts those markers into ordered id
//! sequences and derives the canonical [`TimerType`] from the text before the
//! first camera marker.
//!
//! ## Warm-up filtering
//!
//! Frames below the configured warm-up threshold were recorded before the
//! pipeline reached steady state. [`EventParser::normalize`] drops every event
//! with at least one such frame id. Events without any frame marker carry the
//! sentinel frame id `-1` and are therefore dropped too unless the threshold is
//! `-1` or lower.

use crate::error::{AnalysisError, ParseError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Camera identifier parsed from a `cam_id_<N>` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(pub i64);

impl CameraId {
    /// Stand-in used when a description has no camera marker.
    pub const UNKNOWN: CameraId = CameraId(-1);
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame index parsed from a `frame_id_<N>` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub i64);

impl FrameId {
    /// Stand-in used when a description has no frame marker.
    pub const UNKNOWN: FrameId = FrameId(-1);
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical stage identifier, e.g. `perception_writebuffer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerType(String);

impl TimerType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimerType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for TimerType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TimerType {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// The `(camera, frame)` pair used to match events across pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationKey {
    pub camera: CameraId,
    pub frame: FrameId,
}

impl CorrelationKey {
    pub fn new(camera: CameraId, frame: FrameId) -> Self {
        Self { camera, frame }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cam_id_{}-frame_id_{}", self.camera, self.frame)
    }
}

/// A scalar as handed over by a loading collaborator.
///
/// Tabular sources disagree on how they type numbers, so integers, floats and
/// numeric text are all accepted as long as they denote an integral value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    fn to_i64(&self, field: &'static str) -> Result<i64, ParseError> {
        let malformed = || ParseError::MalformedField {
            field,
            value: self.to_string(),
        };

        match self {
            RawValue::Integer(value) => Ok(*value),
            RawValue::Float(value) => integral_float(*value).ok_or_else(malformed),
            RawValue::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(integral_float))
                    .ok_or_else(malformed)
            }
        }
    }
}

fn integral_float(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Integer(value) => write!(f, "{}", value),
            RawValue::Float(value) => write!(f, "{}", value),
            RawValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

/// One unparsed timing record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub description: Option<String>,
    pub start_time: Option<RawValue>,
    pub end_time: Option<RawValue>,
    pub duration: Option<RawValue>,
}

impl RawRecord {
    /// Build a fully populated record.
    pub fn new(description: impl Into<String>, start_time: i64, end_time: i64, duration: i64) -> Self {
        Self {
            description: Some(description.into()),
            start_time: Some(start_time.into()),
            end_time: Some(end_time.into()),
            duration: Some(duration.into()),
        }
    }
}

/// A normalized timing event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    raw_description: String,
    timer_type: TimerType,
    camera_ids: Vec<CameraId>,
    frame_ids: Vec<FrameId>,
    start_time: i64,
    end_time: i64,
    duration: i64,
}

impl Event {
    pub fn raw_description(&self) -> &str {
        &self.raw_description
    }

    pub fn timer_type(&self) -> &TimerType {
        &self.timer_type
    }

    pub fn camera_ids(&self) -> &[CameraId] {
        &self.camera_ids
    }

    pub fn frame_ids(&self) -> &[FrameId] {
        &self.frame_ids
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    /// Every `(camera, frame)` pair this event refers to, in description order.
    pub fn keys(&self) -> impl Iterator<Item = CorrelationKey> + '_ {
        self.camera_ids
            .iter()
            .zip(&self.frame_ids)
            .map(|(&camera, &frame)| CorrelationKey::new(camera, frame))
    }

    /// The key of an event that refers to exactly one pair.
    pub fn single_key(&self) -> Option<CorrelationKey> {
        match (self.camera_ids.as_slice(), self.frame_ids.as_slice()) {
            ([camera], [frame]) => Some(CorrelationKey::new(*camera, *frame)),
            _ => None,
        }
    }

    /// Whether every frame of this event is at or beyond the warm-up threshold.
    pub fn is_past_warmup(&self, threshold: i64) -> bool {
        self.frame_ids.iter().all(|frame| frame.0 >= threshold)
    }
}

/// Parses raw records into events.
///
/// Holds the compiled marker patterns so that a batch is parsed without
/// recompiling them per record.
#[derive(Debug, Clone)]
pub struct EventParser {
    camera_marker: Regex,
    frame_marker: Regex,
}

/// Text that separates the stage name from its markers.
const CAMERA_MARKER_PREFIX: &str = "cam_id";

impl EventParser {
    pub fn new() -> Result<Self, AnalysisError> {
        Ok(Self {
            camera_marker: Regex::new(r"cam_id_([0-9]+)")?,
            frame_marker: Regex::new(r"frame_id_([0-9]+)")?,
        })
    }

    /// Parse a single record. Does not apply the warm-up filter.
    pub fn parse(&self, record: &RawRecord) -> Result<Event, ParseError> {
        let description = record
            .description
            .as_deref()
            .ok_or(ParseError::MissingField("description"))?;
        let start_time = required(&record.start_time, "start_time")?;
        let end_time = required(&record.end_time, "end_time")?;
        let duration = required(&record.duration, "duration")?;

        if end_time < start_time {
            return Err(ParseError::InvertedInterval {
                start: start_time,
                end: end_time,
            });
        }

        let camera_ids = ids_or_sentinel(&self.camera_marker, description, CameraId, CameraId::UNKNOWN);
        let frame_ids = ids_or_sentinel(&self.frame_marker, description, FrameId, FrameId::UNKNOWN);
        if camera_ids.len() != frame_ids.len() {
            return Err(ParseError::MarkerCountMismatch {
                cameras: camera_ids.len(),
                frames: frame_ids.len(),
            });
        }

        Ok(Event {
            raw_description: description.to_string(),
            timer_type: timer_type_of(description),
            camera_ids,
            frame_ids,
            start_time,
            end_time,
            duration,
        })
    }

    /// Parse a batch and drop warm-up events.
    ///
    /// Records that fail to parse are logged and counted, never fatal.
    pub fn normalize<'a, I>(&self, records: I, warmup_threshold: i64) -> NormalizeOutcome
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        let mut outcome = NormalizeOutcome::default();
        let mut events = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            outcome.records_seen += 1;
            match self.parse(record) {
                Ok(event) if event.is_past_warmup(warmup_threshold) => events.push(event),
                Ok(event) => {
                    debug!(
                        "Dropping warm-up event '{}' (frames {:?})",
                        event.raw_description, event.frame_ids
                    );
                    outcome.warmup_dropped += 1;
                }
                Err(e) => {
                    warn!("Skipping record {}: {}", index, e);
                    outcome.parse_failures += 1;
                }
            }
        }

        outcome.events = EventSet::from(events);
        outcome
    }
}

fn required(value: &Option<RawValue>, field: &'static str) -> Result<i64, ParseError> {
    value
        .as_ref()
        .ok_or(ParseError::MissingField(field))?
        .to_i64(field)
}

/// Collect every marker value in order, falling back to a single sentinel.
///
/// Digit runs too long for an `i64` are treated as no match.
fn ids_or_sentinel<T>(pattern: &Regex, description: &str, wrap: fn(i64) -> T, sentinel: T) -> Vec<T> {
    let ids: Vec<T> = pattern
        .captures_iter(description)
        .filter_map(|caps| caps[1].parse::<i64>().ok())
        .map(wrap)
        .collect();

    if ids.is_empty() {
        vec![sentinel]
    } else {
        ids
    }
}

/// Stage name: everything before the first camera marker, minus trailing separators.
pub fn timer_type_of(description: &str) -> TimerType {
    let stage = description
        .split(CAMERA_MARKER_PREFIX)
        .next()
        .unwrap_or(description);
    TimerType::new(stage.trim_end_matches(&['-', '_'][..]))
}

/// Result of normalizing one batch of records.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub events: EventSet,
    pub records_seen: usize,
    pub parse_failures: usize,
    pub warmup_dropped: usize,
}

/// The filtered events of one batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EventSet {
    events: Vec<Event>,
}

impl EventSet {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Events of one stage, keeping their batch index.
    pub fn of_type<'a, 't>(&'a self, timer_type: &'t str) -> impl Iterator<Item = (usize, &'a Event)> + 't
    where
        'a: 't,
    {
        self.events
            .iter()
            .enumerate()
            .filter(move |(_, event)| event.timer_type == *timer_type)
    }

    /// Distinct stage names in order of first appearance.
    pub fn timer_types(&self) -> Vec<&TimerType> {
        let mut seen: Vec<&TimerType> = Vec::new();
        for event in &self.events {
            if !seen.contains(&&event.timer_type) {
                seen.push(&event.timer_type);
            }
        }
        seen
    }

    /// Distinct camera-id sequences observed for one stage, in order of first appearance.
    pub fn camera_groups(&self, timer_type: &str) -> Vec<&[CameraId]> {
        let mut seen: Vec<&[CameraId]> = Vec::new();
        for event in self.events.iter().filter(|e| e.timer_type == *timer_type) {
            if !seen.contains(&event.camera_ids.as_slice()) {
                seen.push(&event.camera_ids);
            }
        }
        seen
    }
}

impl From<Vec<Event>> for EventSet {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl<'a> IntoIterator for &'a EventSet {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
