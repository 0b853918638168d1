use crate::correlation::CorrelationRule;
use crate::error::{AnalysisError, Result};
use crate::event::TimerType;
use crate::results::{CameraBreakdown, TypeMatcher};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Analysis options, meant to be flattened into a front end's own parser
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Frames with a lower index are warm-up and excluded
    #[clap(long, default_value_t = crate::defaults::WARMUP_THRESHOLD, allow_negative_numbers = true, help_heading = "Analysis Options")]
    pub warmup_threshold: i64,

    /// Timer type that marks a frame entering the pipeline
    #[clap(long, default_value = crate::defaults::ORIGIN_TIMER_TYPE, help_heading = "Analysis Options")]
    pub origin_type: String,

    /// Timer type that marks a frame leaving the pipeline
    #[clap(long, default_value = crate::defaults::TERMINAL_TIMER_TYPE, help_heading = "Analysis Options")]
    pub terminal_type: String,

    /// Timer types containing this text get per-camera statistics (repeatable)
    #[clap(long = "per-camera", default_values_t = vec![crate::defaults::PER_CAMERA_MARKER.to_string()], help_heading = "Analysis Options")]
    pub per_camera_markers: Vec<String>,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// Directory for a copy of the log output
    #[clap(long)]
    pub log_dir: Option<PathBuf>,
}

/// Configuration for one analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub warmup_threshold: i64,
    pub correlation: CorrelationRule,
    pub per_camera: CameraBreakdown,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            warmup_threshold: crate::defaults::WARMUP_THRESHOLD,
            correlation: CorrelationRule::default(),
            per_camera: CameraBreakdown::default(),
        }
    }
}

impl AnalysisConfig {
    /// Decode and validate a JSON configuration; absent keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rule = &self.correlation;
        if rule.origin.as_str().is_empty() || rule.terminal.as_str().is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "origin and terminal timer types must not be empty".to_string(),
            ));
        }
        if rule.origin == rule.terminal {
            return Err(AnalysisError::InvalidConfig(format!(
                "origin and terminal timer types are both '{}'",
                rule.origin
            )));
        }
        Ok(())
    }
}

impl From<&AnalysisArgs> for AnalysisConfig {
    fn from(args: &AnalysisArgs) -> Self {
        Self {
            warmup_threshold: args.warmup_threshold,
            correlation: CorrelationRule {
                origin: TimerType::new(args.origin_type.as_str()),
                terminal: TimerType::new(args.terminal_type.as_str()),
            },
            per_camera: CameraBreakdown {
                rules: args
                    .per_camera_markers
                    .iter()
                    .map(|marker| TypeMatcher::Contains(marker.clone()))
                    .collect(),
            },
        }
    }
}
