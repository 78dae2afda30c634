use crate::{
    ConfigError, Threshold, ThresholdError, Thresholds, DEFAULT_GRACEFUL_RAMP_DOWN,
    DEFAULT_GRACEFUL_STOP, DEFAULT_SCENARIO_NAME,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// A time-boxed ramp towards `target` concurrent virtual users.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Global cap on transactions per second across every VU.
    #[serde(default)]
    pub rps: Option<NonZeroU32>,
    #[serde(default = "default_graceful_ramp_down", with = "humantime_serde")]
    pub graceful_ramp_down: Duration,
    #[serde(default = "default_graceful_stop", with = "humantime_serde")]
    pub graceful_stop: Duration,
}

fn default_name() -> String {
    DEFAULT_SCENARIO_NAME.to_string()
}

fn default_graceful_ramp_down() -> Duration {
    DEFAULT_GRACEFUL_RAMP_DOWN
}

fn default_graceful_stop() -> Duration {
    DEFAULT_GRACEFUL_STOP
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SCENARIO_NAME)
    }
}

impl ScenarioConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stages: vec![],
            thresholds: Thresholds::new(),
            rps: None,
            graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
        }
    }

    pub fn push_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn push_threshold(&mut self, threshold: Threshold) {
        self.thresholds.push(threshold);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        if self.max_target() == 0 {
            return Err(ConfigError::NoVirtualUsers);
        }
        for threshold in self.thresholds.iter() {
            if let Some(condition) = threshold.unsupported() {
                return Err(ThresholdError::Unsupported {
                    metric: threshold.metric.to_string(),
                    aggregation: condition.aggregation.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn max_target(&self) -> usize {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Number of VUs which should be active `elapsed` into the run.
    ///
    /// Each stage ramps linearly from the previous stage's target (starting at 0) to its own
    /// target. Once every stage has elapsed the target is 0.
    pub fn target_at(&self, elapsed: Duration) -> usize {
        let mut from = 0usize;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let from = from as f64;
                let to = stage.target as f64;
                return (from + (to - from) * progress).round() as usize;
            }
            from = stage.target;
            stage_start = stage_end;
        }

        0
    }
}
