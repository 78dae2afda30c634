use crate::{Condition, Metric};
use std::fmt;
use std::time::Duration;

/// Aggregated statistics of a finished Scenario run.
#[derive(Clone, Debug)]
pub struct RunStatistics {
    pub name: String,
    pub elapsed: Duration,
    pub vus_max: usize,
    pub iterations: u64,
    /// Iterations aborted because they outlived a graceful ramp-down or stop.
    pub interrupted_iterations: u64,
    pub http_reqs: u64,
    pub http_req_failed: u64,
    pub http_req_duration: DurationSummary,
    pub checks: Vec<CheckStats>,
    pub thresholds: Vec<ThresholdOutcome>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DurationSummary {
    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
    pub med: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckStats {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckStats {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdOutcome {
    pub metric: Metric,
    pub condition: Condition,
    pub observed: f64,
    pub passed: bool,
}

impl RunStatistics {
    /// True when no threshold was crossed. A run without thresholds always passes.
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failed_rate(&self) -> f64 {
        rate(self.http_req_failed, self.http_reqs)
    }

    pub fn checks_rate(&self) -> f64 {
        let passes: u64 = self.checks.iter().map(|c| c.passes).sum();
        let total: u64 = self.checks.iter().map(CheckStats::total).sum();
        rate(passes, total)
    }

    pub fn check(&self, name: &str) -> Option<&CheckStats> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// `part / total`, with `0/0` defined as `0`.
pub fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.
    } else {
        part as f64 / total as f64
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {}", self.name)?;
        writeln!(
            f,
            "  elapsed............: {}",
            humantime::format_duration(truncate_to_millis(self.elapsed))
        )?;

        for check in &self.checks {
            let mark = if check.fails == 0 { "✓" } else { "✗" };
            writeln!(
                f,
                "  {mark} {} ({} passed, {} failed)",
                check.name, check.passes, check.fails
            )?;
        }

        writeln!(
            f,
            "  checks.............: {:.2}%",
            self.checks_rate() * 100.
        )?;
        let d = &self.http_req_duration;
        writeln!(
            f,
            "  http_req_duration..: avg={:?} min={:?} med={:?} max={:?} p(90)={:?} p(95)={:?} p(99)={:?}",
            d.avg, d.min, d.med, d.max, d.p90, d.p95, d.p99
        )?;
        writeln!(
            f,
            "  http_req_failed....: {:.2}% ({} of {})",
            self.failed_rate() * 100.,
            self.http_req_failed,
            self.http_reqs
        )?;
        writeln!(f, "  http_reqs..........: {}", self.http_reqs)?;
        writeln!(
            f,
            "  iterations.........: {} ({} interrupted)",
            self.iterations, self.interrupted_iterations
        )?;
        writeln!(f, "  vus_max............: {}", self.vus_max)?;

        for outcome in &self.thresholds {
            let mark = if outcome.passed { "✓" } else { "✗" };
            writeln!(
                f,
                "  {mark} threshold {}: {} (observed {:.4})",
                outcome.metric, outcome.condition, outcome.observed
            )?;
        }

        Ok(())
    }
}

fn truncate_to_millis(dur: Duration) -> Duration {
    Duration::from_millis(dur.as_millis() as u64)
}
