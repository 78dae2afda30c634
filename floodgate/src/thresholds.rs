use crate::collector::Snapshot;
use crate::trend::Trend;
use floodgate_core::{rate, Aggregation, CheckStats, Metric, ThresholdOutcome, Thresholds};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Everything collected over a run, as seen by threshold evaluation.
pub(crate) struct Aggregate<'a> {
    pub snapshot: Snapshot,
    pub checks: &'a [CheckStats],
    pub trend: &'a Trend,
    pub elapsed: Duration,
}

impl Aggregate<'_> {
    /// Value of `aggregation` over `metric`. Metrics without data observe as `0`, and
    /// aggregations the metric does not provide observe as `None`.
    pub fn observe(&self, metric: Metric, aggregation: Aggregation) -> Option<f64> {
        if !metric.supports(aggregation) {
            return None;
        }

        let per_second = |count: u64| {
            let secs = self.elapsed.as_secs_f64();
            if secs > 0. {
                count as f64 / secs
            } else {
                0.
            }
        };

        let observed = match (metric, aggregation) {
            (Metric::HttpReqFailed, _) => {
                rate(self.snapshot.http_req_failed, self.snapshot.http_reqs)
            }
            (Metric::Checks, _) => {
                let passes = self.checks.iter().map(|c| c.passes).sum();
                let total = self.checks.iter().map(CheckStats::total).sum();
                rate(passes, total)
            }
            (Metric::HttpReqs, Aggregation::Rate) => per_second(self.snapshot.http_reqs),
            (Metric::HttpReqs, _) => self.snapshot.http_reqs as f64,
            (Metric::Iterations, Aggregation::Rate) => per_second(self.snapshot.iterations),
            (Metric::Iterations, _) => self.snapshot.iterations as f64,
            (Metric::HttpReqDuration, aggregation) => {
                let dur = match aggregation {
                    Aggregation::Min => self.trend.min(),
                    Aggregation::Max => self.trend.max(),
                    Aggregation::Med => self.trend.quantile(0.5),
                    Aggregation::Percentile(p) => self.trend.quantile(p / 100.),
                    Aggregation::Avg => self.trend.avg(),
                    Aggregation::Rate | Aggregation::Count => return None,
                };
                dur.as_nanos() as f64 / 1e6
            }
        };
        Some(observed)
    }
}

pub(crate) fn evaluate(thresholds: &Thresholds, aggregate: &Aggregate<'_>) -> Vec<ThresholdOutcome> {
    thresholds
        .iter()
        .flat_map(|threshold| {
            threshold.conditions.iter().map(move |condition| {
                let Some(observed) = aggregate.observe(threshold.metric, condition.aggregation)
                else {
                    warn!(
                        "Threshold {}: {condition} is not an aggregation of this metric",
                        threshold.metric
                    );
                    return ThresholdOutcome {
                        metric: threshold.metric,
                        condition: *condition,
                        observed: f64::NAN,
                        passed: false,
                    };
                };
                let passed = condition.passes(observed);
                if passed {
                    debug!("Threshold {}: {condition} passed ({observed:.4})", threshold.metric);
                } else {
                    warn!("Threshold {}: {condition} crossed ({observed:.4})", threshold.metric);
                }
                ThresholdOutcome {
                    metric: threshold.metric,
                    condition: *condition,
                    observed,
                    passed,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use floodgate_core::Threshold;

    fn thresholds(entries: &[(&str, &str)]) -> Thresholds {
        entries
            .iter()
            .map(|(metric, condition)| Threshold::parse(metric, &[*condition]).unwrap())
            .collect()
    }

    fn check(passes: u64, fails: u64) -> CheckStats {
        CheckStats {
            name: "status is 200 or 429".to_string(),
            passes,
            fails,
        }
    }

    #[test]
    fn failed_rate_threshold() {
        let trend = Trend::new();
        let checks = [check(99, 1)];
        let aggregate = Aggregate {
            snapshot: Snapshot {
                http_reqs: 100,
                http_req_failed: 1,
                iterations: 100,
                interrupted: 0,
            },
            checks: &checks,
            trend: &trend,
            elapsed: Duration::from_secs(10),
        };

        let outcomes = evaluate(
            &thresholds(&[
                ("http_req_failed", "rate<0.01"),
                ("checks", "rate>0.95"),
                ("http_reqs", "rate>=10"),
                ("iterations", "count==100"),
            ]),
            &aggregate,
        );

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].observed, 0.01);
        assert!(!outcomes[0].passed);
        assert!(outcomes[1].passed);
        assert_eq!(outcomes[2].observed, 10.);
        assert!(outcomes[2].passed);
        assert!(outcomes[3].passed);
    }

    #[test]
    fn duration_thresholds_in_millis() {
        let mut trend = Trend::new();
        trend.extend(&[Duration::from_millis(100), Duration::from_millis(300)]);
        let aggregate = Aggregate {
            snapshot: Snapshot::default(),
            checks: &[],
            trend: &trend,
            elapsed: Duration::from_secs(1),
        };

        assert_eq!(
            aggregate.observe(Metric::HttpReqDuration, Aggregation::Avg),
            Some(200.)
        );
        assert_eq!(
            aggregate.observe(Metric::HttpReqDuration, Aggregation::Max),
            Some(300.)
        );

        let outcomes = evaluate(&thresholds(&[("http_req_duration", "max<250")]), &aggregate);
        assert!(!outcomes[0].passed);
    }

    #[test]
    fn no_data_observes_zero() {
        let trend = Trend::new();
        let aggregate = Aggregate {
            snapshot: Snapshot::default(),
            checks: &[],
            trend: &trend,
            elapsed: Duration::ZERO,
        };

        let outcomes = evaluate(
            &thresholds(&[
                ("http_req_failed", "rate<0.01"),
                ("http_reqs", "rate<1"),
                ("http_req_duration", "p(95)<1"),
            ]),
            &aggregate,
        );
        assert!(outcomes.iter().all(|o| o.observed == 0. && o.passed));
    }

    #[tracing_test::traced_test]
    #[test]
    fn unsupported_aggregation_is_crossed() {
        let mut trend = Trend::new();
        trend.insert(Duration::from_millis(100));
        let aggregate = Aggregate {
            snapshot: Snapshot {
                http_reqs: 10,
                http_req_failed: 0,
                iterations: 10,
                interrupted: 0,
            },
            checks: &[],
            trend: &trend,
            elapsed: Duration::from_secs(1),
        };

        assert_eq!(
            aggregate.observe(Metric::HttpReqFailed, Aggregation::Avg),
            None
        );

        // Built as a literal, so nothing rejected `avg` up front.
        let mut thresholds = Thresholds::new();
        thresholds.push(Threshold {
            metric: Metric::HttpReqFailed,
            conditions: vec!["avg<1".parse().unwrap()],
        });

        let outcomes = evaluate(&thresholds, &aggregate);
        assert!(!outcomes[0].passed);
        assert!(outcomes[0].observed.is_nan());
        assert!(logs_contain("is not an aggregation of this metric"));
    }
}
