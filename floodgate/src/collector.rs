use crate::trend::Trend;
use floodgate_core::CheckStats;
use metrics_util::AtomicBucket;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, trace, warn};

/// Shared counters every VU of a scenario reports into.
#[derive(Default)]
pub(crate) struct Collector {
    http_reqs: AtomicU64,
    http_req_failed: AtomicU64,
    iterations: AtomicU64,
    interrupted: AtomicU64,
    latency: AtomicBucket<Duration>,
    checks: RwLock<BTreeMap<String, Arc<CheckCounter>>>,
}

#[derive(Default)]
struct CheckCounter {
    passes: AtomicU64,
    fails: AtomicU64,
}

impl Collector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, elapsed: Duration, failed: bool) {
        self.http_reqs.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.http_req_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.latency.push(elapsed);
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interrupted(&self, count: u64) {
        self.interrupted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_check(&self, name: &str, passed: bool) {
        let counter = self.check_counter(name);
        if passed {
            counter.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            counter.fails.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn check_counter(&self, name: &str) -> Arc<CheckCounter> {
        {
            let checks = self.checks.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = checks.get(name) {
                return counter.clone();
            }
        }

        let mut checks = self.checks.write().unwrap_or_else(|e| e.into_inner());
        checks.entry(name.to_string()).or_default().clone()
    }

    /// Move buffered latencies into `trend`.
    pub fn drain_latencies(&self, trend: &mut Trend) {
        self.latency.clear_with(|durs| trend.extend(durs));
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            http_reqs: self.http_reqs.load(Ordering::Relaxed),
            http_req_failed: self.http_req_failed.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
        }
    }

    pub fn checks(&self) -> Vec<CheckStats> {
        let checks = self.checks.read().unwrap_or_else(|e| e.into_inner());
        checks
            .iter()
            .map(|(name, counter)| CheckStats {
                name: name.clone(),
                passes: counter.passes.load(Ordering::Relaxed),
                fails: counter.fails.load(Ordering::Relaxed),
            })
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Snapshot {
    pub http_reqs: u64,
    pub http_req_failed: u64,
    pub iterations: u64,
    pub interrupted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_requests_and_checks() {
        let collector = Collector::new();
        collector.record_request(Duration::from_millis(3), false);
        collector.record_request(Duration::from_millis(5), true);
        collector.record_iteration();
        collector.record_check("ok", true);
        collector.record_check("ok", false);
        collector.record_check("ok", true);
        collector.record_check("other", false);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.http_reqs, 2);
        assert_eq!(snapshot.http_req_failed, 1);
        assert_eq!(snapshot.iterations, 1);

        let checks = collector.checks();
        assert_eq!(
            checks,
            vec![
                CheckStats {
                    name: "ok".to_string(),
                    passes: 2,
                    fails: 1
                },
                CheckStats {
                    name: "other".to_string(),
                    passes: 0,
                    fails: 1
                },
            ]
        );

        let mut trend = Trend::new();
        collector.drain_latencies(&mut trend);
        assert_eq!(trend.count(), 2);
        assert_eq!(trend.max(), Duration::from_millis(5));

        let mut trend = Trend::new();
        collector.drain_latencies(&mut trend);
        assert_eq!(trend.count(), 0);
    }
}
