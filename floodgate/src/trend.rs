use floodgate_core::DurationSummary;
use pdatastructs::tdigest::{TDigest, K1};
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Duration distribution with exact min/max/avg and t-digest quantiles.
#[derive(Debug, Clone)]
pub(crate) struct Trend {
    digest: TDigest<K1>,
    count: u64,
    sum: Duration,
    min: Duration,
    max: Duration,
}

impl Trend {
    pub fn new() -> Self {
        Self {
            digest: default_tdigest(),
            count: 0,
            sum: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    pub fn insert(&mut self, dur: Duration) {
        self.digest.insert(dur.as_secs_f64());
        self.count += 1;
        self.sum += dur;
        self.min = self.min.min(dur);
        self.max = self.max.max(dur);
    }

    pub fn extend(&mut self, durs: &[Duration]) {
        for dur in durs {
            self.insert(*dur);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((self.sum.as_nanos() / self.count as u128) as u64)
        }
    }

    pub fn min(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.min
        }
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// `quantile` in `0.0..=1.0`
    pub fn quantile(&self, quantile: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        let secs = self.digest.quantile(quantile);

        // TDigest can hand back NaN for sparse digests.
        let secs = if secs.is_finite() {
            secs.clamp(self.min.as_secs_f64(), self.max.as_secs_f64())
        } else {
            error!("NaN latency quantile for q={quantile}; reporting 0.");
            0.
        };

        Duration::from_secs_f64(secs)
    }

    pub fn summary(&self) -> DurationSummary {
        DurationSummary {
            avg: self.avg(),
            min: self.min(),
            max: self.max(),
            med: self.quantile(0.5),
            p90: self.quantile(0.9),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
        }
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
