//! Scenario logic and the stage scheduler
use crate::collector::Collector;
use crate::thresholds::{evaluate, Aggregate};
use crate::timer::Timer;
use crate::transaction::TransactionData;
use crate::trend::Trend;
use crate::vu_pool::VuPool;
use floodgate_core::{
    ConfigError, RunStatistics, ScenarioConfig, Stage, Threshold, BASE_INTERVAL,
};
use governor::{Quota, RateLimiter};
use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Load test scenario structure
///
/// Handler for running scenarios. Usually created with the [`#[scenario]`](floodgate_macros::scenario)
/// macro, or with [`Scenario::new`] when the scenario function is a closure.
#[pin_project::pin_project]
pub struct Scenario<T> {
    func: T,
    #[pin]
    runner_fut: Option<Pin<Box<dyn Future<Output = RunStatistics> + Send>>>,
    config: ScenarioConfig,
}

impl<T> Scenario<T> {
    pub fn new(name: &str, func: T) -> Self {
        Self {
            func,
            runner_fut: None,
            config: ScenarioConfig::new(name),
        }
    }
}

impl<T, F> Future for Scenario<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    type Output = RunStatistics;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        if this.runner_fut.is_none() {
            let func = this.func.clone();
            let config = this.config.clone();
            this.runner_fut
                .set(Some(Box::pin(async move { run_scenario(func, config).await })));
        }

        match this.runner_fut.as_pin_mut() {
            Some(runner) => runner.poll(cx),
            None => unreachable!(),
        }
    }
}

pub trait ConfigurableScenario<T: Send>: Future<Output = T> + Sized + Send {
    fn stage(self, duration: Duration, target: usize) -> Self;
    fn stages(self, stages: &[Stage]) -> Self;
    fn threshold(self, threshold: Threshold) -> Self;
    fn rps(self, rps: NonZeroU32) -> Self;
    fn graceful_ramp_down(self, graceful_ramp_down: Duration) -> Self;
    fn graceful_stop(self, graceful_stop: Duration) -> Self;
    fn config(self, config: ScenarioConfig) -> Self;
}

impl<T, F> ConfigurableScenario<RunStatistics> for Scenario<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    /// Append a stage ramping linearly to `target` VUs over `duration`.
    ///
    /// # Example
    /// ```no_run
    /// use floodgate::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     my_scenario()
    ///         .stage(Duration::from_secs(10), 20)
    ///         .stage(Duration::from_secs(30), 100)
    ///         .stage(Duration::from_secs(10), 0)
    ///         .await;
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn stage(mut self, duration: Duration, target: usize) -> Self {
        self.config.push_stage(Stage::new(duration, target));
        self
    }

    /// Append several stages at once.
    fn stages(mut self, stages: &[Stage]) -> Self {
        self.config.stages.extend_from_slice(stages);
        self
    }

    /// Add a pass/fail criterion evaluated over the whole run.
    ///
    /// # Example
    /// ```no_run
    /// use floodgate::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = my_scenario()
    ///         .stage(Duration::from_secs(30), 10)
    ///         .threshold(Threshold::parse("http_req_failed", &["rate<0.01"]).unwrap())
    ///         .await;
    ///     assert!(stats.passed());
    /// }
    ///
    /// #[scenario]
    /// async fn my_scenario() {
    /// }
    /// ```
    fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.push_threshold(threshold);
        self
    }

    /// Cap transactions per second across all VUs.
    fn rps(mut self, rps: NonZeroU32) -> Self {
        self.config.rps = Some(rps);
        self
    }

    fn graceful_ramp_down(mut self, graceful_ramp_down: Duration) -> Self {
        self.config.graceful_ramp_down = graceful_ramp_down;
        self
    }

    fn graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.config.graceful_stop = graceful_stop;
        self
    }

    /// Replace the whole configuration, keeping the scenario's name unless the new one is set.
    fn config(mut self, mut config: ScenarioConfig) -> Self {
        if config.name == floodgate_core::DEFAULT_SCENARIO_NAME {
            config.name = std::mem::take(&mut self.config.name);
        }
        self.config = config;
        self
    }
}

#[instrument(name="scenario", skip_all, fields(name=config.name))]
pub(crate) async fn run_scenario<T, F>(scenario: T, config: ScenarioConfig) -> RunStatistics
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    info!("Running {} with config {:?}", config.name, &config);
    match config.validate() {
        Ok(()) => {}
        Err(err @ ConfigError::Threshold(_)) => {
            warn!("Scenario {} has a threshold which will always cross: {err}", config.name)
        }
        Err(err) => warn!("Scenario {} will generate no load: {err}", config.name),
    }

    let collector = Collector::new();
    let hook = TransactionData {
        limiter: config.rps.map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps)))),
        collector: collector.clone(),
    };
    let mut pool = VuPool::new(scenario, hook);
    let mut trend = Trend::new();

    let total = config.total_duration();
    let start = Instant::now();
    let mut timer = Timer::new(BASE_INTERVAL).await;
    debug!("Scheduling every {timer} over {}", humantime::format_duration(total));

    // NOTE: This loop is time-sensitive. Any long awaits or blocking will throw off the ramp.
    loop {
        let elapsed = start.elapsed();
        if elapsed >= total {
            break;
        }

        let target = config.target_at(elapsed);
        if target != pool.vus() {
            trace!("Adjusting VUs {} -> {target}", pool.vus());
        }
        pool.set_vus(target, config.graceful_ramp_down);
        pool.reap();
        collector.drain_latencies(&mut trend);

        let tick = timer.tick().await;
        let snapshot = collector.snapshot();
        trace!(
            "tick={tick:?} vus={} reqs={} failed={} iterations={}",
            pool.vus(),
            snapshot.http_reqs,
            snapshot.http_req_failed,
            snapshot.iterations
        );
    }

    let vus_max = pool.vus_max();
    pool.shutdown(config.graceful_stop).await;
    let elapsed = start.elapsed();
    collector.drain_latencies(&mut trend);

    let snapshot = collector.snapshot();
    let checks = collector.checks();
    let aggregate = Aggregate {
        snapshot,
        checks: &checks,
        trend: &trend,
        elapsed,
    };
    let thresholds = evaluate(&config.thresholds, &aggregate);

    let stats = RunStatistics {
        name: config.name.clone(),
        elapsed,
        vus_max,
        iterations: snapshot.iterations,
        interrupted_iterations: snapshot.interrupted,
        http_reqs: snapshot.http_reqs,
        http_req_failed: snapshot.http_req_failed,
        http_req_duration: trend.summary(),
        checks,
        thresholds,
    };

    if stats.passed() {
        info!("Scenario complete");
    } else {
        warn!("Scenario complete; thresholds crossed");
    }

    stats
}
