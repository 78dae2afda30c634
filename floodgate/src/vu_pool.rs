use crate::transaction::{TransactionData, TRANSACTION_HOOK};
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Pool of virtual users, each a task looping over the scenario function.
pub(crate) struct VuPool<T> {
    scenario: T,
    hook: TransactionData,
    active: Vec<Vu>,
    retiring: Vec<Retiring>,
    vus_max: usize,
}

struct Vu {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

/// A VU which was asked to stop and is finishing its current iteration.
struct Retiring {
    handle: JoinHandle<()>,
    deadline: Instant,
}

impl<T, F> VuPool<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(scenario: T, hook: TransactionData) -> Self {
        Self {
            scenario,
            hook,
            active: vec![],
            retiring: vec![],
            vus_max: 0,
        }
    }

    /// Grow or shrink the pool to `count` active VUs.
    ///
    /// Removed VUs finish their current iteration, and are aborted if that takes longer than
    /// `graceful_ramp_down`.
    pub fn set_vus(&mut self, count: usize, graceful_ramp_down: Duration) {
        if self.active.len() > count {
            let deadline = Instant::now() + graceful_ramp_down;
            for vu in self.active.drain(count..) {
                vu.stop.store(true, Ordering::Relaxed);
                self.retiring.push(Retiring {
                    handle: vu.handle,
                    deadline,
                });
            }
        } else {
            while self.active.len() < count {
                let vu = self.spawn_vu();
                self.active.push(vu);
            }
        }

        self.vus_max = self.vus_max.max(self.active.len());

        #[cfg(feature = "metrics")]
        metrics::gauge!("floodgate_vus").set(self.active.len() as f64);
    }

    fn spawn_vu(&self) -> Vu {
        let scenario = self.scenario.clone();
        let collector = self.hook.collector.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let handle = tokio::spawn(TRANSACTION_HOOK.scope(self.hook.clone(), async move {
            while !flag.load(Ordering::Relaxed) {
                scenario().await;
                collector.record_iteration();
            }
        }));

        Vu { handle, stop }
    }

    pub fn vus(&self) -> usize {
        self.active.len()
    }

    pub fn vus_max(&self) -> usize {
        self.vus_max
    }

    /// Forget retired VUs which have finished, and abort those past their deadline.
    pub fn reap(&mut self) {
        let now = Instant::now();
        let mut interrupted = 0;
        self.retiring.retain(|vu| {
            if vu.handle.is_finished() {
                false
            } else if now >= vu.deadline {
                vu.handle.abort();
                interrupted += 1;
                false
            } else {
                true
            }
        });

        if interrupted > 0 {
            debug!("Aborted {interrupted} VUs past their ramp-down deadline.");
            self.hook.collector.record_interrupted(interrupted);
        }
    }

    /// Stop every VU, waiting up to `graceful_stop` for in-flight iterations.
    pub async fn shutdown(mut self, graceful_stop: Duration) {
        let deadline = Instant::now() + graceful_stop;
        self.set_vus(0, graceful_stop);

        let mut interrupted = 0;
        for mut vu in self.retiring.drain(..) {
            match timeout_at(vu.deadline.min(deadline), &mut vu.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_cancelled() => {}
                Ok(Err(err)) => error!("VU task failed: {err}"),
                Err(_) => {
                    vu.handle.abort();
                    interrupted += 1;
                }
            }
        }

        if interrupted > 0 {
            warn!("{interrupted} VUs did not finish within the graceful stop period.");
            self.hook.collector.record_interrupted(interrupted);
        }
    }
}
