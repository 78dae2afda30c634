use crate::collector::Collector;
use floodgate_core::TransactionLabels;
use governor::DefaultDirectRateLimiter;
use std::{future::Future, sync::Arc, time::Instant};

/// Transaction hook used by the `#[transaction]` macro. Not intended to be used manually.
///
/// Records one request, its duration, and a failure if the wrapped future resolves to `Err`.
pub async fn transaction_hook<T, R, E>(labels: TransactionLabels, func: T) -> T::Output
where
    T: Future<Output = Result<R, E>>,
{
    if let Ok(hook) = TRANSACTION_HOOK.try_with(|v| v.clone()) {
        if let Some(limiter) = &hook.limiter {
            limiter.until_ready().await;
        }

        let start = Instant::now();
        let res = func.await;
        let elapsed = start.elapsed();

        hook.collector.record_request(elapsed, res.is_err());

        #[cfg(feature = "metrics")]
        {
            metrics::histogram!(labels.duration).record(elapsed.as_secs_f64());
            metrics::counter!(labels.reqs).increment(1);
            if res.is_err() {
                metrics::counter!(labels.failed).increment(1);
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = labels;

        res
    } else {
        tracing::warn!("No hook available.");
        func.await
    }
}

/// Record a named boolean assertion for the current virtual user.
///
/// A failing check is not an error: it is counted and reported in the run's
/// [`RunStatistics`](floodgate_core::RunStatistics), and can be gated on with a `checks`
/// threshold. Returns `passed` so it can be used inline.
///
/// ```ignore
/// let status = res.status().as_u16();
/// check("status is 200 or 429", status == 200 || status == 429);
/// ```
pub fn check(name: &str, passed: bool) -> bool {
    let recorded = TRANSACTION_HOOK.try_with(|hook| hook.collector.record_check(name, passed));
    if recorded.is_err() {
        tracing::warn!("Check `{name}` recorded outside of a scenario.");
    }
    passed
}

#[derive(Clone)]
pub(crate) struct TransactionData {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub collector: Arc<Collector>,
}

tokio::task_local! {
    pub(crate) static TRANSACTION_HOOK: TransactionData;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const LABELS: TransactionLabels = TransactionLabels {
        reqs: "test_reqs",
        failed: "test_failed",
        duration: "test_duration",
    };

    #[tokio::test]
    async fn records_inside_hook() {
        let collector = Collector::new();
        let data = TransactionData {
            limiter: None,
            collector: collector.clone(),
        };

        TRANSACTION_HOOK
            .scope(data, async {
                let _ = transaction_hook::<_, (), ()>(LABELS, async { Ok(()) }).await;
                let _ = transaction_hook::<_, (), ()>(LABELS, async {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    Err(())
                })
                .await;
                assert!(check("passes", true));
                assert!(!check("passes", false));
            })
            .await;

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.http_reqs, 2);
        assert_eq!(snapshot.http_req_failed, 1);

        let checks = collector.checks();
        assert_eq!(checks[0].passes, 1);
        assert_eq!(checks[0].fails, 1);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn passes_through_without_hook() {
        let res = transaction_hook::<_, u8, ()>(LABELS, async { Ok(7) }).await;
        assert_eq!(res, Ok(7));
        assert!(check("orphan", true));
        assert!(logs_contain("No hook available."));
    }
}
