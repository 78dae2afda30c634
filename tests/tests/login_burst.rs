mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use floodgate::prelude::*;
    use login_burst::{login_burst, LoginPayload, Target, CHECK_NAME};
    use mock_service::MockConfig;
    use reqwest::Client;
    use std::num::NonZeroU64;
    use std::time::Duration;

    fn short_ramp() -> Vec<Stage> {
        vec![
            Stage::new(Duration::from_millis(300), 4),
            Stage::new(Duration::from_millis(600), 10),
            Stage::new(Duration::from_millis(300), 0),
        ]
    }

    fn failed_rate_below_one_percent() -> Threshold {
        Threshold::parse("http_req_failed", &["rate<0.01"]).unwrap()
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn healthy_endpoint_passes() {
        init();
        let (addr, target) = mock(MockConfig::default()).await;

        let stats = login_burst(Client::new(), target, Duration::from_millis(10))
            .stages(&short_ramp())
            .threshold(failed_rate_below_one_percent())
            .await;

        assert!(stats.http_reqs > 0);
        assert_eq!(stats.http_req_failed, 0);
        assert_eq!(stats.failed_rate(), 0.);
        assert!(stats.passed());

        let check = stats.check(CHECK_NAME).unwrap();
        assert_eq!(check.fails, 0);
        assert_eq!(check.passes, stats.http_reqs);

        let seen = mock_stats(addr).await;
        assert_eq!(seen.requests, stats.http_reqs);
        assert_eq!(seen.ok, stats.http_reqs);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn rate_limited_answers_are_not_failures() {
        init();
        let (addr, target) = mock(MockConfig::defended()).await;

        let stats = login_burst(Client::new(), target, Duration::from_millis(10))
            .stages(&short_ramp())
            .threshold(failed_rate_below_one_percent())
            .await;

        let seen = mock_stats(addr).await;
        assert!(dbg!(seen.rate_limited) > 0);
        assert_eq!(seen.ok, mock_service::DEFENSE_ATTEMPTS_PER_MINUTE as u64);

        assert_eq!(stats.http_req_failed, 0);
        assert!(stats.passed());
        assert_eq!(stats.check(CHECK_NAME).unwrap().fails, 0);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn server_errors_cross_threshold() {
        init();
        let (addr, target) = mock(MockConfig {
            fail_every: NonZeroU64::new(4),
            ..Default::default()
        })
        .await;

        let stats = login_burst(Client::new(), target, Duration::from_millis(10))
            .stages(&short_ramp())
            .threshold(failed_rate_below_one_percent())
            .await;

        let seen = mock_stats(addr).await;
        assert!(seen.failed > 0);
        assert_eq!(stats.http_req_failed, seen.failed);

        let check = stats.check(CHECK_NAME).unwrap();
        assert_eq!(check.fails, seen.failed);
        assert!(dbg!(stats.failed_rate()) > 0.1);

        assert!(!stats.passed());
        let outcome = &stats.thresholds[0];
        assert_eq!(outcome.metric, Metric::HttpReqFailed);
        assert!(!outcome.passed);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn repeated_runs_agree() {
        init();
        let (addr, target) = mock(MockConfig::default()).await;

        for _ in 0..2 {
            let stats = login_burst(Client::new(), target.clone(), Duration::from_millis(10))
                .stages(&short_ramp())
                .threshold(failed_rate_below_one_percent())
                .await;
            assert!(stats.http_reqs > 0);
            assert_eq!(stats.failed_rate(), 0.);
            assert!(stats.passed());
        }

        assert_eq!(mock_stats(addr).await.distinct_payloads, 1);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn every_attempt_sends_the_same_payload() {
        init();
        let (addr, target) = mock(MockConfig::default()).await;

        let stats = login_burst(Client::new(), target, Duration::ZERO)
            .stage(Duration::from_millis(500), 8)
            .await;

        let seen = mock_stats(addr).await;
        assert!(seen.requests > 1);
        assert_eq!(seen.requests, stats.http_reqs);
        assert_eq!(seen.distinct_payloads, 1);
        assert_eq!(seen.unauthorized, 0);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn unreachable_endpoint_fails_everything() {
        init();
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let target = Target::new(
            &format!("http://{addr}/auth/login"),
            &LoginPayload::default(),
        )
        .unwrap();

        let stats = login_burst(Client::new(), target, Duration::from_millis(10))
            .stages(&short_ramp())
            .threshold(failed_rate_below_one_percent())
            .await;

        assert!(stats.http_reqs > 0);
        assert_eq!(stats.http_req_failed, stats.http_reqs);

        let check = stats.check(CHECK_NAME).unwrap();
        assert_eq!(check.passes, 0);
        assert_eq!(check.fails, stats.http_reqs);

        assert!(!stats.passed());
        assert_eq!(stats.thresholds[0].observed, 1.);
    }
}
