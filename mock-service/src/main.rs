use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{MockConfig, Quota, DEFENSE_ATTEMPTS_PER_MINUTE};
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroU64};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Rate-limited mock of the login endpoint")]
struct Cli {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Login attempts per minute each client address may make before answering 429
    #[arg(long, default_value_t = DEFENSE_ATTEMPTS_PER_MINUTE)]
    per_minute: u32,

    /// Per-client attempts per second, replacing --per-minute
    #[arg(long)]
    max_rps: Option<NonZeroU32>,

    /// Never answer 429
    #[arg(long, conflicts_with = "max_rps")]
    unlimited: bool,

    /// Answer 500 to every Nth request
    #[arg(long)]
    fail_every: Option<NonZeroU64>,

    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
    }

    let quota = match (cli.unlimited, cli.max_rps) {
        (true, _) => None,
        (false, Some(rps)) => Some(Quota::per_second(rps)),
        (false, None) => NonZeroU32::new(cli.per_minute).map(Quota::per_minute),
    };

    let addr: SocketAddr = ([0, 0, 0, 0], cli.port).into();
    mock_service::run(
        addr,
        MockConfig {
            quota,
            fail_every: cli.fail_every,
            delay: Duration::from_millis(cli.delay_ms),
        },
    )
    .await
}
