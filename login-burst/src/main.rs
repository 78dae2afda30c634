use anyhow::{Context, Result};
use clap::Parser;
use floodgate::prelude::*;
use login_burst::{
    default_options, exit_status, login_burst, LoginPayload, Target, DEFAULT_LOGIN,
    DEFAULT_SENHA, DEFAULT_URL, EXIT_OK,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::Client;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Burst login traffic to confirm a rate-limiting defense answers 429"
)]
struct Cli {
    /// Login endpoint under test
    #[arg(short, long, default_value = DEFAULT_URL)]
    url: String,

    #[arg(long, default_value = DEFAULT_LOGIN)]
    login: String,

    #[arg(long, default_value = DEFAULT_SENHA)]
    senha: String,

    /// JSON options document (`stages`, `thresholds`, ...) replacing the default ramp
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Pause after each login attempt
    #[arg(long, default_value_t = 100)]
    pause_ms: u64,

    /// Expose Prometheus metrics on this address while the run lasts
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("floodgate=info,login_burst=info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(stats) => {
            println!("{stats}");
            let status = exit_status(&stats);
            if status != EXIT_OK {
                error!("Thresholds crossed.");
            }
            ExitCode::from(status)
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunStatistics> {
    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
    }

    let options = match &cli.options {
        Some(path) => load_options(path)?,
        None => default_options()?,
    };
    // A run without load passes every threshold.
    options.validate().context("invalid options")?;

    let payload = LoginPayload {
        login: cli.login,
        senha: cli.senha,
    };
    let target = Target::new(&cli.url, &payload)?;
    info!(
        "Attacking {} for {:?}",
        target.url(),
        options.total_duration()
    );

    let stats = login_burst(Client::new(), target, Duration::from_millis(cli.pause_ms))
        .config(options)
        .await;
    Ok(stats)
}

fn load_options(path: &Path) -> Result<ScenarioConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading options from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing options in {}", path.display()))
}
