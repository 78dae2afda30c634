//! Login burst attack profile.
//!
//! Every virtual user repeatedly POSTs the same login attempt at the target endpoint, checks
//! that the answer is either a successful login (200) or a rate-limited rejection (429), and
//! pauses briefly before the next attempt. Under the default stage table the number of virtual
//! users ramps 0 → 20 → 100 → 0, which should push a defended endpoint into answering 429.
use floodgate::core::ThresholdError;
use floodgate::prelude::*;
use floodgate::Scenario;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub const DEFAULT_URL: &str = "http://localhost:8080/auth/login";
pub const DEFAULT_LOGIN: &str = "admin";
pub const DEFAULT_SENHA: &str = "123";
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(100);

pub const SCENARIO_NAME: &str = "login_burst";
pub const CHECK_NAME: &str = "status is 200 or 429";

/// Process exit code when every threshold passed.
pub const EXIT_OK: u8 = 0;
/// Process exit code when a threshold was crossed.
pub const EXIT_THRESHOLDS_FAILED: u8 = 99;

#[derive(Debug, Error)]
pub enum AttackError {
    #[error("invalid target url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not encode login payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginPayload {
    pub login: String,
    pub senha: String,
}

impl Default for LoginPayload {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN.to_string(),
            senha: DEFAULT_SENHA.to_string(),
        }
    }
}

/// The endpoint under attack along with the request body, which is encoded once and reused
/// verbatim by every virtual user.
#[derive(Debug, Clone)]
pub struct Target {
    url: reqwest::Url,
    body: String,
}

impl Target {
    pub fn new(url: &str, payload: &LoginPayload) -> Result<Self, AttackError> {
        let url = reqwest::Url::parse(url).map_err(|err| AttackError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        let body = serde_json::to_string(payload)?;
        Ok(Self { url, body })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// 200 is a login that went through; 429 is the rate limiter doing its job.
pub fn is_expected_status(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::TOO_MANY_REQUESTS
}

/// Stages 10s→20, 30s→100, 10s→0 VUs, failing the run if 1% or more of the logins fail.
pub fn default_options() -> Result<ScenarioConfig, ThresholdError> {
    let mut config = ScenarioConfig::new(SCENARIO_NAME);
    config.push_stage(Stage::new(Duration::from_secs(10), 20));
    config.push_stage(Stage::new(Duration::from_secs(30), 100));
    config.push_stage(Stage::new(Duration::from_secs(10), 0));
    config.push_threshold(Threshold::parse(
        Metric::HttpReqFailed.name(),
        &["rate<0.01"],
    )?);
    Ok(config)
}

/// Process exit code for a finished run.
pub fn exit_status(stats: &RunStatistics) -> u8 {
    if stats.passed() {
        EXIT_OK
    } else {
        EXIT_THRESHOLDS_FAILED
    }
}

#[transaction]
async fn post_login(client: &Client, target: &Target) -> Result<StatusCode, AttackError> {
    let res = client
        .post(target.url.clone())
        .header(header::CONTENT_TYPE, "application/json")
        .body(target.body.clone())
        .send()
        .await;

    match res {
        Ok(res) => {
            let status = res.status();
            // Drain the body so the connection can be reused.
            if let Err(err) = res.bytes().await {
                debug!("Failed reading login response body: {err}");
            }
            if is_expected_status(status) {
                Ok(status)
            } else {
                Err(AttackError::UnexpectedStatus(status))
            }
        }
        Err(err) => Err(AttackError::Transport(err)),
    }
}

/// One login attempt: request, check, pause.
///
/// Returns the status received, or `None` if the request never got a response.
pub async fn attack(client: &Client, target: &Target, pause: Duration) -> Option<StatusCode> {
    let status = match post_login(client, target).await {
        Ok(status) | Err(AttackError::UnexpectedStatus(status)) => Some(status),
        Err(err) => {
            debug!("Login attempt failed: {err}");
            None
        }
    };

    check(CHECK_NAME, status.is_some_and(is_expected_status));
    tokio::time::sleep(pause).await;
    status
}

/// The attack profile as a runnable scenario; configure it with [`default_options`] or a
/// custom stage table.
pub fn login_burst(
    client: Client,
    target: Target,
    pause: Duration,
) -> impl ConfigurableScenario<RunStatistics> {
    let target = Arc::new(target);
    Scenario::new(SCENARIO_NAME, move || {
        let client = client.clone();
        let target = target.clone();
        async move {
            attack(&client, &target, pause).await;
        }
    })
}
