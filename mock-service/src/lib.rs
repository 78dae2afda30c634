//! Mock login endpoint guarded by a per-client rate limiter.
//!
//! `POST /auth/login` answers 200 with a bearer token for `admin`/`123`, 401 for any other
//! credentials, 429 once the calling address has used up its quota, and 500 on every Nth request
//! when asked to misbehave. `GET /stats` reports what the endpoint has seen so far.
use axum::{
    body::Bytes,
    debug_handler,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
pub use governor::Quota;
use governor::{DefaultKeyedRateLimiter, RateLimiter};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::num::{NonZeroU32, NonZeroU64};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub const VALID_LOGIN: &str = "admin";
pub const VALID_SENHA: &str = "123";

/// Body of a rate-limited answer.
pub const RATE_LIMITED_BODY: &str = "Too Many Requests - Try again later";

/// Login attempts a client may burst before the defense answers 429. The bucket refills at the
/// same number of attempts per minute.
pub const DEFENSE_ATTEMPTS_PER_MINUTE: u32 = 10;

/// Distinct payloads remembered for `GET /stats`; further distinct payloads are not counted.
pub const MAX_TRACKED_PAYLOADS: usize = 1024;

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Token bucket given to every client address. A client whose bucket is empty gets 429.
    pub quota: Option<Quota>,
    /// Answer 500 to every Nth request.
    pub fail_every: Option<NonZeroU64>,
    pub delay: Duration,
}

impl MockConfig {
    /// The login defense: [`DEFENSE_ATTEMPTS_PER_MINUTE`] attempts per client address.
    pub fn defended() -> Self {
        Self {
            quota: NonZeroU32::new(DEFENSE_ATTEMPTS_PER_MINUTE).map(Quota::per_minute),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub senha: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockStats {
    pub requests: u64,
    pub ok: u64,
    pub unauthorized: u64,
    pub rate_limited: u64,
    pub failed: u64,
    /// Number of distinct `(content-type, body)` pairs received, up to
    /// [`MAX_TRACKED_PAYLOADS`].
    pub distinct_payloads: usize,
}

struct MockState {
    config: MockConfig,
    limiter: Option<DefaultKeyedRateLimiter<IpAddr>>,
    requests: AtomicU64,
    ok: AtomicU64,
    unauthorized: AtomicU64,
    rate_limited: AtomicU64,
    failed: AtomicU64,
    payloads: Mutex<HashSet<u64>>,
}

impl MockState {
    fn new(config: MockConfig) -> Self {
        Self {
            limiter: config.quota.map(RateLimiter::keyed),
            config,
            requests: AtomicU64::new(0),
            ok: AtomicU64::new(0),
            unauthorized: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            payloads: Mutex::new(HashSet::new()),
        }
    }

    fn record_payload(&self, content_type: &str, body: &Bytes) {
        let mut hasher = DefaultHasher::new();
        (content_type, body).hash(&mut hasher);
        let digest = hasher.finish();

        let mut payloads = self.payloads.lock().unwrap_or_else(|e| e.into_inner());
        if payloads.len() < MAX_TRACKED_PAYLOADS {
            payloads.insert(digest);
        }
    }
}

pub fn router(config: MockConfig) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(MockState::new(config)))
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mock login service listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        router(config).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Serve on an ephemeral localhost port in the background, returning the bound address.
pub async fn spawn(config: MockConfig) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(config).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("Mock login service stopped: {err}");
        }
    });
    Ok(addr)
}

#[debug_handler]
async fn login(
    State(state): State<Arc<MockState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TokenResponse>, Response> {
    let n = state.requests.fetch_add(1, Ordering::Relaxed) + 1;
    counter!("mock_service_login_requests").increment(1);

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    state.record_payload(content_type, &body);

    if let Some(limiter) = &state.limiter {
        if limiter.check_key(&peer.ip()).is_err() {
            debug!("Login #{n} from {} rate limited", peer.ip());
            state.rate_limited.fetch_add(1, Ordering::Relaxed);
            counter!("mock_service_login_rate_limited").increment(1);
            return Err((StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_BODY).into_response());
        }
    }

    if let Some(every) = state.config.fail_every {
        if n % every.get() == 0 {
            state.failed.fetch_add(1, Ordering::Relaxed);
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    }

    if !state.config.delay.is_zero() {
        tokio::time::sleep(state.config.delay).await;
    }

    if !content_type.starts_with("application/json") {
        return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response());
    }
    let req: LoginRequest = serde_json::from_slice(&body).map_err(|err| {
        debug!("Malformed login from {peer}: {err}");
        StatusCode::BAD_REQUEST.into_response()
    })?;

    if req.login == VALID_LOGIN && req.senha == VALID_SENHA {
        state.ok.fetch_add(1, Ordering::Relaxed);
        Ok(Json(TokenResponse {
            access_token: format!("mock-token-{n}"),
            token_type: "Bearer".to_string(),
        }))
    } else {
        state.unauthorized.fetch_add(1, Ordering::Relaxed);
        Err(StatusCode::UNAUTHORIZED.into_response())
    }
}

#[debug_handler]
async fn stats(State(state): State<Arc<MockState>>) -> Json<MockStats> {
    let distinct_payloads = state
        .payloads
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .len();

    Json(MockStats {
        requests: state.requests.load(Ordering::Relaxed),
        ok: state.ok.load(Ordering::Relaxed),
        unauthorized: state.unauthorized.load(Ordering::Relaxed),
        rate_limited: state.rate_limited.load(Ordering::Relaxed),
        failed: state.failed.load(Ordering::Relaxed),
        distinct_payloads,
    })
}
