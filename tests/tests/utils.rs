use login_burst::{LoginPayload, Target};
use mock_service::{MockConfig, MockStats};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("floodgate=debug,login_burst=debug,mock_service=info")
            .init();
    });
}

/// Start a fresh mock login service and return its address together with a target pointing at
/// its login endpoint.
#[allow(unused)]
pub async fn mock(config: MockConfig) -> (SocketAddr, Target) {
    let addr = mock_service::spawn(config).await.unwrap();
    let target = Target::new(
        &format!("http://{addr}/auth/login"),
        &LoginPayload::default(),
    )
    .unwrap();
    (addr, target)
}

#[allow(unused)]
pub async fn mock_stats(addr: SocketAddr) -> MockStats {
    reqwest::get(format!("http://{addr}/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}
