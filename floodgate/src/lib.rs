#![cfg_attr(docsrs, feature(doc_cfg))]
//! Floodgate drives a scenario function from a pool of virtual users (VUs) whose size follows a
//! staged ramp, records every transaction and check, and evaluates thresholds over the whole run.
//!
//! ```no_run
//! use floodgate::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let stats = login()
//!         .stage(Duration::from_secs(10), 20)
//!         .stage(Duration::from_secs(30), 100)
//!         .stage(Duration::from_secs(10), 0)
//!         .threshold(Threshold::parse("http_req_failed", &["rate<0.01"]).unwrap())
//!         .await;
//!
//!     println!("{stats}");
//! }
//!
//! #[scenario]
//! async fn login() {
//!     let res = post_login().await;
//!     check("status is 200", res.is_ok());
//! }
//!
//! #[transaction]
//! async fn post_login() -> Result<(), std::io::Error> {
//!     Ok(())
//! }
//! ```

// Lets the attribute macros, which emit `::floodgate::...` paths, work inside this crate.
extern crate self as floodgate;

pub(crate) mod collector;
pub mod scenario;
pub(crate) mod thresholds;
pub(crate) mod timer;
#[doc(hidden)]
pub mod transaction;
pub(crate) mod trend;
pub(crate) mod vu_pool;

#[doc(hidden)]
pub use floodgate_core as core;
pub use floodgate_macros::{scenario, transaction};
pub use scenario::Scenario;
pub use transaction::check;

pub mod stats {
    pub use floodgate_core::{CheckStats, DurationSummary, RunStatistics, ThresholdOutcome};
}

pub mod prelude {
    pub use crate::scenario::ConfigurableScenario;
    pub use crate::transaction::check;
    pub use floodgate_core::{
        Condition, Metric, RunStatistics, ScenarioConfig, Stage, Threshold, Thresholds,
    };
    pub use floodgate_macros::{scenario, transaction};
}
