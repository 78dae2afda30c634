mod config;
mod constants;
mod error;
mod metrics;
mod stats;
mod threshold;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use metrics::*;
pub use stats::*;
pub use threshold::*;
