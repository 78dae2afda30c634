use std::time::Duration;

/// How often the scheduler re-reads the stage table and resizes the VU pool.
pub const BASE_INTERVAL: Duration = Duration::from_millis(50);

/// The default time a ramped-down VU gets to finish its iteration.
pub const DEFAULT_GRACEFUL_RAMP_DOWN: Duration = Duration::from_secs(30);

/// The default time every VU gets to finish its iteration once the stages end.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

pub const DEFAULT_SCENARIO_NAME: &str = "default";
