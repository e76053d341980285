use crate::endpoint::PeerEndpoint;
use crate::logging::LogFormat;

/// Host the Unity peer connects to by default.
pub const DEFAULT_HOST: &str = "localhost";

/// Port the host application's bridge listens on.
pub const DEFAULT_PORT: u16 = 12346;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Upper bound on a single inbound record, including its line feed.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Grace period before the peer session sends its first heartbeat.
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 2_000;

/// Simulated workpiece loading time.
pub const DEFAULT_WORKPIECE_LATENCY_MS: u64 = 1_000;

/// Simulated trajectory rendering time.
pub const DEFAULT_TRAJECTORY_LATENCY_MS: u64 = 500;

/// Simulated duration of a spray simulation run.
pub const DEFAULT_SIMULATION_DURATION_MS: u64 = 3_000;

/// Linear deflection tolerance handed to the CAD toolkit.
pub const DEFAULT_LINEAR_DEFLECTION: f64 = 0.1;

/// Angular deflection tolerance handed to the CAD toolkit.
pub const DEFAULT_ANGULAR_DEFLECTION: f64 = 0.1;

/// Upper bound on a single CAD toolkit run.
pub const DEFAULT_CAD_TIMEOUT_SECS: u64 = 600;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    default_log_filter().to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Endpoint of the host application's control channel.
pub fn default_endpoint() -> PeerEndpoint {
    PeerEndpoint::tcp(DEFAULT_HOST, DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_log_filter_matches_the_borrowed_default() {
        assert_eq!(default_log_filter_string(), default_log_filter());
        assert_eq!(default_log_filter(), DEFAULT_LOG_FILTER);
    }
}
