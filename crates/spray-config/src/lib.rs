//! Shared configuration for the spraylink tools.
//!
//! Both ends of the control channel (the mock Unity peer and the host bridge)
//! and the CAD helpers read the same [`Config`]. Values are layered by
//! `ortho_config`: built-in defaults, then a configuration file
//! (`--config-path` or `SPRAY_CONFIG_PATH`), then `SPRAY_*` environment
//! variables, then command-line flags.

mod defaults;
mod endpoint;
mod logging;
pub mod telemetry;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ANGULAR_DEFLECTION, DEFAULT_CAD_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_LINEAR_DEFLECTION,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_LINE_BYTES, DEFAULT_PORT, DEFAULT_SIMULATION_DURATION_MS,
    DEFAULT_STARTUP_DELAY_MS, DEFAULT_TRAJECTORY_LATENCY_MS, DEFAULT_WORKPIECE_LATENCY_MS,
    default_endpoint, default_log_filter, default_log_filter_string, default_log_format,
};
pub use endpoint::{EndpointParseError, PeerEndpoint};
pub use logging::{LogFormat, LogFormatParseError};
pub use telemetry::{TelemetryError, TelemetryHandle};

/// Resolved configuration shared by every spraylink binary.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SPRAY")]
pub struct Config {
    /// Control channel endpoint (`tcp://host:port`).
    #[ortho_config(default = defaults::default_endpoint())]
    pub endpoint: PeerEndpoint,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Log line format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Connect timeout in milliseconds; zero blocks until the OS gives up.
    #[ortho_config(default = 0)]
    pub connect_timeout_ms: u64,
    /// Read poll interval in milliseconds; zero means reads block.
    #[ortho_config(default = 0)]
    pub read_timeout_ms: u64,
    /// Longest accepted inbound record in bytes.
    #[ortho_config(default = defaults::DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,
    /// Delay before the peer session sends its first heartbeat.
    #[ortho_config(default = defaults::DEFAULT_STARTUP_DELAY_MS)]
    pub startup_delay_ms: u64,
    /// Simulated workpiece loading latency.
    #[ortho_config(default = defaults::DEFAULT_WORKPIECE_LATENCY_MS)]
    pub workpiece_latency_ms: u64,
    /// Simulated trajectory display latency.
    #[ortho_config(default = defaults::DEFAULT_TRAJECTORY_LATENCY_MS)]
    pub trajectory_latency_ms: u64,
    /// Simulated spray simulation duration.
    #[ortho_config(default = defaults::DEFAULT_SIMULATION_DURATION_MS)]
    pub simulation_duration_ms: u64,
    /// Delay before a simulated collision report; zero disables it.
    #[ortho_config(default = 0)]
    pub collision_delay_ms: u64,
    /// Explicit FreeCAD command-line executable; empty searches the usual
    /// install locations and `PATH`.
    #[ortho_config(default = String::new())]
    pub freecad_executable: String,
    /// Linear deflection tolerance for tessellation.
    #[ortho_config(default = defaults::DEFAULT_LINEAR_DEFLECTION)]
    pub linear_deflection: f64,
    /// Angular deflection tolerance for tessellation.
    #[ortho_config(default = defaults::DEFAULT_ANGULAR_DEFLECTION)]
    pub angular_deflection: f64,
    /// Upper bound on a single CAD toolkit run, in seconds.
    #[ortho_config(default = defaults::DEFAULT_CAD_TIMEOUT_SECS)]
    pub cad_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            connect_timeout_ms: 0,
            read_timeout_ms: 0,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
            workpiece_latency_ms: DEFAULT_WORKPIECE_LATENCY_MS,
            trajectory_latency_ms: DEFAULT_TRAJECTORY_LATENCY_MS,
            simulation_duration_ms: DEFAULT_SIMULATION_DURATION_MS,
            collision_delay_ms: 0,
            freecad_executable: String::new(),
            linear_deflection: DEFAULT_LINEAR_DEFLECTION,
            angular_deflection: DEFAULT_ANGULAR_DEFLECTION,
            cad_timeout_secs: DEFAULT_CAD_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Control channel endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &PeerEndpoint {
        &self.endpoint
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Connect timeout, when one is configured.
    #[must_use]
    pub const fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }

    /// Read poll interval, when one is configured.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_timeout_ms)
    }

    /// Longest accepted inbound record.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Delay before the first heartbeat of a peer session.
    #[must_use]
    pub const fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Simulated workpiece loading latency.
    #[must_use]
    pub const fn workpiece_latency(&self) -> Duration {
        Duration::from_millis(self.workpiece_latency_ms)
    }

    /// Simulated trajectory display latency.
    #[must_use]
    pub const fn trajectory_latency(&self) -> Duration {
        Duration::from_millis(self.trajectory_latency_ms)
    }

    /// Simulated spray simulation duration.
    #[must_use]
    pub const fn simulation_duration(&self) -> Duration {
        Duration::from_millis(self.simulation_duration_ms)
    }

    /// Delay before the simulated collision report, when enabled.
    #[must_use]
    pub const fn collision_delay(&self) -> Option<Duration> {
        non_zero_millis(self.collision_delay_ms)
    }

    /// Explicit FreeCAD executable, when configured.
    #[must_use]
    pub fn freecad_executable(&self) -> Option<&str> {
        let trimmed = self.freecad_executable.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Linear and angular deflection tolerances, in that order.
    #[must_use]
    pub const fn deflection(&self) -> (f64, f64) {
        (self.linear_deflection, self.angular_deflection)
    }

    /// Upper bound on a single CAD toolkit run.
    #[must_use]
    pub const fn cad_timeout(&self) -> Duration {
        Duration::from_secs(self.cad_timeout_secs)
    }
}

const fn non_zero_millis(millis: u64) -> Option<Duration> {
    if millis == 0 {
        None
    } else {
        Some(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeouts_mean_unbounded() {
        let config = Config::default();
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.collision_delay(), None);
    }

    #[test]
    fn blank_executable_is_treated_as_unset() {
        let mut config = Config::default();
        config.freecad_executable = String::from("   ");
        assert_eq!(config.freecad_executable(), None);
        config.freecad_executable = String::from("/opt/freecad/bin/FreeCADCmd");
        assert_eq!(
            config.freecad_executable(),
            Some("/opt/freecad/bin/FreeCADCmd")
        );
    }

    #[test]
    fn defaults_match_host_bridge() {
        let config = Config::default();
        assert_eq!(config.endpoint().to_string(), "tcp://localhost:12346");
        assert_eq!(config.simulation_duration(), Duration::from_secs(3));
        assert_eq!(config.deflection(), (0.1, 0.1));
    }
}
