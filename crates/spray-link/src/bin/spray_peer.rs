//! Mock Unity client: connects to the host and answers its commands.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use ortho_config::OrthoConfig;
use spray_config::{Config, telemetry};
use spray_link::{SessionEnd, SystemShutdownSignal, run_peer_session};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => return fail(&error),
    };
    if let Err(error) = telemetry::initialise(&config) {
        return fail(&error);
    }

    match run_peer_session(&config, Arc::new(SystemShutdownSignal)) {
        Ok(SessionEnd::Interrupted | SessionEnd::Closed(_)) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "peer session failed");
            fail(&error)
        }
    }
}

fn fail(error: &dyn std::fmt::Display) -> ExitCode {
    let _ = writeln!(io::stderr().lock(), "spray-peer: {error}");
    ExitCode::FAILURE
}
