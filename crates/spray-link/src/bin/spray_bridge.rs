//! Host bridge: listens for the Unity client and forwards console commands.

use std::io::{self, BufReader, Write};
use std::process::ExitCode;
use std::sync::Arc;

use ortho_config::OrthoConfig;
use spray_config::{Config, telemetry};
use spray_link::{SystemShutdownSignal, run_bridge};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => return fail(&error),
    };
    if let Err(error) = telemetry::initialise(&config) {
        return fail(&error);
    }

    let console = BufReader::new(io::stdin());
    match run_bridge(&config, Arc::new(SystemShutdownSignal), console) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "host bridge failed");
            fail(&error)
        }
    }
}

fn fail(error: &dyn std::fmt::Display) -> ExitCode {
    let _ = writeln!(io::stderr().lock(), "spray-bridge: {error}");
    ExitCode::FAILURE
}
