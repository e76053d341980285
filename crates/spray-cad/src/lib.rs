//! CAD helpers for the spray simulation.
//!
//! Converts STEP models to STL through FreeCAD and generates small test
//! models. Every operation takes a [`CadToolkit`], so the conversion logic
//! runs against test doubles as readily as against a real FreeCAD install.
//! [`run`] is the `spray-cad` command-line entry point; each command prints
//! `SUCCESS` or `ERROR: <message>` and exits accordingly.

#![warn(missing_docs)]

mod cli;
mod config;
pub mod error;
pub mod freecad;
pub mod job;
pub mod scripts;
pub mod stl;
pub mod toolkit;

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ortho_config::OrthoConfig;
use spray_config::{Config, telemetry};

use cli::{CadCommand, Cli};
use config::split_arguments;
pub use error::CadError;
pub use freecad::FreeCadToolkit;
pub use job::{CadJob, JobReport, JobStep, Placement, Primitive, Tolerance};
pub use scripts::{
    MeshOutput, ProbeEntry, ProbeReport, convert_step_to_stl, create_simple_step,
    create_simple_stl, probe_toolkit, write_reference_step,
};
pub use stl::{StlFormat, StlSummary};
pub use toolkit::CadToolkit;

/// Supplies toolkits to the command runner.
pub trait ToolkitLocator {
    /// Finds a toolkit for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CadError::ToolkitNotFound`] when none is available.
    fn locate(&self, config: &Config) -> Result<Box<dyn CadToolkit>, CadError>;

    /// Executable paths reported by `spray-cad probe`.
    fn candidates(&self, config: &Config) -> Vec<PathBuf>;
}

/// Locates FreeCAD on this machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeCadLocator;

impl ToolkitLocator for FreeCadLocator {
    fn locate(&self, config: &Config) -> Result<Box<dyn CadToolkit>, CadError> {
        Ok(Box::new(FreeCadToolkit::locate(config)?))
    }

    fn candidates(&self, config: &Config) -> Vec<PathBuf> {
        freecad::candidate_paths(config)
    }
}

/// Runs `spray-cad` with FreeCAD as the toolkit.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_locator(args, stdout, stderr, &FreeCadLocator)
}

/// Runs `spray-cad` with a caller-supplied toolkit locator.
pub fn run_with_locator<I, W, E, L>(args: I, stdout: &mut W, stderr: &mut E, locator: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ToolkitLocator + ?Sized,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_arguments(&args);

    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error) if error.use_stderr() => {
            let _ = write!(stderr, "{error}");
            return ExitCode::FAILURE;
        }
        Err(error) => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
    };

    let config = match Config::load_from_iter(split.config_arguments) {
        Ok(config) => config,
        Err(error) => {
            let _ = writeln!(stderr, "spray-cad: {error}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = telemetry::initialise(&config) {
        let _ = writeln!(stderr, "spray-cad: {error}");
    }

    match execute(cli.command, &config, locator, stdout) {
        Ok(()) => {
            let _ = writeln!(stdout, "SUCCESS");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(target: "spray_cad", error = %error, "command failed");
            let _ = writeln!(stdout, "ERROR: {error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W, L>(
    command: CadCommand,
    config: &Config,
    locator: &L,
    out: &mut W,
) -> Result<(), CadError>
where
    W: Write,
    L: ToolkitLocator + ?Sized,
{
    let tolerance = Tolerance::from_config(config);
    match command {
        CadCommand::Convert { input, output } => {
            scripts::require_input(&input)?;
            let toolkit = locator.locate(config)?;
            let mesh = convert_step_to_stl(toolkit.as_ref(), &input, &output, tolerance)?;
            let _ = writeln!(out, "STEP file: {}", input.display());
            print_mesh(out, &mesh);
        }
        CadCommand::MakeStep { output } => {
            let toolkit = locator.locate(config)?;
            create_simple_step(toolkit.as_ref(), &output)?;
            let _ = writeln!(out, "STEP file: {}", output.display());
        }
        CadCommand::MakeReferenceStep { output } => {
            write_reference_step(&output)?;
            let _ = writeln!(out, "STEP file: {}", output.display());
        }
        CadCommand::MakeStl { output } => {
            let toolkit = locator.locate(config)?;
            let mesh = create_simple_stl(toolkit.as_ref(), &output, tolerance)?;
            print_mesh(out, &mesh);
        }
        CadCommand::Probe { step_files } => {
            let step_files = if step_files.is_empty() {
                scripts::DEFAULT_PROBE_MODELS
                    .iter()
                    .map(PathBuf::from)
                    .collect()
            } else {
                step_files
            };
            let candidates = locator.candidates(config);
            let report = probe_toolkit(&candidates, &step_files);
            print_probe(out, &report);
            if !report.toolkit_available() {
                return Err(CadError::ToolkitNotFound {
                    searched: candidates
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }
    }
    Ok(())
}

fn print_mesh(out: &mut impl Write, mesh: &MeshOutput) {
    let _ = writeln!(out, "STL file: {}", mesh.path.display());
    let _ = writeln!(out, "points: {}", mesh.report.points);
    let _ = writeln!(out, "facets: {}", mesh.report.facets);
}

fn print_probe(out: &mut impl Write, report: &ProbeReport) {
    let sections = [
        ("FreeCAD executables:", &report.toolkits),
        ("STEP models:", &report.step_files),
    ];
    for (title, entries) in sections {
        let _ = writeln!(out, "{title}");
        for entry in entries {
            let state = if entry.found { "found" } else { "missing" };
            let _ = writeln!(out, "  {state:<8}{}", entry.path.display());
        }
    }
}

#[cfg(test)]
mod tests;
