//! Command-line definitions for `spray-cad`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::scripts::{
    DEFAULT_REFERENCE_STEP, DEFAULT_SIMPLE_STEP, DEFAULT_SIMPLE_STL, DEFAULT_STEP_INPUT,
    DEFAULT_STL_OUTPUT,
};

/// CAD helpers for the spray simulation: STEP to STL conversion and test
/// model generation.
///
/// Configuration flags (`--config-path`, `--freecad-executable`,
/// `--linear-deflection`, ...) go before the subcommand.
#[derive(Parser, Debug)]
#[command(name = "spray-cad", disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CadCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CadCommand {
    /// Converts a STEP model to STL.
    Convert {
        /// STEP model to read.
        #[arg(default_value = DEFAULT_STEP_INPUT)]
        input: PathBuf,
        /// STL file to write.
        #[arg(default_value = DEFAULT_STL_OUTPUT)]
        output: PathBuf,
    },
    /// Exports a 100 mm cube as STEP through FreeCAD.
    MakeStep {
        #[arg(default_value = DEFAULT_SIMPLE_STEP)]
        output: PathBuf,
    },
    /// Writes the built-in reference cube STEP file; FreeCAD is not needed.
    MakeReferenceStep {
        #[arg(default_value = DEFAULT_REFERENCE_STEP)]
        output: PathBuf,
    },
    /// Builds a simple robot-arm model and writes it as STL.
    MakeStl {
        #[arg(default_value = DEFAULT_SIMPLE_STL)]
        output: PathBuf,
    },
    /// Lists which FreeCAD executables and STEP models are present.
    Probe {
        /// STEP models to check; defaults to the bundled model paths.
        #[arg(long = "step", value_name = "PATH")]
        step_files: Vec<PathBuf>,
    },
}
