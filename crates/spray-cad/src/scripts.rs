//! Conversion and fixture operations built on a [`CadToolkit`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CadError;
use crate::job::{CadJob, JobReport, Placement, Primitive, Tolerance};
use crate::stl::{self, StlSummary};
use crate::toolkit::CadToolkit;

const SCRIPTS_TARGET: &str = "spray_cad::scripts";

/// Hand-authored ISO-10303-21 cube used when no CAD kernel is available.
pub const REFERENCE_CUBE_STEP: &str = include_str!("reference_cube.step");

/// Default STEP model converted by `spray-cad convert`.
pub const DEFAULT_STEP_INPUT: &str = "data/model/MPX3500.STEP";
/// Default STL written by `spray-cad convert`.
pub const DEFAULT_STL_OUTPUT: &str = "data/model/MPX3500.stl";
/// Default output of `spray-cad make-step`.
pub const DEFAULT_SIMPLE_STEP: &str = "data/model/simple_test.STEP";
/// Default output of `spray-cad make-reference-step`.
pub const DEFAULT_REFERENCE_STEP: &str = "data/model/simple_cube.step";
/// Default output of `spray-cad make-stl`.
pub const DEFAULT_SIMPLE_STL: &str = "data/model/simple_robot.stl";
/// STEP models checked by `spray-cad probe` when none are given.
pub const DEFAULT_PROBE_MODELS: &[&str] = &["data/model/杭汽轮总装.STEP", DEFAULT_STEP_INPUT];

/// Outcome of a job that produced an STL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshOutput {
    /// Where the STL was written.
    pub path: PathBuf,
    /// Counts reported by the toolkit.
    pub report: JobReport,
    /// Counts read back from the written file.
    pub stl: StlSummary,
}

/// Checks that a conversion input exists before any toolkit runs.
///
/// # Errors
///
/// Returns [`CadError::MissingInput`] unless `path` is an existing file.
pub fn require_input(path: &Path) -> Result<(), CadError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CadError::MissingInput {
            path: path.to_path_buf(),
        })
    }
}

/// Converts a STEP model to STL.
///
/// The input is checked before the toolkit is involved. After the toolkit
/// reports success the STL is read back; a missing or empty file fails the
/// conversion even when the toolkit claimed otherwise.
///
/// # Errors
///
/// [`CadError::MissingInput`] for an absent input, [`CadError::NoShapes`]
/// when the model holds no valid geometry, any toolkit failure, and the
/// [`stl::inspect`] errors for bad output.
pub fn convert_step_to_stl(
    toolkit: &dyn CadToolkit,
    input: &Path,
    output: &Path,
    tolerance: Tolerance,
) -> Result<MeshOutput, CadError> {
    require_input(input)?;
    ensure_parent(output)?;

    info!(
        target: SCRIPTS_TARGET,
        input = %input.display(),
        output = %output.display(),
        linear_deflection = tolerance.linear_deflection,
        angular_deflection = tolerance.angular_deflection,
        "converting STEP to STL"
    );
    let job = CadJob::new_document("StepToStl")
        .import_step(input)
        .tessellate(tolerance)
        .write_stl(output);
    run_mesh_job(toolkit, &job, output)
}

/// Exports a 100×100×100 box as STEP.
///
/// # Errors
///
/// Toolkit failures, or [`CadError::MissingOutput`] / [`CadError::EmptyOutput`]
/// when the STEP file was not written.
pub fn create_simple_step(toolkit: &dyn CadToolkit, output: &Path) -> Result<JobReport, CadError> {
    ensure_parent(output)?;
    let job = CadJob::new_document("SimpleTest")
        .add_primitive(
            "TestBox",
            Primitive::Box {
                length: 100.0,
                width: 100.0,
                height: 100.0,
            },
            Placement::default(),
        )
        .export_step(output);
    let report = toolkit.run(&job)?;
    require_non_empty(output)?;
    info!(target: SCRIPTS_TARGET, output = %output.display(), "simple STEP written");
    Ok(report)
}

/// Writes the built-in reference cube without a toolkit.
///
/// # Errors
///
/// Returns [`CadError::Io`] when the file or its directory cannot be
/// created.
pub fn write_reference_step(output: &Path) -> Result<(), CadError> {
    ensure_parent(output)?;
    fs::write(output, REFERENCE_CUBE_STEP).map_err(|err| CadError::io(output, err))?;
    info!(target: SCRIPTS_TARGET, output = %output.display(), "reference STEP written");
    Ok(())
}

/// Builds a simple robot-arm model and writes it as STL.
///
/// # Errors
///
/// Toolkit failures and the [`stl::inspect`] errors for bad output.
pub fn create_simple_stl(
    toolkit: &dyn CadToolkit,
    output: &Path,
    tolerance: Tolerance,
) -> Result<MeshOutput, CadError> {
    ensure_parent(output)?;
    let job = robot_arm()
        .tessellate(tolerance)
        .write_stl(output);
    run_mesh_job(toolkit, &job, output)
}

fn robot_arm() -> CadJob {
    CadJob::new_document("SimpleSTL")
        .add_primitive(
            "Base",
            Primitive::Cylinder {
                radius: 50.0,
                height: 20.0,
            },
            Placement::default(),
        )
        .add_primitive(
            "Arm1",
            Primitive::Box {
                length: 200.0,
                width: 30.0,
                height: 30.0,
            },
            Placement::at(0.0, -15.0, 20.0),
        )
        .add_primitive(
            "Arm2",
            Primitive::Box {
                length: 150.0,
                width: 25.0,
                height: 25.0,
            },
            Placement::at(200.0, -12.5, 32.5),
        )
        .add_primitive(
            "EndEffector",
            Primitive::Cylinder {
                radius: 15.0,
                height: 40.0,
            },
            Placement::at(350.0, 0.0, 40.0),
        )
}

fn run_mesh_job(
    toolkit: &dyn CadToolkit,
    job: &CadJob,
    output: &Path,
) -> Result<MeshOutput, CadError> {
    let report = toolkit.run(job)?;
    if report.shapes == 0 {
        return Err(CadError::NoShapes {
            message: String::from("toolkit reported no valid shapes"),
        });
    }
    let stl = stl::inspect(output)?;
    if stl.facets != report.facets {
        debug!(
            target: SCRIPTS_TARGET,
            reported = report.facets,
            written = stl.facets,
            "facet count differs from the toolkit report"
        );
    }
    info!(
        target: SCRIPTS_TARGET,
        output = %output.display(),
        points = report.points,
        facets = report.facets,
        "STL written"
    );
    Ok(MeshOutput {
        path: output.to_path_buf(),
        report,
        stl,
    })
}

fn ensure_parent(output: &Path) -> Result<(), CadError> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| CadError::io(parent, err))
        }
        _ => Ok(()),
    }
}

fn require_non_empty(output: &Path) -> Result<(), CadError> {
    match fs::metadata(output) {
        Ok(metadata) if metadata.len() > 0 => Ok(()),
        Ok(_) => Err(CadError::EmptyOutput {
            path: output.to_path_buf(),
        }),
        Err(_) => Err(CadError::MissingOutput {
            path: output.to_path_buf(),
        }),
    }
}

/// Whether a probed path exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    /// Path that was checked.
    pub path: PathBuf,
    /// Whether a file exists there.
    pub found: bool,
}

impl ProbeEntry {
    fn check(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            found: path.is_file(),
        }
    }
}

/// Availability of toolkit executables and STEP inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Candidate FreeCAD executables, in search order.
    pub toolkits: Vec<ProbeEntry>,
    /// STEP models the conversion would read.
    pub step_files: Vec<ProbeEntry>,
}

impl ProbeReport {
    /// True when at least one toolkit executable exists.
    #[must_use]
    pub fn toolkit_available(&self) -> bool {
        self.toolkits.iter().any(|entry| entry.found)
    }
}

/// Reports which of the candidate executables and STEP files exist.
#[must_use]
pub fn probe_toolkit(candidates: &[PathBuf], step_files: &[PathBuf]) -> ProbeReport {
    ProbeReport {
        toolkits: candidates.iter().map(|path| ProbeEntry::check(path)).collect(),
        step_files: step_files.iter().map(|path| ProbeEntry::check(path)).collect(),
    }
}
