//! Behavioural coverage for STEP to STL conversion.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use crate::scripts::{MeshOutput, REFERENCE_CUBE_STEP, convert_step_to_stl};
use crate::tests::support::TriangleMesh;
use crate::{CadError, CadJob, CadToolkit, JobReport, JobStep, Tolerance};

/// Meshes a unit disc as a triangle fan, one facet per `linear_deflection`
/// of arc length, so finer tolerances give denser meshes.
#[derive(Default)]
struct FanToolkit {
    invocations: Cell<usize>,
}

impl FanToolkit {
    fn mesh_for(tolerance: Tolerance) -> TriangleMesh {
        let circumference = std::f64::consts::TAU;
        let segments = (circumference / tolerance.linear_deflection).ceil().max(3.0);
        let segments = u32::try_from(segments as u64).unwrap_or(u32::MAX);

        let mut mesh = TriangleMesh::new();
        let hub = mesh.push_vertex([0.0, 0.0, 0.0]);
        let rim: Vec<u32> = (0..segments)
            .map(|index| {
                let angle = f64::from(index) * circumference / f64::from(segments);
                mesh.push_vertex([angle.cos() as f32, angle.sin() as f32, 0.0])
            })
            .collect();
        for (index, &current) in rim.iter().enumerate() {
            let next = rim[(index + 1) % rim.len()];
            if let Err(message) = mesh.push_triangle([hub, current, next]) {
                panic!("fan triangle: {message}");
            }
        }
        mesh
    }
}

impl CadToolkit for FanToolkit {
    fn run(&self, job: &CadJob) -> Result<JobReport, CadError> {
        self.invocations.set(self.invocations.get() + 1);
        let tolerance = job.tolerance().unwrap_or_default();
        let mesh = Self::mesh_for(tolerance);
        for step in job.steps() {
            if let JobStep::WriteStl { path } = step {
                mesh.write_binary(path, "fan")?;
            }
        }
        let facets = mesh.triangle_count() as u64;
        Ok(JobReport {
            shapes: 1,
            points: facets + 1,
            facets,
        })
    }
}

struct World {
    dir: TempDir,
    toolkit: FanToolkit,
    outputs: Vec<PathBuf>,
    results: Vec<Result<MeshOutput, CadError>>,
}

impl World {
    fn new() -> Self {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            dir,
            toolkit: FanToolkit::default(),
            outputs: Vec::new(),
            results: Vec::new(),
        }
    }

    fn last_success(&self) -> &MeshOutput {
        match self.results.last() {
            Some(Ok(mesh)) => mesh,
            Some(Err(error)) => panic!("conversion failed: {error}"),
            None => panic!("no conversion ran"),
        }
    }
}

#[fixture]
fn world() -> RefCell<World> {
    RefCell::new(World::new())
}

#[given("a CAD workspace")]
fn given_workspace(world: &RefCell<World>) {
    assert!(world.borrow().dir.path().is_dir());
}

#[given("a STEP model \"{name}\"")]
fn given_step_model(world: &RefCell<World>, name: String) {
    let path = world.borrow().dir.path().join(name);
    if let Err(error) = fs::write(&path, REFERENCE_CUBE_STEP) {
        panic!("failed to write STEP model: {error}");
    }
}

#[when("the model \"{name}\" is converted with linear deflection {deflection}")]
fn when_converted(world: &RefCell<World>, name: String, deflection: f64) {
    let mut world = world.borrow_mut();
    let input = world.dir.path().join(name);
    let output = world
        .dir
        .path()
        .join(format!("out-{}.stl", world.outputs.len()));
    let result = convert_step_to_stl(
        &world.toolkit,
        &input,
        &output,
        Tolerance::new(deflection, 0.1),
    );
    world.outputs.push(output);
    world.results.push(result);
}

#[then("the conversion fails because the input is missing")]
fn then_missing_input(world: &RefCell<World>) {
    let world = world.borrow();
    assert!(matches!(
        world.results.last(),
        Some(Err(CadError::MissingInput { .. }))
    ));
}

#[then("the toolkit was never invoked")]
fn then_toolkit_idle(world: &RefCell<World>) {
    assert_eq!(world.borrow().toolkit.invocations.get(), 0);
}

#[then("no STL file was written")]
fn then_no_output(world: &RefCell<World>) {
    let world = world.borrow();
    assert!(world.outputs.iter().all(|path| !path.exists()));
}

#[then("the STL file is not empty")]
fn then_non_empty(world: &RefCell<World>) {
    let world = world.borrow();
    let mesh = world.last_success();
    let size = fs::metadata(&mesh.path).map(|metadata| metadata.len()).unwrap_or(0);
    assert!(size > 0, "STL at {} is empty", mesh.path.display());
    assert!(mesh.stl.facets > 0);
}

#[then("the reported facet count matches the STL file")]
fn then_counts_match(world: &RefCell<World>) {
    let world = world.borrow();
    let mesh = world.last_success();
    assert_eq!(mesh.report.facets, mesh.stl.facets);
    assert_eq!(mesh.report.points, mesh.stl.points);
}

#[then("the finer conversion has more facets")]
fn then_finer_is_denser(world: &RefCell<World>) {
    let world = world.borrow();
    let facets: Vec<u64> = world
        .results
        .iter()
        .map(|result| match result {
            Ok(mesh) => mesh.stl.facets,
            Err(error) => panic!("conversion failed: {error}"),
        })
        .collect();
    assert_eq!(facets.len(), 2);
    assert!(
        facets[1] > facets[0],
        "expected 0.1 deflection to refine the 1.0 mesh: {facets:?}"
    );
}

#[scenario(path = "tests/features/step_conversion.feature")]
fn step_conversion(#[from(world)] world: RefCell<World>) {
    drop(world);
}
