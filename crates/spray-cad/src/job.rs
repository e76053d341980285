//! Toolkit-neutral description of a CAD job.
//!
//! A [`CadJob`] is an ordered list of [`JobStep`]s. Toolkits execute the
//! steps in order against one document and answer with a [`JobReport`].
//! The JSON form of a job is what the FreeCAD driver script reads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use spray_config::{Config, DEFAULT_ANGULAR_DEFLECTION, DEFAULT_LINEAR_DEFLECTION};

/// Tessellation tolerances used when meshing shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Maximum chord deviation.
    pub linear_deflection: f64,
    /// Maximum angle between adjacent facet normals, in radians.
    pub angular_deflection: f64,
}

impl Tolerance {
    /// Builds a tolerance from explicit values.
    #[must_use]
    pub const fn new(linear_deflection: f64, angular_deflection: f64) -> Self {
        Self {
            linear_deflection,
            angular_deflection,
        }
    }

    /// Reads the configured deflection pair.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        let (linear, angular) = config.deflection();
        Self::new(linear, angular)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(DEFAULT_LINEAR_DEFLECTION, DEFAULT_ANGULAR_DEFLECTION)
    }
}

/// Parametric solid added to a document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    /// Axis-aligned box anchored at its minimum corner.
    Box {
        /// Extent along X.
        length: f64,
        /// Extent along Y.
        width: f64,
        /// Extent along Z.
        height: f64,
    },
    /// Cylinder standing on the XY plane around its local Z axis.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Extent along Z.
        height: f64,
    },
}

/// Translation applied to a primitive's base point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Offset along X.
    pub x: f64,
    /// Offset along Y.
    pub y: f64,
    /// Offset along Z.
    pub z: f64,
}

impl Placement {
    /// Placement at the given offsets.
    #[must_use]
    pub const fn at(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One operation of a [`CadJob`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JobStep {
    /// Closes any open document and starts a new one.
    NewDocument {
        /// Document name.
        name: String,
    },
    /// Adds a labelled primitive to the document.
    AddPrimitive {
        /// Object label shown in the document tree.
        label: String,
        /// Solid to create.
        primitive: Primitive,
        /// Offset of the solid's base point.
        placement: Placement,
    },
    /// Imports every object of a STEP file into the document.
    ImportStep {
        /// STEP file to read.
        path: PathBuf,
    },
    /// Exports the document objects as STEP.
    ExportStep {
        /// STEP file to write.
        path: PathBuf,
    },
    /// Meshes the valid shapes of the document, compounding them when there
    /// is more than one.
    Tessellate {
        /// Meshing tolerances.
        tolerance: Tolerance,
    },
    /// Writes the current mesh as STL.
    WriteStl {
        /// STL file to write.
        path: PathBuf,
    },
}

/// Ordered list of steps run against a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CadJob {
    steps: Vec<JobStep>,
}

impl CadJob {
    /// Starts a job whose first step opens a document called `name`.
    #[must_use]
    pub fn new_document(name: impl Into<String>) -> Self {
        Self {
            steps: vec![JobStep::NewDocument { name: name.into() }],
        }
    }

    /// Appends an [`JobStep::AddPrimitive`] step.
    #[must_use]
    pub fn add_primitive(
        mut self,
        label: impl Into<String>,
        primitive: Primitive,
        placement: Placement,
    ) -> Self {
        self.steps.push(JobStep::AddPrimitive {
            label: label.into(),
            primitive,
            placement,
        });
        self
    }

    /// Appends an [`JobStep::ImportStep`] step.
    #[must_use]
    pub fn import_step(mut self, path: &Path) -> Self {
        self.steps.push(JobStep::ImportStep {
            path: path.to_path_buf(),
        });
        self
    }

    /// Appends an [`JobStep::ExportStep`] step.
    #[must_use]
    pub fn export_step(mut self, path: &Path) -> Self {
        self.steps.push(JobStep::ExportStep {
            path: path.to_path_buf(),
        });
        self
    }

    /// Appends a [`JobStep::Tessellate`] step.
    #[must_use]
    pub fn tessellate(mut self, tolerance: Tolerance) -> Self {
        self.steps.push(JobStep::Tessellate { tolerance });
        self
    }

    /// Appends a [`JobStep::WriteStl`] step.
    #[must_use]
    pub fn write_stl(mut self, path: &Path) -> Self {
        self.steps.push(JobStep::WriteStl {
            path: path.to_path_buf(),
        });
        self
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[JobStep] {
        &self.steps
    }

    /// Tolerance of the first tessellation step, if any.
    #[must_use]
    pub fn tolerance(&self) -> Option<Tolerance> {
        self.steps.iter().find_map(|step| match step {
            JobStep::Tessellate { tolerance } => Some(*tolerance),
            _ => None,
        })
    }
}

/// Summary returned by a toolkit after a successful job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// Valid shapes found in the document.
    pub shapes: usize,
    /// Mesh vertex count, zero when nothing was tessellated.
    pub points: u64,
    /// Mesh facet count, zero when nothing was tessellated.
    pub facets: u64,
}
