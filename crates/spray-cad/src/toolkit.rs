//! Seam between the conversion operations and a CAD kernel.

use crate::error::CadError;
use crate::job::{CadJob, JobReport};

/// Executes CAD jobs.
///
/// The production implementation drives FreeCAD in a child process; tests
/// substitute doubles that record jobs or write canned meshes.
pub trait CadToolkit {
    /// Runs every step of `job` against a fresh document.
    ///
    /// # Errors
    ///
    /// Returns [`CadError`] when the toolkit cannot be started or any step
    /// fails.
    fn run(&self, job: &CadJob) -> Result<JobReport, CadError>;
}

impl<T: CadToolkit + ?Sized> CadToolkit for &T {
    fn run(&self, job: &CadJob) -> Result<JobReport, CadError> {
        (**self).run(job)
    }
}

impl<T: CadToolkit + ?Sized> CadToolkit for Box<T> {
    fn run(&self, job: &CadJob) -> Result<JobReport, CadError> {
        (**self).run(job)
    }
}
