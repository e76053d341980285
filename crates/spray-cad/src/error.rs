//! Error types for CAD conversion jobs.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while preparing, running, or verifying a CAD job.
///
/// Variants wrapping [`io::Error`] hold it behind an [`Arc`] so the error
/// stays cheap to clone when it is both logged and reported.
#[derive(Debug, Clone, Error)]
pub enum CadError {
    /// The STEP input does not exist; nothing was run.
    #[error("STEP file does not exist: {}", path.display())]
    MissingInput {
        /// Path that was checked.
        path: PathBuf,
    },

    /// No FreeCAD command-line executable could be located.
    #[error("FreeCAD executable not found (searched: {searched})")]
    ToolkitNotFound {
        /// Human-readable list of the places that were searched.
        searched: String,
    },

    /// The document held no usable geometry.
    #[error("no shapes to convert: {message}")]
    NoShapes {
        /// Detail reported by the toolkit.
        message: String,
    },

    /// The toolkit reported a failure while running a job step.
    #[error("toolkit failed: {message}")]
    Toolkit {
        /// Detail reported by the toolkit.
        message: String,
    },

    /// The toolkit process could not be started.
    #[error("failed to start '{}': {message}", executable.display())]
    SpawnFailed {
        /// Executable that was spawned.
        executable: PathBuf,
        /// What went wrong.
        message: String,
        /// Underlying OS error, when there is one.
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// The toolkit did not finish within its time limit and was killed.
    #[error("toolkit timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured limit in milliseconds.
        timeout_ms: u64,
    },

    /// The toolkit exited unsuccessfully without reporting a result.
    #[error("toolkit exited with status {status}")]
    NonZeroExit {
        /// Exit code, or `-1` when the process was terminated by a signal.
        status: i32,
    },

    /// The toolkit output did not contain a usable report.
    #[error("invalid toolkit output: {message}")]
    InvalidOutput {
        /// What was wrong with the output.
        message: String,
    },

    /// The job could not be serialised for the toolkit.
    #[error("failed to encode CAD job: {message}")]
    EncodeJob {
        /// Serialiser message.
        message: String,
    },

    /// The job claimed success but wrote no file.
    #[error("expected output was not written: {}", path.display())]
    MissingOutput {
        /// Path that should exist.
        path: PathBuf,
    },

    /// The output file exists but holds no geometry.
    #[error("output file is empty: {}", path.display())]
    EmptyOutput {
        /// Offending file.
        path: PathBuf,
    },

    /// The STL output could not be parsed.
    #[error("invalid STL '{}': {message}", path.display())]
    InvalidStl {
        /// Offending file.
        path: PathBuf,
        /// What failed to parse.
        message: String,
    },

    /// A filesystem or pipe operation failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// File or resource involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl CadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
