//! FreeCAD backend.
//!
//! [`FreeCadToolkit`] runs a [`CadJob`] by spawning the FreeCAD command-line
//! executable on an embedded driver script. The job travels as JSON through
//! a temporary file named by [`JOB_ENV_VAR`]; the driver answers with a
//! single stdout line starting with [`REPORT_PREFIX`]. Anything else FreeCAD
//! prints (start-up banners, Python tracebacks on stderr) is logged at debug
//! level and otherwise ignored.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use spray_config::Config;

use crate::error::CadError;
use crate::job::{CadJob, JobReport};
use crate::toolkit::CadToolkit;

const FREECAD_TARGET: &str = "spray_cad::freecad";

const DRIVER_SCRIPT: &str = include_str!("driver.py");

/// Environment variable naming the job file for the driver script.
pub const JOB_ENV_VAR: &str = "SPRAY_CAD_JOB";

/// Prefix of the driver's report line on stdout.
pub const REPORT_PREFIX: &str = "SPRAY_CAD_REPORT ";

/// Install locations checked when no executable is configured.
pub const KNOWN_INSTALLS: &[&str] = &[
    "K:/Kapps/FreeCAD/bin/FreeCADCmd.exe",
    "K:/Kapps/FreeCAD/bin/FreeCAD.exe",
];

/// Executable names looked up on `PATH` after the known installs.
const COMMAND_NAMES: &[&str] = &["FreeCADCmd", "freecadcmd", "FreeCAD", "freecad"];

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs CAD jobs in a FreeCAD child process.
#[derive(Debug, Clone)]
pub struct FreeCadToolkit {
    executable: PathBuf,
    timeout: Duration,
}

impl FreeCadToolkit {
    /// Uses `executable` directly, killing runs that outlast `timeout`.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    /// Finds FreeCAD from the configuration, the known install locations,
    /// or `PATH`, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`CadError::ToolkitNotFound`] when no candidate exists. An
    /// explicitly configured executable that cannot be found is never
    /// replaced by a fallback.
    pub fn locate(config: &Config) -> Result<Self, CadError> {
        let executable = locate_executable(config)?;
        debug!(
            target: FREECAD_TARGET,
            executable = %executable.display(),
            "located FreeCAD executable"
        );
        Ok(Self::new(executable, config.cad_timeout()))
    }

    /// Executable that jobs are run with.
    #[must_use]
    pub fn executable(&self) -> &Path {
        self.executable.as_path()
    }

    // The GUI build only runs scripts headless when asked for console mode.
    fn needs_console_flag(&self) -> bool {
        self.executable
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|stem| stem == "freecad")
    }
}

impl CadToolkit for FreeCadToolkit {
    fn run(&self, job: &CadJob) -> Result<JobReport, CadError> {
        let encoded = serde_json::to_string(job).map_err(|err| CadError::EncodeJob {
            message: err.to_string(),
        })?;
        let job_file = write_temp_file("spray-cad-job-", ".json", &encoded)?;
        let driver_file = write_temp_file("spray-cad-driver-", ".py", DRIVER_SCRIPT)?;

        let mut command = Command::new(&self.executable);
        if self.needs_console_flag() {
            command.arg("-c");
        }
        command
            .arg(driver_file.path())
            .env(JOB_ENV_VAR, job_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            target: FREECAD_TARGET,
            executable = %self.executable.display(),
            steps = job.steps().len(),
            "spawning FreeCAD"
        );

        let mut child = command.spawn().map_err(|err| CadError::SpawnFailed {
            executable: self.executable.clone(),
            message: err.to_string(),
            source: Some(Arc::new(err)),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| CadError::SpawnFailed {
            executable: self.executable.clone(),
            message: String::from("failed to capture stdout"),
            source: None,
        })?;
        let stdout_reader = spawn_reader("spray-cad-stdout", stdout, &self.executable)?;
        let stderr_reader = match child.stderr.take() {
            Some(stderr) => Some(spawn_reader("spray-cad-stderr", stderr, &self.executable)?),
            None => None,
        };

        let exit = wait_for_exit(&mut child, self.timeout);
        // Both pipes close once the child is gone, so the readers finish.
        let lines = join_reader(stdout_reader);
        if let Some(reader) = stderr_reader {
            let stderr = join_reader(reader);
            if !stderr.is_empty() {
                debug!(
                    target: FREECAD_TARGET,
                    stderr = %stderr.join("\n"),
                    "FreeCAD stderr output"
                );
            }
        }
        let status = exit?;

        match find_report(&lines) {
            Some(report) => parse_report(report),
            None if !status.success() => Err(CadError::NonZeroExit {
                status: status.code().unwrap_or(-1),
            }),
            None => Err(CadError::InvalidOutput {
                message: format!("no '{}' line on stdout", REPORT_PREFIX.trim_end()),
            }),
        }
    }
}

/// Every location [`FreeCadToolkit::locate`] would consider, configured
/// executable first. `PATH` entries are included only when they resolve.
#[must_use]
pub fn candidate_paths(config: &Config) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = config
        .freecad_executable()
        .map(PathBuf::from)
        .into_iter()
        .collect();
    candidates.extend(KNOWN_INSTALLS.iter().map(PathBuf::from));
    candidates.extend(
        COMMAND_NAMES
            .iter()
            .filter_map(|name| which::which(name).ok()),
    );
    candidates.dedup();
    candidates
}

fn locate_executable(config: &Config) -> Result<PathBuf, CadError> {
    if let Some(configured) = config.freecad_executable() {
        let path = Path::new(configured);
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return which::which(configured).map_err(|_| CadError::ToolkitNotFound {
            searched: configured.to_owned(),
        });
    }

    KNOWN_INSTALLS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .or_else(|| {
            COMMAND_NAMES
                .iter()
                .find_map(|name| which::which(name).ok())
        })
        .ok_or_else(|| CadError::ToolkitNotFound {
            searched: KNOWN_INSTALLS
                .iter()
                .chain(COMMAND_NAMES)
                .copied()
                .collect::<Vec<_>>()
                .join(", "),
        })
}

fn write_temp_file(prefix: &str, suffix: &str, contents: &str) -> Result<NamedTempFile, CadError> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()
        .map_err(|err| CadError::io(std::env::temp_dir(), err))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|err| CadError::io(file.path(), err))?;
    Ok(file)
}

fn spawn_reader(
    name: &str,
    source: impl Read + Send + 'static,
    executable: &Path,
) -> Result<JoinHandle<Vec<String>>, CadError> {
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            BufReader::new(source)
                .lines()
                .map_while(Result::ok)
                .collect::<Vec<String>>()
        })
        .map_err(|err| CadError::SpawnFailed {
            executable: executable.to_path_buf(),
            message: format!("failed to start {name} reader"),
            source: Some(Arc::new(err)),
        })
}

fn join_reader(reader: JoinHandle<Vec<String>>) -> Vec<String> {
    reader.join().unwrap_or_else(|_| {
        warn!(target: FREECAD_TARGET, "output reader panicked");
        Vec::new()
    })
}

/// Waits for the child to exit, killing it once `timeout` has elapsed.
fn wait_for_exit(child: &mut Child, timeout: Duration) -> Result<ExitStatus, CadError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: FREECAD_TARGET, ?status, "FreeCAD exited");
                return Ok(status);
            }
            Ok(None) if start.elapsed() > timeout => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    target: FREECAD_TARGET,
                    timeout_ms,
                    "FreeCAD timed out, killing process"
                );
                drop(child.kill());
                drop(child.wait());
                return Err(CadError::Timeout { timeout_ms });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                drop(child.kill());
                return Err(CadError::io("FreeCAD process", err));
            }
        }
    }
}

fn find_report(lines: &[String]) -> Option<&str> {
    lines
        .iter()
        .rev()
        .find_map(|line| line.trim_end().strip_prefix(REPORT_PREFIX))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DriverReport {
    Ok {
        shapes: usize,
        points: u64,
        facets: u64,
    },
    Error {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FailureKind {
    NoObjects,
    NoShapes,
    #[serde(other)]
    Failed,
}

fn parse_report(line: &str) -> Result<JobReport, CadError> {
    let report: DriverReport =
        serde_json::from_str(line.trim()).map_err(|err| CadError::InvalidOutput {
            message: format!("malformed report: {err}"),
        })?;
    match report {
        DriverReport::Ok {
            shapes,
            points,
            facets,
        } => Ok(JobReport {
            shapes,
            points,
            facets,
        }),
        DriverReport::Error {
            kind: FailureKind::NoObjects | FailureKind::NoShapes,
            message,
        } => Err(CadError::NoShapes { message }),
        DriverReport::Error {
            kind: FailureKind::Failed,
            message,
        } => Err(CadError::Toolkit { message }),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn report_line_is_found_among_banner_output() {
        let lines = vec![
            String::from("FreeCAD 0.21.2, Libs: 0.21.2R33771"),
            String::from("(c) Juergen Riegel, Werner Mayer, Yorik van Havre and others 2001-2023"),
            String::from(r#"SPRAY_CAD_REPORT {"status":"ok","shapes":1,"points":8,"facets":12}"#),
        ];
        let report = find_report(&lines).expect("report line");
        assert_eq!(
            parse_report(report).expect("parse report"),
            JobReport {
                shapes: 1,
                points: 8,
                facets: 12,
            }
        );
    }

    #[rstest]
    #[case::no_objects("no_objects")]
    #[case::no_shapes("no_shapes")]
    fn empty_documents_map_to_no_shapes(#[case] kind: &str) {
        let line = format!(r#"{{"status":"error","kind":"{kind}","message":"nothing here"}}"#);
        let error = parse_report(&line).expect_err("report is a failure");
        assert!(matches!(error, CadError::NoShapes { ref message } if message == "nothing here"));
    }

    #[test]
    fn unknown_failure_kinds_are_toolkit_errors() {
        let error = parse_report(r#"{"status":"error","kind":"segfault","message":"boom"}"#)
            .expect_err("report is a failure");
        assert!(matches!(error, CadError::Toolkit { .. }));
    }

    #[test]
    fn malformed_report_is_invalid_output() {
        let error = parse_report("{not json").expect_err("report is malformed");
        assert!(matches!(error, CadError::InvalidOutput { .. }));
    }

    #[test]
    fn configured_executable_is_used_when_present() {
        let file = NamedTempFile::new().expect("temp file");
        let mut config = Config::default();
        config.freecad_executable = file.path().display().to_string();

        let toolkit = FreeCadToolkit::locate(&config).expect("locate configured executable");
        assert_eq!(toolkit.executable(), file.path());
    }

    #[test]
    fn missing_configured_executable_is_not_replaced_by_a_fallback() {
        let mut config = Config::default();
        config.freecad_executable = String::from("/nonexistent/spray-cad/FreeCADCmd");

        let error = FreeCadToolkit::locate(&config).expect_err("executable is missing");
        assert!(matches!(error, CadError::ToolkitNotFound { .. }));
    }

    #[test]
    fn gui_build_runs_in_console_mode() {
        let gui = FreeCadToolkit::new("K:/Kapps/FreeCAD/bin/FreeCAD.exe", Duration::from_secs(1));
        let console = FreeCadToolkit::new("/usr/bin/FreeCADCmd", Duration::from_secs(1));
        assert!(gui.needs_console_flag());
        assert!(!console.needs_console_flag());
    }

    #[test]
    fn candidates_start_with_the_configured_executable() {
        let mut config = Config::default();
        config.freecad_executable = String::from("/opt/freecad/bin/FreeCADCmd");
        let candidates = candidate_paths(&config);
        assert_eq!(
            candidates.first(),
            Some(&PathBuf::from("/opt/freecad/bin/FreeCADCmd"))
        );
        assert!(candidates.contains(&PathBuf::from(KNOWN_INSTALLS[0])));
    }

    #[cfg(unix)]
    #[test]
    fn runs_fake_executables_through_the_process_protocol() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let received = dir.path().join("received.json");
        let script = |name: &str, body: &str| {
            let folder = dir.path().join(name);
            fs::create_dir(&folder).expect("create script dir");
            let path = folder.join("FreeCADCmd");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
            path
        };

        // Scripts are all written before any is spawned.
        let succeeding = script(
            "ok",
            &format!(
                "case \"$1\" in *.py) ;; *) exit 9 ;; esac\n\
                 echo 'FreeCAD banner'\n\
                 cp \"${JOB_ENV_VAR}\" '{}'\n\
                 echo 'SPRAY_CAD_REPORT {{\"status\":\"ok\",\"shapes\":2,\"points\":10,\"facets\":16}}'",
                received.display()
            ),
        );
        let failing = script("fail", "echo 'Traceback' >&2\nexit 3");
        let hanging = script("slow", "exec sleep 5");

        let job = CadJob::new_document("StepToStl").import_step(Path::new("part.step"));
        let report = FreeCadToolkit::new(&succeeding, Duration::from_secs(10))
            .run(&job)
            .expect("fake run succeeds");
        assert_eq!(
            report,
            JobReport {
                shapes: 2,
                points: 10,
                facets: 16,
            }
        );
        let echoed: CadJob =
            serde_json::from_str(&fs::read_to_string(&received).expect("job copied"))
                .expect("job decodes");
        assert_eq!(echoed, job);

        let error = FreeCadToolkit::new(&failing, Duration::from_secs(10))
            .run(&job)
            .expect_err("non-zero exit");
        assert!(matches!(error, CadError::NonZeroExit { status: 3 }));

        let started = Instant::now();
        let error = FreeCadToolkit::new(&hanging, Duration::from_millis(200))
            .run(&job)
            .expect_err("timeout");
        assert!(matches!(error, CadError::Timeout { timeout_ms: 200 }));
        assert_eq!(error.to_string(), "toolkit timed out after 200 ms");
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
