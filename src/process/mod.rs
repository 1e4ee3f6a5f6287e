//! External process execution with captured output.
//!
//! Every tool invocation in a run goes through one [`Runner`], which owns
//! the run's [`RunLog`]. The runner writes a banner line, hands the
//! child's stdout and stderr straight to the log file, awaits completion,
//! and flushes so partial output survives a crash. Non-zero exit becomes
//! [`InstallError::ProcessFailure`] pointing at the log.
//!
//! Arguments are always passed as a vector; nothing is routed through a
//! shell, so paths and tags never need escaping.

use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::error::InstallError;

/// Log file name, created under the download root.
pub const LOG_FILENAME: &str = "deps-fetch.log";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Append-only log for one orchestrator run.
///
/// Holds the open file handle for the whole run; child processes write
/// into cloned handles of the same file so banners and tool output stay
/// in execution order.
#[derive(Debug)]
pub struct RunLog {
    file: File,
    path: PathBuf,
}

impl RunLog {
    /// Create (truncate) the log file under `dir` and write the
    /// timestamped run header.
    pub fn create(dir: &Path) -> Result<Self, InstallError> {
        let path = dir.join(LOG_FILENAME);
        let file = File::create(&path)
            .map_err(|e| InstallError::io(format!("creating run log '{}'", path.display()), e))?;
        let mut log = RunLog { file, path };
        log.banner(&format!("deps-fetch run started {}", utc_timestamp()))?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a `*** ... ***` banner line and flush.
    pub fn banner(&mut self, text: &str) -> Result<(), InstallError> {
        writeln!(self.file, "\n*** {} ***\n", text)
            .and_then(|_| self.file.flush())
            .map_err(|e| InstallError::io(format!("writing run log '{}'", self.path.display()), e))
    }

    /// Write a plain note line (used for per-file copy records) and flush.
    pub fn note(&mut self, text: &str) -> Result<(), InstallError> {
        writeln!(self.file, "{}", text)
            .and_then(|_| self.file.flush())
            .map_err(|e| InstallError::io(format!("writing run log '{}'", self.path.display()), e))
    }

    /// A writable handle onto the log for child process output.
    fn stdio(&self) -> Result<Stdio, InstallError> {
        self.file
            .try_clone()
            .map(Stdio::from)
            .map_err(|e| InstallError::io(format!("cloning run log '{}'", self.path.display()), e))
    }
}

/// Runs one external command at a time, archiving its output in the run
/// log. The optional timeout bounds each invocation's wall-clock time;
/// without it a hung tool hangs the whole run.
#[derive(Debug)]
pub struct Runner {
    log: RunLog,
    timeout: Option<Duration>,
}

impl Runner {
    pub fn new(log: RunLog) -> Self {
        Runner { log, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn log_mut(&mut self) -> &mut RunLog {
        &mut self.log
    }

    /// Run `program` with `args` in `cwd`, blocking until it exits.
    ///
    /// Output is not parsed, only archived; success carries no value.
    pub fn run(&mut self, program: &Path, args: &[OsString], cwd: &Path) -> Result<(), InstallError> {
        let pretty = render_command(program, args);
        self.log
            .banner(&format!("running: {} [in {}]", pretty, cwd.display()))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(self.log.stdio()?)
            .stderr(self.log.stdio()?)
            .spawn()
            .map_err(|e| InstallError::io(format!("spawning {}", pretty), e))?;

        let status = match self.timeout {
            None => child
                .wait()
                .map_err(|e| InstallError::io(format!("waiting for {}", pretty), e))?,
            Some(limit) => self.wait_with_deadline(&mut child, limit, &pretty)?,
        };

        if !status.success() {
            self.log
                .banner(&format!("{} failed ({})", program_name(program), status))?;
            return Err(InstallError::ProcessFailure {
                command: pretty,
                status,
                log: self.log.path().to_path_buf(),
            });
        }

        self.log
            .banner(&format!("{} success", program_name(program)))?;
        Ok(())
    }

    fn wait_with_deadline(
        &mut self,
        child: &mut std::process::Child,
        limit: Duration,
        pretty: &str,
    ) -> Result<ExitStatus, InstallError> {
        let deadline = Instant::now() + limit;
        loop {
            match child
                .try_wait()
                .map_err(|e| InstallError::io(format!("waiting for {}", pretty), e))?
            {
                Some(status) => return Ok(status),
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    self.log.banner(&format!(
                        "killed after {}s timeout: {}",
                        limit.as_secs(),
                        pretty
                    ))?;
                    return Err(InstallError::ProcessTimeout {
                        command: pretty.to_string(),
                        after: limit,
                    });
                }
                None => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    format!("`{}`", parts.join(" "))
}

fn utc_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
