//! Failure taxonomy for the fetch-and-install pipeline.
//!
//! Every phase failure surfaces as one of these variants so callers can
//! match on the exact condition (the orchestrator's batch policy and the
//! CLI exit codes both depend on it).

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::CatalogError;

#[derive(Debug, Error)]
pub enum InstallError {
    /// Pre-flight collision: the download directory is left over from a
    /// prior (possibly partial) run and must be removed by hand.
    #[error("download directory '{dir}' already exists; remove or rename it before re-running")]
    AlreadyExists { dir: PathBuf },

    /// A requested name is not in the catalog.
    #[error("unknown dependency '{name}'")]
    UnknownDependency { name: String },

    /// An external tool returned non-zero. Full output is in the run log.
    #[error("command {command} failed ({status}); see '{log}' for details")]
    ProcessFailure {
        command: String,
        status: ExitStatus,
        log: PathBuf,
    },

    /// An external tool exceeded the configured wall-clock limit and was
    /// killed.
    #[error("command {command} did not finish within {}s and was killed", .after.as_secs())]
    ProcessTimeout { command: String, after: Duration },

    /// A file-copy step could not complete (missing source, permissions,
    /// disk full).
    #[error("copying '{path}' failed: {source}")]
    CopyFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A required external tool could not be located.
    #[error("required tool '{tool}' not found; set ${env} or install it on PATH")]
    ToolUnavailable { tool: String, env: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Filesystem or spawn failure outside the cases above.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        InstallError::Io {
            context: context.into(),
            source,
        }
    }
}
