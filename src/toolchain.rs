//! External tool resolution.
//!
//! Resolution order per tool:
//! 1. Upper-case environment variable (`GIT`, `CMAKE`, `MAKE`) naming the
//!    executable path
//! 2. System PATH (`which`)
//!
//! All three tools are resolved up front, before any dependency runs, so
//! a missing tool fails the run before anything touches the filesystem.

use std::env;
use std::path::PathBuf;

use crate::error::InstallError;

/// Resolved paths of the external tools every run may invoke.
///
/// Constructed once and passed down explicitly; tests substitute stub
/// executables instead of touching the environment.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub git: PathBuf,
    pub cmake: PathBuf,
    pub make: PathBuf,
}

impl Toolchain {
    /// Resolve all tools from the environment, failing with
    /// [`InstallError::ToolUnavailable`] on the first one missing.
    pub fn from_env() -> Result<Self, InstallError> {
        Ok(Toolchain {
            git: resolve_tool("git", "GIT")?,
            cmake: resolve_tool("cmake", "CMAKE")?,
            make: resolve_tool("make", "MAKE")?,
        })
    }
}

/// Resolve one tool: env var override first, then PATH lookup.
pub fn resolve_tool(tool: &str, env_var: &str) -> Result<PathBuf, InstallError> {
    if let Ok(path) = env::var(env_var) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    which::which(tool).map_err(|_| InstallError::ToolUnavailable {
        tool: tool.to_string(),
        env: env_var.to_string(),
    })
}
