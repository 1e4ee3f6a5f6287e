//! Fetch, build, and stage pinned third-party source dependencies.
//!
//! Given a declarative catalog of git-hosted dependencies, this crate
//! clones each one at its pinned revision under a download root, then
//! materializes it into a local install prefix (either by copying listed
//! files or by a cmake configure/build/install pass), recording the full
//! output of every external tool in a durable run log.
//!
//! - **Catalog** - ordered, validated recipe table loaded from TOML
//! - **Process runner** - one external command at a time, output archived
//! - **Installer** - pre-flight / acquire / materialize / report phases
//! - **Orchestrator** - batch validation, sequencing, outcome report
//!
//! # Architecture
//!
//! ```text
//! catalog entries
//!     │  orchestrator selects the requested subset (validated up front)
//!     ▼
//! one installer per recipe, bound to the shared InstallEnv
//!     │  pre-flight → acquire → materialize → report
//!     ▼
//! per-name outcome report + run log under the download root
//! ```
//!
//! This is not a build system or dependency resolver: it only walks a
//! fixed list of fetch+build recipes and reports success or failure per
//! entry.
//!
//! # Example
//!
//! ```rust,ignore
//! use deps_fetch::{orchestrator, Catalog, RunOptions, Toolchain};
//! use std::path::Path;
//!
//! let catalog = Catalog::builtin()?;
//! let tools = Toolchain::from_env()?;
//! let report = orchestrator::run(
//!     &catalog,
//!     &catalog.names(),
//!     Path::new("./deps_src"),
//!     Path::new("./deps_install"),
//!     &tools,
//!     &RunOptions::default(),
//! )?;
//! ```

pub mod catalog;
pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod process;
pub mod toolchain;

pub use catalog::{Catalog, Materialize, Pin, Recipe};
pub use error::InstallError;
pub use installer::{InstallEnv, Installer};
pub use orchestrator::{Outcome, Report, RunOptions};
pub use process::{RunLog, Runner};
pub use toolchain::Toolchain;
