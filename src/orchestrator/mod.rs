//! Batch orchestration: name validation, sequencing, outcome report.
//!
//! Dependencies run strictly sequentially, one installer per selected
//! recipe, all bound to one shared [`InstallEnv`] and one run log. The
//! whole batch is validated against the catalog before anything touches
//! the filesystem.
//!
//! Batch policy: fail-stop by default (the first dependency failure
//! leaves the remaining ones unattempted). `keep_going` opts into
//! continue-on-error, recording every failure and reporting a
//! multi-failure summary instead; each dependency's state on disk is
//! independent, so both policies are safe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{Catalog, Recipe};
use crate::error::InstallError;
use crate::installer::{InstallEnv, Installer};
use crate::process::{RunLog, Runner};
use crate::toolchain::Toolchain;

/// Batch-level knobs, all off by default.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Continue with the remaining dependencies after a failure instead
    /// of stopping the batch.
    pub keep_going: bool,
    /// Wall-clock bound for each external tool invocation.
    pub timeout: Option<Duration>,
}

/// Result of one attempted dependency.
#[derive(Debug)]
pub enum Outcome {
    Installed,
    Failed(InstallError),
}

/// Per-name outcomes for every dependency attempted, in execution order.
#[derive(Debug)]
pub struct Report {
    pub log: PathBuf,
    pub outcomes: Vec<(String, Outcome)>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, Outcome::Failed(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// One summary line per dependency attempted.
    pub fn summary_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|(name, outcome)| match outcome {
                Outcome::Installed => format!("{}: installed", name),
                Outcome::Failed(err) => format!("{}: failed ({})", name, err),
            })
            .collect()
    }
}

/// Resolve the requested names against the catalog, in the order given.
///
/// Whole-batch validation: the first unknown name fails the entire
/// request before any installer is constructed.
pub fn select<'c>(catalog: &'c Catalog, names: &[String]) -> Result<Vec<&'c Recipe>, InstallError> {
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match catalog.get(name) {
            Some(recipe) => selected.push(recipe),
            None => {
                return Err(InstallError::UnknownDependency {
                    name: name.clone(),
                })
            }
        }
    }
    Ok(selected)
}

/// Install the named dependencies into `install_prefix`, cloning under
/// `source_root`.
///
/// Returns `Err` only for whole-batch failures (unknown names,
/// environment or log setup); per-dependency failures are recorded in
/// the [`Report`].
pub fn run(
    catalog: &Catalog,
    names: &[String],
    source_root: &Path,
    install_prefix: &Path,
    tools: &Toolchain,
    opts: &RunOptions,
) -> Result<Report, InstallError> {
    let selected = select(catalog, names)?;

    let env = InstallEnv::prepare(source_root, install_prefix)?;
    println!(
        "[deps] downloading to '{}', installing to '{}'",
        env.source_root.display(),
        env.install_prefix.display()
    );

    let log = RunLog::create(&env.source_root)?;
    let mut runner = Runner::new(log).with_timeout(opts.timeout);
    let log_path = runner.log_path().to_path_buf();

    let mut outcomes = Vec::with_capacity(selected.len());
    for recipe in selected {
        println!(
            "[deps:{}] installing from {} at {}",
            recipe.name,
            recipe.git_url,
            recipe.pin.as_str()
        );
        let installer = Installer::new(recipe, &env);
        match installer.install(tools, &mut runner) {
            Ok(()) => outcomes.push((recipe.name.clone(), Outcome::Installed)),
            Err(err) => {
                eprintln!(
                    "[deps:{}] failed: {}\n[deps:{}] see '{}' for full output",
                    recipe.name,
                    err,
                    recipe.name,
                    log_path.display()
                );
                outcomes.push((recipe.name.clone(), Outcome::Failed(err)));
                if !opts.keep_going {
                    break;
                }
            }
        }
    }

    Ok(Report {
        log: log_path,
        outcomes,
    })
}
