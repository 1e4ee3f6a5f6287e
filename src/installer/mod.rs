//! Per-dependency installer: pre-flight, acquire, materialize, report.
//!
//! One [`Installer`] is built per selected recipe per run. It derives its
//! working paths from the shared [`InstallEnv`] and carries no state
//! across runs; idempotency is filesystem-based, with the existence of
//! `source_dir` as the sentinel for "already fetched".
//!
//! The four phases run in fixed order and the first failure aborts the
//! remaining phases for that dependency:
//!
//! 1. pre-flight  - refuse to clone over an existing download
//! 2. acquire     - shallow git clone at the pinned revision
//! 3. materialize - copy listed files, or cmake configure/build/install
//! 4. report      - success notice, no filesystem effect

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{Materialize, Pin, Recipe};
use crate::error::InstallError;
use crate::process::Runner;
use crate::toolchain::Toolchain;

/// The two filesystem roots shared read-only by every installer in a run.
#[derive(Debug, Clone)]
pub struct InstallEnv {
    /// Scratch space; each dependency clones into a subfolder named
    /// after it.
    pub source_root: PathBuf,
    /// Destination root for built artifacts and headers.
    pub install_prefix: PathBuf,
}

impl InstallEnv {
    /// Ensure both roots exist and pin them to absolute paths (cmake
    /// receives the prefix as an absolute `-DCMAKE_INSTALL_PREFIX`).
    pub fn prepare(source_root: &Path, install_prefix: &Path) -> Result<Self, InstallError> {
        let source_root = ensure_absolute_dir(source_root)?;
        let install_prefix = ensure_absolute_dir(install_prefix)?;
        Ok(InstallEnv {
            source_root,
            install_prefix,
        })
    }
}

fn ensure_absolute_dir(dir: &Path) -> Result<PathBuf, InstallError> {
    fs::create_dir_all(dir)
        .map_err(|e| InstallError::io(format!("creating directory '{}'", dir.display()), e))?;
    fs::canonicalize(dir)
        .map_err(|e| InstallError::io(format!("resolving directory '{}'", dir.display()), e))
}

/// Transient installer for one recipe, bound to the shared environment.
#[derive(Debug)]
pub struct Installer<'a> {
    recipe: &'a Recipe,
    env: &'a InstallEnv,
    source_dir: PathBuf,
    build_dir: PathBuf,
}

impl<'a> Installer<'a> {
    pub fn new(recipe: &'a Recipe, env: &'a InstallEnv) -> Self {
        let source_dir = env.source_root.join(&recipe.name);
        let build_dir = source_dir.join("build");
        Installer {
            recipe,
            env,
            source_dir,
            build_dir,
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Run all four phases in order.
    pub fn install(&self, tools: &Toolchain, runner: &mut Runner) -> Result<(), InstallError> {
        self.preflight()?;
        self.acquire(tools, runner)?;
        self.materialize(tools, runner)?;
        self.report();
        Ok(())
    }

    /// Acquisition is a destructive clone into a fresh directory, so a
    /// leftover download from a prior (possibly partial) run must be
    /// removed by hand first.
    fn preflight(&self) -> Result<(), InstallError> {
        if self.source_dir.exists() {
            return Err(InstallError::AlreadyExists {
                dir: self.source_dir.clone(),
            });
        }
        Ok(())
    }

    /// Clone the pinned revision into `source_dir`.
    ///
    /// A tag can be requested directly from a shallow clone; a commit
    /// hash cannot, so that case clones without checkout and moves the
    /// working tree explicitly.
    fn acquire(&self, tools: &Toolchain, runner: &mut Runner) -> Result<(), InstallError> {
        match &self.recipe.pin {
            Pin::Tag(tag) => {
                let args = os_args(&[
                    "clone",
                    &self.recipe.git_url,
                    "--depth=1",
                    "--branch",
                    tag,
                    &self.recipe.name,
                ]);
                runner.run(&tools.git, &args, &self.env.source_root)
            }
            Pin::Commit(commit) => {
                let args = os_args(&[
                    "clone",
                    &self.recipe.git_url,
                    "--depth=1",
                    "-n",
                    &self.recipe.name,
                ]);
                runner.run(&tools.git, &args, &self.env.source_root)?;
                let args = os_args(&["checkout", commit]);
                runner.run(&tools.git, &args, &self.source_dir)
            }
        }
    }

    fn materialize(&self, tools: &Toolchain, runner: &mut Runner) -> Result<(), InstallError> {
        match &self.recipe.materialize {
            Materialize::CopyFiles(pairs) => self.copy_files(pairs, runner),
            Materialize::CmakeInstall {
                options,
                separate_build,
            } => {
                self.configure(options, tools, runner)?;
                if *separate_build {
                    runner.run(&tools.make, &[], &self.build_dir)?;
                }
                runner.run(&tools.make, &os_args(&["install"]), &self.build_dir)
            }
        }
    }

    /// Copy each listed file into the install prefix, in list order.
    /// Destinations are disjoint by construction of the catalog.
    fn copy_files(
        &self,
        pairs: &[(PathBuf, PathBuf)],
        runner: &mut Runner,
    ) -> Result<(), InstallError> {
        runner
            .log_mut()
            .banner(&format!("copying files for {}", self.recipe.name))?;

        for (rel_src, rel_dest) in pairs {
            let src = self.source_dir.join(rel_src);
            let dest = self.env.install_prefix.join(rel_dest);

            runner
                .log_mut()
                .note(&format!("    - {} -> {}", src.display(), dest.display()))?;

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|source| InstallError::CopyFailure {
                    path: dest.clone(),
                    source,
                })?;
            }
            fs::copy(&src, &dest).map_err(|source| InstallError::CopyFailure {
                path: src.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn configure(
        &self,
        options: &BTreeMap<String, String>,
        tools: &Toolchain,
        runner: &mut Runner,
    ) -> Result<(), InstallError> {
        if !self.build_dir.exists() {
            fs::create_dir(&self.build_dir).map_err(|e| {
                InstallError::io(
                    format!("creating build directory '{}'", self.build_dir.display()),
                    e,
                )
            })?;
        }

        let args = configure_args(options, &self.env.install_prefix);
        runner.run(&tools.cmake, &args, &self.build_dir)
    }

    fn report(&self) {
        println!("[deps:{}] successfully installed", self.recipe.name);
    }
}

/// Arguments for the configure step: the parent source directory, the
/// absolute install prefix, then one `-D<K>=<V>` per override in map
/// order.
pub fn configure_args(options: &BTreeMap<String, String>, install_prefix: &Path) -> Vec<OsString> {
    let mut args = vec![
        OsString::from(".."),
        OsString::from(format!(
            "-DCMAKE_INSTALL_PREFIX={}",
            install_prefix.display()
        )),
    ];
    args.extend(
        options
            .iter()
            .map(|(key, value)| OsString::from(format!("-D{}={}", key, value))),
    );
    args
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{RunLog, LOG_FILENAME};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn recipe_copy(name: &str, pairs: &[(&str, &str)]) -> Recipe {
        Recipe {
            name: name.to_string(),
            git_url: "https://example.com/repo.git".to_string(),
            pin: Pin::Tag("v1".to_string()),
            materialize: Materialize::CopyFiles(
                pairs
                    .iter()
                    .map(|(s, d)| (PathBuf::from(s), PathBuf::from(d)))
                    .collect(),
            ),
        }
    }

    fn recipe_cmake(name: &str, options: &[(&str, &str)], separate_build: bool) -> Recipe {
        Recipe {
            name: name.to_string(),
            git_url: "https://example.com/repo.git".to_string(),
            pin: Pin::Tag("v1".to_string()),
            materialize: Materialize::CmakeInstall {
                options: options
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                separate_build,
            },
        }
    }

    /// Shell stub that appends its name and argv to `calls`, one line
    /// per invocation.
    fn write_stub(dir: &Path, name: &str, calls: &Path) -> PathBuf {
        let path = dir.join(name);
        let script = format!("#!/bin/sh\necho \"{} $@\" >> '{}'\n", name, calls.display());
        fs::write(&path, script).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn stub_toolchain(dir: &Path, calls: &Path) -> Toolchain {
        Toolchain {
            git: write_stub(dir, "git", calls),
            cmake: write_stub(dir, "cmake", calls),
            make: write_stub(dir, "make", calls),
        }
    }

    fn test_env(temp: &TempDir) -> InstallEnv {
        InstallEnv::prepare(&temp.path().join("deps_src"), &temp.path().join("deps_install"))
            .unwrap()
    }

    #[test]
    fn prepare_creates_absolute_roots() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp);
        assert!(env.source_root.is_absolute());
        assert!(env.source_root.is_dir());
        assert!(env.install_prefix.is_absolute());
        assert!(env.install_prefix.is_dir());
    }

    #[test]
    fn preflight_rejects_existing_source_dir_without_running_anything() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp);
        let calls = temp.path().join("calls.txt");
        let tools = stub_toolchain(temp.path(), &calls);

        let recipe = recipe_copy("dep-a", &[("x.h", "include/x.h")]);
        let installer = Installer::new(&recipe, &env);
        fs::create_dir_all(installer.source_dir()).unwrap();

        let mut runner = Runner::new(RunLog::create(&env.source_root).unwrap());
        let err = installer.install(&tools, &mut runner).unwrap_err();

        match err {
            InstallError::AlreadyExists { dir } => assert_eq!(dir, installer.source_dir()),
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
        assert!(!calls.exists(), "no tool may run after a pre-flight failure");
        let log = fs::read_to_string(env.source_root.join(LOG_FILENAME)).unwrap();
        assert!(!log.contains("running:"));
    }

    #[test]
    fn copy_variant_places_listed_files_only() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp);
        let recipe = recipe_copy("dep-a", &[("x.h", "include/x.h"), ("sub/y.h", "y.h")]);
        let installer = Installer::new(&recipe, &env);

        fs::create_dir_all(installer.source_dir().join("sub")).unwrap();
        fs::write(installer.source_dir().join("x.h"), b"int x;\n").unwrap();
        fs::write(installer.source_dir().join("sub/y.h"), b"int y;\n").unwrap();
        fs::write(installer.source_dir().join("unlisted.h"), b"int z;\n").unwrap();

        let calls = temp.path().join("calls.txt");
        let tools = stub_toolchain(temp.path(), &calls);
        let mut runner = Runner::new(RunLog::create(&env.source_root).unwrap());
        installer.materialize(&tools, &mut runner).unwrap();

        assert_eq!(
            fs::read(env.install_prefix.join("include/x.h")).unwrap(),
            b"int x;\n"
        );
        assert_eq!(fs::read(env.install_prefix.join("y.h")).unwrap(), b"int y;\n");

        let installed: Vec<_> = walkdir::WalkDir::new(&env.install_prefix)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();
        assert_eq!(installed.len(), 2, "only listed files may be installed");

        let log = fs::read_to_string(env.source_root.join(LOG_FILENAME)).unwrap();
        assert!(log.contains("copying files for dep-a"));
        assert!(log.contains("x.h"));
    }

    #[test]
    fn copy_variant_fails_on_missing_source_file() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp);
        let recipe = recipe_copy("dep-a", &[("missing.h", "include/missing.h")]);
        let installer = Installer::new(&recipe, &env);
        fs::create_dir_all(installer.source_dir()).unwrap();

        let calls = temp.path().join("calls.txt");
        let tools = stub_toolchain(temp.path(), &calls);
        let mut runner = Runner::new(RunLog::create(&env.source_root).unwrap());
        let err = installer.materialize(&tools, &mut runner).unwrap_err();

        assert!(matches!(err, InstallError::CopyFailure { ref path, .. }
            if path.ends_with("missing.h")));
    }

    #[test]
    fn configure_args_pass_overrides_verbatim_in_map_order() {
        let options: BTreeMap<String, String> = [
            ("ZED".to_string(), "off".to_string()),
            ("ALPHA".to_string(), "on".to_string()),
        ]
        .into_iter()
        .collect();

        let args = configure_args(&options, Path::new("/stage/prefix"));
        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            rendered,
            vec![
                "..".to_string(),
                "-DCMAKE_INSTALL_PREFIX=/stage/prefix".to_string(),
                "-DALPHA=on".to_string(),
                "-DZED=off".to_string(),
            ]
        );
    }

    #[test]
    fn cmake_variant_runs_configure_then_install() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp);
        let recipe = recipe_cmake("dep-b", &[("FOO", "bar")], false);
        let installer = Installer::new(&recipe, &env);
        fs::create_dir_all(installer.source_dir()).unwrap();

        let calls = temp.path().join("calls.txt");
        let tools = stub_toolchain(temp.path(), &calls);
        let mut runner = Runner::new(RunLog::create(&env.source_root).unwrap());
        installer.materialize(&tools, &mut runner).unwrap();

        assert!(installer.build_dir.is_dir());
        let recorded = fs::read_to_string(&calls).unwrap();
        let lines: Vec<&str> = recorded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cmake .."));
        assert!(lines[0].contains("-DFOO=bar"));
        assert!(lines[0].contains(&format!(
            "-DCMAKE_INSTALL_PREFIX={}",
            env.install_prefix.display()
        )));
        assert_eq!(lines[1], "make install");
    }

    #[test]
    fn explicit_build_step_runs_make_before_install() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp);
        let recipe = recipe_cmake("dep-b", &[], true);
        let installer = Installer::new(&recipe, &env);
        fs::create_dir_all(installer.source_dir()).unwrap();

        let calls = temp.path().join("calls.txt");
        let tools = stub_toolchain(temp.path(), &calls);
        let mut runner = Runner::new(RunLog::create(&env.source_root).unwrap());
        installer.materialize(&tools, &mut runner).unwrap();

        let recorded = fs::read_to_string(&calls).unwrap();
        let lines: Vec<&str> = recorded.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("cmake"));
        assert_eq!(lines[1].trim_end(), "make");
        assert_eq!(lines[2], "make install");
    }
}
