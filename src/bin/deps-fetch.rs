use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use deps_fetch::catalog::{Catalog, CATALOG_FILENAME};
use deps_fetch::{orchestrator, RunOptions, Toolchain};

/// Exit code for the project-root guard, distinct from ordinary failures.
const EXIT_GUARD: u8 = 2;

fn usage() -> &'static str {
    "Usage: deps-fetch [OPTIONS]\n\
     \n\
     Fetch, build, and stage the third-party dependencies listed in deps.toml.\n\
     \n\
     Options:\n\
       --deps <a,b,c>        comma-separated dependency names (default: all)\n\
       --download-dir <dir>  where sources are cloned and built (default: ./deps_src)\n\
       --prefix <dir>        where artifacts are installed (default: ./deps_install)\n\
       --catalog <file>      load an alternative catalog file\n\
       --timeout <secs>      wall-clock limit per external tool invocation\n\
       --keep-going          continue after a dependency fails and summarize at the end\n\
       --local               skip the project-root check; directories are created\n\
                             relative to the current working directory\n\
       --list                print the catalog entries and exit\n\
       -h, --help            show this help"
}

struct CliArgs {
    deps: Option<Vec<String>>,
    download_dir: PathBuf,
    prefix: PathBuf,
    catalog: Option<PathBuf>,
    timeout: Option<Duration>,
    keep_going: bool,
    local: bool,
    list: bool,
    help: bool,
}

fn parse_args(argv: &[String]) -> Result<CliArgs> {
    let mut args = CliArgs {
        deps: None,
        download_dir: PathBuf::from("./deps_src"),
        prefix: PathBuf::from("./deps_install"),
        catalog: None,
        timeout: None,
        keep_going: false,
        local: false,
        list: false,
        help: false,
    };

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--deps" => {
                let value = next_value(&mut iter, "--deps")?;
                args.deps = Some(
                    value
                        .split(',')
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .collect(),
                );
            }
            "--download-dir" => args.download_dir = PathBuf::from(next_value(&mut iter, "--download-dir")?),
            "--prefix" => args.prefix = PathBuf::from(next_value(&mut iter, "--prefix")?),
            "--catalog" => args.catalog = Some(PathBuf::from(next_value(&mut iter, "--catalog")?)),
            "--timeout" => {
                let value = next_value(&mut iter, "--timeout")?;
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("--timeout expects seconds, got '{}'", value))?;
                args.timeout = Some(Duration::from_secs(secs));
            }
            "--keep-going" => args.keep_going = true,
            "--local" => args.local = true,
            "--list" => args.list = true,
            "-h" | "--help" => args.help = true,
            other => bail!("unknown argument '{}'\n\n{}", other, usage()),
        }
    }

    Ok(args)
}

fn next_value<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a String> {
    iter.next()
        .ok_or_else(|| anyhow::anyhow!("{} requires a value\n\n{}", flag, usage()))
}

fn load_catalog(args: &CliArgs) -> Result<Catalog> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("loading catalog '{}'", path.display()))?,
        None if Path::new(CATALOG_FILENAME).exists() => Catalog::load(Path::new(CATALOG_FILENAME))
            .with_context(|| format!("loading catalog '{}'", CATALOG_FILENAME))?,
        None => Catalog::builtin().context("loading built-in catalog")?,
    };
    if catalog.is_empty() {
        bail!("catalog has no dependencies");
    }
    Ok(catalog)
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("deps-fetch: error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<ExitCode> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;

    if args.help {
        println!("{}", usage());
        return Ok(ExitCode::SUCCESS);
    }

    // Safety rail against populating the wrong directory tree: require a
    // recognized project root unless the caller opts out.
    if !args.local && args.catalog.is_none() && !Path::new(CATALOG_FILENAME).exists() {
        eprintln!(
            "deps-fetch: no '{}' in the current directory.\n\
             Run from the project root, pass --catalog <file>, or use --local.",
            CATALOG_FILENAME
        );
        return Ok(ExitCode::from(EXIT_GUARD));
    }

    let catalog = load_catalog(&args)?;

    if args.list {
        for recipe in catalog.recipes() {
            println!("{}  {} @ {}", recipe.name, recipe.git_url, recipe.pin.as_str());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let selected = args.deps.clone().unwrap_or_else(|| catalog.names());
    let tools = Toolchain::from_env()?;

    println!("[deps] will install: {}", selected.join(" "));

    let opts = RunOptions {
        keep_going: args.keep_going,
        timeout: args.timeout,
    };
    let report = orchestrator::run(
        &catalog,
        &selected,
        &args.download_dir,
        &args.prefix,
        &tools,
        &opts,
    )?;

    for line in report.summary_lines() {
        println!("[deps] {}", line);
    }

    if report.is_success() {
        println!("[deps] done.");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "[deps] {} of {} dependencies failed; see '{}' for full output",
            report.failed(),
            report.outcomes.len(),
            report.log.display()
        );
        Ok(ExitCode::from(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_documented_paths() {
        let args = parse_args(&argv(&[])).unwrap();
        assert_eq!(args.download_dir, PathBuf::from("./deps_src"));
        assert_eq!(args.prefix, PathBuf::from("./deps_install"));
        assert!(args.deps.is_none());
        assert!(!args.local);
        assert!(!args.keep_going);
    }

    #[test]
    fn deps_list_is_split_and_trimmed() {
        let args = parse_args(&argv(&["--deps", "catch2, nlohmann-json ,"])).unwrap();
        assert_eq!(
            args.deps.unwrap(),
            vec!["catch2".to_string(), "nlohmann-json".to_string()]
        );
    }

    #[test]
    fn timeout_parses_seconds() {
        let args = parse_args(&argv(&["--timeout", "90"])).unwrap();
        assert_eq!(args.timeout, Some(Duration::from_secs(90)));
        assert!(parse_args(&argv(&["--timeout", "soon"])).is_err());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(parse_args(&argv(&["--frobnicate"])).is_err());
        assert!(parse_args(&argv(&["--deps"])).is_err());
    }
}
