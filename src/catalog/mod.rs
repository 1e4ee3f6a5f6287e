//! Dependency catalog: the declarative table of fetch+install recipes.
//!
//! A catalog is an ordered list of [`Recipe`] records loaded from a TOML
//! file (see `deps.toml` at the repository root for the built-in table).
//! Each record pins its source to exactly one of a git tag or a commit
//! hash, and is materialized either by copying listed files into the
//! install prefix or by a cmake configure/build/install pass.
//!
//! Validation happens once at load time: the materialization strategy is
//! fixed into the [`Materialize`] sum type here, never re-derived from
//! field presence later.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Built-in dependency table, embedded from the repository root.
pub const DEFAULT_CATALOG: &str = include_str!("../../deps.toml");

/// File name the project-root guard and the default loader look for.
pub const CATALOG_FILENAME: &str = "deps.toml";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reading catalog '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing catalog '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("dependency '{name}': exactly one of 'tag' or 'commit' must be set")]
    PinConflict { name: String },

    #[error("dependency '{name}': 'copy' cannot be combined with 'cmake' or 'make'")]
    VariantConflict { name: String },

    #[error("dependency '{name}': 'copy' list must not be empty")]
    EmptyCopyList { name: String },

    #[error("duplicate dependency name '{name}'")]
    DuplicateName { name: String },
}

/// Exact source revision: a human-readable tag/branch, or an immutable
/// commit hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pin {
    Tag(String),
    Commit(String),
}

impl Pin {
    pub fn as_str(&self) -> &str {
        match self {
            Pin::Tag(tag) => tag,
            Pin::Commit(commit) => commit,
        }
    }
}

/// How an acquired source tree is turned into installed artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialize {
    /// Copy the listed (relative source, relative destination) pairs from
    /// the source tree into the install prefix, in list order.
    CopyFiles(Vec<(PathBuf, PathBuf)>),

    /// Run cmake configure then `make install` in a `build/` subfolder.
    /// `separate_build` inserts a plain `make` before the install step.
    CmakeInstall {
        options: BTreeMap<String, String>,
        separate_build: bool,
    },
}

/// One immutable catalog entry. `name` doubles as the on-disk folder
/// name under the download root.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub git_url: String,
    pub pin: Pin,
    pub materialize: Materialize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogToml {
    dep: Vec<DepToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DepToml {
    name: String,
    git: String,
    tag: Option<String>,
    commit: Option<String>,
    cmake: Option<BTreeMap<String, String>>,
    copy: Option<Vec<(String, String)>>,
    make: Option<bool>,
}

impl DepToml {
    fn into_recipe(self) -> Result<Recipe, CatalogError> {
        let pin = match (self.tag, self.commit) {
            (Some(tag), None) => Pin::Tag(tag),
            (None, Some(commit)) => Pin::Commit(commit),
            _ => return Err(CatalogError::PinConflict { name: self.name }),
        };

        let materialize = match self.copy {
            Some(pairs) => {
                if self.cmake.is_some() || self.make.is_some() {
                    return Err(CatalogError::VariantConflict { name: self.name });
                }
                if pairs.is_empty() {
                    return Err(CatalogError::EmptyCopyList { name: self.name });
                }
                Materialize::CopyFiles(
                    pairs
                        .into_iter()
                        .map(|(src, dest)| (PathBuf::from(src), PathBuf::from(dest)))
                        .collect(),
                )
            }
            None => Materialize::CmakeInstall {
                options: self.cmake.unwrap_or_default(),
                separate_build: self.make.unwrap_or(false),
            },
        };

        Ok(Recipe {
            name: self.name,
            git_url: self.git,
            pin,
            materialize,
        })
    }
}

/// Ordered, validated set of recipes.
#[derive(Debug, Clone)]
pub struct Catalog {
    recipes: Vec<Recipe>,
}

impl Catalog {
    /// Parse catalog TOML. `origin` names the source in error messages
    /// (a path, or "builtin").
    pub fn parse(text: &str, origin: &str) -> Result<Self, CatalogError> {
        let parsed: CatalogToml = toml::from_str(text).map_err(|source| CatalogError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let mut seen = BTreeSet::new();
        let mut recipes = Vec::with_capacity(parsed.dep.len());
        for dep in parsed.dep {
            if !seen.insert(dep.name.clone()) {
                return Err(CatalogError::DuplicateName { name: dep.name });
            }
            recipes.push(dep.into_recipe()?);
        }

        Ok(Catalog { recipes })
    }

    /// Load a catalog from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// The built-in table embedded at compile time.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse(DEFAULT_CATALOG, "builtin")
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| recipe.name == name)
    }

    /// Recipes in declaration order.
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Dependency names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.recipes.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}
