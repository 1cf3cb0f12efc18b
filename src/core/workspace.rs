//! Workspace - the root directory, its lockfile and member set.
//!
//! A Workspace represents a uv workspace on disk: the directory holding
//! the root `pyproject.toml` and the unified `uv.lock`, together with the
//! configuration that applies to builds started from it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::lock::Lockfile;
use crate::core::PackageName;
use crate::util::config::Config;
use crate::util::diagnostic::suggestions;

/// Lockfile name at the workspace root.
pub const LOCKFILE_NAME: &str = "uv.lock";

/// Root manifest name.
pub const MANIFEST_NAME: &str = "pyproject.toml";

/// The set of package names belonging to one workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceManifest {
    members: BTreeSet<PackageName>,
}

impl WorkspaceManifest {
    /// Create a manifest from member names; duplicates collapse.
    pub fn new(members: impl IntoIterator<Item = PackageName>) -> Self {
        WorkspaceManifest {
            members: members.into_iter().collect(),
        }
    }

    /// Check membership.
    pub fn contains(&self, name: &PackageName) -> bool {
        self.members.contains(name)
    }

    /// Iterate over members in name order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageName> {
        self.members.iter()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the workspace has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A workspace rooted at a directory containing `uv.lock`.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Workspace root directory
    root: PathBuf,

    /// Effective configuration
    config: Config,
}

impl Workspace {
    /// Open the workspace at `root`.
    pub fn new(root: &Path, config: Config) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("workspace root does not exist: {}", root.display()))?;

        if !root.join(LOCKFILE_NAME).is_file() {
            bail!(
                "no {} found in {}\n{}",
                LOCKFILE_NAME,
                root.display(),
                suggestions::NO_LOCKFILE
            );
        }

        Ok(Workspace { root, config })
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the lockfile path.
    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join(LOCKFILE_NAME)
    }

    /// Get the root manifest path.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    /// Directory where the frontend for `name` would live.
    pub fn frontend_dir(&self, name: &PackageName) -> PathBuf {
        self.root
            .join(self.config.layout.frontend_dir())
            .join(name.as_str())
    }

    /// Get the .berth directory.
    pub fn berth_dir(&self) -> PathBuf {
        self.root.join(".berth")
    }

    /// Load and parse the lockfile.
    pub fn load_lock(&self) -> Result<Lockfile> {
        let path = self.lockfile_path();
        let lock = Lockfile::load(&path)
            .map_err(|e| anyhow::anyhow!("{:?}", miette::Report::new(e)))?;
        tracing::debug!(
            "loaded {} with {} package(s) and {} member(s)",
            path.display(),
            lock.len(),
            lock.workspace().len()
        );
        Ok(lock)
    }
}

/// Walk up from `start` to the nearest directory containing `uv.lock`.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(LOCKFILE_NAME).is_file())
        .map(Path::to_path_buf)
}
