//! Global context for berth operations.
//!
//! Provides centralized access to the working directory, the global
//! configuration home and workspace discovery.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::workspace::{find_workspace_root, Workspace, LOCKFILE_NAME};
use crate::util::config::{self, Config};
use crate::util::diagnostic::suggestions;

/// Environment variable overriding the global config directory.
pub const HOME_ENV: &str = "BERTH_HOME";

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Global berth directory (~/.berth/), if a home directory exists
    home: Option<PathBuf>,

    /// Workspace root passed explicitly with `--root`
    root: Option<PathBuf>,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = match std::env::var_os(HOME_ENV) {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
            _ => config::global_config_dir(),
        };

        Ok(GlobalContext {
            cwd,
            home,
            root: None,
            verbose: false,
            color: true,
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Replace the global config directory.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Pin the workspace root instead of searching for it.
    pub fn set_root(&mut self, root: Option<PathBuf>) {
        self.root = root.map(|r| if r.is_absolute() { r } else { self.cwd.join(r) });
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global berth directory.
    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Locate the workspace root.
    ///
    /// An explicit `--root` must hold a lockfile itself; otherwise the
    /// search walks up from the working directory.
    pub fn find_workspace_root(&self) -> Result<PathBuf> {
        if let Some(ref root) = self.root {
            if !root.join(LOCKFILE_NAME).is_file() {
                bail!(
                    "no {} found in {}\n{}",
                    LOCKFILE_NAME,
                    root.display(),
                    suggestions::NO_LOCKFILE
                );
            }
            return Ok(root.clone());
        }

        match find_workspace_root(&self.cwd) {
            Some(root) => Ok(root),
            None => bail!(
                "could not find {} in {} or any parent directory\n{}",
                LOCKFILE_NAME,
                self.cwd.display(),
                suggestions::NO_LOCKFILE
            ),
        }
    }

    /// Merged global and project configuration for a workspace root.
    pub fn load_config(&self, root: &Path) -> Config {
        let global = self.config_path();
        config::load_config(global.as_deref(), &config::project_config_path(root))
    }

    /// Open the workspace this context points at.
    pub fn workspace(&self) -> Result<Workspace> {
        let root = self.find_workspace_root()?;
        let config = self.load_config(&root);
        Workspace::new(&root, config)
    }
}
