//! Configuration file support for berth.
//!
//! berth supports two configuration file locations:
//! - Global: `~/.berth/config.toml` - User-wide defaults
//! - Project: `.berth/config.toml` - Workspace-specific overrides
//!
//! Project config takes precedence over global config. Every setting has a
//! built-in default, so an absent file is the same as an empty one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default image for the build container and the runtime image.
pub const DEFAULT_BASE_IMAGE: &str = "python:3.12-slim-bookworm";

/// Default image the uv binaries are copied from.
pub const DEFAULT_UV_IMAGE: &str = "ghcr.io/astral-sh/uv:0.5.11";

/// Default image for frontend builds.
pub const DEFAULT_NODE_IMAGE: &str = "node:22-slim";

/// Default cache volume id for uv downloads.
pub const DEFAULT_UV_CACHE_ID: &str = "uv-cache";

/// Default cache volume id for the pnpm store.
pub const DEFAULT_PNPM_CACHE_ID: &str = "pnpm-store";

/// Paths never copied into any container.
pub const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".env",
    ".env.*",
    ".venv",
    "node_modules",
    "__pycache__",
    "*.pyc",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "*.egg-info",
    "dist",
    "build",
    ".berth",
];

/// berth configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Image tags
    pub images: ImageConfig,

    /// Cache volume ids
    pub cache: CacheConfig,

    /// Paths inside the workspace and the images
    pub layout: LayoutConfig,

    /// Build behavior
    pub build: BuildConfig,

    /// Engine invocation
    pub engine: EngineConfig,

    /// Extra environment variables for the build container
    pub env: BTreeMap<String, String>,
}

/// Image tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Build container base (Python runtime)
    pub base: Option<String>,

    /// Final runtime base (defaults to `base`)
    pub runtime: Option<String>,

    /// Image providing the uv binaries
    pub uv: Option<String>,

    /// Frontend toolchain image
    pub node: Option<String>,
}

impl ImageConfig {
    pub fn base(&self) -> &str {
        self.base.as_deref().unwrap_or(DEFAULT_BASE_IMAGE)
    }

    pub fn runtime(&self) -> &str {
        self.runtime.as_deref().unwrap_or_else(|| self.base())
    }

    pub fn uv(&self) -> &str {
        self.uv.as_deref().unwrap_or(DEFAULT_UV_IMAGE)
    }

    pub fn node(&self) -> &str {
        self.node.as_deref().unwrap_or(DEFAULT_NODE_IMAGE)
    }
}

/// Cache volume ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// uv download cache
    pub uv: Option<String>,

    /// pnpm content-addressed store
    pub pnpm: Option<String>,
}

impl CacheConfig {
    pub fn uv(&self) -> &str {
        self.uv.as_deref().unwrap_or(DEFAULT_UV_CACHE_ID)
    }

    pub fn pnpm(&self) -> &str {
        self.pnpm.as_deref().unwrap_or(DEFAULT_PNPM_CACHE_ID)
    }
}

/// Paths inside the workspace and the images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Application directory inside the images (default `/app`)
    pub app_dir: Option<String>,

    /// Workspace directory holding one frontend per package (default `frontend`)
    pub frontend_dir: Option<String>,

    /// Frontend build output directory (default `dist`)
    pub frontend_output: Option<String>,

    /// Parent of the per-package static asset directories (default `<app_dir>/static`)
    pub static_root: Option<String>,
}

impl LayoutConfig {
    pub fn app_dir(&self) -> &str {
        self.app_dir.as_deref().unwrap_or("/app")
    }

    pub fn frontend_dir(&self) -> &str {
        self.frontend_dir.as_deref().unwrap_or("frontend")
    }

    pub fn frontend_output(&self) -> &str {
        self.frontend_output.as_deref().unwrap_or("dist")
    }

    pub fn static_root(&self) -> String {
        match &self.static_root {
            Some(root) => root.clone(),
            None => format!("{}/static", self.app_dir().trim_end_matches('/')),
        }
    }
}

/// Build behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Fail when the requested package is not in the lockfile
    pub strict: bool,

    /// Check that the package's `__main__` module exists before building
    pub validate_entrypoint: bool,

    /// Replace the built-in ignore list
    pub ignore: Option<Vec<String>>,

    /// Append to the ignore list
    pub extra_ignore: Vec<String>,
}

/// Engine invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Docker CLI program (default `docker`)
    pub program: Option<String>,

    /// Target platform, e.g. `linux/amd64`
    pub platform: Option<String>,
}

impl EngineConfig {
    pub fn program(&self) -> &str {
        self.program.as_deref().unwrap_or("docker")
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.images.base, other.images.base);
        take(&mut self.images.runtime, other.images.runtime);
        take(&mut self.images.uv, other.images.uv);
        take(&mut self.images.node, other.images.node);

        take(&mut self.cache.uv, other.cache.uv);
        take(&mut self.cache.pnpm, other.cache.pnpm);

        take(&mut self.layout.app_dir, other.layout.app_dir);
        take(&mut self.layout.frontend_dir, other.layout.frontend_dir);
        take(&mut self.layout.frontend_output, other.layout.frontend_output);
        take(&mut self.layout.static_root, other.layout.static_root);

        // Flags can only be switched on by a later layer
        if other.build.strict {
            self.build.strict = true;
        }
        if other.build.validate_entrypoint {
            self.build.validate_entrypoint = true;
        }
        take(&mut self.build.ignore, other.build.ignore);
        self.build.extra_ignore.extend(other.build.extra_ignore);

        take(&mut self.engine.program, other.engine.program);
        take(&mut self.engine.platform, other.engine.platform);

        self.env.extend(other.env);
    }

    /// The effective ignore list.
    pub fn ignore_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = match &self.build.ignore {
            Some(list) => list.clone(),
            None => DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
        };
        for extra in &self.build.extra_ignore {
            if !patterns.contains(extra) {
                patterns.push(extra.clone());
            }
        }
        patterns
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.berth/config.toml)
/// 2. Global config (~/.berth/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global berth config directory (~/.berth).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".berth"))
}

/// Get the global config path (~/.berth/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.berth/config.toml).
pub fn project_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".berth").join("config.toml")
}
