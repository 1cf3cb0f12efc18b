//! Frontend builds.
//!
//! A package may ship a web frontend at `frontend/<name>`. It is built with
//! pnpm in a throwaway Node container and only its output directory is
//! carried into the final image.

use std::path::PathBuf;

use crate::core::{PackageName, Workspace};
use crate::engine::{CacheVolume, Container, Directory};
use crate::util::config::Config;

/// `PNPM_HOME` inside the Node container.
pub const PNPM_HOME: &str = "/pnpm";

/// Where the pnpm store cache volume is mounted.
pub const PNPM_STORE_TARGET: &str = "/pnpm/store";

/// Working directory of the frontend build.
pub const FRONTEND_WORKDIR: &str = "/src";

pub const PACKAGE_JSON: &str = "package.json";

/// The frontend of one package: where it came from and what it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontend {
    /// Host source directory, `None` when the package has no frontend
    pub source: Option<PathBuf>,
    /// Built static assets; empty when there is no frontend
    pub output: Directory,
}

impl Frontend {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }
}

/// Find the frontend source of `name`, if it has a usable one.
pub fn locate_frontend(ws: &Workspace, name: &PackageName) -> Option<PathBuf> {
    let dir = ws.frontend_dir(name);
    if !dir.is_dir() {
        tracing::debug!("no frontend for `{}` at {}", name, dir.display());
        return None;
    }
    if !dir.join(PACKAGE_JSON).is_file() {
        tracing::warn!(
            "{} has no {}; building `{}` without a frontend",
            dir.display(),
            PACKAGE_JSON,
            name
        );
        return None;
    }
    Some(dir)
}

/// Describe the frontend build of `name`.
pub fn build_frontend(ws: &Workspace, name: &PackageName) -> Frontend {
    let Some(source) = locate_frontend(ws, name) else {
        return Frontend {
            source: None,
            output: Directory::Empty,
        };
    };

    let config = ws.config();
    let output = format!("{}/{}", FRONTEND_WORKDIR, config.layout.frontend_output());
    tracing::info!("building frontend of `{}` from {}", name, source.display());

    Frontend {
        output: frontend_container(&source, config).directory(output),
        source: Some(source),
    }
}

fn frontend_container(source: &std::path::Path, config: &Config) -> Container {
    let mut ignore = config.ignore_patterns();
    if !ignore.iter().any(|p| p == "node_modules") {
        ignore.push("node_modules".to_string());
    }

    Container::from_image(config.images.node())
        .with_env_variable("PNPM_HOME", PNPM_HOME)
        .with_env_variable("PATH", format!("{}:$PATH", PNPM_HOME))
        .with_exec(["corepack", "enable"])
        .with_workdir(FRONTEND_WORKDIR)
        .with_directory(FRONTEND_WORKDIR, Directory::host(source, ignore))
        .with_mounted_cache(PNPM_STORE_TARGET, CacheVolume::new(config.cache.pnpm()))
        .with_exec(["pnpm", "install", "--frozen-lockfile"])
        .with_exec(["pnpm", "run", "build"])
}
