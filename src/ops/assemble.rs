//! Build container assembly.
//!
//! The build container holds the Python runtime, the `uv` binaries and the
//! workspace's manifests. Third-party dependencies of the target are
//! installed before any workspace source is present so that layer stays
//! cached while application code changes.

use anyhow::{bail, Result};

use crate::core::{Lockfile, PackageName, Workspace, LOCKFILE_NAME, MANIFEST_NAME};
use crate::engine::{CacheVolume, Container, File};
use crate::util::config::Config;
use crate::util::fs::{to_unix_string, workspace_relative};

/// Where the uv cache volume is mounted.
pub const UV_CACHE_TARGET: &str = "/root/.cache/uv";

/// Virtual environment path for an application directory.
pub fn venv_dir(app_dir: &str) -> String {
    format!("{}/.venv", app_dir.trim_end_matches('/'))
}

/// Assemble the build container for `name` with its third-party
/// dependencies installed.
pub fn assemble(ws: &Workspace, lock: &Lockfile, name: &PackageName) -> Result<Container> {
    let config = ws.config();
    let app = config.layout.app_dir();

    for required in [ws.manifest_path(), ws.lockfile_path()] {
        if !required.is_file() {
            bail!("workspace is missing {}", required.display());
        }
    }

    let uv = Container::from_image(config.images.uv());
    let mut container = Container::from_image(config.images.base())
        .with_file("/bin/uv", uv.file("/uv"))
        .with_file("/bin/uvx", uv.file("/uvx"))
        .with_env_variable("UV_COMPILE_BYTECODE", "1")
        .with_env_variable("UV_LINK_MODE", "copy")
        .with_env_variable("UV_PYTHON_DOWNLOADS", "0")
        .with_env_variable("UV_PROJECT_ENVIRONMENT", venv_dir(app));

    for (key, value) in &config.env {
        container = container.with_env_variable(key, value);
    }

    container = container
        .with_workdir(app)
        .with_file(
            format!("{}/{}", app, MANIFEST_NAME),
            File::host(ws.manifest_path()),
        )
        .with_file(
            format!("{}/{}", app, LOCKFILE_NAME),
            File::host(ws.lockfile_path()),
        );

    // uv needs every member manifest to rebuild the workspace, not only the
    // ones in this package's closure
    let mut members = 0;
    for (member, path) in lock.editable_members() {
        let relative = workspace_relative(path)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let manifest = ws.root().join(&relative).join(MANIFEST_NAME);
        if !manifest.is_file() {
            bail!(
                "workspace member `{}` has no {} at {}",
                member,
                MANIFEST_NAME,
                manifest.display()
            );
        }
        container = container.with_file(
            format!("{}/{}/{}", app, to_unix_string(&relative), MANIFEST_NAME),
            File::host(manifest),
        );
        members += 1;
    }

    tracing::debug!(
        "assembling `{}` on {} with {} member manifest(s)",
        name,
        config.images.base(),
        members
    );

    Ok(container
        .with_mounted_cache(UV_CACHE_TARGET, CacheVolume::new(config.cache.uv()))
        .with_exec([
            "uv",
            "sync",
            "--frozen",
            "--no-dev",
            "--no-install-workspace",
            "--package",
            name.as_str(),
        ]))
}

/// Install the staged workspace members of `name` as regular packages.
pub fn install_workspace(container: Container, name: &PackageName, config: &Config) -> Container {
    container
        .with_mounted_cache(UV_CACHE_TARGET, CacheVolume::new(config.cache.uv()))
        .with_exec([
            "uv",
            "sync",
            "--frozen",
            "--no-dev",
            "--no-editable",
            "--package",
            name.as_str(),
        ])
}
