//! Workspace resolution operations.

use anyhow::Result;

use crate::core::{PackageName, Workspace};
use crate::resolver::{Resolution, Resolver};

/// Resolve the dependency closure and source mapping of one package.
///
/// `strict` is combined with the workspace's `build.strict` setting; with
/// neither set an unknown package resolves to nothing.
pub fn resolve_package(ws: &Workspace, name: &str, strict: bool) -> Result<Resolution> {
    let lock = ws.load_lock()?;
    let target = PackageName::new(name);
    let strict = strict || ws.config().build.strict;

    let resolution = Resolver::new(&lock).strict(strict).resolve(&target)?;

    tracing::info!(
        "resolved `{}`: {} workspace package(s), {} to stage",
        target,
        resolution.closure.len(),
        resolution.mapping.len()
    );
    Ok(resolution)
}
