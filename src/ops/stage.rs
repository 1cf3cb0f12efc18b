//! Source staging.
//!
//! Every editable package in a closure is copied to the same relative path
//! under the application directory, so the workspace layout recorded in
//! `uv.lock` stays valid inside the container.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;
use thiserror::Error;

use crate::core::PackageName;
use crate::engine::{Container, Directory};
use crate::resolver::SourceMapping;
use crate::util::config::Config;
use crate::util::fs::{self as bfs, to_unix_string, workspace_relative, IgnoreSet};
use crate::util::hash::hash_tree;

/// Errors raised while checking a source mapping.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("source path of `{package}` escapes the workspace: {}", path.display())]
    OutsideWorkspace { package: PackageName, path: PathBuf },

    #[error("source directory of `{package}` does not exist: {}", path.display())]
    MissingSource { package: PackageName, path: PathBuf },
}

/// One package copied by [`stage_to_dir`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedPackage {
    pub name: PackageName,
    /// Workspace-relative path
    pub path: PathBuf,
    pub files: usize,
    pub skipped: usize,
    /// Content digest of the staged tree
    pub digest: String,
}

/// Summary of a host staging run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub packages: Vec<StagedPackage>,
}

impl StageReport {
    pub fn total_files(&self) -> usize {
        self.packages.iter().map(|p| p.files).sum()
    }
}

/// Validate the mapping against `root`; parents sort before children.
fn checked_sources<'a>(
    root: &Path,
    mapping: &'a SourceMapping,
) -> Result<Vec<(&'a PackageName, PathBuf)>, StageError> {
    let mut sources = Vec::with_capacity(mapping.len());
    for (name, path) in mapping.iter() {
        let relative = workspace_relative(path).map_err(|_| StageError::OutsideWorkspace {
            package: name.clone(),
            path: path.to_path_buf(),
        })?;
        let absolute = root.join(&relative);
        if !absolute.is_dir() {
            return Err(StageError::MissingSource {
                package: name.clone(),
                path: absolute,
            });
        }
        sources.push((name, relative));
    }
    sources.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(sources)
}

/// Container path for a workspace-relative source path.
fn container_path(app: &str, relative: &Path) -> String {
    let relative = to_unix_string(relative);
    if relative.is_empty() {
        app.to_string()
    } else {
        format!("{}/{}", app.trim_end_matches('/'), relative)
    }
}

/// Copy every mapped source tree into `container` under the app directory.
pub fn stage_sources(
    container: Container,
    root: &Path,
    mapping: &SourceMapping,
    config: &Config,
) -> Result<Container> {
    let app = config.layout.app_dir();
    let ignore = config.ignore_patterns();

    let mut container = container;
    for (name, relative) in checked_sources(root, mapping)? {
        let dest = container_path(app, &relative);
        tracing::debug!("staging `{}` at {}", name, dest);
        container = container.with_directory(
            dest,
            Directory::host(root.join(&relative), ignore.clone()),
        );
    }
    Ok(container)
}

/// Copy every mapped source tree into `dest` on the host.
///
/// Each package directory is replaced wholesale, so running this twice over
/// the same inputs leaves an identical tree.
pub fn stage_to_dir(
    root: &Path,
    mapping: &SourceMapping,
    dest: &Path,
    ignore: &[String],
) -> Result<StageReport> {
    let sources = checked_sources(root, mapping)?;
    let ignore = IgnoreSet::new(ignore)?;

    // Every target is checked against every source before anything is
    // removed: replacing a target must never delete or recurse into a source.
    let dest = bfs::resolve_path(dest)?;
    let mut plan = Vec::with_capacity(sources.len());
    for (name, relative) in &sources {
        let src = bfs::resolve_path(&root.join(relative))?;
        plan.push((*name, relative.clone(), src, dest.join(relative)));
    }
    for (name, _, _, target) in &plan {
        if let Some((owner, _, src, _)) = plan
            .iter()
            .find(|(_, _, src, _)| bfs::paths_overlap(target, src))
        {
            bail!(
                "output {} for `{}` overlaps the source of `{}` at {}",
                target.display(),
                name,
                owner,
                src.display()
            );
        }
    }

    bfs::ensure_dir(&dest)?;
    let mut report = StageReport::default();
    for (name, relative, src, target) in plan {
        let stats = if relative.as_os_str().is_empty() {
            bfs::copy_dir_filtered(&src, &target, &ignore)?
        } else {
            bfs::replace_dir_filtered(&src, &target, &ignore)?
        };
        tracing::debug!(
            "staged `{}`: {} file(s), {} skipped",
            name,
            stats.files,
            stats.skipped
        );

        report.packages.push(StagedPackage {
            name: name.clone(),
            path: relative,
            files: stats.files,
            skipped: stats.skipped,
            digest: hash_tree(&target)?,
        });
    }

    Ok(report)
}
