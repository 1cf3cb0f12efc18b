//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use glob::Pattern;
use walkdir::WalkDir;

/// A set of glob patterns excluded from copies.
///
/// A pattern matches an entry when it matches the entry's file name or its
/// path relative to the copy root, so `node_modules` prunes every
/// `node_modules` directory and `src/*.tmp` only applies below `src`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    /// Compile a list of glob patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref().trim_end_matches('/');
                Pattern::new(p).with_context(|| format!("invalid ignore pattern: {}", p))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(IgnoreSet { patterns })
    }

    /// Check a path relative to the copy root.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let full = relative.to_string_lossy().replace('\\', "/");

        self.patterns
            .iter()
            .any(|p| p.matches(&name) || p.matches(&full))
    }
}

/// Summary of a filtered copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Regular files copied
    pub files: usize,
    /// Entries skipped by the ignore set
    pub skipped: usize,
}

/// Recursively copy a directory, skipping ignored entries.
pub fn copy_dir_filtered(src: &Path, dst: &Path, ignore: &IgnoreSet) -> Result<CopyStats> {
    ensure_dir(dst)?;
    let mut stats = CopyStats::default();

    let walker = WalkDir::new(src).min_depth(1).sort_by_file_name();
    let mut it = walker.into_iter();
    while let Some(entry) = it.next() {
        let entry =
            entry.with_context(|| format!("failed to read directory: {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("walked outside of {}", src.display()))?;

        if ignore.is_ignored(relative) {
            stats.skipped += 1;
            if entry.file_type().is_dir() {
                it.skip_current_dir();
            }
            continue;
        }

        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            stats.files += 1;
        } else {
            tracing::debug!("skipping special file {}", entry.path().display());
            stats.skipped += 1;
        }
    }

    Ok(stats)
}

/// Replace `dst` with a filtered copy of `src`.
///
/// Anything previously at `dst` is removed first, so repeated calls leave
/// the same tree behind.
pub fn replace_dir_filtered(src: &Path, dst: &Path, ignore: &IgnoreSet) -> Result<CopyStats> {
    remove_dir_all_if_exists(dst)?;
    copy_dir_filtered(src, dst, ignore)
}

/// Replace `dst` with a directory produced by `fill`.
///
/// `fill` writes into a scratch directory next to `dst`; the old `dst` is
/// only removed once `fill` has succeeded, so a failure leaves it intact.
pub fn swap_dir_with<F>(dst: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let parent = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let scratch = tempfile::Builder::new()
        .prefix(".berth-swap-")
        .tempdir_in(&parent)
        .with_context(|| format!("failed to create scratch directory in {}", parent.display()))?;
    let staged = scratch.path().join("out");
    fill(&staged)?;
    ensure_dir(&staged)?;

    remove_dir_all_if_exists(dst)?;
    fs::rename(&staged, dst).with_context(|| {
        format!("failed to move {} to {}", staged.display(), dst.display())
    })?;
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Validate a workspace-relative path and return it in normalized form.
///
/// Absolute paths and paths that climb out of the root with `..` are
/// rejected; `.` components are dropped.
pub fn workspace_relative(path: &Path) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("path escapes the workspace: {}", path.display())
            }
        }
    }
    Ok(normalized)
}

/// Resolve `path` to an absolute, symlink-free form.
///
/// Trailing components that do not exist yet are appended to the
/// canonical form of the nearest existing ancestor.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to read the current directory")?
            .join(path)
    };

    let mut missing = Vec::new();
    let mut existing = path.as_path();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            return Ok(missing.iter().rev().fold(resolved, |acc, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => bail!("failed to resolve path: {}", path.display()),
        }
    }
}

/// True when one path is equal to or nested inside the other.
pub fn paths_overlap(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Render a relative path with forward slashes.
pub fn to_unix_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
