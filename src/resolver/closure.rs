//! Dependency closures over the lock's package table.
//!
//! A closure is computed fresh for each build request and never persisted.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::{DependencyRef, LockEntry, Lockfile, PackageName};
use crate::resolver::errors::ResolveError;

/// Packages reachable from a target through workspace members, in
/// discovery order (target first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyClosure {
    packages: Vec<PackageName>,
}

impl DependencyClosure {
    /// Check whether `name` is in the closure.
    pub fn contains(&self, name: &PackageName) -> bool {
        self.packages.contains(name)
    }

    /// Iterate in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageName> {
        self.packages.iter()
    }

    /// Number of packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether nothing was reached.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Workspace-relative source paths of the editable closure entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceMapping {
    paths: BTreeMap<PackageName, PathBuf>,
}

impl SourceMapping {
    /// Path for `name`, if it is staged.
    pub fn get(&self, name: &PackageName) -> Option<&Path> {
        self.paths.get(name).map(PathBuf::as_path)
    }

    /// Iterate over (name, path) pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&PackageName, &Path)> {
        self.paths.iter().map(|(n, p)| (n, p.as_path()))
    }

    /// Number of mapped packages.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no package needs staging.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FromIterator<(PackageName, PathBuf)> for SourceMapping {
    fn from_iter<I: IntoIterator<Item = (PackageName, PathBuf)>>(iter: I) -> Self {
        SourceMapping {
            paths: iter.into_iter().collect(),
        }
    }
}

/// The result of resolving one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Requested package
    pub target: Option<PackageName>,

    /// Reachable workspace packages
    pub closure: DependencyClosure,

    /// Editable entries to stage
    pub mapping: SourceMapping,
}

/// Computes closures against one lockfile.
pub struct Resolver<'a> {
    lock: &'a Lockfile,
    strict: bool,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a decoded lockfile.
    pub fn new(lock: &'a Lockfile) -> Self {
        Resolver {
            lock,
            strict: false,
        }
    }

    /// Make an unknown target a hard error instead of an empty result.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolve the closure and source mapping for `target`.
    pub fn resolve(&self, target: &PackageName) -> Result<Resolution, ResolveError> {
        let members = self.lock.workspace();
        let root = self
            .lock
            .get(target)
            .filter(|_| members.contains(target));
        let Some(root) = root else {
            if self.strict {
                return Err(ResolveError::PackageNotFound {
                    package: target.to_string(),
                    suggestions: self.similar_members(target),
                });
            }
            tracing::warn!(
                "`{}` is not a workspace member in the lockfile; nothing to build",
                target
            );
            return Ok(Resolution::default());
        };

        let mut closure = Vec::new();
        let mut seen_packages: HashSet<&PackageName> = HashSet::new();
        let mut visited: HashSet<(&PackageName, Option<&str>)> = HashSet::new();
        let mut worklist: Vec<(&LockEntry, Option<&str>)> = vec![(root, None)];

        while let Some((entry, extra)) = worklist.pop() {
            if !visited.insert((&entry.name, extra)) {
                continue;
            }
            if seen_packages.insert(&entry.name) {
                closure.push(entry.name.clone());
            }

            let edges: &[DependencyRef] = match extra {
                None => &entry.dependencies,
                Some(extra) => entry.extra_dependencies(extra),
            };

            // Reverse so the first-listed dependency is explored first.
            for dep in edges.iter().rev() {
                if !members.contains(&dep.name) {
                    tracing::trace!("`{}` -> `{}` is external", entry.name, dep.name);
                    continue;
                }
                let Some(dep_entry) = self.lock.get(&dep.name) else {
                    tracing::warn!(
                        "member `{}` is referenced by `{}` but not locked",
                        dep.name,
                        entry.name
                    );
                    continue;
                };
                for extra in dep.extra.iter().rev() {
                    worklist.push((dep_entry, Some(extra.as_str())));
                }
                worklist.push((dep_entry, None));
            }
        }

        let mapping = closure
            .iter()
            .filter_map(|name| self.lock.get(name))
            .filter_map(|entry| {
                entry
                    .editable_path()
                    .map(|path| (entry.name.clone(), path.to_path_buf()))
            })
            .collect();

        tracing::debug!(
            "resolved `{}`: {} package(s) in closure",
            target,
            closure.len()
        );

        Ok(Resolution {
            target: Some(target.clone()),
            closure: DependencyClosure { packages: closure },
            mapping,
        })
    }

    fn similar_members(&self, target: &PackageName) -> Vec<String> {
        let needle = target.as_str();
        self.lock
            .workspace()
            .iter()
            .filter(|m| m.as_str().contains(needle) || needle.contains(m.as_str()))
            .map(|m| m.to_string())
            .collect()
    }
}
