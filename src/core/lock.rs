//! `uv.lock` decoding.
//!
//! The lockfile is a TOML document with a `version`, an optional
//! `[manifest]` section listing workspace members, and a `[[package]]`
//! table with one entry per resolvable package. Only the fields that
//! matter for dependency closure and staging are decoded; wheels, sdists
//! and resolution markers are ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::workspace::WorkspaceManifest;
use crate::core::PackageName;

/// Lockfile format version understood by berth.
pub const SUPPORTED_LOCK_VERSION: u32 = 1;

/// Errors raised while loading a lockfile.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum LockError {
    #[error("failed to read lockfile: {}", path.display())]
    #[diagnostic(code(berth::lock::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse lockfile: {message}")]
    #[diagnostic(
        code(berth::lock::parse),
        help("regenerate the lockfile with `uv lock`")
    )]
    Parse {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("invalid lockfile content")]
        span: Option<SourceSpan>,
    },

    #[error("lockfile version {found} is not supported (expected {expected})")]
    #[diagnostic(
        code(berth::lock::version),
        help("regenerate the lockfile with a uv release that writes version {expected}")
    )]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("workspace member `{name}` appears more than once in the lockfile")]
    #[diagnostic(code(berth::lock::duplicate_member))]
    DuplicateMember { name: PackageName },
}

/// Where a locked package comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSource", into = "RawSource")]
pub enum SourceDescriptor {
    /// Workspace-local package installed in editable mode.
    Editable(PathBuf),
    /// Workspace-local package that is never installed (e.g. a virtual root).
    Virtual(PathBuf),
    /// Local directory dependency.
    Directory(PathBuf),
    /// Local archive or wheel.
    Path(PathBuf),
    /// Package index.
    Registry(String),
    /// Git repository.
    Git(String),
    /// Direct URL.
    Url(String),
}

impl SourceDescriptor {
    /// Whether this source is an editable workspace path.
    pub fn is_editable(&self) -> bool {
        matches!(self, SourceDescriptor::Editable(_))
    }

    /// Path of an editable source, relative to the workspace root.
    pub fn editable_path(&self) -> Option<&Path> {
        match self {
            SourceDescriptor::Editable(path) => Some(path),
            _ => None,
        }
    }

    /// Short label used in listings.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceDescriptor::Editable(_) => "editable",
            SourceDescriptor::Virtual(_) => "virtual",
            SourceDescriptor::Directory(_) => "directory",
            SourceDescriptor::Path(_) => "path",
            SourceDescriptor::Registry(_) => "registry",
            SourceDescriptor::Git(_) => "git",
            SourceDescriptor::Url(_) => "url",
        }
    }
}

/// Inline-table form of a source (`{ editable = "packages/api" }`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    editable: Option<PathBuf>,
    #[serde(default, rename = "virtual", skip_serializing_if = "Option::is_none")]
    virtual_: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl TryFrom<RawSource> for SourceDescriptor {
    type Error = String;

    fn try_from(raw: RawSource) -> Result<Self, Self::Error> {
        if let Some(path) = raw.editable {
            Ok(SourceDescriptor::Editable(path))
        } else if let Some(path) = raw.virtual_ {
            Ok(SourceDescriptor::Virtual(path))
        } else if let Some(path) = raw.directory {
            Ok(SourceDescriptor::Directory(path))
        } else if let Some(path) = raw.path {
            Ok(SourceDescriptor::Path(path))
        } else if let Some(url) = raw.registry {
            Ok(SourceDescriptor::Registry(url))
        } else if let Some(url) = raw.git {
            Ok(SourceDescriptor::Git(url))
        } else if let Some(url) = raw.url {
            Ok(SourceDescriptor::Url(url))
        } else {
            Err("source must name one of: editable, virtual, directory, path, registry, git, url"
                .to_string())
        }
    }
}

impl From<SourceDescriptor> for RawSource {
    fn from(source: SourceDescriptor) -> Self {
        let mut raw = RawSource::default();
        match source {
            SourceDescriptor::Editable(p) => raw.editable = Some(p),
            SourceDescriptor::Virtual(p) => raw.virtual_ = Some(p),
            SourceDescriptor::Directory(p) => raw.directory = Some(p),
            SourceDescriptor::Path(p) => raw.path = Some(p),
            SourceDescriptor::Registry(u) => raw.registry = Some(u),
            SourceDescriptor::Git(u) => raw.git = Some(u),
            SourceDescriptor::Url(u) => raw.url = Some(u),
        }
        raw
    }
}

/// A reference from one locked package to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    /// Name of the dependency
    pub name: PackageName,

    /// Extras requested on the dependency
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,

    /// Environment marker guarding the edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

/// One `[[package]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockEntry {
    /// Package name
    pub name: PackageName,

    /// Locked version (absent for some virtual packages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Source descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDescriptor>,

    /// Runtime dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRef>,

    /// Optional dependencies keyed by extra
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, Vec<DependencyRef>>,

    /// Development dependency groups; never part of a build closure
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, Vec<DependencyRef>>,
}

impl LockEntry {
    /// Whether this entry is installed from a workspace path in editable mode.
    pub fn is_editable(&self) -> bool {
        self.source.as_ref().is_some_and(SourceDescriptor::is_editable)
    }

    /// Workspace-relative path for editable entries.
    pub fn editable_path(&self) -> Option<&Path> {
        self.source.as_ref().and_then(SourceDescriptor::editable_path)
    }

    /// Dependencies activated by the given extra.
    pub fn extra_dependencies(&self, extra: &str) -> &[DependencyRef] {
        self.optional_dependencies
            .get(extra)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn is_workspace_local(&self) -> bool {
        matches!(
            self.source,
            Some(SourceDescriptor::Editable(_)) | Some(SourceDescriptor::Virtual(_))
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawLockfile {
    version: u32,
    #[serde(default)]
    revision: Option<u32>,
    #[serde(default)]
    requires_python: Option<String>,
    #[serde(default)]
    manifest: Option<RawManifest>,
    #[serde(default, rename = "package")]
    packages: Vec<LockEntry>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    members: Vec<PackageName>,
}

/// A decoded lockfile with its package table indexed by name.
#[derive(Debug, Clone)]
pub struct Lockfile {
    /// Format version
    pub version: u32,

    /// Format revision
    pub revision: Option<u32>,

    /// Python requirement recorded at lock time
    pub requires_python: Option<String>,

    workspace: WorkspaceManifest,
    packages: BTreeMap<PackageName, LockEntry>,
}

impl Lockfile {
    /// Load and parse a lockfile from disk.
    pub fn load(path: &Path) -> Result<Self, LockError> {
        let content = std::fs::read_to_string(path).map_err(|source| LockError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse lockfile text. `origin` names the document in diagnostics.
    pub fn parse(content: &str, origin: &str) -> Result<Self, LockError> {
        let raw: RawLockfile = toml::from_str(content).map_err(|e| LockError::Parse {
            message: e.message().to_string(),
            src: NamedSource::new(origin, content.to_string()),
            span: e.span().map(SourceSpan::from),
        })?;

        if raw.version != SUPPORTED_LOCK_VERSION {
            return Err(LockError::UnsupportedVersion {
                found: raw.version,
                expected: SUPPORTED_LOCK_VERSION,
            });
        }

        // Without a [manifest] section the workspace is a single project and
        // its members are the workspace-local entries.
        let workspace = match raw.manifest {
            Some(manifest) => WorkspaceManifest::new(manifest.members),
            None => WorkspaceManifest::new(
                raw.packages
                    .iter()
                    .filter(|p| p.is_workspace_local())
                    .map(|p| p.name.clone()),
            ),
        };

        let mut packages = BTreeMap::new();
        for entry in raw.packages {
            if packages.contains_key(&entry.name) {
                if workspace.contains(&entry.name) {
                    return Err(LockError::DuplicateMember { name: entry.name });
                }
                tracing::warn!(
                    "lockfile has several entries for `{}`; using the first",
                    entry.name
                );
                continue;
            }
            packages.insert(entry.name.clone(), entry);
        }

        Ok(Lockfile {
            version: raw.version,
            revision: raw.revision,
            requires_python: raw.requires_python,
            workspace,
            packages,
        })
    }

    /// Check whether this lockfile can be used.
    pub fn is_compatible(&self) -> bool {
        self.version == SUPPORTED_LOCK_VERSION
    }

    /// The workspace members declared by the lock.
    pub fn workspace(&self) -> &WorkspaceManifest {
        &self.workspace
    }

    /// Look up a package by (normalized) name.
    pub fn get(&self, name: &PackageName) -> Option<&LockEntry> {
        self.packages.get(name)
    }

    /// All entries, ordered by name.
    pub fn packages(&self) -> impl Iterator<Item = &LockEntry> {
        self.packages.values()
    }

    /// Number of locked packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the package table is empty.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Editable workspace members and their paths, ordered by name.
    pub fn editable_members(&self) -> impl Iterator<Item = (&PackageName, &Path)> {
        self.packages
            .values()
            .filter(|entry| self.workspace.contains(&entry.name))
            .filter_map(|entry| entry.editable_path().map(|path| (&entry.name, path)))
    }
}
