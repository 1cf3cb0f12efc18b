//! Value-typed build graph.
//!
//! Containers, directories and files are plain immutable values. Every
//! `with_*` call returns a new container; nothing runs until an
//! [`Engine`](super::Engine) executes the graph. Two structurally equal
//! containers describe the same build and may be shared by the engine.

use std::fmt;
use std::path::{Path, PathBuf};

/// A named cache volume that persists across builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheVolume {
    id: String,
}

impl CacheVolume {
    pub fn new(id: impl Into<String>) -> Self {
        CacheVolume { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A cache volume mounted at a container path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheMount {
    pub target: String,
    pub cache: CacheVolume,
}

/// One step of a container definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// Set an environment variable
    Env { key: String, value: String },
    /// Change the working directory
    Workdir(String),
    /// Place a directory at a path
    WithDirectory { path: String, source: Directory },
    /// Place a single file at a path
    WithFile { path: String, source: File },
    /// Run a command with the cache mounts active at that point
    Exec {
        args: Vec<String>,
        mounts: Vec<CacheMount>,
    },
    /// Set the image entrypoint
    Entrypoint(Vec<String>),
}

/// A container built on top of a base image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    image: String,
    ops: Vec<Op>,
    mounts: Vec<CacheMount>,
}

impl Container {
    /// Start from a registry image reference.
    pub fn from_image(image: impl Into<String>) -> Self {
        Container {
            image: image.into(),
            ops: Vec::new(),
            mounts: Vec::new(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    fn push(mut self, op: Op) -> Self {
        self.ops.push(op);
        self
    }

    pub fn with_env_variable(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Op::Env {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn with_workdir(self, path: impl Into<String>) -> Self {
        self.push(Op::Workdir(path.into()))
    }

    pub fn with_directory(self, path: impl Into<String>, source: Directory) -> Self {
        self.push(Op::WithDirectory {
            path: path.into(),
            source,
        })
    }

    pub fn with_file(self, path: impl Into<String>, source: File) -> Self {
        self.push(Op::WithFile {
            path: path.into(),
            source,
        })
    }

    /// Mount `cache` at `target` for every later exec.
    pub fn with_mounted_cache(mut self, target: impl Into<String>, cache: CacheVolume) -> Self {
        let target = target.into();
        self.mounts.retain(|m| m.target != target);
        self.mounts.push(CacheMount { target, cache });
        self
    }

    pub fn with_exec<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mounts = self.mounts.clone();
        self.push(Op::Exec {
            args: args.into_iter().map(Into::into).collect(),
            mounts,
        })
    }

    pub fn with_entrypoint<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Op::Entrypoint(args.into_iter().map(Into::into).collect()))
    }

    /// A directory of this container's filesystem.
    pub fn directory(&self, path: impl Into<String>) -> Directory {
        Directory::Container {
            container: Box::new(self.clone()),
            path: path.into(),
        }
    }

    /// A file of this container's filesystem.
    pub fn file(&self, path: impl Into<String>) -> File {
        File::Container {
            container: Box::new(self.clone()),
            path: path.into(),
        }
    }

    /// Commands this container runs, in order.
    pub fn execs(&self) -> impl Iterator<Item = &[String]> {
        self.ops.iter().filter_map(|op| match op {
            Op::Exec { args, .. } => Some(args.as_slice()),
            _ => None,
        })
    }

    /// Environment variable value as last set.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::Env { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Directory placed at `path`, if any (the last one wins).
    pub fn mounted_directory(&self, path: &str) -> Option<&Directory> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::WithDirectory { path: p, source } if p == path => Some(source),
            _ => None,
        })
    }

    /// Configured entrypoint, if any.
    pub fn entrypoint(&self) -> Option<&[String]> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::Entrypoint(args) => Some(args.as_slice()),
            _ => None,
        })
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (+{} ops)", self.image, self.ops.len())
    }
}

/// A directory value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Directory {
    /// An empty directory
    Empty,
    /// A host directory, minus entries matching `exclude`
    Host { path: PathBuf, exclude: Vec<String> },
    /// A path inside a container
    Container {
        container: Box<Container>,
        path: String,
    },
}

impl Directory {
    pub fn host(path: impl AsRef<Path>, exclude: Vec<String>) -> Self {
        Directory::Host {
            path: path.as_ref().to_path_buf(),
            exclude,
        }
    }

    pub fn is_empty_dir(&self) -> bool {
        matches!(self, Directory::Empty)
    }
}

/// A file value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum File {
    /// A host file
    Host(PathBuf),
    /// A path inside a container
    Container {
        container: Box<Container>,
        path: String,
    },
}

impl File {
    pub fn host(path: impl AsRef<Path>) -> Self {
        File::Host(path.as_ref().to_path_buf())
    }
}
