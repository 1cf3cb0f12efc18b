//! Build execution.
//!
//! Operations describe their work as a [`graph`] of containers and
//! directories. An [`Engine`] turns that graph into an image or an
//! exported directory. The shipped engine drives Docker BuildKit.

pub mod docker;
pub mod dockerfile;
pub mod graph;

use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;

pub use docker::DockerEngine;
pub use graph::{CacheVolume, Container, Directory, File};

/// Errors raised while executing a build graph.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("`{program}` was not found in PATH")]
    NotFound { program: String },

    #[error("invalid build graph: {reason}")]
    InvalidGraph { reason: String },

    #[error("`{command}` failed with exit code {code:?}\n{stderr}")]
    BuildFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("build finished without writing an image id to {}", path.display())]
    MissingImageId { path: PathBuf },
}

/// Options for producing an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions {
    /// Tag to apply, e.g. `api:latest`
    pub tag: Option<String>,

    /// Target platform, e.g. `linux/amd64`
    pub platform: Option<String>,
}

/// A built image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Content id reported by the engine (`sha256:...`)
    pub id: String,
    pub tag: Option<String>,
}

/// Executes build graphs.
pub trait Engine: Sync {
    /// Build `container` into an image.
    fn build_image(&self, container: &Container, opts: &ImageOptions) -> Result<ImageRef>;

    /// Materialize `dir` at `dest` on the host, replacing anything there.
    fn export_directory(&self, dir: &Directory, dest: &Path) -> Result<()>;
}
