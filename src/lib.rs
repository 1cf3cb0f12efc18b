//! berth - container images for uv workspaces
//!
//! This crate provides the core library functionality for berth:
//! resolving a package's workspace closure from `uv.lock`, describing its
//! build as a graph of containers, and executing that graph with Docker
//! BuildKit.

pub mod core;
pub mod engine;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test utilities and mocks for berth unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted process runner and on-disk
/// workspace fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{Lockfile, PackageName, Workspace};
pub use engine::{DockerEngine, Engine};
pub use resolver::{Resolution, Resolver};
pub use util::context::GlobalContext;
