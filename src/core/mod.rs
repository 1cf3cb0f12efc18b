//! Core data structures for berth.
//!
//! This module contains the foundational types used throughout berth:
//! - Normalized package names
//! - The decoded `uv.lock` and its entries
//! - Workspace management

pub mod lock;
pub mod package_name;
pub mod workspace;

pub use lock::{DependencyRef, LockEntry, LockError, Lockfile, SourceDescriptor};
pub use package_name::PackageName;
pub use workspace::{
    find_workspace_root, Workspace, WorkspaceManifest, LOCKFILE_NAME, MANIFEST_NAME,
};
