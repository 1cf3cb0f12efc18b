//! Workspace dependency resolution.
//!
//! Unlike a package manager's solver, nothing is chosen here: the lock
//! already pins every version. Resolution only walks the locked graph to
//! find which workspace members a package needs and where their sources
//! live.

pub mod closure;
pub mod errors;

pub use closure::{DependencyClosure, Resolution, Resolver, SourceMapping};
pub use errors::ResolveError;
