//! High-level operations.
//!
//! This module contains the implementation of berth commands.

pub mod assemble;
pub mod berth_build;
pub mod finalize;
pub mod frontend;
pub mod resolve;
pub mod stage;

pub use assemble::{assemble, install_workspace};
pub use berth_build::{build, build_ui, plan, BuildOptions, BuildOutcome, BuildPlan, UiOutcome};
pub use finalize::{check_entrypoint, entrypoint, finalize, FinalizeError};
pub use frontend::{build_frontend, locate_frontend, Frontend};
pub use resolve::resolve_package;
pub use stage::{stage_sources, stage_to_dir, StageError, StageReport, StagedPackage};
