//! Command implementations

pub mod build;
pub mod build_ui;
pub mod completions;
pub mod plan;
pub mod resolve;
pub mod stage;
