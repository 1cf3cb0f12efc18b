//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// berth - build container images for packages of a uv workspace
#[derive(Parser)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Workspace root (defaults to the nearest directory with a uv.lock)
    #[arg(long, global = true, value_name = "DIR", env = "BERTH_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the runtime image of a package
    Build(BuildArgs),

    /// Build only the frontend of a package and export its assets
    #[command(name = "build-ui")]
    BuildUi(BuildUiArgs),

    /// Show the workspace packages a package depends on
    Resolve(ResolveArgs),

    /// Copy the sources a package needs into a directory
    Stage(StageArgs),

    /// Print the Dockerfile a build would run
    Plan(PlanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Package to build
    pub package: String,

    /// Tag for the image, e.g. `api:latest`
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Target platform, e.g. `linux/amd64`
    #[arg(long)]
    pub platform: Option<String>,

    /// Do not build the frontend
    #[arg(long)]
    pub no_ui: bool,

    /// Fail if the package is not in uv.lock
    #[arg(long)]
    pub strict: bool,

    /// Fail early if the package has no `__main__` module
    #[arg(long)]
    pub check_entrypoint: bool,

    /// Print the Dockerfile instead of building
    #[arg(long)]
    pub plan: bool,
}

#[derive(Args)]
pub struct BuildUiArgs {
    /// Package whose frontend to build
    pub package: String,

    /// Output directory (defaults to dist/<package> in the workspace)
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Package to resolve
    pub package: String,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Fail if the package is not in uv.lock
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct StageArgs {
    /// Package to stage
    pub package: String,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub out: PathBuf,

    /// Fail if the package is not in uv.lock
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Package to plan
    pub package: String,

    /// Leave the frontend out of the plan
    #[arg(long)]
    pub no_ui: bool,

    /// Fail if the package is not in uv.lock
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
