//! berth CLI - container images for uv workspaces

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use berth::engine::EngineError;
use berth::ops::FinalizeError;
use berth::resolver::ResolveError;
use berth::util::diagnostic::{emit, suggestions, Diagnostic};
use berth::util::shell::{Shell, Verbosity};
use berth::util::GlobalContext;
use cli::{Cli, Commands};

/// State shared by every command.
pub struct GlobalOptions {
    pub shell: Shell,
    pub ctx: GlobalContext,
}

fn main() {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let shell = Shell::new(verbosity, !cli.no_color);
    let color = shell.use_color();

    init_logging(verbosity);

    if let Err(e) = run(cli, shell) {
        match diagnose(&e) {
            Some(diag) => emit(&diag, color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_logging(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Quiet => "berth=error",
        Verbosity::Normal => "berth=info",
        Verbosity::Verbose => "berth=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Richer reports for errors users can act on.
fn diagnose(err: &anyhow::Error) -> Option<Diagnostic> {
    if let Some(e) = err.downcast_ref::<ResolveError>() {
        return Some(e.to_diagnostic());
    }

    if let Some(e) = err.downcast_ref::<FinalizeError>() {
        return Some(e.to_diagnostic());
    }

    match err.downcast_ref::<EngineError>()? {
        EngineError::NotFound { .. } => {
            Some(Diagnostic::error(err.to_string()).with_suggestion(suggestions::NO_ENGINE))
        }
        EngineError::BuildFailed { .. } => {
            Some(Diagnostic::error(format!("{:#}", err)).with_suggestion(suggestions::BUILD_FAILED))
        }
        _ => None,
    }
}

fn run(cli: Cli, shell: Shell) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_root(cli.root);
    ctx.set_verbose(cli.verbose);
    ctx.set_color(!cli.no_color);

    let opts = GlobalOptions { shell, ctx };

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &opts),
        Commands::BuildUi(args) => commands::build_ui::execute(args, &opts),
        Commands::Resolve(args) => commands::resolve::execute(args, &opts),
        Commands::Stage(args) => commands::stage::execute(args, &opts),
        Commands::Plan(args) => commands::plan::execute(args, &opts),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
