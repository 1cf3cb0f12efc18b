//! `berth plan` command

use anyhow::Result;

use crate::cli::PlanArgs;
use crate::GlobalOptions;
use berth::core::Workspace;
use berth::engine::dockerfile::ContextSource;
use berth::ops::berth_build::{plan, BuildOptions};
use berth::util::fs::relative_path;

pub fn execute(args: PlanArgs, global_opts: &GlobalOptions) -> Result<()> {
    let ws = global_opts.ctx.workspace()?;

    let opts = BuildOptions {
        no_ui: args.no_ui,
        strict: args.strict,
        ..BuildOptions::new(args.package)
    };

    print_plan(&ws, &opts, global_opts)
}

/// Print the rendered Dockerfile to stdout; context inputs go to stderr in
/// verbose mode.
pub fn print_plan(ws: &Workspace, opts: &BuildOptions, global_opts: &GlobalOptions) -> Result<()> {
    let plan = plan(ws, opts)?;

    if global_opts.ctx.is_verbose() {
        for input in &plan.context_inputs {
            let source = match &input.source {
                ContextSource::HostDir { path, .. } | ContextSource::HostFile { path } => {
                    relative_path(ws.root(), path).display().to_string()
                }
                ContextSource::Empty => "(empty)".to_string(),
            };
            eprintln!("{:>12} {} <- {}", "Context", input.name, source);
        }
    }

    print!("{}", plan.dockerfile);
    Ok(())
}
