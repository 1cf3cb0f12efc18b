//! `berth build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use crate::GlobalOptions;
use berth::engine::DockerEngine;
use berth::ops::berth_build::{build, BuildOptions};
use berth::util::shell::{format_duration, Status};

pub fn execute(args: BuildArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let ws = global_opts.ctx.workspace()?;

    let opts = BuildOptions {
        package: args.package.clone(),
        tag: args.tag,
        platform: args.platform,
        no_ui: args.no_ui,
        strict: args.strict,
        check_entrypoint: args.check_entrypoint,
    };

    if args.plan {
        return super::plan::print_plan(&ws, &opts, global_opts);
    }

    let engine = DockerEngine::from_config(&ws.config().engine)?;

    let spinner = shell.spinner(Status::Building, format!("`{}`", args.package));
    let result = build(&ws, &opts, &engine);
    let elapsed = spinner.finish();
    let outcome = result?;

    if let Some(ref frontend) = outcome.frontend {
        shell.status(
            Status::Finished,
            format!("frontend from {}", frontend.display()),
        );
    }
    shell.status(
        Status::Finished,
        format!(
            "`{}` ({} workspace package(s)) in {}",
            args.package,
            outcome.closure.len(),
            format_duration(elapsed)
        ),
    );

    println!("{}", outcome.tag.unwrap_or(outcome.image_id));
    Ok(())
}
