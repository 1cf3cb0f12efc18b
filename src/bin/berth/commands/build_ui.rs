//! `berth build-ui` command

use anyhow::Result;

use crate::cli::BuildUiArgs;
use crate::GlobalOptions;
use berth::core::PackageName;
use berth::engine::DockerEngine;
use berth::ops::berth_build::build_ui;
use berth::ops::frontend::locate_frontend;
use berth::util::shell::{format_duration, Status};
use berth::util::SystemRunner;

pub fn execute(args: BuildUiArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let ctx = &global_opts.ctx;
    let ws = ctx.workspace()?;
    let engine_config = &ws.config().engine;

    let dest = match args.out {
        Some(out) if out.is_absolute() => out,
        Some(out) => ctx.cwd().join(out),
        None => ws.root().join("dist").join(&args.package),
    };

    // an absent frontend exports an empty directory without running docker
    let engine = if locate_frontend(&ws, &PackageName::new(&args.package)).is_some() {
        DockerEngine::from_config(engine_config)?
    } else {
        DockerEngine::with_runner(engine_config.program(), SystemRunner)
    };

    let spinner = shell.spinner(Status::Building, format!("frontend of `{}`", args.package));
    let result = build_ui(&ws, &args.package, &dest, &engine);
    let elapsed = spinner.finish();
    let outcome = result?;

    if outcome.empty {
        shell.status(
            Status::Skipped,
            format!(
                "`{}` has no frontend; {} is empty",
                args.package,
                outcome.dest.display()
            ),
        );
    } else {
        shell.status(
            Status::Finished,
            format!(
                "frontend of `{}` in {}",
                args.package,
                format_duration(elapsed)
            ),
        );
    }

    println!("{}", outcome.dest.display());
    Ok(())
}
