//! `berth stage` command

use anyhow::Result;

use crate::cli::StageArgs;
use crate::GlobalOptions;
use berth::ops::resolve::resolve_package;
use berth::ops::stage::stage_to_dir;
use berth::util::fs::to_unix_string;
use berth::util::shell::Status;

pub fn execute(args: StageArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let ctx = &global_opts.ctx;
    let ws = ctx.workspace()?;

    let out = if args.out.is_absolute() {
        args.out
    } else {
        ctx.cwd().join(args.out)
    };

    let resolution = resolve_package(&ws, &args.package, args.strict)?;
    let report = stage_to_dir(
        ws.root(),
        &resolution.mapping,
        &out,
        &ws.config().ignore_patterns(),
    )?;

    for package in &report.packages {
        shell.status(
            Status::Staging,
            format!(
                "{} ({}, {} file(s), {})",
                package.name,
                to_unix_string(&package.path),
                package.files,
                &package.digest[..12]
            ),
        );
    }
    shell.status(
        Status::Finished,
        format!(
            "{} file(s) from {} package(s) into {}",
            report.total_files(),
            report.packages.len(),
            out.display()
        ),
    );
    Ok(())
}
