//! `berth resolve` command

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::cli::ResolveArgs;
use crate::GlobalOptions;
use berth::core::PackageName;
use berth::ops::resolve::resolve_package;
use berth::resolver::Resolution;
use berth::util::fs::to_unix_string;
use berth::util::shell::Status;

#[derive(Serialize)]
struct ResolveJson<'a> {
    package: &'a str,
    closure: Vec<&'a str>,
    sources: BTreeMap<&'a str, String>,
}

impl<'a> ResolveJson<'a> {
    fn new(package: &'a PackageName, resolution: &'a Resolution) -> Self {
        ResolveJson {
            package: package.as_str(),
            closure: resolution.closure.iter().map(|n| n.as_str()).collect(),
            sources: resolution
                .mapping
                .iter()
                .map(|(name, path)| (name.as_str(), to_unix_string(path)))
                .collect(),
        }
    }
}

pub fn execute(args: ResolveArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let ws = global_opts.ctx.workspace()?;

    let package = PackageName::new(&args.package);
    let resolution = resolve_package(&ws, &args.package, args.strict)?;

    if args.json {
        let json = ResolveJson::new(&package, &resolution);
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    // unknown packages were already reported while resolving
    if resolution.closure.is_empty() {
        return Ok(());
    }

    for name in resolution.closure.iter() {
        match resolution.mapping.get(name) {
            Some(path) => println!("{} {}", name, to_unix_string(path)),
            None => println!("{} (not editable)", name),
        }
    }

    shell.status(
        Status::Finished,
        format!(
            "{} package(s), {} to stage",
            resolution.closure.len(),
            resolution.mapping.len()
        ),
    );
    Ok(())
}
