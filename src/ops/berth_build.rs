//! Implementation of `berth build`, `berth build-ui` and `berth plan`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::{PackageName, Workspace};
use crate::engine::dockerfile::{self, ContextInput};
use crate::engine::{Container, Directory, Engine, ImageOptions};
use crate::ops::assemble::{assemble, install_workspace};
use crate::ops::finalize::{check_entrypoint, finalize};
use crate::ops::frontend::{build_frontend, Frontend};
use crate::ops::stage::stage_sources;
use crate::resolver::{DependencyClosure, Resolution, Resolver, SourceMapping};
use crate::util::fs::resolve_path;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Package to build
    pub package: String,

    /// Tag for the resulting image
    pub tag: Option<String>,

    /// Target platform (overrides `engine.platform`)
    pub platform: Option<String>,

    /// Skip the frontend even if one exists
    pub no_ui: bool,

    /// Fail if the package is not a workspace member
    pub strict: bool,

    /// Require a `__main__` module before building
    pub check_entrypoint: bool,
}

impl BuildOptions {
    pub fn new(package: impl Into<String>) -> Self {
        BuildOptions {
            package: package.into(),
            ..BuildOptions::default()
        }
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Image id reported by the engine
    pub image_id: String,
    pub tag: Option<String>,
    pub closure: DependencyClosure,
    pub mapping: SourceMapping,
    /// Frontend source that was bundled, if any
    pub frontend: Option<PathBuf>,
}

/// Result of `build_ui`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiOutcome {
    pub dest: PathBuf,
    /// True when the package has no frontend and `dest` is empty
    pub empty: bool,
}

/// A rendered build that was not executed.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub dockerfile: String,
    pub context_inputs: Vec<ContextInput>,
    pub resolution: Resolution,
}

/// Everything needed to hand a build to the engine.
struct Prepared {
    name: PackageName,
    resolution: Resolution,
    frontend: Frontend,
    image: Container,
}

fn prepare(ws: &Workspace, opts: &BuildOptions) -> Result<Prepared> {
    let config = ws.config();
    let lock = ws.load_lock()?;
    let name = PackageName::new(&opts.package);

    let resolution = Resolver::new(&lock)
        .strict(opts.strict || config.build.strict)
        .resolve(&name)?;
    tracing::info!(
        "`{}` needs {} workspace package(s)",
        name,
        resolution.closure.len()
    );

    if opts.check_entrypoint || config.build.validate_entrypoint {
        let found = check_entrypoint(ws.root(), &resolution.mapping, &name)?;
        tracing::debug!("entrypoint found at {}", found.display());
    }

    let (app, frontend) = rayon::join(
        || -> Result<Container> {
            let container = assemble(ws, &lock, &name)?;
            let container = stage_sources(container, ws.root(), &resolution.mapping, config)?;
            Ok(install_workspace(container, &name, config))
        },
        || {
            if opts.no_ui {
                Frontend {
                    source: None,
                    output: Directory::Empty,
                }
            } else {
                build_frontend(ws, &name)
            }
        },
    );
    let app = app?;

    let image = finalize(&app, frontend.output.clone(), &name, config);
    Ok(Prepared {
        name,
        resolution,
        frontend,
        image,
    })
}

/// Build the runtime image for one package.
///
/// Nothing is tagged or returned unless every stage succeeds.
pub fn build(ws: &Workspace, opts: &BuildOptions, engine: &dyn Engine) -> Result<BuildOutcome> {
    let prepared = prepare(ws, opts)?;

    let image_opts = ImageOptions {
        tag: opts.tag.clone(),
        platform: opts
            .platform
            .clone()
            .or_else(|| ws.config().engine.platform.clone()),
    };
    let image = engine.build_image(&prepared.image, &image_opts)?;
    tracing::info!("`{}` built as {}", prepared.name, image.id);

    Ok(BuildOutcome {
        image_id: image.id,
        tag: image.tag,
        closure: prepared.resolution.closure,
        mapping: prepared.resolution.mapping,
        frontend: prepared.frontend.source,
    })
}

/// Render the build for one package without running it.
pub fn plan(ws: &Workspace, opts: &BuildOptions) -> Result<BuildPlan> {
    let prepared = prepare(ws, opts)?;
    let rendered = dockerfile::render(&prepared.image)?;

    Ok(BuildPlan {
        dockerfile: rendered.dockerfile,
        context_inputs: rendered.inputs,
        resolution: prepared.resolution,
    })
}

/// Build only the frontend of `name` and export its output to `dest`.
///
/// `dest` is replaced, so it may not be the workspace root, the frontend
/// source or a parent of either.
pub fn build_ui(ws: &Workspace, name: &str, dest: &Path, engine: &dyn Engine) -> Result<UiOutcome> {
    let name = PackageName::new(name);
    let frontend = build_frontend(ws, &name);

    let resolved = resolve_path(dest)?;
    let protected = std::iter::once(ws.root()).chain(frontend.source.as_deref());
    for path in protected {
        if resolve_path(path)?.starts_with(&resolved) {
            bail!(
                "refusing to replace {}: it contains {}",
                dest.display(),
                path.display()
            );
        }
    }

    engine.export_directory(&frontend.output, dest)?;

    Ok(UiOutcome {
        dest: dest.to_path_buf(),
        empty: frontend.is_empty(),
    })
}
