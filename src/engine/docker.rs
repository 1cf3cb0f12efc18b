//! Docker BuildKit engine.
//!
//! Renders the graph to a Dockerfile, fills a temporary build context with
//! the host inputs and runs `docker build`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tempfile::TempDir;

use crate::engine::dockerfile::{self, ContextInput, ContextSource, Rendered};
use crate::engine::{Directory, Engine, EngineError, ImageOptions, ImageRef};
use crate::engine::graph::Container;
use crate::util::config::EngineConfig;
use crate::util::fs::{self as bfs, IgnoreSet};
use crate::util::process::{find_executable, ProcessBuilder, ProcessRunner, SystemRunner};

/// Lines of build output kept in error messages.
const STDERR_TAIL: usize = 40;

const CONTEXT_DIR: &str = "context";
const DOCKERFILE: &str = "Dockerfile";
const IIDFILE: &str = "iid";

/// Engine backed by the Docker CLI.
#[derive(Debug)]
pub struct DockerEngine<R = SystemRunner> {
    program: String,
    platform: Option<String>,
    runner: R,
}

impl DockerEngine<SystemRunner> {
    /// Engine for the configured Docker CLI, which must be on PATH.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let program = config.program();
        let Some(path) = find_executable(program) else {
            return Err(EngineError::NotFound {
                program: program.to_string(),
            });
        };
        tracing::debug!("using engine {}", path.display());

        Ok(DockerEngine {
            program: program.to_string(),
            platform: config.platform.clone(),
            runner: SystemRunner,
        })
    }
}

impl<R: ProcessRunner> DockerEngine<R> {
    /// Engine that runs `program` through `runner`.
    pub fn with_runner(program: impl Into<String>, runner: R) -> Self {
        DockerEngine {
            program: program.into(),
            platform: None,
            runner,
        }
    }

    /// Default platform for builds that do not name one.
    pub fn platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Create the scratch directory with the Dockerfile and context inputs.
    fn prepare(&self, rendered: &Rendered) -> Result<TempDir> {
        let scratch = tempfile::Builder::new()
            .prefix("berth-")
            .tempdir()
            .context("failed to create build context directory")?;
        let context = scratch.path().join(CONTEXT_DIR);
        bfs::ensure_dir(&context)?;
        bfs::write_string(&scratch.path().join(DOCKERFILE), &rendered.dockerfile)?;

        rendered
            .inputs
            .par_iter()
            .try_for_each(|input| stage_input(&context, input))?;

        tracing::debug!(
            "prepared build context with {} input(s) at {}",
            rendered.inputs.len(),
            context.display()
        );
        Ok(scratch)
    }

    fn build_command(&self, scratch: &Path, target: &str, platform: Option<&str>) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.program)
            .env("DOCKER_BUILDKIT", "1")
            .arg("build")
            .arg("--progress=plain")
            .arg("--file")
            .arg(scratch.join(DOCKERFILE))
            .arg("--target")
            .arg(target);

        if let Some(platform) = platform.or(self.platform.as_deref()) {
            cmd = cmd.arg("--platform").arg(platform);
        }
        cmd
    }

    fn run(&self, cmd: ProcessBuilder) -> Result<()> {
        let output = self.runner.run(&cmd)?;
        if !output.success() {
            return Err(EngineError::BuildFailed {
                command: cmd.display_command(),
                code: output.code,
                stderr: tail(&output.stderr, STDERR_TAIL),
            }
            .into());
        }
        Ok(())
    }
}

impl<R: ProcessRunner> Engine for DockerEngine<R> {
    fn build_image(&self, container: &Container, opts: &ImageOptions) -> Result<ImageRef> {
        let rendered = dockerfile::render(container)?;
        let scratch = self.prepare(&rendered)?;
        let iidfile = scratch.path().join(IIDFILE);

        let mut cmd = self
            .build_command(scratch.path(), &rendered.target, opts.platform.as_deref())
            .arg("--iidfile")
            .arg(&iidfile);
        if let Some(ref tag) = opts.tag {
            cmd = cmd.arg("--tag").arg(tag);
        }
        cmd = cmd.arg(scratch.path().join(CONTEXT_DIR));

        self.run(cmd)?;

        let id = std::fs::read_to_string(&iidfile)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if id.is_empty() {
            return Err(EngineError::MissingImageId { path: iidfile }.into());
        }

        tracing::info!("built image {}", id);
        Ok(ImageRef {
            id,
            tag: opts.tag.clone(),
        })
    }

    fn export_directory(&self, dir: &Directory, dest: &Path) -> Result<()> {
        match dir {
            Directory::Empty => bfs::swap_dir_with(dest, bfs::ensure_dir),
            Directory::Host { path, exclude } => {
                let ignore = IgnoreSet::new(exclude)?;
                let (src, out) = (bfs::resolve_path(path)?, bfs::resolve_path(dest)?);
                if bfs::paths_overlap(&src, &out) {
                    anyhow::bail!(
                        "cannot export {} into overlapping path {}",
                        src.display(),
                        out.display()
                    );
                }
                bfs::swap_dir_with(dest, |staged| {
                    bfs::copy_dir_filtered(path, staged, &ignore).map(|_| ())
                })
            }
            Directory::Container { container, path } => {
                let rendered = dockerfile::render_export(container, path)?;
                let scratch = self.prepare(&rendered)?;

                // BuildKit writes into a sibling; `dest` is untouched until it succeeds
                bfs::swap_dir_with(dest, |staged| {
                    let cmd = self
                        .build_command(scratch.path(), &rendered.target, None)
                        .arg("--output")
                        .arg(format!("type=local,dest={}", staged.display()))
                        .arg(scratch.path().join(CONTEXT_DIR));
                    self.run(cmd)
                })?;
                tracing::info!("exported {} to {}", path, dest.display());
                Ok(())
            }
        }
    }
}

/// Place one context input under the context root.
fn stage_input(context: &Path, input: &ContextInput) -> Result<()> {
    let target: PathBuf = context.join(&input.name);
    match &input.source {
        ContextSource::Empty => bfs::ensure_dir(&target),
        ContextSource::HostDir { path, exclude } => {
            if !path.is_dir() {
                anyhow::bail!("build input is not a directory: {}", path.display());
            }
            let ignore = IgnoreSet::new(exclude)?;
            let stats = bfs::copy_dir_filtered(path, &target, &ignore)?;
            tracing::debug!(
                "staged {} ({} file(s), {} skipped)",
                path.display(),
                stats.files,
                stats.skipped
            );
            Ok(())
        }
        ContextSource::HostFile { path } => {
            if let Some(parent) = target.parent() {
                bfs::ensure_dir(parent)?;
            }
            std::fs::copy(path, &target).with_context(|| {
                format!("failed to copy build input: {}", path.display())
            })?;
            Ok(())
        }
    }
}

/// Last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::File;
    use crate::test_support::{MockProcessOutput, MockRunner};

    fn engine() -> DockerEngine<MockRunner> {
        DockerEngine::with_runner("docker", MockRunner::new())
    }

    fn sample(tmp: &Path) -> Container {
        std::fs::create_dir_all(tmp.join("pkg/__pycache__")).unwrap();
        std::fs::write(tmp.join("pkg/app.py"), "x = 1").unwrap();
        std::fs::write(tmp.join("pkg/__pycache__/app.pyc"), "").unwrap();
        std::fs::write(tmp.join("uv.lock"), "version = 1").unwrap();

        Container::from_image("python:3.12-slim")
            .with_file("/app/uv.lock", File::host(tmp.join("uv.lock")))
            .with_directory(
                "/app/pkg",
                Directory::host(tmp.join("pkg"), vec!["__pycache__".into()]),
            )
    }

    #[test]
    fn test_build_image_reads_iidfile() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = engine().platform(Some("linux/amd64".into()));
        engine.runner().expect_contains(
            "docker build",
            MockProcessOutput::success("").writing("--iidfile", "sha256:feed\n"),
        );

        let opts = ImageOptions {
            tag: Some("api:latest".into()),
            platform: None,
        };
        let image = engine.build_image(&sample(tmp.path()), &opts).unwrap();

        assert_eq!(image.id, "sha256:feed");
        assert_eq!(image.tag.as_deref(), Some("api:latest"));

        let calls = engine.runner().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].flag_value("--tag"), Some("api:latest"));
        assert_eq!(calls[0].flag_value("--platform"), Some("linux/amd64"));
        assert_eq!(calls[0].flag_value("--target"), Some("stage-0"));
    }

    #[test]
    fn test_build_failure_produces_no_image() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = engine();
        engine.runner().expect_contains(
            "docker build",
            MockProcessOutput::failure(1, "step 5/9: uv sync failed"),
        );

        let err = engine
            .build_image(&sample(tmp.path()), &ImageOptions::default())
            .unwrap_err();

        match err.downcast_ref::<EngineError>() {
            Some(EngineError::BuildFailed { code, stderr, .. }) => {
                assert_eq!(*code, Some(1));
                assert!(stderr.contains("uv sync failed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_success_without_iid_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = engine();
        engine
            .runner()
            .set_default(MockProcessOutput::success(""));

        let err = engine
            .build_image(&sample(tmp.path()), &ImageOptions::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::MissingImageId { .. })
        ));
    }

    #[test]
    fn test_export_container_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("dist");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.js"), "").unwrap();

        let engine = engine();
        engine.runner().expect_contains(
            "--output type=local",
            MockProcessOutput::success("").exporting("index.html", "<html/>"),
        );

        let builder = Container::from_image("node:22-slim").with_exec(["pnpm", "run", "build"]);
        engine
            .export_directory(&builder.directory("/src/dist"), &dest)
            .unwrap();

        assert!(dest.join("index.html").is_file());
        assert!(!dest.join("stale.js").exists());
    }

    #[test]
    fn test_failed_export_keeps_previous_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("dist");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("index.html"), "previous").unwrap();

        let engine = engine();
        engine.runner().expect_contains(
            "--output type=local",
            MockProcessOutput::failure(1, "ERR_PNPM_NO_SCRIPT").exporting("partial.js", ""),
        );

        let builder = Container::from_image("node:22-slim").with_exec(["pnpm", "run", "build"]);
        let err = engine
            .export_directory(&builder.directory("/src/dist"), &dest)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::BuildFailed { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(dest.join("index.html")).unwrap(),
            "previous"
        );
        assert!(!dest.join("partial.js").exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_host_export_rejects_overlapping_dest() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("web");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("index.html"), "").unwrap();

        let engine = engine();
        let dir = Directory::host(&src, Vec::new());
        assert!(engine.export_directory(&dir, tmp.path()).is_err());
        assert!(engine.export_directory(&dir, &src.join("dist")).is_err());
        assert!(src.join("index.html").is_file());
    }

    #[test]
    fn test_export_empty_and_host_directories_skip_docker() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = engine();

        let empty = tmp.path().join("empty");
        engine.export_directory(&Directory::Empty, &empty).unwrap();
        assert!(empty.is_dir());
        assert_eq!(std::fs::read_dir(&empty).unwrap().count(), 0);

        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("node_modules")).unwrap();
        std::fs::write(src.join("index.html"), "").unwrap();
        let out = tmp.path().join("out");
        engine
            .export_directory(&Directory::host(&src, vec!["node_modules".into()]), &out)
            .unwrap();
        assert!(out.join("index.html").is_file());
        assert!(!out.join("node_modules").exists());

        assert!(engine.runner().calls().is_empty());
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }
}
