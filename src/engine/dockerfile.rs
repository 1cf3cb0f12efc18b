//! Render a build graph as a multi-stage BuildKit Dockerfile.
//!
//! Every distinct container in the graph becomes one `stage-N`; containers
//! that are structurally equal share a stage. Host inputs are not read here,
//! only listed as [`ContextInput`]s for the engine to place in the build
//! context.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;
use serde::Serialize;
use serde_json::Value;

use crate::engine::graph::{CacheMount, Container, Directory, File, Op};
use crate::engine::EngineError;

/// Dockerfile frontend line.
pub const SYNTAX: &str = "# syntax=docker/dockerfile:1";

/// Stage name used for directory exports.
pub const EXPORT_STAGE: &str = "export";

/// Where the content of a context entry comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ContextSource {
    /// Filtered copy of a host directory
    HostDir { path: PathBuf, exclude: Vec<String> },
    /// A single host file
    HostFile { path: PathBuf },
    /// An empty directory
    Empty,
}

/// One entry of the build context, at `name` relative to the context root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextInput {
    pub name: String,
    pub source: ContextSource,
}

/// A rendered Dockerfile and the context it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub dockerfile: String,
    pub inputs: Vec<ContextInput>,
    /// Stage to pass as `--target`
    pub target: String,
}

/// Render the stages needed to build `container`.
pub fn render(container: &Container) -> Result<Rendered, EngineError> {
    let mut renderer = Renderer::default();
    let root = renderer.visit(container)?;
    let target = stage_name(root);
    Ok(renderer.finish(target, None))
}

/// Render a build whose output is the content of `path` in `container`.
pub fn render_export(container: &Container, path: &str) -> Result<Rendered, EngineError> {
    let mut renderer = Renderer::default();
    let root = renderer.visit(container)?;
    let tail = vec![
        format!("FROM scratch AS {}", EXPORT_STAGE),
        format!(
            "COPY --from={} {}",
            stage_name(root),
            json_array(&[dir_path(path), "/".to_string()])
        ),
    ];
    Ok(renderer.finish(EXPORT_STAGE.to_string(), Some(tail)))
}

fn stage_name(index: usize) -> String {
    format!("stage-{}", index)
}

fn json_str(s: &str) -> String {
    Value::from(s).to_string()
}

fn json_array(items: &[String]) -> String {
    Value::from(items.to_vec()).to_string()
}

/// Directory paths get a trailing slash so COPY treats them as directories.
fn dir_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

fn mount_flags(mounts: &[CacheMount]) -> String {
    mounts
        .iter()
        .map(|m| {
            format!(
                "--mount=type=cache,id={},target={} ",
                m.cache.id(),
                m.target
            )
        })
        .collect()
}

struct Stage {
    image: String,
    lines: Vec<String>,
    deps: Vec<usize>,
}

#[derive(Default)]
struct Renderer<'a> {
    stages: Vec<Stage>,
    seen: HashMap<&'a Container, usize>,
    inputs: Vec<ContextInput>,
    input_names: HashMap<ContextSource, String>,
}

impl<'a> Renderer<'a> {
    /// Render `container` and everything it copies from; returns its stage.
    fn visit(&mut self, container: &'a Container) -> Result<usize, EngineError> {
        if let Some(&index) = self.seen.get(container) {
            return Ok(index);
        }
        if container.image().trim().is_empty() {
            return Err(EngineError::InvalidGraph {
                reason: "container has no base image".into(),
            });
        }

        let mut lines = Vec::new();
        let mut deps = Vec::new();

        for op in container.ops() {
            match op {
                Op::Env { key, value } => lines.push(format!("ENV {}={}", key, json_str(value))),
                Op::Workdir(path) => lines.push(format!("WORKDIR {}", path)),
                Op::WithDirectory { path, source } => {
                    let line = match source {
                        Directory::Empty => {
                            let name = self.input(ContextSource::Empty, None);
                            format!("COPY {}", json_array(&[dir_path(&name), dir_path(path)]))
                        }
                        Directory::Host { path: src, exclude } => {
                            let name = self.input(
                                ContextSource::HostDir {
                                    path: src.clone(),
                                    exclude: exclude.clone(),
                                },
                                None,
                            );
                            format!("COPY {}", json_array(&[dir_path(&name), dir_path(path)]))
                        }
                        Directory::Container {
                            container: from,
                            path: src,
                        } => {
                            let index = self.visit(from)?;
                            deps.push(index);
                            format!(
                                "COPY --from={} {}",
                                stage_name(index),
                                json_array(&[dir_path(src), dir_path(path)])
                            )
                        }
                    };
                    lines.push(line);
                }
                Op::WithFile { path, source } => {
                    let line = match source {
                        File::Host(src) => {
                            let name = self.input(
                                ContextSource::HostFile { path: src.clone() },
                                src.file_name().map(|n| n.to_string_lossy().into_owned()),
                            );
                            format!("COPY {}", json_array(&[name, path.clone()]))
                        }
                        File::Container {
                            container: from,
                            path: src,
                        } => {
                            let index = self.visit(from)?;
                            deps.push(index);
                            format!(
                                "COPY --from={} {}",
                                stage_name(index),
                                json_array(&[src.clone(), path.clone()])
                            )
                        }
                    };
                    lines.push(line);
                }
                Op::Exec { args, mounts } => {
                    if args.is_empty() {
                        return Err(EngineError::InvalidGraph {
                            reason: "exec with no command".into(),
                        });
                    }
                    lines.push(format!("RUN {}{}", mount_flags(mounts), json_array(args)));
                }
                Op::Entrypoint(args) => lines.push(format!("ENTRYPOINT {}", json_array(args))),
            }
        }

        let index = self.stages.len();
        self.stages.push(Stage {
            image: container.image().to_string(),
            lines,
            deps,
        });
        self.seen.insert(container, index);
        tracing::trace!("rendered {} as {}", container, stage_name(index));
        Ok(index)
    }

    /// Register a context input and return its path in the context.
    fn input(&mut self, source: ContextSource, file_name: Option<String>) -> String {
        if let Some(name) = self.input_names.get(&source) {
            return name.clone();
        }

        let k = self.inputs.len();
        let name = match (&source, file_name) {
            (ContextSource::Empty, _) => "empty".to_string(),
            (ContextSource::HostDir { .. }, _) => format!("host-{}", k),
            (ContextSource::HostFile { .. }, Some(file)) => format!("files/{}/{}", k, file),
            (ContextSource::HostFile { .. }, None) => format!("files/{}/file", k),
        };

        self.input_names.insert(source.clone(), name.clone());
        self.inputs.push(ContextInput {
            name: name.clone(),
            source,
        });
        name
    }

    fn finish(self, target: String, tail: Option<Vec<String>>) -> Rendered {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.stages.len()).map(|i| graph.add_node(i)).collect();
        for (index, stage) in self.stages.iter().enumerate() {
            for &dep in &stage.deps {
                graph.add_edge(nodes[dep], nodes[index], ());
            }
        }

        let mut out = String::new();
        out.push_str(SYNTAX);
        out.push('\n');

        let mut topo = Topo::new(&graph);
        while let Some(node) = topo.next(&graph) {
            let index = graph[node];
            let stage = &self.stages[index];
            out.push('\n');
            out.push_str(&format!("FROM {} AS {}\n", stage.image, stage_name(index)));
            for line in &stage.lines {
                out.push_str(line);
                out.push('\n');
            }
        }

        if let Some(tail) = tail {
            out.push('\n');
            for line in tail {
                out.push_str(&line);
                out.push('\n');
            }
        }

        Rendered {
            dockerfile: out,
            inputs: self.inputs,
            target,
        }
    }
}

impl Rendered {
    /// Host paths this build reads.
    pub fn host_paths(&self) -> impl Iterator<Item = &Path> {
        self.inputs.iter().filter_map(|input| match &input.source {
            ContextSource::HostDir { path, .. } | ContextSource::HostFile { path } => {
                Some(path.as_path())
            }
            ContextSource::Empty => None,
        })
    }
}
