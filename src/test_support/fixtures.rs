//! Workspace fixtures.
//!
//! Writes a uv workspace (root manifest, `uv.lock`, member packages and
//! optional frontends) into a temporary directory.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::core::PackageName;

/// One workspace member.
#[derive(Debug, Clone)]
pub struct MemberFixture {
    /// Package name as written in the lock.
    pub name: String,
    /// Workspace-relative path.
    pub path: PathBuf,
    /// Runtime dependencies, `name` or `name[extra]`.
    pub deps: Vec<String>,
    /// Optional dependencies per extra.
    pub extras: Vec<(String, Vec<String>)>,
    /// Dev dependencies (group `dev`).
    pub dev: Vec<String>,
    /// Locked as `virtual` instead of `editable`.
    pub is_virtual: bool,
    /// Write a `__main__.py` for the package module.
    pub main_module: bool,
}

impl MemberFixture {
    /// An editable member at `packages/<name>`.
    pub fn new(name: &str, deps: &[&str]) -> Self {
        MemberFixture {
            name: name.to_string(),
            path: PathBuf::from("packages").join(name),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            extras: Vec::new(),
            dev: Vec::new(),
            is_virtual: false,
            main_module: true,
        }
    }

    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn extra(mut self, extra: &str, deps: &[&str]) -> Self {
        self.extras
            .push((extra.to_string(), deps.iter().map(|d| d.to_string()).collect()));
        self
    }

    pub fn dev(mut self, deps: &[&str]) -> Self {
        self.dev.extend(deps.iter().map(|d| d.to_string()));
        self
    }

    pub fn virtual_(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    pub fn without_main(mut self) -> Self {
        self.main_module = false;
        self
    }

    fn module(&self) -> String {
        PackageName::new(&self.name).module_name()
    }
}

/// Builder for a complete workspace on disk.
#[derive(Debug, Clone)]
pub struct WorkspaceFixture {
    members: Vec<MemberFixture>,
    frontends: Vec<(String, bool)>,
    with_manifest: bool,
}

impl Default for WorkspaceFixture {
    fn default() -> Self {
        WorkspaceFixture::new()
    }
}

/// Split `name[a,b]` into the name and its extras.
fn parse_dep(spec: &str) -> (String, Vec<String>) {
    match spec.split_once('[') {
        Some((name, rest)) => {
            let extras = rest
                .trim_end_matches(']')
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            (name.to_string(), extras)
        }
        None => (spec.to_string(), Vec::new()),
    }
}

fn dep_table(spec: &str) -> String {
    let (name, extras) = parse_dep(spec);
    if extras.is_empty() {
        format!("{{ name = \"{}\" }}", name)
    } else {
        let extras: Vec<String> = extras.iter().map(|e| format!("\"{}\"", e)).collect();
        format!("{{ name = \"{}\", extra = [{}] }}", name, extras.join(", "))
    }
}

fn dep_list(deps: &[String]) -> String {
    let mut out = String::from("[\n");
    for dep in deps {
        let _ = writeln!(out, "    {},", dep_table(dep));
    }
    out.push(']');
    out
}

impl WorkspaceFixture {
    pub fn new() -> Self {
        WorkspaceFixture {
            members: Vec::new(),
            frontends: Vec::new(),
            with_manifest: true,
        }
    }

    /// Add an editable member at `packages/<name>`.
    pub fn member(self, name: &str, deps: &[&str]) -> Self {
        self.member_with(MemberFixture::new(name, deps))
    }

    pub fn member_with(mut self, member: MemberFixture) -> Self {
        self.members.push(member);
        self
    }

    /// Add `frontend/<name>` with a `package.json`.
    pub fn frontend(mut self, name: &str) -> Self {
        self.frontends.push((name.to_string(), true));
        self
    }

    /// Add `frontend/<name>` without a `package.json`.
    pub fn frontend_without_package_json(mut self, name: &str) -> Self {
        self.frontends.push((name.to_string(), false));
        self
    }

    /// Omit the lock's `[manifest]` section.
    pub fn without_manifest(mut self) -> Self {
        self.with_manifest = false;
        self
    }

    /// The `uv.lock` text for this workspace.
    pub fn lock_toml(&self) -> String {
        let mut out = String::from("version = 1\nrevision = 2\nrequires-python = \">=3.12\"\n");

        if self.with_manifest {
            let members: Vec<String> = self
                .members
                .iter()
                .map(|m| format!("\"{}\"", m.name))
                .collect();
            let _ = write!(out, "\n[manifest]\nmembers = [{}]\n", members.join(", "));
        }

        let member_names: BTreeSet<PackageName> =
            self.members.iter().map(|m| PackageName::new(&m.name)).collect();
        let mut externals: BTreeSet<String> = BTreeSet::new();

        for member in &self.members {
            let kind = if member.is_virtual { "virtual" } else { "editable" };
            let _ = write!(
                out,
                "\n[[package]]\nname = \"{}\"\nversion = \"0.1.0\"\nsource = {{ {} = \"{}\" }}\n",
                member.name,
                kind,
                crate::util::fs::to_unix_string(&member.path)
            );
            if !member.deps.is_empty() {
                let _ = writeln!(out, "dependencies = {}", dep_list(&member.deps));
            }
            if !member.extras.is_empty() {
                out.push_str("\n[package.optional-dependencies]\n");
                for (extra, deps) in &member.extras {
                    let _ = writeln!(out, "{} = {}", extra, dep_list(deps));
                }
            }
            if !member.dev.is_empty() {
                out.push_str("\n[package.dev-dependencies]\n");
                let _ = writeln!(out, "dev = {}", dep_list(&member.dev));
            }

            let all = member
                .deps
                .iter()
                .chain(member.extras.iter().flat_map(|(_, d)| d))
                .chain(&member.dev);
            for dep in all {
                let (name, _) = parse_dep(dep);
                if !member_names.contains(&PackageName::new(&name)) {
                    externals.insert(name);
                }
            }
        }

        for name in externals {
            let _ = write!(
                out,
                "\n[[package]]\nname = \"{}\"\nversion = \"1.0.0\"\nsource = {{ registry = \"https://pypi.org/simple\" }}\n",
                name
            );
        }

        out
    }

    /// Write the workspace under `root`.
    pub fn write_to(&self, root: &Path) -> std::io::Result<()> {
        let members: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("\"{}\"", crate::util::fs::to_unix_string(&m.path)))
            .collect();
        std::fs::write(
            root.join("pyproject.toml"),
            format!(
                "[project]\nname = \"workspace\"\nversion = \"0.1.0\"\n\n[tool.uv.workspace]\nmembers = [{}]\n",
                members.join(", ")
            ),
        )?;
        std::fs::write(root.join("uv.lock"), self.lock_toml())?;

        for member in &self.members {
            let dir = root.join(&member.path);
            let module = dir.join(member.module());
            std::fs::create_dir_all(module.join("__pycache__"))?;
            std::fs::write(
                dir.join("pyproject.toml"),
                format!("[project]\nname = \"{}\"\nversion = \"0.1.0\"\n", member.name),
            )?;
            std::fs::write(module.join("__init__.py"), "")?;
            std::fs::write(module.join("__pycache__").join("__init__.cpython-312.pyc"), "")?;
            if member.main_module {
                std::fs::write(module.join("__main__.py"), "print('hello')\n")?;
            }
        }

        for (name, package_json) in &self.frontends {
            let dir = root.join("frontend").join(name);
            std::fs::create_dir_all(dir.join("src"))?;
            std::fs::create_dir_all(dir.join("node_modules").join("vite"))?;
            std::fs::write(dir.join("src").join("main.ts"), "console.log('hi')\n")?;
            std::fs::write(dir.join("node_modules").join("vite").join("index.js"), "")?;
            if *package_json {
                std::fs::write(
                    dir.join("package.json"),
                    format!("{{\"name\":\"{}\",\"scripts\":{{\"build\":\"vite build\"}}}}\n", name),
                )?;
            }
        }

        Ok(())
    }

    /// Write the workspace into a fresh temporary directory.
    pub fn build(&self) -> tempfile::TempDir {
        let tmp = tempfile::TempDir::new().expect("failed to create temp dir");
        self.write_to(tmp.path()).expect("failed to write workspace");
        tmp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Lockfile;

    #[test]
    fn test_fixture_lock_parses() {
        let fixture = WorkspaceFixture::new()
            .member("api", &["core[cli]", "fastapi"])
            .member_with(MemberFixture::new("core", &[]).extra("cli", &["click"]).dev(&["pytest"]));

        let lock = Lockfile::parse(&fixture.lock_toml(), "uv.lock").unwrap();
        assert_eq!(lock.workspace().len(), 2);
        assert_eq!(lock.len(), 5);

        let api = lock.get(&PackageName::new("api")).unwrap();
        assert_eq!(api.dependencies[0].extra, vec!["cli".to_string()]);
    }

    #[test]
    fn test_fixture_writes_tree() {
        let tmp = WorkspaceFixture::new()
            .member("my-api", &[])
            .frontend("my-api")
            .build();

        assert!(tmp.path().join("uv.lock").is_file());
        assert!(tmp.path().join("packages/my-api/my_api/__main__.py").is_file());
        assert!(tmp.path().join("frontend/my-api/package.json").is_file());
    }
}
