//! Runtime image composition.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::PackageName;
use crate::engine::{Container, Directory};
use crate::ops::assemble::venv_dir;
use crate::resolver::SourceMapping;
use crate::util::config::Config;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Errors raised while composing the runtime image.
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("`{package}` has no entrypoint module `{module}.__main__`")]
    MissingEntrypoint {
        package: PackageName,
        module: String,
        searched: Vec<PathBuf>,
    },
}

impl FinalizeError {
    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            FinalizeError::MissingEntrypoint { searched, .. } => {
                let mut diag = Diagnostic::error(self.to_string());
                if let Some(dir) = searched.first().and_then(|p| p.parent()) {
                    diag = diag.with_location(dir);
                }
                for path in searched {
                    diag = diag.with_context(format!("looked for {}", path.display()));
                }
                diag.with_suggestion(suggestions::MISSING_ENTRYPOINT)
            }
        }
    }
}

/// `python -m <module>` for a package.
pub fn entrypoint(name: &PackageName) -> Vec<String> {
    vec!["python".into(), "-m".into(), name.module_name()]
}

/// Check that the package's `__main__` module exists on the host.
///
/// Both the flat (`<module>/__main__.py`) and the src layout
/// (`src/<module>/__main__.py`) are accepted.
pub fn check_entrypoint(
    root: &Path,
    mapping: &SourceMapping,
    name: &PackageName,
) -> Result<PathBuf, FinalizeError> {
    let module = name.module_name();
    let searched: Vec<PathBuf> = match mapping.get(name) {
        Some(path) => {
            let base = root.join(path);
            vec![
                base.join(&module).join("__main__.py"),
                base.join("src").join(&module).join("__main__.py"),
            ]
        }
        None => Vec::new(),
    };

    match searched.iter().find(|p| p.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(FinalizeError::MissingEntrypoint {
            package: name.clone(),
            module,
            searched,
        }),
    }
}

/// Compose the runtime image from the assembled build container and the
/// frontend output.
pub fn finalize(
    assembled: &Container,
    frontend: Directory,
    name: &PackageName,
    config: &Config,
) -> Container {
    let app = config.layout.app_dir();
    let venv = venv_dir(app);
    let static_dir = format!(
        "{}/{}",
        config.layout.static_root().trim_end_matches('/'),
        name
    );

    Container::from_image(config.images.runtime())
        .with_workdir(app)
        .with_directory(venv.clone(), assembled.directory(venv.clone()))
        .with_directory(static_dir, frontend)
        .with_env_variable("PATH", format!("{}/bin:$PATH", venv))
        .with_entrypoint(entrypoint(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mapping(name: &str, path: &str) -> SourceMapping {
        std::iter::once((PackageName::new(name), PathBuf::from(path))).collect()
    }

    #[test]
    fn test_entrypoint_module_name() {
        assert_eq!(
            entrypoint(&PackageName::new("my-api")),
            vec!["python", "-m", "my_api"]
        );
    }

    #[test]
    fn test_finalize_layout() {
        let assembled = Container::from_image("python:3.12-slim").with_exec(["uv", "sync"]);
        let name = PackageName::new("my-api");

        let image = finalize(&assembled, Directory::Empty, &name, &Config::default());

        assert_eq!(image.image(), "python:3.12-slim-bookworm");
        assert_eq!(image.env("PATH"), Some("/app/.venv/bin:$PATH"));
        assert_eq!(image.entrypoint().unwrap(), ["python", "-m", "my_api"]);
        assert!(image
            .mounted_directory("/app/static/my-api")
            .unwrap()
            .is_empty_dir());
        assert_eq!(
            image.mounted_directory("/app/.venv"),
            Some(&assembled.directory("/app/.venv"))
        );
    }

    #[test]
    fn test_runtime_image_from_config() {
        let mut config = Config::default();
        config.images.runtime = Some("python:3.12-alpine".into());
        config.layout.static_root = Some("/srv/static/".into());

        let image = finalize(
            &Container::from_image("python:3.12-slim"),
            Directory::Empty,
            &PackageName::new("web"),
            &config,
        );
        assert_eq!(image.image(), "python:3.12-alpine");
        assert!(image.mounted_directory("/srv/static/web").is_some());
    }

    #[test]
    fn test_check_entrypoint_layouts() {
        let tmp = TempDir::new().unwrap();
        let flat = tmp.path().join("packages/api/api");
        let src = tmp.path().join("packages/worker/src/worker");
        std::fs::create_dir_all(&flat).unwrap();
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(flat.join("__main__.py"), "").unwrap();
        std::fs::write(src.join("__main__.py"), "").unwrap();

        assert!(check_entrypoint(
            tmp.path(),
            &mapping("api", "packages/api"),
            &PackageName::new("api")
        )
        .is_ok());
        assert!(check_entrypoint(
            tmp.path(),
            &mapping("worker", "packages/worker"),
            &PackageName::new("worker")
        )
        .is_ok());
    }

    #[test]
    fn test_check_entrypoint_missing() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("packages/api/api")).unwrap();

        let err = check_entrypoint(
            tmp.path(),
            &mapping("api", "packages/api"),
            &PackageName::new("api"),
        )
        .unwrap_err();

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("--> "));
        assert!(output.contains("packages/api/api\n"));
        assert!(output.contains("help: Add a `__main__.py`"));

        let FinalizeError::MissingEntrypoint {
            module, searched, ..
        } = err;
        assert_eq!(module, "api");
        assert_eq!(searched.len(), 2);
    }
}
