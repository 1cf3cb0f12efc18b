//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error during closure resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("`{package}` is not a workspace member in the lockfile")]
    PackageNotFound {
        package: String,
        suggestions: Vec<String>,
    },
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::PackageNotFound {
                package,
                suggestions: similar,
            } => {
                let mut diag =
                    Diagnostic::error(format!("`{}` is not a workspace member in the lockfile", package));

                if !similar.is_empty() {
                    diag = diag.with_context(format!("similar members: {}", similar.join(", ")));
                }

                diag.with_suggestion(suggestions::STALE_LOCK)
            }
        }
    }
}
