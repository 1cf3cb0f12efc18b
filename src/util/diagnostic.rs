//! User-friendly diagnostic messages.
//!
//! Every error shown to a user should name the root cause and, where one
//! exists, the command that fixes it.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no lockfile is found.
    pub const NO_LOCKFILE: &str =
        "help: Run `uv lock` in the workspace root, or pass `--root <dir>`";

    /// Suggestion when the lockfile does not list a package.
    pub const STALE_LOCK: &str = "help: Run `uv lock` to refresh the lockfile";

    /// Suggestion when a package name is unknown.
    pub const PACKAGE_NOT_FOUND: &str = "help: Run `berth resolve <package>` to inspect members";

    /// Suggestion when the engine is missing.
    pub const NO_ENGINE: &str = "help: Install Docker with BuildKit or set `engine.program`";

    /// Suggestion when the engine reports a failed build.
    pub const BUILD_FAILED: &str = "help: Run `berth plan <package>` to inspect the generated build";

    /// Suggestion when the entrypoint module is missing.
    pub const MISSING_ENTRYPOINT: &str =
        "help: Add a `__main__.py` to the package or drop `--check-entrypoint`";
}

/// An error message with optional context and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            "\x1b[1;31merror\x1b[0m"
        } else {
            "error"
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        for suggestion in &self.suggestions {
            output.push_str(suggestion);
            output.push('\n');
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
