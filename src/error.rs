//! Error taxonomy shared across the crate.
//!
//! Every fallible operation in this crate returns [`Result`]. Variants are
//! grouped by the kind of failure they represent rather than by the module
//! that raised them, mirroring how callers actually want to branch on them
//! (a dependency error and a driver-load error are both "fatal for a
//! subtree", a filesystem error is usually retryable-by-the-user).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A short, human-readable trail of context frames attached to an error as
/// it propagates ("in `<file>` in `<operation>`").
#[derive(Debug, Clone, Default)]
pub struct Context(Vec<String>);

impl Context {
    pub fn push(mut self, frame: impl Into<String>) -> Self {
        self.0.push(frame.into());
        self
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.0.iter().rev() {
            write!(f, "\n  in {frame}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed manifest, unknown project type, missing required id.
    /// Blocks the offending project only.
    #[error("config error in project manifest {path}: {message}{context}")]
    Config { path: PathBuf, message: String, context: Context },

    /// Unresolved dependency id or a cyclic dependency edge. Blocks the
    /// affected subtree.
    #[error("dependency error: {message}{context}")]
    Dependency { message: String, context: Context },

    /// A driver plug-in could not be located or its entry point did not
    /// register the interface correctly. Fatal for any project that
    /// requests the driver.
    #[error("driver `{driver}` could not be loaded: {message}")]
    DriverLoad { driver: String, message: String },

    /// Missing source, `exec` returning non-zero, or a target absent after
    /// its action ran. Blocks the project; surfaced via `Project::error`.
    #[error("rule `{rule}` failed for project `{project}`: {message}{context}")]
    RuleExecution { project: String, rule: String, message: String, context: Context },

    /// Unreadable file, `mkdir` failure other than already-exists, or any
    /// other I/O primitive failure.
    #[error("filesystem error at {path}: {source}{context}")]
    Filesystem { path: PathBuf, #[source] source: std::io::Error, context: Context },

    /// Glob/match expression failed to parse or validate.
    #[error("invalid match expression `{expr}`: {message}")]
    Match { expr: String, message: String },

    /// An internal invariant was violated. In debug builds the call site
    /// that detects this should prefer `debug_assert!`; this variant exists
    /// for release builds where the walk must still report a result.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config { path: path.into(), message: message.into(), context: Context::default() }
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency { message: message.into(), context: Context::default() }
    }

    pub fn driver_load(driver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DriverLoad { driver: driver.into(), message: message.into() }
    }

    pub fn rule_execution(
        project: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RuleExecution {
            project: project.into(),
            rule: rule.into(),
            message: message.into(),
            context: Context::default(),
        }
    }

    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem { path: path.into(), source, context: Context::default() }
    }

    pub fn matching(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Match { expr: expr.into(), message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Append a context frame, building it up as the error is returned
    /// through nested calls.
    pub fn context(self, frame: impl Into<String>) -> Self {
        match self {
            Self::Config { path, message, context } => {
                Self::Config { path, message, context: context.push(frame) }
            }
            Self::Dependency { message, context } => {
                Self::Dependency { message, context: context.push(frame) }
            }
            Self::RuleExecution { project, rule, message, context } => {
                Self::RuleExecution { project, rule, message, context: context.push(frame) }
            }
            Self::Filesystem { path, source, context } => {
                Self::Filesystem { path, source, context: context.push(frame) }
            }
            other => other,
        }
    }
}

/// Extension trait used at call sites to attach context the way the teacher
/// codebase chains `.map_err(|e| SolcError::io(e, path))`.
pub trait ResultExt<T> {
    fn with_context(self, frame: impl FnOnce() -> String) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, frame: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| e.context(frame()))
    }
}
