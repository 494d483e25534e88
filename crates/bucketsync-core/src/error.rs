//! Error types for planning and executing a sync.

use std::path::PathBuf;

use bucketsync_auth::AuthError;
use bucketsync_client::ClientError;

use crate::plan::{Action, ActionKind};

/// Malformed declarative input, detected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the schema
    /// (including unknown fields).
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A shell-style pattern could not be compiled.
    #[error("invalid glob pattern '{pattern}'")]
    Glob {
        /// The offending pattern.
        pattern: String,
        /// Compilation error.
        #[source]
        source: globset::Error,
    },

    /// A regular expression could not be compiled.
    #[error("invalid regex '{pattern}'")]
    Regex {
        /// The offending expression.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// The document is structurally valid YAML but semantically wrong.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Two incompatible actions were requested for the same key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflicting actions set for key '{key}': {incoming}, {existing}")]
pub struct ConflictError {
    /// Key both actions target.
    pub key: String,
    /// Action already in the plan.
    pub existing: Action,
    /// Action that was being added.
    pub incoming: Action,
}

/// Failures of the concurrent executor itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// A task panicked or was cancelled by the runtime.
    #[error("task failed to complete: {0}")]
    TaskFailed(String),

    /// The worker pool was shut down.
    #[error("worker pool closed")]
    Closed,
}

/// Errors returned by the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Conflicting actions in a plan.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Missing or invalid credentials.
    #[error("credentials unavailable")]
    Credential(#[from] AuthError),

    /// A request failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A local file or directory could not be read.
    #[error("I/O error on {}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The executor failed to run a task.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// An action failed while the plan was executing.
    #[error("{action} failed for {key}")]
    Action {
        /// Key (or key set) the action targeted.
        key: String,
        /// Kind of action that failed.
        action: ActionKind,
        /// Cause.
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the key and action that were executing.
    #[must_use]
    pub fn in_action(self, key: impl Into<String>, action: ActionKind) -> Self {
        Self::Action {
            key: key.into(),
            action,
            source: Box::new(self),
        }
    }

    /// The provider error code if this error (or its cause) is a remote error.
    #[must_use]
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Client(e) => e.remote_code(),
            Self::Action { source, .. } => source.remote_code(),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
