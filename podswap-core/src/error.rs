//! Error types for podswap core

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a command string into something runnable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The command string had no tokens
    #[error("command is empty")]
    Empty,

    /// The program could not be found on the search path
    #[error("command {program:?} not found in path")]
    NotFound {
        /// First token of the command string
        program: String,
    },

    /// The program exists but cannot be executed
    #[error("command {program:?} at {path} is not executable")]
    NotExecutable {
        /// First token of the command string
        program: String,
        /// Where it was found
        path: PathBuf,
    },
}

/// Errors that can occur when loading a pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Workflow file could not be read
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Workflow file is not valid YAML or has the wrong shape
    #[error(
        "failed to parse config file {path:?}, make sure the 'podswap' job exists and that your yaml is valid: {source}"
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required command field is absent or empty
    #[error("field {0} not set in the yaml file")]
    MissingField(&'static str),

    /// Working directory is missing or not a directory
    #[error("workdir {path:?} is not usable: {reason}")]
    WorkDir { path: PathBuf, reason: String },

    /// A stage command does not resolve to an executable
    #[error("{field}: {source}")]
    Command {
        field: &'static str,
        #[source]
        source: CommandError,
    },
}

impl ConfigError {
    /// Create a work dir error from any displayable reason
    pub fn work_dir(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WorkDir {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error comes from the workflow file contents rather than the filesystem
    pub fn is_invalid_document(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::MissingField(_))
    }
}
