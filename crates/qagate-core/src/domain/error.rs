//! Domain-level error taxonomy for qagate.
//!
//! Only request-level and internal-invariant failures live here. Individual
//! tool failures never surface as errors: wrappers convert them into
//! [`ToolResult`](crate::domain::ToolResult)s with red findings.

use std::path::PathBuf;

/// Errors produced while validating an execution request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("unknown mode: {0} (expected fast, full or dod)")]
    UnknownMode(String),

    #[error("unknown scope: {0}")]
    UnknownScope(String),

    #[error("scope selector must name at least one scope")]
    EmptyScopeSelection,

    #[error("explicit file does not exist: {}", .0.display())]
    MissingFile(PathBuf),
}

/// qagate domain errors.
#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("duplicate tool registration: {0}")]
    DuplicateTool(String),

    #[error("aggregation invariant violated: {0}")]
    AggregationInvariant(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("git error: {0}")]
    GitError(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QaError {
    /// Process exit code for this error class.
    ///
    /// `2` for configuration and usage problems, `3` for internal defects.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_)
            | Self::Request(_)
            | Self::ConfigParse { .. }
            | Self::UnknownTool(_)
            | Self::DuplicateTool(_)
            | Self::Io(_) => 2,
            Self::AggregationInvariant(_)
            | Self::Internal(_)
            | Self::GitError(_)
            | Self::Serialization(_) => 3,
        }
    }
}

/// Result type for qagate domain operations.
pub type Result<T> = std::result::Result<T, QaError>;
