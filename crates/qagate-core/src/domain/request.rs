//! Execution requests: the immutable description of one qagate invocation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::digest;
use super::dimension::Dimension;
use super::error::{RequestError, Result};

/// How strictly a run selects and judges tools.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Only fast-eligible tools.
    Fast,
    /// Every compatible tool.
    #[default]
    Full,
    /// Every compatible tool, fail-closed on dimensions without an available tool.
    Dod,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Full => "full",
            Mode::Dod => "dod",
        }
    }

    pub fn is_fail_closed(&self) -> bool {
        matches!(self, Mode::Dod)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RequestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "full" => Ok(Mode::Full),
            "dod" => Ok(Mode::Dod),
            _ => Err(RequestError::UnknownMode(s.to_string())),
        }
    }
}

/// Whether the run inspects or rewrites files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    #[default]
    Check,
    Fix,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Check => "check",
            RunKind::Fix => "fix",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which scopes a run targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "type", content = "names")]
pub enum ScopeSelector {
    /// Let the stack detector decide.
    #[default]
    Auto,
    /// Exactly these scopes.
    Named(Vec<String>),
}

impl ScopeSelector {
    /// Parse a comma-separated CLI value; `auto` (or nothing) selects detection.
    pub fn parse_list(values: &[String]) -> std::result::Result<Self, RequestError> {
        let names: Vec<String> = values
            .iter()
            .flat_map(|v| v.split(','))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if names.is_empty() || names.iter().all(|n| n.eq_ignore_ascii_case("auto")) {
            return Ok(ScopeSelector::Auto);
        }
        if names.iter().any(|n| n.eq_ignore_ascii_case("auto")) {
            return Err(RequestError::UnknownScope(
                "auto cannot be combined with named scopes".to_string(),
            ));
        }
        Ok(ScopeSelector::Named(names))
    }
}

/// Raw request fields as collected from the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFields {
    pub dimensions: Vec<Dimension>,
    pub scopes: ScopeSelector,
    pub mode: Mode,
    pub tools: Vec<String>,
    pub files: Vec<PathBuf>,
    pub kind: RunKind,
    pub changed_only: bool,
}

/// Normalized, immutable execution request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Requested dimensions, sorted and deduplicated. Never empty.
    pub dimensions: Vec<Dimension>,
    pub scopes: ScopeSelector,
    pub mode: Mode,
    /// Explicit tool overrides, sorted and deduplicated.
    pub tools: Vec<String>,
    /// Explicit files relative to the repository root.
    pub files: Vec<PathBuf>,
    pub kind: RunKind,
    pub changed_only: bool,
    /// SHA256 of the normalized fields.
    pub digest: String,
}

#[derive(Serialize)]
struct DigestFields<'a> {
    dimensions: &'a [Dimension],
    scopes: &'a ScopeSelector,
    mode: Mode,
    tools: &'a [String],
    files: &'a [PathBuf],
    kind: RunKind,
    changed_only: bool,
}

impl ExecutionRequest {
    /// Normalize the fields and compute the request digest.
    ///
    /// No dimensions means every dimension. Fix runs only ever cover
    /// formatting.
    pub fn new(fields: RequestFields) -> Result<Self> {
        let mut dimensions = match fields.kind {
            RunKind::Fix => vec![Dimension::Format],
            RunKind::Check if fields.dimensions.is_empty() => Dimension::ALL.to_vec(),
            RunKind::Check => fields.dimensions,
        };
        dimensions.sort();
        dimensions.dedup();

        let scopes = match fields.scopes {
            ScopeSelector::Named(names) => {
                let mut names: Vec<String> = names
                    .into_iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect();
                if names.is_empty() {
                    return Err(RequestError::EmptyScopeSelection.into());
                }
                names.sort();
                names.dedup();
                ScopeSelector::Named(names)
            }
            ScopeSelector::Auto => ScopeSelector::Auto,
        };

        let mut tools: Vec<String> = fields
            .tools
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tools.sort();
        tools.dedup();

        let mut files = fields.files;
        files.sort();
        files.dedup();

        let digest = digest::compute_digest(&serde_json::to_value(DigestFields {
            dimensions: &dimensions,
            scopes: &scopes,
            mode: fields.mode,
            tools: &tools,
            files: &files,
            kind: fields.kind,
            changed_only: fields.changed_only,
        })?)?;

        Ok(Self {
            dimensions,
            scopes,
            mode: fields.mode,
            tools,
            files,
            kind: fields.kind,
            changed_only: fields.changed_only,
            digest,
        })
    }

    pub fn requests(&self, dimension: Dimension) -> bool {
        self.dimensions.contains(&dimension)
    }

    pub fn is_fail_closed(&self) -> bool {
        self.mode.is_fail_closed()
    }
}
