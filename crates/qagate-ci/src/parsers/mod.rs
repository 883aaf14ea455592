//! Tool output parsers.
//!
//! Each parser turns captured stdout/stderr into [`Finding`]s. Raw severity
//! tokens are mapped to bands through the tool's [`SeverityMap`]; tokens the
//! map does not know come out red.

mod bandit;
mod cargo;
mod eslint;
mod exit_code;
mod file_list;
mod line;
mod lizard;
mod ruff;

use std::collections::BTreeMap;
use std::path::Path;

use qagate_core::domain::{Finding, ParserKind, SeverityMap};
use qagate_core::Threshold;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("invalid output pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Everything a parser may need besides the raw streams.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub root: &'a Path,
    pub exit_code: i32,
    pub severity: &'a SeverityMap,
    pub thresholds: &'a BTreeMap<String, Threshold>,
}

pub fn parse(
    kind: ParserKind,
    stdout: &str,
    stderr: &str,
    ctx: &ParseContext<'_>,
) -> Result<Vec<Finding>, ParseError> {
    match kind {
        ParserKind::ExitCode => Ok(exit_code::parse(stdout, stderr, ctx)),
        ParserKind::LineDiagnostic => line::parse(stdout, stderr, ctx),
        ParserKind::FileList => Ok(file_list::parse(stdout, ctx)),
        ParserKind::EslintJson => eslint::parse(stdout, ctx),
        ParserKind::RuffJson => ruff::parse(stdout, ctx),
        ParserKind::CargoJson => Ok(cargo::parse(stdout, ctx)),
        ParserKind::BanditJson => bandit::parse(stdout, ctx),
        ParserKind::LizardCsv => lizard::parse(stdout, ctx),
    }
}

/// Report paths relative to the workspace root when they are under it.
fn relative_path(root: &Path, path: &str) -> String {
    let candidate = Path::new(path);
    candidate
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.trim_start_matches("./").to_string())
}
