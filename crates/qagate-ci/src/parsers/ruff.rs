//! `ruff check --output-format json`
//!
//! The severity token is the rule family: the alphabetic prefix of the rule
//! code, lowercased (`F401` -> `f`). Syntax errors carry no code and use
//! `error`.

use serde::Deserialize;

use qagate_core::domain::Finding;

use super::{relative_path, ParseContext, ParseError};

#[derive(Debug, Deserialize)]
struct Diagnostic {
    code: Option<String>,
    message: String,
    filename: String,
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    row: u32,
}

pub(super) fn parse(stdout: &str, ctx: &ParseContext<'_>) -> Result<Vec<Finding>, ParseError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let diagnostics: Vec<Diagnostic> = serde_json::from_str(stdout.trim())?;
    Ok(diagnostics
        .into_iter()
        .map(|d| {
            let token = d
                .code
                .as_deref()
                .map(rule_family)
                .filter(|family| !family.is_empty())
                .unwrap_or_else(|| "error".to_string());
            let band = ctx.severity.classify(&token);
            let mut finding = Finding::new(d.message, token, band).with_location(
                relative_path(ctx.root, &d.filename),
                d.location.map(|l| l.row),
            );
            if let Some(code) = d.code {
                finding = finding.with_code(code);
            }
            finding
        })
        .collect())
}

fn rule_family(code: &str) -> String {
    code.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase()
}
