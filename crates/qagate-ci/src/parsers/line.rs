//! `path:line[:col]: severity: message` style diagnostics.
//!
//! Covers gcc-style output (mypy, shellcheck `-f gcc`), TypeScript's
//! `path(line,col): error TS1234: message`, and severity-less
//! `path:line:col:message` lines such as buf's text format.

use regex::Regex;

use qagate_core::domain::Finding;

use super::{relative_path, ParseContext, ParseError};

const SEVERITIES: &str = "error|warning|note|info|style|help";

struct Patterns {
    gcc: Regex,
    tsc: Regex,
    bare: Regex,
    trailing_code: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        let gcc = format!(
            r"^(?P<file>[^:\s][^:]*):(?P<line>\d+):(?:\d+:)?\s*(?P<sev>{SEVERITIES})\s*:\s*(?P<msg>.*)$"
        );
        Ok(Self {
            gcc: Regex::new(&gcc)?,
            tsc: Regex::new(
                r"^(?P<file>.+?)\((?P<line>\d+),\d+\):\s*(?P<sev>error|warning)\s+(?P<code>TS\d+):\s*(?P<msg>.*)$",
            )?,
            bare: Regex::new(r"^(?P<file>[^:\s][^:]*):(?P<line>\d+):(?:\d+:)?(?P<msg>.+)$")?,
            trailing_code: Regex::new(r"\s*\[(?P<code>[A-Za-z0-9_.\-]+)\]$")?,
        })
    }
}

pub(super) fn parse(
    stdout: &str,
    stderr: &str,
    ctx: &ParseContext<'_>,
) -> Result<Vec<Finding>, ParseError> {
    let patterns = Patterns::new()?;
    Ok(stdout
        .lines()
        .chain(stderr.lines())
        .filter_map(|line| parse_line(&patterns, line.trim_end(), ctx))
        .collect())
}

fn parse_line(p: &Patterns, line: &str, ctx: &ParseContext<'_>) -> Option<Finding> {
    let (caps, severity) = if let Some(caps) = p.tsc.captures(line) {
        let sev = caps["sev"].to_ascii_lowercase();
        (caps, sev)
    } else if let Some(caps) = p.gcc.captures(line) {
        let sev = caps["sev"].to_ascii_lowercase();
        (caps, sev)
    } else if let Some(caps) = p.bare.captures(line) {
        (caps, "unknown".to_string())
    } else {
        return None;
    };

    let file = relative_path(ctx.root, caps["file"].trim());
    let line_no = caps["line"].parse::<u32>().ok();
    let mut message = caps["msg"].trim().to_string();
    let mut code = caps.name("code").map(|m| m.as_str().to_string());
    if code.is_none() {
        if let Some(found) = p.trailing_code.captures(&message) {
            code = Some(found["code"].to_string());
            let cut = found.get(0).map(|m| m.start()).unwrap_or(message.len());
            message.truncate(cut);
        }
    }

    let band = ctx.severity.classify(&severity);
    let mut finding = Finding::new(message, severity, band).with_location(file, line_no);
    if let Some(code) = code {
        finding = finding.with_code(code);
    }
    Some(finding)
}
