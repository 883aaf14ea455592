//! Report rendering: console text, Markdown and JSON.
//!
//! Every format is rendered from the same [`Report`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Band, QaError, Report, Result, ToolResult, ToolStatus};

/// Findings shown per tool in text and Markdown output.
const MAX_FINDINGS_SHOWN: usize = 20;

/// Output format for a rendered report.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "markdown",
        })
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => Err(format!("unknown report format: {other}")),
        }
    }
}

pub fn render(report: &Report, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Markdown => Ok(render_markdown(report)),
        ReportFormat::Json => render_json(report),
    }
}

/// Pretty JSON, terminated by a newline.
pub fn render_json(report: &Report) -> Result<String> {
    let mut out = serde_json::to_string_pretty(report)?;
    out.push('\n');
    Ok(out)
}

fn band_marker(band: Band) -> &'static str {
    match band {
        Band::Green => "PASS",
        Band::Yellow => "WARN",
        Band::Red => "FAIL",
    }
}

fn status_line(result: &ToolResult) -> String {
    let mut line = format!("{} [{}]", result.tool_id, result.status);
    if let Some(code) = result.exit_code {
        line.push_str(&format!(" exit={code}"));
    }
    line.push_str(&format!(" {}ms", result.duration_ms));
    if result.status != ToolStatus::Completed {
        if let Some(reason) = &result.reason {
            line.push_str(&format!(" ({reason})"));
        }
    }
    line
}

/// Console rendering.
pub fn render_text(report: &Report) -> String {
    let summary = report.summary();
    let mut out = String::new();
    out.push_str(&format!(
        "qagate {} ({}) {} in {}ms\n",
        report.kind,
        report.mode,
        band_marker(report.overall),
        report.duration_ms
    ));
    if report.scopes.is_empty() {
        out.push_str("scopes: (none)\n");
    } else {
        out.push_str(&format!("scopes: {}\n", report.scopes.join(", ")));
    }
    out.push('\n');

    for (dim, verdict) in &report.dimensions {
        out.push_str(&format!(
            "{:<20} {:<6} {}\n",
            dim.as_str(),
            verdict.band.as_str(),
            verdict.tools.join(", ")
        ));
        for reason in &verdict.reasons {
            out.push_str(&format!("    - {reason}\n"));
        }
    }

    let noisy: Vec<&ToolResult> = report
        .results
        .iter()
        .filter(|r| r.status != ToolStatus::Skipped && r.band() != Band::Green)
        .collect();
    if !noisy.is_empty() {
        out.push('\n');
    }
    for result in noisy {
        out.push_str(&format!("{}\n", status_line(result)));
        for finding in result
            .findings
            .iter()
            .filter(|f| f.band != Band::Green)
            .take(MAX_FINDINGS_SHOWN)
        {
            let location = finding.location().unwrap_or_else(|| "-".to_string());
            let code = finding
                .code
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            out.push_str(&format!(
                "    {} {}{}: {}\n",
                finding.band, location, code, finding.message
            ));
        }
        let hidden = result
            .findings
            .iter()
            .filter(|f| f.band != Band::Green)
            .count()
            .saturating_sub(MAX_FINDINGS_SHOWN);
        if hidden > 0 {
            out.push_str(&format!("    ... {hidden} more\n"));
        }
    }

    out.push_str(&format!(
        "\n{} tool(s): {} completed, {} failed, {} timed out, {} skipped; {} red, {} yellow finding(s)\n",
        summary.tools_total,
        summary.completed,
        summary.failed,
        summary.timed_out,
        summary.skipped,
        summary.red_findings,
        summary.yellow_findings
    ));
    out
}

/// Markdown rendering for PR comments and CI summaries.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# qagate {}: {}\n\n",
        report.kind,
        report.overall.as_str()
    ));
    out.push_str(&format!("- mode: `{}`\n", report.mode));
    out.push_str(&format!("- scopes: {}\n", scopes_md(&report.scopes)));
    if let Some(sha) = &report.git_sha {
        out.push_str(&format!("- commit: `{sha}`\n"));
    }
    out.push_str(&format!("- duration: {}ms\n\n", report.duration_ms));

    out.push_str("## Dimensions\n\n| dimension | verdict | tools |\n| --- | --- | --- |\n");
    for (dim, verdict) in &report.dimensions {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            dim,
            verdict.band,
            verdict.tools.join(", ")
        ));
    }
    out.push('\n');

    out.push_str("## Tools\n\n| tool | status | exit | findings | duration |\n| --- | --- | --- | --- | --- |\n");
    for result in &report.results {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {}ms |\n",
            result.tool_id,
            result.status,
            result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            result.findings.len(),
            result.duration_ms
        ));
    }

    let flagged: Vec<&ToolResult> = report
        .results
        .iter()
        .filter(|r| r.findings.iter().any(|f| f.band != Band::Green))
        .collect();
    if !flagged.is_empty() {
        out.push_str("\n## Findings\n");
    }
    for result in flagged {
        out.push_str(&format!("\n### {}\n\n", result.tool_id));
        for finding in result
            .findings
            .iter()
            .filter(|f| f.band != Band::Green)
            .take(MAX_FINDINGS_SHOWN)
        {
            match finding.location() {
                Some(location) => out.push_str(&format!(
                    "- **{}** `{}` {}\n",
                    finding.band, location, finding.message
                )),
                None => out.push_str(&format!("- **{}** {}\n", finding.band, finding.message)),
            }
        }
    }
    out
}

fn scopes_md(scopes: &[String]) -> String {
    if scopes.is_empty() {
        return "(none)".to_string();
    }
    scopes
        .iter()
        .map(|s| format!("`{s}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write a rendered report, creating parent directories.
pub fn write_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| {
        QaError::Io(std::io::Error::new(
            e.kind(),
            format!("write {}: {e}", path.display()),
        ))
    })
}
