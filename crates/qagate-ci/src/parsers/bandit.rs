//! `bandit -f json`

use serde::Deserialize;

use qagate_core::domain::Finding;

use super::{relative_path, ParseContext, ParseError};

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<Issue>,
    #[serde(default)]
    errors: Vec<ScanError>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    filename: String,
    line_number: Option<u32>,
    issue_text: String,
    issue_severity: String,
    test_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScanError {
    filename: String,
    reason: String,
}

pub(super) fn parse(stdout: &str, ctx: &ParseContext<'_>) -> Result<Vec<Finding>, ParseError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let report: BanditReport = serde_json::from_str(stdout.trim())?;
    let mut findings = Vec::with_capacity(report.results.len() + report.errors.len());
    for issue in report.results {
        let token = issue.issue_severity.to_ascii_lowercase();
        let band = ctx.severity.classify(&token);
        let mut finding = Finding::new(issue.issue_text, token, band).with_location(
            relative_path(ctx.root, &issue.filename),
            issue.line_number,
        );
        if let Some(test_id) = issue.test_id {
            finding = finding.with_code(test_id);
        }
        findings.push(finding);
    }
    // files bandit could not scan
    for err in report.errors {
        let band = ctx.severity.classify("error");
        findings.push(
            Finding::new(err.reason, "error", band)
                .with_location(relative_path(ctx.root, &err.filename), None),
        );
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::ctx;
    use qagate_core::domain::{Band, SeverityMap};
    use std::collections::BTreeMap;

    #[test]
    fn maps_issue_severity() {
        let sev = SeverityMap::from([
            ("low", Band::Yellow),
            ("medium", Band::Red),
            ("high", Band::Red),
        ]);
        let th = BTreeMap::new();
        let out = r#"{
          "errors": [{"filename": "svc/broken.py", "reason": "syntax error while parsing AST from file"}],
          "results": [
            {"filename": "svc/app.py", "line_number": 3, "issue_text": "Consider possible security implications associated with the subprocess module.", "issue_severity": "LOW", "test_id": "B404"},
            {"filename": "svc/app.py", "line_number": 10, "issue_text": "Use of exec detected.", "issue_severity": "MEDIUM", "test_id": "B102"}
          ]
        }"#;
        let findings = parse(out, &ctx(&sev, &th, 1)).unwrap();
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].raw_severity, "low");
        assert_eq!(findings[0].band, Band::Yellow);
        assert_eq!(findings[1].band, Band::Red);
        assert_eq!(findings[1].code.as_deref(), Some("B102"));
        assert_eq!(findings[2].raw_severity, "error");
        assert_eq!(findings[2].band, Band::Red);
    }
}
