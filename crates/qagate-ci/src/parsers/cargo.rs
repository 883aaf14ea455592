//! `cargo --message-format json` diagnostics (build and clippy).
//!
//! Stdout is one JSON object per line; only `compiler-message` records with a
//! primary span become findings. Lines that are not JSON are ignored.

use serde::Deserialize;

use qagate_core::domain::Finding;

use super::{relative_path, ParseContext};

#[derive(Debug, Deserialize)]
struct Record {
    reason: String,
    message: Option<Diagnostic>,
}

#[derive(Debug, Deserialize)]
struct Diagnostic {
    message: String,
    level: String,
    code: Option<Code>,
    #[serde(default)]
    spans: Vec<Span>,
}

#[derive(Debug, Deserialize)]
struct Code {
    code: String,
}

#[derive(Debug, Deserialize)]
struct Span {
    file_name: String,
    line_start: u32,
    is_primary: bool,
}

pub(super) fn parse(stdout: &str, ctx: &ParseContext<'_>) -> Vec<Finding> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<Record>(line.trim()).ok())
        .filter(|record| record.reason == "compiler-message")
        .filter_map(|record| record.message)
        .filter_map(|diag| finding(diag, ctx))
        .collect()
}

fn finding(diag: Diagnostic, ctx: &ParseContext<'_>) -> Option<Finding> {
    let primary = diag.spans.iter().find(|s| s.is_primary);
    if primary.is_none() && is_summary(&diag.message) {
        return None;
    }
    let band = ctx.severity.classify(&diag.level);
    let mut finding = Finding::new(diag.message, diag.level, band);
    if let Some(span) = primary {
        finding = finding.with_location(
            relative_path(ctx.root, &span.file_name),
            Some(span.line_start),
        );
    }
    if let Some(code) = diag.code {
        finding = finding.with_code(code.code);
    }
    Some(finding)
}

fn is_summary(message: &str) -> bool {
    message.starts_with("aborting due to")
        || message.ends_with("warning emitted")
        || message.ends_with("warnings emitted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::ctx;
    use qagate_core::domain::{Band, SeverityMap};
    use std::collections::BTreeMap;

    #[test]
    fn keeps_primary_diagnostics_only() {
        let sev = SeverityMap::from([("error", Band::Red), ("warning", Band::Yellow)]);
        let th = BTreeMap::new();
        let out = [
            r#"{"reason":"compiler-artifact","package_id":"x"}"#,
            r#"{"reason":"compiler-message","message":{"message":"unused variable: `x`","level":"warning","code":{"code":"unused_variables"},"spans":[{"file_name":"src/lib.rs","line_start":4,"is_primary":true}]}}"#,
            r#"{"reason":"compiler-message","message":{"message":"mismatched types","level":"error","code":{"code":"E0308"},"spans":[{"file_name":"src/main.rs","line_start":9,"is_primary":true}]}}"#,
            r#"{"reason":"compiler-message","message":{"message":"aborting due to 1 previous error","level":"error","code":null,"spans":[]}}"#,
            r#"{"reason":"build-finished","success":false}"#,
            "   Compiling demo v0.1.0",
        ]
        .join("\n");
        let findings = parse(&out, &ctx(&sev, &th, 101));
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].band, Band::Yellow);
        assert_eq!(findings[0].location().as_deref(), Some("src/lib.rs:4"));
        assert_eq!(findings[1].code.as_deref(), Some("E0308"));
        assert_eq!(findings[1].band, Band::Red);
    }
}
