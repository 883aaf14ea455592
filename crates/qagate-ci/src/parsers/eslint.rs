//! `eslint --format json`

use serde::Deserialize;

use qagate_core::domain::Finding;

use super::{relative_path, ParseContext, ParseError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileReport {
    file_path: String,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    rule_id: Option<String>,
    severity: u8,
    message: String,
    line: Option<u32>,
}

pub(super) fn parse(stdout: &str, ctx: &ParseContext<'_>) -> Result<Vec<Finding>, ParseError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let reports: Vec<FileReport> = serde_json::from_str(stdout.trim())?;
    let mut findings = Vec::new();
    for report in reports {
        let file = relative_path(ctx.root, &report.file_path);
        for msg in report.messages {
            let token = msg.severity.to_string();
            let band = ctx.severity.classify(&token);
            let mut finding =
                Finding::new(msg.message, token, band).with_location(file.clone(), msg.line);
            if let Some(rule) = msg.rule_id {
                finding = finding.with_code(rule);
            }
            findings.push(finding);
        }
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
    fn maps_numeric_severities() {
        let sev = SeverityMap::from([("1", Band::Yellow), ("2", Band::Red)]);
        let th = BTreeMap::new();
        let out = r#"[
          {"filePath":"/repo/web/src/app.tsx","messages":[
            {"ruleId":"no-unused-vars","severity":1,"message":"'x' is unused","line":3,"column":7},
            {"ruleId":null,"severity":2,"message":"Parsing error","line":9}
          ],"errorCount":1,"warningCount":1},
          {"filePath":"/repo/web/src/ok.ts","messages":[]}
        ]"#;
        let findings = parse(out, &ctx(&sev, &th, 1)).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].band, Band::Yellow);
        assert_eq!(findings[0].code.as_deref(), Some("no-unused-vars"));
        assert_eq!(findings[0].location().as_deref(), Some("web/src/app.tsx:3"));
        assert_eq!(findings[1].band, Band::Red);
        assert!(findings[1].code.is_none());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let sev = SeverityMap::new();
        let th = BTreeMap::new();
        assert!(parse("Oops! Something went wrong!", &ctx(&sev, &th, 2)).is_err());
    }
}
