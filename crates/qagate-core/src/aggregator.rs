//! Result aggregation.
//!
//! Merges per-tool [`ToolResult`]s into one [`Report`]: groups them by
//! dimension, computes each dimension's band and the overall verdict. The
//! output depends only on the multiset of results, never on the order in
//! which tools finished.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Band, Dimension, DimensionVerdict, ExecutionRequest, QaError, Report, Result, ToolResult,
    ToolStatus,
};

/// Run metadata the aggregator stamps onto the report.
#[derive(Debug, Clone)]
pub struct AggregationInput<'a> {
    pub run_id: Uuid,
    pub request: &'a ExecutionRequest,
    /// Active scopes for the run.
    pub scopes: Vec<String>,
    /// Requested dimensions no resolved tool covers.
    pub uncovered: &'a [Dimension],
    pub git_sha: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

fn check_invariants(request: &ExecutionRequest, results: &[ToolResult]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for result in results {
        if !seen.insert(result.tool_id.as_str()) {
            return Err(QaError::AggregationInvariant(format!(
                "tool {} reported more than one result",
                result.tool_id
            )));
        }
        if result.dimensions.is_empty() {
            return Err(QaError::AggregationInvariant(format!(
                "result for {} names no dimension",
                result.tool_id
            )));
        }
        if let Some(dim) = result.dimensions.iter().find(|d| !request.requests(**d)) {
            return Err(QaError::AggregationInvariant(format!(
                "result for {} names unrequested dimension {dim}",
                result.tool_id
            )));
        }
        if result.status == ToolStatus::Skipped && !result.findings.is_empty() {
            return Err(QaError::AggregationInvariant(format!(
                "skipped result for {} carries findings",
                result.tool_id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

fn contribution_reason(result: &ToolResult) -> Option<String> {
    match result.status {
        ToolStatus::Skipped => Some(format!(
            "{} skipped: {}",
            result.tool_id,
            result.reason.as_deref().unwrap_or("no reason given")
        )),
        ToolStatus::Failed | ToolStatus::TimedOut => Some(format!(
            "{} {}: {}",
            result.tool_id,
            result.status,
            result.reason.as_deref().unwrap_or("no reason given")
        )),
        ToolStatus::Completed => {
            let red = result.count_band(Band::Red);
            let yellow = result.count_band(Band::Yellow);
            (red + yellow > 0).then(|| {
                format!("{}: {red} red, {yellow} yellow finding(s)", result.tool_id)
            })
        }
    }
}

fn dimension_verdict(
    dimension: Dimension,
    results: &[ToolResult],
    uncovered: bool,
    fail_closed: bool,
) -> DimensionVerdict {
    let contributing: Vec<&ToolResult> = results
        .iter()
        .filter(|r| r.dimensions.contains(&dimension))
        .collect();

    let attempted = contributing.iter().filter(|r| r.is_attempted()).count();
    let skipped = contributing.len() - attempted;
    let available = contributing.iter().filter(|r| r.was_available()).count();
    let mut band = Band::worst(contributing.iter().map(|r| r.band()));
    let mut reasons: Vec<String> = contributing
        .iter()
        .filter_map(|r| contribution_reason(r))
        .collect();

    if contributing.is_empty() {
        reasons.push(if uncovered {
            "no tool covers this dimension for the active scopes".to_string()
        } else {
            "no tool ran for this dimension".to_string()
        });
    }
    if fail_closed && available == 0 {
        band = Band::Red;
        reasons.push("no available tool (fail-closed)".to_string());
    }

    DimensionVerdict {
        band,
        tools: contributing.iter().map(|r| r.tool_id.clone()).collect(),
        attempted,
        skipped,
        reasons,
    }
}

/// Build the report for a finished run.
///
/// Fails with [`QaError::AggregationInvariant`] when a result is duplicated,
/// names no dimension or names a dimension that was not requested.
pub fn aggregate(input: AggregationInput<'_>, mut results: Vec<ToolResult>) -> Result<Report> {
    check_invariants(input.request, &results)?;
    results.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));

    let fail_closed = input.request.is_fail_closed();
    let dimensions: BTreeMap<Dimension, DimensionVerdict> = input
        .request
        .dimensions
        .iter()
        .map(|dim| {
            let uncovered = input.uncovered.contains(dim);
            (*dim, dimension_verdict(*dim, &results, uncovered, fail_closed))
        })
        .collect();

    let overall = Band::worst(dimensions.values().map(|v| v.band));

    let mut scopes = input.scopes;
    scopes.sort();
    scopes.dedup();

    Ok(Report {
        run_id: input.run_id,
        request_digest: input.request.digest.clone(),
        mode: input.request.mode,
        kind: input.request.kind,
        scopes,
        git_sha: input.git_sha,
        dimensions,
        results,
        overall,
        started_at: input.started_at,
        duration_ms: input.duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Finding, Mode, RequestFields};

    fn request(dimensions: &[Dimension], mode: Mode) -> ExecutionRequest {
        ExecutionRequest::new(RequestFields {
            dimensions: dimensions.to_vec(),
            mode,
            ..Default::default()
        })
        .unwrap()
    }

    fn input<'a>(request: &'a ExecutionRequest, uncovered: &'a [Dimension]) -> AggregationInput<'a> {
        AggregationInput {
            run_id: Uuid::new_v4(),
            request,
            scopes: vec!["frontend".into()],
            uncovered,
            git_sha: None,
            started_at: Utc::now(),
            duration_ms: 5,
        }
    }

    fn completed(id: &str, dim: Dimension, bands: &[Band]) -> ToolResult {
        ToolResult::completed(
            id,
            vec![dim],
            Some(0),
            bands
                .iter()
                .map(|b| Finding::new("finding", b.as_str(), *b))
                .collect(),
        )
    }

    #[test]
    fn test_green_when_no_findings() {
        let req = request(&[Dimension::Lint], Mode::Full);
        let report = aggregate(input(&req, &[]), vec![completed("eslint", Dimension::Lint, &[])])
            .unwrap();
        assert_eq!(report.overall, Band::Green);
        assert_eq!(report.dimensions[&Dimension::Lint].attempted, 1);
    }

    #[test]
    fn test_red_finding_makes_dimension_and_overall_red() {
        let req = request(&[Dimension::Format, Dimension::Lint], Mode::Full);
        let report = aggregate(
            input(&req, &[]),
            vec![
                completed("prettier", Dimension::Format, &[]),
                completed("eslint", Dimension::Lint, &[Band::Yellow, Band::Red]),
            ],
        )
        .unwrap();
        assert_eq!(report.dimensions[&Dimension::Format].band, Band::Green);
        assert_eq!(report.dimensions[&Dimension::Lint].band, Band::Red);
        assert_eq!(report.overall, Band::Red);
    }

    #[test]
    fn test_yellow_only_is_yellow_overall() {
        let req = request(&[Dimension::Lint], Mode::Full);
        let report = aggregate(
            input(&req, &[]),
            vec![completed("eslint", Dimension::Lint, &[Band::Yellow])],
        )
        .unwrap();
        assert_eq!(report.overall, Band::Yellow);
        assert!(report.passed(false));
        assert!(!report.passed(true));
    }

    #[test]
    fn test_timed_out_tool_is_red() {
        let req = request(&[Dimension::Test], Mode::Full);
        let report = aggregate(
            input(&req, &[]),
            vec![ToolResult::timed_out("pytest", vec![Dimension::Test], 5)],
        )
        .unwrap();
        assert_eq!(report.overall, Band::Red);
        assert!(report.dimensions[&Dimension::Test].reasons[0].contains("TIMED_OUT"));
    }

    #[test]
    fn test_skipped_is_non_fatal_outside_dod() {
        let req = request(&[Dimension::Security], Mode::Full);
        let report = aggregate(
            input(&req, &[]),
            vec![ToolResult::skipped("bandit", vec![Dimension::Security], "not installed")],
        )
        .unwrap();
        assert_eq!(report.overall, Band::Green);
        let verdict = &report.dimensions[&Dimension::Security];
        assert_eq!(verdict.skipped, 1);
        assert!(verdict.reasons[0].contains("not installed"));
    }

    #[test]
    fn test_dod_fails_closed_on_skipped_dimension() {
        let req = request(&[Dimension::Security], Mode::Dod);
        let report = aggregate(
            input(&req, &[]),
            vec![ToolResult::skipped("bandit", vec![Dimension::Security], "not installed")],
        )
        .unwrap();
        assert_eq!(report.dimensions[&Dimension::Security].band, Band::Red);
        assert_eq!(report.overall, Band::Red);
    }

    #[test]
    fn test_dod_accepts_available_tool_without_files() {
        let req = request(&[Dimension::Format], Mode::Dod);
        let report = aggregate(
            input(&req, &[]),
            vec![
                ToolResult::skipped_no_files("prettier", vec![Dimension::Format]),
                ToolResult::skipped("shfmt", vec![Dimension::Format], "not installed"),
            ],
        )
        .unwrap();
        let verdict = &report.dimensions[&Dimension::Format];
        assert_eq!(verdict.band, Band::Green);
        assert_eq!(verdict.attempted, 0);
        assert_eq!(verdict.skipped, 2);
        assert!(!verdict.reasons.iter().any(|r| r.contains("fail-closed")));
    }

    #[test]
    fn test_uncovered_dimension_policy() {
        let full = request(&[Dimension::DataCompatibility], Mode::Full);
        let uncovered = [Dimension::DataCompatibility];
        let report = aggregate(input(&full, &uncovered), Vec::new()).unwrap();
        assert_eq!(report.overall, Band::Green);
        assert!(report.dimensions[&Dimension::DataCompatibility].reasons[0].contains("no tool covers"));

        let dod = request(&[Dimension::DataCompatibility], Mode::Dod);
        let report = aggregate(input(&dod, &uncovered), Vec::new()).unwrap();
        assert_eq!(report.overall, Band::Red);
    }

    #[test]
    fn test_result_without_dimension_is_invariant_violation() {
        let req = request(&[Dimension::Lint], Mode::Full);
        let bad = ToolResult::completed("eslint", Vec::new(), Some(0), Vec::new());
        let err = aggregate(input(&req, &[]), vec![bad]).unwrap_err();
        assert!(matches!(err, QaError::AggregationInvariant(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_unrequested_dimension_is_invariant_violation() {
        let req = request(&[Dimension::Lint], Mode::Full);
        let err = aggregate(
            input(&req, &[]),
            vec![completed("pytest", Dimension::Test, &[])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("unrequested dimension test"));
    }

    #[test]
    fn test_duplicate_tool_is_invariant_violation() {
        let req = request(&[Dimension::Lint], Mode::Full);
        let err = aggregate(
            input(&req, &[]),
            vec![
                completed("eslint", Dimension::Lint, &[]),
                completed("eslint", Dimension::Lint, &[]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, QaError::AggregationInvariant(_)));
    }

    #[test]
    fn test_completion_order_does_not_matter() {
        let req = request(&[Dimension::Lint, Dimension::Format], Mode::Full);
        let a = completed("eslint", Dimension::Lint, &[Band::Yellow]);
        let b = completed("prettier", Dimension::Format, &[Band::Red]);
        let c = ToolResult::skipped("ruff", vec![Dimension::Lint], "not installed");

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let build = |results: Vec<ToolResult>| {
            let mut inp = input(&req, &[]);
            inp.run_id = run_id;
            inp.started_at = started_at;
            aggregate(inp, results).unwrap()
        };
        let forward = build(vec![a.clone(), b.clone(), c.clone()]);
        let backward = build(vec![c, b, a]);
        assert_eq!(forward, backward);
        let ids: Vec<&str> = forward.results.iter().map(|r| r.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["eslint", "prettier", "ruff"]);
    }
}
