//! Structured observability hooks for qagate run lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`]
//! - Emission functions for run start/finish and per-tool outcomes
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use tracing::info;

use crate::domain::{Band, ToolResult};

/// Run-scoped span; attach it to the run future with `Instrument`.
///
/// ```ignore
/// async { /* events carry run_id */ }.instrument(run_span("6f1c...")).await
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("qagate.run", run_id = %run_id)
}

/// Emit event: run started with its request fingerprint and resolved tools.
pub fn emit_run_started(run_id: &str, request_digest: &str, mode: &str, tools: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        request_digest = %request_digest,
        mode = %mode,
        tools = tools,
    );
}

pub fn emit_tool_skipped(tool_id: &str, reason: &str) {
    info!(event = "tool.skipped", tool = %tool_id, reason = %reason);
}

/// Emit event: a tool reached a terminal state.
pub fn emit_tool_finished(result: &ToolResult) {
    info!(
        event = "tool.finished",
        tool = %result.tool_id,
        status = %result.status,
        exit_code = ?result.exit_code,
        duration_ms = result.duration_ms,
        findings = result.findings.len(),
        band = %result.band(),
    );
}

/// Emit event: run finished with its overall verdict.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, overall: Band, results: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        overall = %overall,
        results = results,
    );
}

/// Emit event: the run was interrupted by the user.
pub fn emit_run_interrupted(run_id: &str) {
    tracing::warn!(event = "run.interrupted", run_id = %run_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dimension;

    #[test]
    fn test_run_span_and_events_do_not_panic() {
        let _span = run_span("test-run-id").entered();
        emit_run_started("test-run-id", "digest", "fast", 2);
        emit_tool_skipped("bandit", "not installed");
        emit_tool_finished(&ToolResult::timed_out("pytest", vec![Dimension::Test], 1));
        emit_run_finished("test-run-id", 10, Band::Red, 2);
        emit_run_interrupted("test-run-id");
    }
}
