//! The aggregated report and its compact summary view.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dimension::Dimension;
use super::request::{Mode, RunKind};
use super::result::{ToolResult, ToolStatus};
use super::severity::Band;

/// Verdict for one requested dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DimensionVerdict {
    pub band: Band,
    /// Tools that contributed to this dimension, sorted.
    pub tools: Vec<String>,
    /// Tools that ran or tried to run.
    pub attempted: usize,
    /// Tools that were skipped.
    pub skipped: usize,
    /// Explanations for non-green or uncovered verdicts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// Immutable result of one qagate run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub run_id: Uuid,
    pub request_digest: String,
    pub mode: Mode,
    pub kind: RunKind,
    /// Active scopes, sorted.
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    pub dimensions: BTreeMap<Dimension, DimensionVerdict>,
    /// Per-tool results sorted by tool id.
    pub results: Vec<ToolResult>,
    pub overall: Band,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Compact view derived from a [`Report`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub overall: Band,
    pub dimensions: BTreeMap<Dimension, Band>,
    pub tools_total: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub red_findings: usize,
    pub yellow_findings: usize,
}

impl Report {
    pub fn summary(&self) -> ReportSummary {
        let count = |status: ToolStatus| self.results.iter().filter(|r| r.status == status).count();
        ReportSummary {
            overall: self.overall,
            dimensions: self
                .dimensions
                .iter()
                .map(|(dim, verdict)| (*dim, verdict.band))
                .collect(),
            tools_total: self.results.len(),
            completed: count(ToolStatus::Completed),
            failed: count(ToolStatus::Failed),
            timed_out: count(ToolStatus::TimedOut),
            skipped: count(ToolStatus::Skipped),
            red_findings: self.results.iter().map(|r| r.count_band(Band::Red)).sum(),
            yellow_findings: self.results.iter().map(|r| r.count_band(Band::Yellow)).sum(),
        }
    }

    /// Whether the run passes. Yellow passes unless `fail_on_yellow`.
    pub fn passed(&self, fail_on_yellow: bool) -> bool {
        match self.overall {
            Band::Green => true,
            Band::Yellow => !fail_on_yellow,
            Band::Red => false,
        }
    }

    /// Process exit code for this report: 0 pass, 1 fail.
    pub fn exit_code(&self, fail_on_yellow: bool) -> u8 {
        if self.passed(fail_on_yellow) {
            0
        } else {
            1
        }
    }

    pub fn result(&self, tool_id: &str) -> Option<&ToolResult> {
        self.results.iter().find(|r| r.tool_id == tool_id)
    }
}
