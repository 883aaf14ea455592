//! Per-tool results, the uniform output of every tool wrapper.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::dimension::Dimension;
use super::finding::Finding;
use super::severity::Band;

/// Terminal status of one tool invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolStatus {
    Completed,
    Failed,
    TimedOut,
    Skipped,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Completed => "COMPLETED",
            ToolStatus::Failed => "FAILED",
            ToolStatus::TimedOut => "TIMED_OUT",
            ToolStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a tool was skipped without running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// The executable or its availability check failed.
    Unavailable,
    /// The tool was available but no file in its partition matched.
    NoFiles,
}

/// Bounded tails of the captured streams.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout_tail: String,
    pub stderr_tail: String,
    /// Whether either stream was cut to fit the capture bound.
    #[serde(default)]
    pub truncated: bool,
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_id: String,

    /// Requested dimensions this tool contributed to.
    pub dimensions: Vec<Dimension>,

    pub status: ToolStatus,

    /// Process exit code, when the process exited normally.
    pub exit_code: Option<i32>,

    pub duration_ms: u64,

    /// Findings in tool output order.
    pub findings: Vec<Finding>,

    pub raw_output: RawOutput,

    /// Why the tool was skipped, failed or timed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<SkipKind>,

    /// First line of the availability check output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ToolResult {
    fn base(tool_id: &str, dimensions: Vec<Dimension>, status: ToolStatus) -> Self {
        Self {
            tool_id: tool_id.to_string(),
            dimensions,
            status,
            exit_code: None,
            duration_ms: 0,
            findings: Vec::new(),
            raw_output: RawOutput::default(),
            reason: None,
            skip: None,
            version: None,
        }
    }

    pub fn completed(
        tool_id: &str,
        dimensions: Vec<Dimension>,
        exit_code: Option<i32>,
        findings: Vec<Finding>,
    ) -> Self {
        let mut result = Self::base(tool_id, dimensions, ToolStatus::Completed);
        result.exit_code = exit_code;
        result.findings = findings;
        result
    }

    /// Skipped because the tool is not available. Skipped results carry no
    /// findings.
    pub fn skipped(tool_id: &str, dimensions: Vec<Dimension>, reason: impl Into<String>) -> Self {
        let mut result = Self::base(tool_id, dimensions, ToolStatus::Skipped);
        result.reason = Some(reason.into());
        result.skip = Some(SkipKind::Unavailable);
        result
    }

    /// Skipped because the tool's file partition was empty.
    pub fn skipped_no_files(tool_id: &str, dimensions: Vec<Dimension>) -> Self {
        let mut result = Self::base(tool_id, dimensions, ToolStatus::Skipped);
        result.reason = Some("no matching files".to_string());
        result.skip = Some(SkipKind::NoFiles);
        result
    }

    /// A failed result holds a single red finding describing the failure.
    pub fn failed(tool_id: &str, dimensions: Vec<Dimension>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut result = Self::base(tool_id, dimensions, ToolStatus::Failed);
        result.findings = vec![Finding::new(reason.clone(), "failure", Band::Red)];
        result.reason = Some(reason);
        result
    }

    pub fn timed_out(tool_id: &str, dimensions: Vec<Dimension>, timeout_secs: u64) -> Self {
        let reason = format!("timed out after {timeout_secs}s");
        let mut result = Self::base(tool_id, dimensions, ToolStatus::TimedOut);
        result.findings = vec![Finding::new(reason.clone(), "timeout", Band::Red)];
        result.reason = Some(reason);
        result
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_raw_output(mut self, raw: RawOutput) -> Self {
        self.raw_output = raw;
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Band this result contributes to its dimensions.
    ///
    /// Failed and timed-out tools are red regardless of findings; skipped
    /// tools contribute nothing.
    pub fn band(&self) -> Band {
        match self.status {
            ToolStatus::Failed | ToolStatus::TimedOut => Band::Red,
            ToolStatus::Skipped => Band::Green,
            ToolStatus::Completed => Band::worst(self.findings.iter().map(|f| f.band)),
        }
    }

    /// Whether the tool actually ran (or tried to).
    pub fn is_attempted(&self) -> bool {
        self.status != ToolStatus::Skipped
    }

    /// Whether the tool was available for the run, whether or not it ran.
    pub fn was_available(&self) -> bool {
        self.skip != Some(SkipKind::Unavailable)
    }

    pub fn count_band(&self, band: Band) -> usize {
        self.findings.iter().filter(|f| f.band == band).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_band_is_worst_finding() {
        let result = ToolResult::completed(
            "eslint",
            vec![Dimension::Lint],
            Some(1),
            vec![
                Finding::new("a", "1", Band::Yellow),
                Finding::new("b", "note", Band::Green),
            ],
        );
        assert_eq!(result.band(), Band::Yellow);
        assert_eq!(result.count_band(Band::Yellow), 1);
    }

    #[test]
    fn test_failed_and_timed_out_are_red() {
        let failed = ToolResult::failed("mypy", vec![Dimension::Lint], "tool crashed");
        assert_eq!(failed.band(), Band::Red);
        assert_eq!(failed.findings.len(), 1);
        assert_eq!(failed.reason.as_deref(), Some("tool crashed"));

        let timed_out = ToolResult::timed_out("pytest", vec![Dimension::Test], 30);
        assert_eq!(timed_out.band(), Band::Red);
        assert!(timed_out.findings[0].message.contains("30s"));
    }

    #[test]
    fn test_skipped_is_not_attempted() {
        let skipped = ToolResult::skipped("bandit", vec![Dimension::Security], "not installed");
        assert!(!skipped.is_attempted());
        assert!(skipped.findings.is_empty());
        assert_eq!(skipped.band(), Band::Green);
        assert!(!skipped.was_available());
    }

    #[test]
    fn test_no_files_skip_keeps_availability() {
        let skipped = ToolResult::skipped_no_files("prettier", vec![Dimension::Format]);
        assert!(!skipped.is_attempted());
        assert!(skipped.was_available());
        assert_eq!(skipped.reason.as_deref(), Some("no matching files"));
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["skip"], "no_files");
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&ToolStatus::TimedOut).unwrap();
        assert_eq!(json, "\"TIMED_OUT\"");
        assert_eq!(ToolStatus::TimedOut.to_string(), "TIMED_OUT");
    }
}
