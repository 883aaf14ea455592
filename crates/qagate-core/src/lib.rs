//! qagate core library
//!
//! Domain model, configuration, stack detection, tool registry, result
//! aggregation and report rendering for the qagate quality gate.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod detector;
pub mod domain;
pub mod git;
pub mod obs;
pub mod registry;
pub mod reporting;
pub mod telemetry;

pub use aggregator::{aggregate, AggregationInput};
pub use config::{ConfigOverrides, QaConfig, RunSettings, Threshold, ToolSettings};
pub use detector::{
    collect_workspace, detect, select_scopes, FileSource, WalkdirFileSource, Workspace,
    WorkspaceQuery,
};
pub use domain::{
    Band, Dimension, DimensionVerdict, ExecutionRequest, Finding, InvocationState, Mode,
    ParserKind, QaError, RawOutput, Report, ReportSummary, RequestError, RequestFields, Result,
    RunKind, ScopeDef, ScopeSelector, SeverityMap, SkipKind, ToolDescriptor, ToolInvocation,
    ToolResult, ToolStatus,
};
pub use git::{capture_head_sha, is_git_repo, CommandGitProbe, GitContext, GitProbe};
pub use obs::{
    emit_run_finished, emit_run_interrupted, emit_run_started, emit_tool_finished,
    emit_tool_skipped, run_span,
};
pub use registry::{Resolution, ResolveQuery, ResolvedTool, ToolRegistry};
pub use reporting::{render, render_json, render_markdown, render_text, write_report, ReportFormat};
pub use telemetry::init_tracing;

/// qagate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
