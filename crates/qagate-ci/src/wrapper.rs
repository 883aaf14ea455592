//! Tool wrappers: the adapter between a descriptor and a child process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use qagate_core::domain::{
    Dimension, ParserKind, RawOutput, RunKind, SeverityMap, ToolDescriptor, ToolInvocation,
    ToolResult,
};
use qagate_core::{QaConfig, Threshold, ToolSettings};

use crate::cancel::CancelSignal;
use crate::command::{render, resolve_override};
use crate::parsers::{parse, ParseContext};
use crate::runner::{run_process, tail, ProcessOutcome, ProcessOutput, ProcessSpec};

/// Deadline for the availability probe (`--version` and friends).
pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of probing a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    /// Resolved executable.
    pub program: Option<PathBuf>,
    /// First line printed by the availability check.
    pub version: Option<String>,
    pub reason: Option<String>,
}

impl Availability {
    pub fn available(program: PathBuf, version: Option<String>) -> Self {
        Self {
            available: true,
            program: Some(program),
            version,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            program: None,
            version: None,
            reason: Some(reason.into()),
        }
    }
}

/// Per-invocation execution context.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub root: PathBuf,
    /// Requested dimensions this tool runs for.
    pub dimensions: Vec<Dimension>,
    pub kind: RunKind,
    pub timeout: Duration,
    pub capture_bytes: usize,
    pub cancel: CancelSignal,
}

/// Adapter around one external tool.
///
/// Implementations never aggregate and never touch shared state: everything
/// they produce goes into the returned [`ToolResult`].
#[async_trait]
pub trait ToolWrapper: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Probe the tool. A cancelled probe reports the tool unavailable.
    async fn availability(&self, cancel: &CancelSignal) -> Availability;

    async fn is_available(&self, cancel: &CancelSignal) -> bool {
        self.availability(cancel).await.available
    }

    async fn execute(&self, invocation: &ToolInvocation, ctx: &ExecContext) -> ToolResult;
}

/// Builds wrappers for resolved tools.
pub trait WrapperFactory: Send + Sync {
    fn create(&self, tool: &ToolDescriptor) -> Arc<dyn ToolWrapper>;
}

/// Wrapper that renders the descriptor's command template and runs it.
#[derive(Debug, Clone)]
pub struct CommandWrapper {
    descriptor: ToolDescriptor,
    root: PathBuf,
    settings: ToolSettings,
    severity: SeverityMap,
    thresholds: BTreeMap<String, Threshold>,
}

impl CommandWrapper {
    pub fn new(descriptor: ToolDescriptor, root: impl Into<PathBuf>) -> Self {
        let severity = descriptor.severity.clone();
        Self {
            descriptor,
            root: root.into(),
            settings: ToolSettings::default(),
            severity,
            thresholds: BTreeMap::new(),
        }
    }

    /// Wrapper with the tool's `[tools.<id>]` settings, effective severity
    /// map and the metric thresholds from `config`.
    pub fn from_config(descriptor: ToolDescriptor, config: &QaConfig, root: &Path) -> Self {
        let severity = config.severity_for(&descriptor);
        let settings = config
            .tool_settings(&descriptor.id)
            .cloned()
            .unwrap_or_default();
        Self {
            descriptor,
            root: root.to_path_buf(),
            settings,
            severity,
            thresholds: config.thresholds.clone(),
        }
    }

    /// Executable that will actually be spawned.
    fn resolve_program(&self) -> Result<PathBuf, String> {
        if let Some(path) = &self.settings.path {
            let resolved = resolve_override(&self.root, path);
            if resolved.exists() || which::which(&resolved).is_ok() {
                return Ok(resolved);
            }
            return Err(format!("configured path {} not found", resolved.display()));
        }
        let program = self
            .descriptor
            .availability
            .first()
            .ok_or_else(|| "empty availability check".to_string())?;
        which::which(program).map_err(|_| format!("{program} not found on PATH"))
    }

    fn interpret(&self, output: &ProcessOutput, parser: ParserKind, ctx: &ExecContext) -> ToolResult {
        let id = self.descriptor.id.as_str();
        let dims = ctx.dimensions.clone();
        let code = match &output.outcome {
            ProcessOutcome::SpawnFailed(msg) => {
                return ToolResult::failed(id, dims, format!("tool crashed: {msg}"));
            }
            ProcessOutcome::TimedOut => {
                return ToolResult::timed_out(id, dims, ctx.timeout.as_secs());
            }
            ProcessOutcome::Cancelled => return ToolResult::failed(id, dims, "interrupted"),
            ProcessOutcome::Signaled { signal } => {
                let signal = signal.map_or_else(|| "unknown".to_string(), |s| s.to_string());
                return ToolResult::failed(
                    id,
                    dims,
                    format!("tool crashed: terminated by signal {signal}"),
                );
            }
            ProcessOutcome::Exited { code } => *code,
        };

        if code == 126 || code == 127 {
            return ToolResult::failed(
                id,
                dims,
                format!("tool crashed: command could not be executed (exit status {code})"),
            )
            .with_exit_code(Some(code));
        }

        let parse_ctx = ParseContext {
            root: &ctx.root,
            exit_code: code,
            severity: &self.severity,
            thresholds: &self.thresholds,
        };
        match parse(parser, &output.stdout, &output.stderr, &parse_ctx) {
            Ok(findings) if code != 0 && findings.is_empty() && failure_needs_findings(parser) => {
                ToolResult::failed(
                    id,
                    dims,
                    format!("tool crashed: exit status {code} without diagnostics"),
                )
                .with_exit_code(Some(code))
            }
            Ok(findings) => ToolResult::completed(id, dims, Some(code), findings),
            Err(e) if code == 0 => {
                warn!(tool = %id, error = %e, "ignoring unparseable output of a successful run");
                ToolResult::completed(id, dims, Some(code), Vec::new())
            }
            Err(e) => ToolResult::failed(id, dims, format!("tool crashed: {e}"))
                .with_exit_code(Some(code)),
        }
    }
}

/// Whether a non-zero exit must be explained by at least one finding.
/// Pass/fail tools explain themselves through the exit code, and metric
/// tools exit non-zero on their own builtin limits.
fn failure_needs_findings(parser: ParserKind) -> bool {
    !matches!(parser, ParserKind::ExitCode | ParserKind::LizardCsv)
}

fn raw_output(output: &ProcessOutput, capture_bytes: usize) -> RawOutput {
    let (stdout_tail, out_cut) = tail(&output.stdout, capture_bytes);
    let (stderr_tail, err_cut) = tail(&output.stderr, capture_bytes);
    RawOutput {
        stdout_tail,
        stderr_tail,
        truncated: output.truncated || out_cut || err_cut,
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ToolWrapper for CommandWrapper {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn availability(&self, cancel: &CancelSignal) -> Availability {
        let program = match self.resolve_program() {
            Ok(program) => program,
            Err(reason) => return Availability::unavailable(reason),
        };
        let line = match render(
            &self.descriptor.availability,
            &self.root,
            &[],
            &[],
            self.settings.path.as_deref(),
        ) {
            Ok(line) => line,
            Err(reason) => return Availability::unavailable(reason),
        };

        let spec = ProcessSpec::new(line.program, line.args, &self.root)
            .with_timeout(AVAILABILITY_TIMEOUT)
            .with_capture_bytes(4096);
        let output = run_process(&spec, cancel).await;
        match output.outcome {
            ProcessOutcome::Exited { code: 0 } => {
                let version = first_line(&output.stdout).or_else(|| first_line(&output.stderr));
                Availability::available(program, version)
            }
            ProcessOutcome::Exited { code } => {
                Availability::unavailable(format!("availability check exited with status {code}"))
            }
            ProcessOutcome::TimedOut => Availability::unavailable("availability check timed out"),
            ProcessOutcome::Signaled { .. } => {
                Availability::unavailable("availability check was killed")
            }
            ProcessOutcome::Cancelled => Availability::unavailable("interrupted"),
            ProcessOutcome::SpawnFailed(msg) => Availability::unavailable(msg),
        }
    }

    async fn execute(&self, invocation: &ToolInvocation, ctx: &ExecContext) -> ToolResult {
        let id = self.descriptor.id.as_str();
        // Fix runs report through the exit code; check-only args stay out.
        let (template, parser, extra_args) = match ctx.kind {
            RunKind::Check => (
                &self.descriptor.command,
                self.descriptor.parser,
                self.settings.args.as_slice(),
            ),
            RunKind::Fix => match &self.descriptor.fix_command {
                Some(cmd) => (cmd, ParserKind::ExitCode, &[][..]),
                None => {
                    return ToolResult::failed(id, ctx.dimensions.clone(), "tool has no fix command")
                }
            },
        };

        let line = match render(
            template,
            &ctx.root,
            &invocation.files,
            extra_args,
            self.settings.path.as_deref(),
        ) {
            Ok(line) => line,
            Err(reason) => return ToolResult::failed(id, ctx.dimensions.clone(), reason),
        };
        debug!(
            tool = %id,
            program = %line.program,
            args = line.args.len(),
            files = invocation.files.len(),
            "spawning tool"
        );

        let spec = ProcessSpec::new(line.program, line.args, &ctx.root)
            .with_timeout(ctx.timeout)
            .with_capture_bytes(ctx.capture_bytes);
        let output = run_process(&spec, &ctx.cancel).await;
        self.interpret(&output, parser, ctx)
            .with_duration_ms(output.duration_ms)
            .with_raw_output(raw_output(&output, ctx.capture_bytes))
    }
}

/// Factory producing [`CommandWrapper`]s configured from a shared config.
#[derive(Debug, Clone)]
pub struct CommandWrapperFactory {
    config: Arc<QaConfig>,
    root: PathBuf,
}

impl CommandWrapperFactory {
    pub fn new(config: Arc<QaConfig>, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }
}

impl WrapperFactory for CommandWrapperFactory {
    fn create(&self, tool: &ToolDescriptor) -> Arc<dyn ToolWrapper> {
        Arc::new(CommandWrapper::from_config(
            tool.clone(),
            &self.config,
            &self.root,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qagate_core::domain::{Band, ToolStatus};

    fn sh_tool(id: &str, script: &str, parser: ParserKind) -> ToolDescriptor {
        ToolDescriptor::new(id, &["sh", "-c", script], parser)
            .with_availability(&["sh", "-c", "echo demo 1.0"])
            .with_dimensions(&[Dimension::Lint])
            .with_extensions(&["py"])
            .with_scopes(&["backend"])
            .with_severity(SeverityMap::from([("error", Band::Red)]))
    }

    fn ctx(root: &Path, timeout: Duration) -> ExecContext {
        ExecContext {
            root: root.to_path_buf(),
            dimensions: vec![Dimension::Lint],
            kind: RunKind::Check,
            timeout,
            capture_bytes: 1024,
            cancel: CancelSignal::never(),
        }
    }

    async fn run(tool: ToolDescriptor, files: Vec<PathBuf>, timeout: Duration) -> ToolResult {
        let dir = tempfile::tempdir().unwrap();
        let wrapper = CommandWrapper::new(tool, dir.path());
        let invocation = ToolInvocation::new(wrapper.descriptor().id.clone(), files);
        wrapper.execute(&invocation, &ctx(dir.path(), timeout)).await
    }

    #[tokio::test]
    async fn availability_reports_version_line() {
        let dir = tempfile::tempdir().unwrap();
        let wrapper = CommandWrapper::new(sh_tool("demo", "true", ParserKind::ExitCode), dir.path());
        let availability = wrapper.availability(&CancelSignal::never()).await;
        assert!(availability.available, "{availability:?}");
        assert_eq!(availability.version.as_deref(), Some("demo 1.0"));
        assert!(wrapper.is_available(&CancelSignal::never()).await);
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ToolDescriptor::new("ghost", &["qagate-ghost-tool", "{files}"], ParserKind::ExitCode);
        let wrapper = CommandWrapper::new(tool, dir.path());
        let availability = wrapper.availability(&CancelSignal::never()).await;
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn interrupt_stops_a_slow_availability_check() {
        let dir = tempfile::tempdir().unwrap();
        let tool = sh_tool("slow", "true", ParserKind::ExitCode)
            .with_availability(&["sh", "-c", "sleep 30"]);
        let wrapper = CommandWrapper::new(tool, dir.path());
        let (handle, signal) = crate::cancel::cancel_pair();
        let started = std::time::Instant::now();

        let (availability, _) = tokio::join!(wrapper.availability(&signal), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.cancel();
        });

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!availability.available);
        assert_eq!(availability.reason.as_deref(), Some("interrupted"));
    }

    #[tokio::test]
    async fn configured_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = QaConfig::default();
        config.tools.insert(
            "demo".into(),
            ToolSettings {
                path: Some(PathBuf::from("bin/missing-demo")),
                ..Default::default()
            },
        );
        let wrapper = CommandWrapper::from_config(
            sh_tool("demo", "true", ParserKind::ExitCode),
            &config,
            dir.path(),
        );
        let availability = wrapper.availability(&CancelSignal::never()).await;
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("bin/missing-demo"));
    }

    #[tokio::test]
    async fn diagnostics_become_findings() {
        let tool = sh_tool(
            "demo",
            "echo 'svc/a.py:3: error: boom'; exit 1",
            ParserKind::LineDiagnostic,
        );
        let result = run(tool, vec![], Duration::from_secs(10)).await;
        assert_eq!(result.status, ToolStatus::Completed);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.band(), Band::Red);
        assert!(result.raw_output.stdout_tail.contains("boom"));
    }

    #[tokio::test]
    async fn nonzero_exit_without_diagnostics_is_a_crash() {
        let tool = sh_tool("demo", "echo 'Traceback' >&2; exit 2", ParserKind::LineDiagnostic);
        let result = run(tool, vec![], Duration::from_secs(10)).await;
        assert_eq!(result.status, ToolStatus::Failed);
        assert!(result.reason.unwrap().starts_with("tool crashed"));
        assert_eq!(result.findings.len(), 1);
    }

    #[tokio::test]
    async fn exit_127_is_a_crash() {
        let tool = sh_tool("demo", "exit 127", ParserKind::ExitCode);
        let result = run(tool, vec![], Duration::from_secs(10)).await;
        assert_eq!(result.status, ToolStatus::Failed);
        assert_eq!(result.exit_code, Some(127));
    }

    #[tokio::test]
    async fn unparseable_output_of_a_clean_run_is_ignored() {
        let tool = sh_tool("demo", "echo 'not json'", ParserKind::EslintJson);
        let result = run(tool, vec![], Duration::from_secs(10)).await;
        assert_eq!(result.status, ToolStatus::Completed);
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn deadline_yields_timed_out() {
        let tool = sh_tool("demo", "sleep 30", ParserKind::ExitCode);
        let result = run(tool, vec![], Duration::from_millis(200)).await;
        assert_eq!(result.status, ToolStatus::TimedOut);
        assert_eq!(result.band(), Band::Red);
    }

    #[tokio::test]
    async fn files_are_passed_to_the_command() {
        let tool = ToolDescriptor::new(
            "lister",
            &["sh", "-c", "for f in \"$@\"; do echo \"$f\"; done", "sh", "{files}"],
            ParserKind::FileList,
        );
        let files = vec![PathBuf::from("svc/a.py"), PathBuf::from("svc/b.py")];
        let result = run(tool, files, Duration::from_secs(10)).await;
        assert_eq!(result.status, ToolStatus::Completed);
        let listed: Vec<_> = result.findings.iter().filter_map(|f| f.file.clone()).collect();
        assert_eq!(listed, vec!["svc/a.py", "svc/b.py"]);
    }

    #[tokio::test]
    async fn fix_runs_use_the_fix_template() {
        let tool = sh_tool("demo", "exit 1", ParserKind::LineDiagnostic).with_fix_command(&[
            "sh",
            "-c",
            "echo fixed",
        ]);
        let dir = tempfile::tempdir().unwrap();
        let wrapper = CommandWrapper::new(tool, dir.path());
        let invocation = ToolInvocation::new("demo", vec![]);
        let mut fix_ctx = ctx(dir.path(), Duration::from_secs(10));
        fix_ctx.kind = RunKind::Fix;
        let result = wrapper.execute(&invocation, &fix_ctx).await;
        assert_eq!(result.status, ToolStatus::Completed);
        assert!(result.findings.is_empty());
        assert!(result.raw_output.stdout_tail.contains("fixed"));
    }
}
