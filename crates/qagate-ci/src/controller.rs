//! Execution controller: plans a run and drives every tool invocation to a
//! terminal state on a bounded pool.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use qagate_core::domain::{
    file_extension, ExecutionRequest, InvocationState, QaError, Result, ScopeDef, ToolInvocation,
    ToolResult, ToolStatus,
};
use qagate_core::{
    detect, emit_tool_finished, emit_tool_skipped, select_scopes, QaConfig, Resolution,
    ResolveQuery, ResolvedTool, ToolRegistry, Workspace,
};

use crate::cancel::CancelSignal;
use crate::wrapper::{Availability, ExecContext, ToolWrapper, WrapperFactory};

/// Active scopes and resolved tools for one run.
#[derive(Debug, Clone)]
pub struct Plan {
    pub scopes: Vec<ScopeDef>,
    pub resolution: Resolution,
}

impl Plan {
    pub fn scope_names(&self) -> Vec<String> {
        self.scopes.iter().map(|s| s.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOutcome {
    pub plan: Plan,
    /// One result per resolved tool, in completion order.
    pub results: Vec<ToolResult>,
    pub interrupted: bool,
}

pub struct ExecutionController {
    config: Arc<QaConfig>,
    registry: Arc<ToolRegistry>,
    factory: Arc<dyn WrapperFactory>,
}

impl ExecutionController {
    pub fn new(
        config: Arc<QaConfig>,
        registry: Arc<ToolRegistry>,
        factory: Arc<dyn WrapperFactory>,
    ) -> Self {
        Self {
            config,
            registry,
            factory,
        }
    }

    /// Detect scopes (unless named) and resolve tools.
    pub fn plan(&self, request: &ExecutionRequest, workspace: &Workspace) -> Result<Plan> {
        let defs = self.config.scope_defs();
        let detected = detect(&workspace.files, workspace.git.as_ref(), &defs);
        let scopes = select_scopes(&request.scopes, &detected, &defs)?;
        debug!(detected = ?detected, active = scopes.len(), "scopes selected");

        let resolution = self.registry.resolve(&ResolveQuery {
            dimensions: &request.dimensions,
            scopes: &scopes,
            mode: request.mode,
            kind: request.kind,
            overrides: &request.tools,
        })?;
        Ok(Plan { scopes, resolution })
    }

    pub async fn run(
        &self,
        request: &ExecutionRequest,
        workspace: &Workspace,
        cancel: CancelSignal,
    ) -> Result<ControllerOutcome> {
        let plan = self.plan(request, workspace)?;
        self.execute(plan, request, workspace, cancel).await
    }

    /// Run a plan. Returns only after every invocation has terminated.
    pub async fn execute(
        &self,
        plan: Plan,
        request: &ExecutionRequest,
        workspace: &Workspace,
        cancel: CancelSignal,
    ) -> Result<ControllerOutcome> {
        let tools = &plan.resolution.tools;
        let wrappers: Vec<Arc<dyn ToolWrapper>> = tools
            .iter()
            .map(|t| self.factory.create(&t.descriptor))
            .collect();
        let availability: Vec<Availability> =
            join_all(wrappers.iter().map(|w| w.availability(&cancel))).await;

        let jobs = self.config.effective_jobs();
        info!(tools = tools.len(), jobs = jobs, "scheduling tools");
        let semaphore = Arc::new(Semaphore::new(jobs));

        let mut results = Vec::with_capacity(tools.len());
        let mut pending = FuturesUnordered::new();
        for ((tool, wrapper), availability) in tools.iter().zip(wrappers).zip(availability) {
            let files = files_for(tool, &plan.scopes, &workspace.files);
            let mut invocation = ToolInvocation::new(tool.id(), files);

            if cancel.is_cancelled() {
                invocation.advance(InvocationState::Failed)?;
                results.push(interrupted_before_start(tool));
                continue;
            }
            if !availability.available {
                invocation.advance(InvocationState::Skipped)?;
                let reason = availability
                    .reason
                    .unwrap_or_else(|| "tool unavailable".to_string());
                emit_tool_skipped(tool.id(), &reason);
                results.push(ToolResult::skipped(tool.id(), tool.dimensions.clone(), reason));
                continue;
            }
            if tool.descriptor.takes_files() && invocation.files.is_empty() {
                invocation.advance(InvocationState::Skipped)?;
                emit_tool_skipped(tool.id(), "no matching files");
                results.push(ToolResult::skipped_no_files(tool.id(), tool.dimensions.clone()));
                continue;
            }

            invocation.advance(InvocationState::Scheduled)?;
            let ctx = ExecContext {
                root: workspace.root.clone(),
                dimensions: tool.dimensions.clone(),
                kind: request.kind,
                timeout: self.config.timeout_for(&tool.descriptor),
                capture_bytes: self.config.run.capture_bytes,
                cancel: cancel.clone(),
            };
            let handle = tokio::spawn(run_invocation(
                wrapper,
                invocation,
                ctx,
                semaphore.clone(),
                availability.version,
            ));
            let id = tool.id().to_string();
            let dimensions = tool.dimensions.clone();
            pending.push(async move { (id, dimensions, handle.await) });
        }

        let mut first_error: Option<QaError> = None;
        while let Some((id, dimensions, joined)) = pending.next().await {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                    continue;
                }
                Err(e) => ToolResult::failed(
                    &id,
                    dimensions,
                    format!("tool crashed: wrapper task failed: {e}"),
                ),
            };
            emit_tool_finished(&result);
            results.push(result);
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(ControllerOutcome {
            plan,
            results,
            interrupted: cancel.is_cancelled(),
        })
    }
}

/// Drive one invocation from SCHEDULED to a terminal state.
async fn run_invocation(
    wrapper: Arc<dyn ToolWrapper>,
    mut invocation: ToolInvocation,
    ctx: ExecContext,
    semaphore: Arc<Semaphore>,
    version: Option<String>,
) -> Result<ToolResult> {
    let mut cancel = ctx.cancel.clone();
    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = semaphore.acquire_owned() => permit.ok(),
    };
    let Some(_permit) = permit else {
        invocation.advance(InvocationState::Failed)?;
        return Ok(ToolResult::failed(
            &invocation.tool_id,
            ctx.dimensions.clone(),
            "interrupted before start",
        ));
    };

    invocation.advance(InvocationState::Running)?;
    let result = wrapper
        .execute(&invocation, &ctx)
        .await
        .with_version(version);
    invocation.advance(terminal_state(result.status))?;
    Ok(result)
}

fn terminal_state(status: ToolStatus) -> InvocationState {
    match status {
        ToolStatus::Completed => InvocationState::Completed,
        ToolStatus::Failed => InvocationState::Failed,
        ToolStatus::TimedOut => InvocationState::TimedOut,
        ToolStatus::Skipped => InvocationState::Skipped,
    }
}

fn interrupted_before_start(tool: &ResolvedTool) -> ToolResult {
    ToolResult::failed(tool.id(), tool.dimensions.clone(), "interrupted before start")
}

/// Files a tool receives: its own extensions, owned by a scope it resolved for.
fn files_for(tool: &ResolvedTool, scopes: &[ScopeDef], files: &[PathBuf]) -> Vec<PathBuf> {
    let owners: Vec<&ScopeDef> = scopes
        .iter()
        .filter(|s| tool.scopes.contains(&s.name))
        .collect();
    files
        .iter()
        .filter(|f| {
            file_extension(f).is_some_and(|ext| {
                tool.descriptor.accepts_extension(&ext)
                    && owners.iter().any(|s| s.owns_extension(&ext))
            })
        })
        .cloned()
        .collect()
}
