//! Run orchestration: workspace collection, planning, execution and
//! aggregation into a single [`Report`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, Instrument};
use uuid::Uuid;

use qagate_core::domain::{Dimension, ExecutionRequest, QaError, Report, Result};
use qagate_core::{
    aggregate, collect_workspace, detect, emit_run_finished, emit_run_interrupted,
    emit_run_started, run_span, AggregationInput, CommandGitProbe, FileSource, GitProbe, QaConfig,
    ToolRegistry, WalkdirFileSource, Workspace, WorkspaceQuery,
};

use crate::cancel::CancelSignal;
use crate::controller::ExecutionController;
use crate::wrapper::{Availability, CommandWrapperFactory, WrapperFactory};

/// Replaceable collaborators of an [`Orchestrator`].
pub struct OrchestratorParts {
    pub registry: Arc<ToolRegistry>,
    pub files: Arc<dyn FileSource>,
    pub git: Arc<dyn GitProbe>,
    pub factory: Arc<dyn WrapperFactory>,
}

/// One row of `qagate tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolListing {
    pub id: String,
    pub dimensions: Vec<Dimension>,
    pub scopes: Vec<String>,
    pub fast: bool,
    pub fixes: bool,
    pub disabled: bool,
    /// Absent for disabled tools, which are never probed.
    pub availability: Option<Availability>,
}

pub struct Orchestrator {
    root: PathBuf,
    config: Arc<QaConfig>,
    registry: Arc<ToolRegistry>,
    files: Arc<dyn FileSource>,
    git: Arc<dyn GitProbe>,
    factory: Arc<dyn WrapperFactory>,
    controller: ExecutionController,
}

impl Orchestrator {
    /// Orchestrator backed by the filesystem, `git` and real child processes.
    pub fn new(root: impl Into<PathBuf>, config: QaConfig) -> Result<Self> {
        let root = root.into();
        let config = Arc::new(config);
        let parts = OrchestratorParts {
            registry: Arc::new(ToolRegistry::from_config(&config)?),
            files: Arc::new(WalkdirFileSource::new(&config.run.exclude)?),
            git: Arc::new(CommandGitProbe),
            factory: Arc::new(CommandWrapperFactory::new(config.clone(), root.clone())),
        };
        Ok(Self::with_parts(root, config, parts))
    }

    pub fn with_parts(root: impl Into<PathBuf>, config: Arc<QaConfig>, parts: OrchestratorParts) -> Self {
        let controller =
            ExecutionController::new(config.clone(), parts.registry.clone(), parts.factory.clone());
        Self {
            root: root.into(),
            config,
            registry: parts.registry,
            files: parts.files,
            git: parts.git,
            factory: parts.factory,
            controller,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Collect the file set and git metadata for a request off the runtime.
    pub async fn workspace(&self, request: &ExecutionRequest) -> Result<Workspace> {
        let root = self.root.clone();
        let files = self.files.clone();
        let git = self.git.clone();
        let explicit = request.files.clone();
        let changed_only = request.changed_only;
        let base_ref = self.config.run.base_ref.clone();
        tokio::task::spawn_blocking(move || {
            collect_workspace(
                &root,
                files.as_ref(),
                git.as_ref(),
                &WorkspaceQuery {
                    explicit_files: &explicit,
                    changed_only,
                    base_ref: base_ref.as_deref(),
                },
            )
        })
        .await
        .map_err(|e| QaError::Internal(format!("workspace scan failed: {e}")))?
    }

    /// Scopes active for the whole tree.
    pub async fn detect_scopes(&self) -> Result<BTreeSet<String>> {
        let request = ExecutionRequest::new(Default::default())?;
        let workspace = self.workspace(&request).await?;
        Ok(detect(
            &workspace.files,
            workspace.git.as_ref(),
            &self.config.scope_defs(),
        ))
    }

    /// Execute one run end to end.
    pub async fn execute(&self, request: &ExecutionRequest, cancel: CancelSignal) -> Result<Report> {
        let run_id = Uuid::new_v4();
        let span = run_span(&run_id.to_string());
        self.execute_inner(run_id, request, cancel)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        run_id: Uuid,
        request: &ExecutionRequest,
        cancel: CancelSignal,
    ) -> Result<Report> {
        let run_id_str = run_id.to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        let workspace = self.workspace(request).await?;
        info!(files = workspace.files.len(), "workspace collected");

        let plan = self.controller.plan(request, &workspace)?;
        emit_run_started(
            &run_id_str,
            &request.digest,
            request.mode.as_str(),
            plan.resolution.tools.len(),
        );

        let outcome = self
            .controller
            .execute(plan, request, &workspace, cancel)
            .await?;
        if outcome.interrupted {
            emit_run_interrupted(&run_id_str);
        }

        let report = aggregate(
            AggregationInput {
                run_id,
                request,
                scopes: outcome.plan.scope_names(),
                uncovered: &outcome.plan.resolution.uncovered,
                git_sha: workspace.git.as_ref().and_then(|g| g.head_sha.clone()),
                started_at,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            outcome.results,
        )?;

        emit_run_finished(
            &run_id_str,
            report.duration_ms,
            report.overall,
            report.results.len(),
        );
        Ok(report)
    }

    /// Every registered tool with its availability, probed concurrently.
    pub async fn tool_listing(&self) -> Vec<ToolListing> {
        let probes = self.registry.tools().map(|tool| {
            let disabled = self.registry.is_disabled(&tool.id);
            let wrapper = self.factory.create(tool);
            async move {
                let availability = if disabled {
                    None
                } else {
                    Some(wrapper.availability(&CancelSignal::never()).await)
                };
                ToolListing {
                    id: tool.id.clone(),
                    dimensions: tool.dimensions.clone(),
                    scopes: tool.scopes.clone(),
                    fast: tool.fast,
                    fixes: tool.fix_command.is_some(),
                    disabled,
                    availability,
                }
            }
        });
        join_all(probes).await
    }
}
