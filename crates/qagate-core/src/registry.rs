//! Tool registry: the catalog of descriptors and the resolution of a request
//! into the set of tools to run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::catalog;
use crate::config::QaConfig;
use crate::domain::{
    Dimension, Mode, QaError, Result, RunKind, ScopeDef, ToolDescriptor,
};

/// In-memory tool catalog keyed by id. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
    disabled: BTreeSet<String>,
}

/// Inputs to [`ToolRegistry::resolve`].
#[derive(Debug, Clone, Copy)]
pub struct ResolveQuery<'a> {
    pub dimensions: &'a [Dimension],
    /// Definitions of the active scopes.
    pub scopes: &'a [ScopeDef],
    pub mode: Mode,
    pub kind: RunKind,
    /// Explicit tool overrides; empty means no restriction.
    pub overrides: &'a [String],
}

/// One tool selected for a run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedTool {
    pub descriptor: ToolDescriptor,
    /// Requested dimensions this tool covers.
    pub dimensions: Vec<Dimension>,
    /// Active scopes this tool is compatible with.
    pub scopes: Vec<String>,
}

impl ResolvedTool {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

/// Output of resolution.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Resolution {
    /// Selected tools, sorted by id.
    pub tools: Vec<ResolvedTool>,
    /// Requested dimensions no selected tool covers.
    pub uncovered: Vec<Dimension>,
    /// Whether dimensions without an attempted tool fail the run.
    pub fail_closed: bool,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every builtin tool.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for tool in catalog::builtin_tools() {
            registry.tools.insert(tool.id.clone(), tool);
        }
        registry
    }

    /// Builtin tools plus configured custom tools, with configured disables.
    ///
    /// Every `[tools.<id>]` table must name a registered tool.
    pub fn from_config(config: &QaConfig) -> Result<Self> {
        let mut registry = Self::builtin();
        for tool in &config.custom_tools {
            registry.register(tool.clone())?;
        }
        for (id, settings) in &config.tools {
            if !registry.tools.contains_key(id) {
                return Err(QaError::Configuration(format!(
                    "[tools.{id}] configures an unknown tool"
                )));
            }
            if settings.disabled {
                registry.disabled.insert(id.clone());
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: ToolDescriptor) -> Result<()> {
        tool.validate().map_err(QaError::Configuration)?;
        if self.tools.contains_key(&tool.id) {
            return Err(QaError::DuplicateTool(tool.id));
        }
        self.tools.insert(tool.id.clone(), tool);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ToolDescriptor> {
        self.tools.get(id)
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.contains(id)
    }

    /// All descriptors, sorted by id.
    pub fn tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Select the tools for a request. Pure: depends only on the registry
    /// and the query.
    ///
    /// Every compatible tool for a dimension runs; `fast` keeps only
    /// fast-eligible tools unless tools were named explicitly. Fix runs only
    /// select tools with a fix template.
    pub fn resolve(&self, query: &ResolveQuery<'_>) -> Result<Resolution> {
        for id in query.overrides {
            if !self.tools.contains_key(id) {
                return Err(QaError::UnknownTool(id.clone()));
            }
            if self.is_disabled(id) {
                return Err(QaError::Configuration(format!(
                    "tool {id} is disabled in configuration"
                )));
            }
        }
        let explicit = !query.overrides.is_empty();

        let mut tools = Vec::new();
        for tool in self.tools.values() {
            if self.is_disabled(&tool.id) {
                continue;
            }
            if explicit && !query.overrides.iter().any(|id| id == &tool.id) {
                continue;
            }
            if query.mode == Mode::Fast && !explicit && !tool.fast {
                continue;
            }
            if query.kind == RunKind::Fix && tool.fix_command.is_none() {
                continue;
            }

            let dimensions: Vec<Dimension> = query
                .dimensions
                .iter()
                .copied()
                .filter(|d| tool.satisfies(*d))
                .collect();
            if dimensions.is_empty() {
                continue;
            }

            let scopes: Vec<String> = query
                .scopes
                .iter()
                .filter(|scope| scope.admits(tool))
                .map(|scope| scope.name.clone())
                .collect();
            if scopes.is_empty() {
                if explicit {
                    tracing::warn!(tool = %tool.id, "requested tool fits no active scope");
                }
                continue;
            }

            tools.push(ResolvedTool {
                descriptor: tool.clone(),
                dimensions,
                scopes,
            });
        }

        let covered: BTreeSet<Dimension> = tools
            .iter()
            .flat_map(|t| t.dimensions.iter().copied())
            .collect();
        let uncovered = query
            .dimensions
            .iter()
            .copied()
            .filter(|d| !covered.contains(d))
            .collect();

        Ok(Resolution {
            tools,
            uncovered,
            fail_closed: query.mode.is_fail_closed(),
        })
    }
}
