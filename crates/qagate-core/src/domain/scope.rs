//! Scope definitions: named partitions of a repository by stack.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tool::ToolDescriptor;

/// Definition of a scope and the predicates that activate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScopeDef {
    /// Scope name (e.g. "frontend").
    pub name: String,

    /// File extensions (without the dot) owned by this scope.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Marker file names whose presence activates the scope.
    #[serde(default)]
    pub markers: Vec<String>,

    /// Branch name prefixes that activate the scope.
    #[serde(default)]
    pub branch_prefixes: Vec<String>,

    /// Optional tool allow-list. Empty admits every compatible tool.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ScopeDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extensions: Vec::new(),
            markers: Vec::new(),
            branch_prefixes: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_markers(mut self, markers: &[&str]) -> Self {
        self.markers = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_branch_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.branch_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn owns_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Whether a file belongs to this scope by extension.
    pub fn owns_file(&self, path: &Path) -> bool {
        file_extension(path).is_some_and(|ext| self.owns_extension(&ext))
    }

    /// Whether a file is one of this scope's marker files.
    pub fn is_marker(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.markers.iter().any(|m| m == name))
    }

    pub fn matches_branch(&self, branch: &str) -> bool {
        self.branch_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && branch.starts_with(prefix.as_str()))
    }

    /// Tool/scope compatibility.
    ///
    /// The tool must list this scope, the scope's allow-list (if any) must
    /// admit the tool, and the scope's extensions must intersect the tool's.
    pub fn admits(&self, tool: &ToolDescriptor) -> bool {
        if !tool.scopes.iter().any(|s| s == &self.name) {
            return false;
        }
        if !self.tools.is_empty() && !self.tools.iter().any(|t| t == &tool.id) {
            return false;
        }
        tool.extensions.iter().any(|ext| self.owns_extension(ext))
    }
}

/// Lowercased extension of a path, without the dot.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
