//! Tool descriptors: the static, immutable catalog record for one external tool.

use serde::{Deserialize, Serialize};

use super::dimension::Dimension;
use super::severity::SeverityMap;

/// Placeholder expanded to the invocation's file list.
pub const FILES_PLACEHOLDER: &str = "{files}";

/// Placeholder expanded to the repository root.
pub const ROOT_PLACEHOLDER: &str = "{root}";

/// How a tool's output is turned into findings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// No structured output; a non-zero exit is one failure finding.
    ExitCode,
    /// `file:line[:col]: severity: message` or `file(line,col): severity CODE: message`.
    LineDiagnostic,
    /// One offending file per line (formatter check listings).
    FileList,
    /// `eslint --format json`.
    EslintJson,
    /// `ruff check --output-format json`.
    RuffJson,
    /// `cargo --message-format json` compiler messages.
    CargoJson,
    /// `bandit -f json`.
    BanditJson,
    /// `lizard --csv`, classified against configured thresholds.
    LizardCsv,
}

/// Static description of a supported tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToolDescriptor {
    /// Unique tool id (e.g. "eslint").
    pub id: String,

    /// Dimensions this tool satisfies.
    pub dimensions: Vec<Dimension>,

    /// File extensions (without the dot) this tool accepts.
    pub extensions: Vec<String>,

    /// Scopes this tool is compatible with.
    pub scopes: Vec<String>,

    /// Check-mode invocation template; first element is the executable.
    pub command: Vec<String>,

    /// Fix-mode invocation template, for tools that can rewrite files.
    #[serde(default)]
    pub fix_command: Option<Vec<String>>,

    /// Command that succeeds when the tool is installed and callable.
    pub availability: Vec<String>,

    /// Lightweight enough for `fast` mode.
    #[serde(default)]
    pub fast: bool,

    /// Output parser.
    pub parser: ParserKind,

    /// Raw severity token to band mapping.
    #[serde(default)]
    pub severity: SeverityMap,

    /// Default timeout for this tool, overriding the run default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolDescriptor {
    /// Create a descriptor whose availability check is `<program> --version`.
    pub fn new(id: &str, command: &[&str], parser: ParserKind) -> Self {
        let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        let availability = command
            .first()
            .map(|program| vec![program.clone(), "--version".to_string()])
            .unwrap_or_default();
        Self {
            id: id.to_string(),
            dimensions: Vec::new(),
            extensions: Vec::new(),
            scopes: Vec::new(),
            command,
            fix_command: None,
            availability,
            fast: false,
            parser,
            severity: SeverityMap::new(),
            timeout_secs: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: &[Dimension]) -> Self {
        self.dimensions = dimensions.to_vec();
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_fix_command(mut self, command: &[&str]) -> Self {
        self.fix_command = Some(command.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_availability(mut self, command: &[&str]) -> Self {
        self.availability = command.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_severity(mut self, severity: SeverityMap) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn fast(mut self) -> Self {
        self.fast = true;
        self
    }

    /// Executable named by the check template.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Whether the check template receives the file list.
    pub fn takes_files(&self) -> bool {
        self.command.iter().any(|arg| arg == FILES_PLACEHOLDER)
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn satisfies(&self, dimension: Dimension) -> bool {
        self.dimensions.contains(&dimension)
    }

    /// Structural validation applied at registration time.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("tool id cannot be empty".to_string());
        }
        if self.command.is_empty() {
            return Err(format!("tool '{}' has an empty command", self.id));
        }
        if self.availability.is_empty() {
            return Err(format!("tool '{}' has an empty availability check", self.id));
        }
        if self.dimensions.is_empty() {
            return Err(format!("tool '{}' declares no dimension", self.id));
        }
        if self.extensions.is_empty() {
            return Err(format!("tool '{}' declares no file extension", self.id));
        }
        if self.scopes.is_empty() {
            return Err(format!("tool '{}' declares no scope", self.id));
        }
        if matches!(&self.fix_command, Some(cmd) if cmd.is_empty()) {
            return Err(format!("tool '{}' has an empty fix command", self.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruff() -> ToolDescriptor {
        ToolDescriptor::new(
            "ruff",
            &["ruff", "check", "--output-format", "json", "{files}"],
            ParserKind::RuffJson,
        )
        .with_dimensions(&[Dimension::Lint])
        .with_extensions(&["py"])
        .with_scopes(&["backend"])
        .fast()
    }

    #[test]
    fn test_defaults_availability_to_version_flag() {
        let tool = ruff();
        assert_eq!(tool.availability, vec!["ruff", "--version"]);
        assert_eq!(tool.program(), Some("ruff"));
        assert!(tool.fast);
    }

    #[test]
    fn test_takes_files() {
        assert!(ruff().takes_files());
        let pytest = ToolDescriptor::new("pytest", &["pytest", "-q"], ParserKind::ExitCode);
        assert!(!pytest.takes_files());
    }

    #[test]
    fn test_validate_rejects_incomplete_descriptors() {
        assert!(ruff().validate().is_ok());

        let no_dims = ruff().with_dimensions(&[]);
        assert!(no_dims.validate().unwrap_err().contains("no dimension"));

        let no_scopes = ruff().with_scopes(&[]);
        assert!(no_scopes.validate().unwrap_err().contains("no scope"));
    }

    #[test]
    fn test_deserialize_custom_tool() {
        let toml_src = r#"
            id = "my-check"
            dimensions = ["lint", "design-metrics"]
            extensions = ["ts"]
            scopes = ["frontend"]
            command = ["my-check", "{files}"]
            availability = ["my-check", "--version"]
            parser = "line_diagnostic"
            severity = { warning = "yellow" }
        "#;
        let tool: ToolDescriptor = toml::from_str(toml_src).expect("deserialize");
        assert_eq!(
            tool.dimensions,
            vec![Dimension::Lint, Dimension::DesignMetrics]
        );
        assert_eq!(tool.parser, ParserKind::LineDiagnostic);
        assert!(!tool.fast);
        assert!(tool.validate().is_ok());
    }
}
