//! `qagate.toml` configuration.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (applied via [`QaConfig::apply_overrides`])
//! 2. Project config (`qagate.toml` in the repository root, or `--config`)
//! 3. Compiled defaults
//!
//! The resolved config is immutable for the rest of the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::domain::{Band, QaError, Result, ScopeDef, SeverityMap, ToolDescriptor};

/// Config file name looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = "qagate.toml";

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_CAPTURE_BYTES: usize = 64 * 1024;

/// Directories never scanned unless the config replaces the exclude list.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/.venv/**",
    "**/__pycache__/**",
];

/// `[run]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// Parallel tool slots. `None` means one per CPU.
    pub jobs: Option<usize>,
    pub default_timeout_secs: u64,
    pub fail_on_yellow: bool,
    /// Bytes of stdout/stderr kept per stream.
    pub capture_bytes: usize,
    /// Glob patterns excluded from file enumeration.
    pub exclude: Vec<String>,
    /// Base ref for `--changed-only` diffs.
    pub base_ref: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            jobs: None,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            fail_on_yellow: false,
            capture_bytes: DEFAULT_CAPTURE_BYTES,
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            base_ref: None,
        }
    }
}

/// `[tools.<id>]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Executable path override, relative to the repository root or absolute.
    pub path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    /// Extra arguments inserted before the file list.
    pub args: Vec<String>,
    pub disabled: bool,
    /// Severity overrides layered over the descriptor's map.
    pub severity: SeverityMap,
}

/// `[thresholds.<metric>]` table. Values strictly above a cutoff reach its band.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Threshold {
    pub yellow: Option<f64>,
    pub red: Option<f64>,
}

impl Threshold {
    pub fn classify(&self, value: f64) -> Band {
        if self.red.is_some_and(|red| value > red) {
            Band::Red
        } else if self.yellow.is_some_and(|yellow| value > yellow) {
            Band::Yellow
        } else {
            Band::Green
        }
    }
}

/// CLI flags that override file configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub fail_on_yellow: Option<bool>,
}

/// Complete qagate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QaConfig {
    pub run: RunSettings,
    pub tools: BTreeMap<String, ToolSettings>,
    pub thresholds: BTreeMap<String, Threshold>,
    /// Replaces the builtin scope definitions when non-empty.
    pub scopes: Vec<ScopeDef>,
    pub custom_tools: Vec<ToolDescriptor>,
}

impl QaConfig {
    /// Load configuration for a repository.
    ///
    /// An explicit path must exist. Without one, `qagate.toml` in `root` is
    /// used when present, otherwise compiled defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                };
                if !path.is_file() {
                    return Err(QaError::Configuration(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::load(&path)
            }
            None => {
                let path = root.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::load(&path)
                } else {
                    tracing::debug!(root = %root.display(), "no qagate.toml, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QaError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: QaConfig = toml::from_str(&content).map_err(|source| QaError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QaConfig = toml::from_str(content).map_err(|source| QaError::ConfigParse {
            path: PathBuf::from("<string>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.jobs == Some(0) {
            return Err(invalid("run.jobs", "must be greater than 0"));
        }
        if self.run.default_timeout_secs == 0 {
            return Err(invalid("run.default_timeout_secs", "must be greater than 0"));
        }
        if self.run.capture_bytes == 0 {
            return Err(invalid("run.capture_bytes", "must be greater than 0"));
        }
        for pattern in &self.run.exclude {
            Glob::new(pattern)
                .map_err(|e| invalid("run.exclude", &format!("bad glob {pattern:?}: {e}")))?;
        }
        for (id, settings) in &self.tools {
            if settings.timeout_secs == Some(0) {
                return Err(invalid(
                    &format!("tools.{id}.timeout_secs"),
                    "must be greater than 0",
                ));
            }
        }
        for (metric, threshold) in &self.thresholds {
            let field = format!("thresholds.{metric}");
            if threshold.yellow.is_some_and(|v| !v.is_finite())
                || threshold.red.is_some_and(|v| !v.is_finite())
            {
                return Err(invalid(&field, "values must be finite"));
            }
            if let (Some(yellow), Some(red)) = (threshold.yellow, threshold.red) {
                if yellow > red {
                    return Err(invalid(&field, "yellow must not exceed red"));
                }
            }
        }
        let mut names = std::collections::BTreeSet::new();
        for scope in &self.scopes {
            if scope.name.trim().is_empty() {
                return Err(invalid("scopes", "scope name cannot be empty"));
            }
            if !names.insert(scope.name.as_str()) {
                return Err(invalid("scopes", &format!("duplicate scope {}", scope.name)));
            }
        }
        for tool in &self.custom_tools {
            tool.validate()
                .map_err(|message| invalid("custom_tools", &message))?;
        }
        Ok(())
    }

    /// Apply CLI overrides on top of the file configuration.
    pub fn apply_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(jobs) = overrides.jobs {
            self.run.jobs = Some(jobs);
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.run.default_timeout_secs = timeout;
        }
        if let Some(fail_on_yellow) = overrides.fail_on_yellow {
            self.run.fail_on_yellow = fail_on_yellow;
        }
        self.validate()?;
        Ok(self)
    }

    /// Parallel slots for this run.
    pub fn effective_jobs(&self) -> usize {
        self.run.jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Timeout for a tool: tool setting, then descriptor default, then run default.
    pub fn timeout_for(&self, tool: &ToolDescriptor) -> Duration {
        let secs = self
            .tools
            .get(&tool.id)
            .and_then(|s| s.timeout_secs)
            .or(tool.timeout_secs)
            .unwrap_or(self.run.default_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Effective severity map for a tool.
    pub fn severity_for(&self, tool: &ToolDescriptor) -> SeverityMap {
        match self.tools.get(&tool.id) {
            Some(settings) if !settings.severity.is_empty() => {
                tool.severity.merged(&settings.severity)
            }
            _ => tool.severity.clone(),
        }
    }

    pub fn tool_settings(&self, id: &str) -> Option<&ToolSettings> {
        self.tools.get(id)
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.tools.get(id).is_some_and(|s| s.disabled)
    }

    /// Configured scopes, or the builtin ones when none are configured.
    pub fn scope_defs(&self) -> Vec<ScopeDef> {
        if self.scopes.is_empty() {
            catalog::default_scopes()
        } else {
            self.scopes.clone()
        }
    }
}

fn invalid(field: &str, message: &str) -> QaError {
    QaError::Configuration(format!("{field}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dimension, ParserKind};

    const SAMPLE: &str = r#"
[run]
jobs = 4
fail_on_yellow = true
exclude = ["vendor/**"]

[tools.eslint]
path = "node_modules/.bin/eslint"
timeout_secs = 120
args = ["--max-warnings", "0"]
severity = { "1" = "red" }

[tools.bandit]
disabled = true

[thresholds.ccn]
yellow = 10.0
red = 20.0

[[scopes]]
name = "web"
extensions = ["ts"]
markers = ["package.json"]

[[custom_tools]]
id = "my-check"
dimensions = ["lint"]
extensions = ["ts"]
scopes = ["web"]
command = ["my-check", "{files}"]
availability = ["my-check", "--version"]
parser = "line_diagnostic"
fast = true
"#;

    fn eslint() -> ToolDescriptor {
        ToolDescriptor::new("eslint", &["eslint", "{files}"], ParserKind::EslintJson)
            .with_dimensions(&[Dimension::Lint])
            .with_extensions(&["ts"])
            .with_scopes(&["frontend"])
            .with_severity(SeverityMap::from([("1", Band::Yellow), ("2", Band::Red)]))
            .with_timeout(300)
    }

    #[test]
    fn test_defaults() {
        let config = QaConfig::default();
        assert_eq!(config.run.default_timeout_secs, 600);
        assert_eq!(config.run.capture_bytes, 65536);
        assert!(!config.run.fail_on_yellow);
        assert!(config.effective_jobs() >= 1);
        assert!(config.scope_defs().iter().any(|s| s.name == "frontend"));
    }

    #[test]
    fn test_parse_sample() {
        let config = QaConfig::from_toml_str(SAMPLE).expect("parse");
        assert_eq!(config.effective_jobs(), 4);
        assert!(config.run.fail_on_yellow);
        assert!(config.is_disabled("bandit"));
        assert!(!config.is_disabled("eslint"));
        assert_eq!(config.scope_defs().len(), 1);
        assert_eq!(config.custom_tools[0].id, "my-check");
        assert_eq!(
            config.thresholds.get("ccn").map(|t| t.classify(15.0)),
            Some(Band::Yellow)
        );
    }

    #[test]
    fn test_timeout_precedence() {
        let tool = eslint();
        let config = QaConfig::default();
        assert_eq!(config.timeout_for(&tool), Duration::from_secs(300));

        let config = QaConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.timeout_for(&tool), Duration::from_secs(120));

        let plain = ToolDescriptor::new("x", &["x"], ParserKind::ExitCode);
        assert_eq!(config.timeout_for(&plain), Duration::from_secs(600));
    }

    #[test]
    fn test_severity_overrides_layer_over_descriptor() {
        let config = QaConfig::from_toml_str(SAMPLE).unwrap();
        let map = config.severity_for(&eslint());
        assert_eq!(map.classify("1"), Band::Red);
        assert_eq!(map.classify("2"), Band::Red);
        assert_eq!(QaConfig::default().severity_for(&eslint()).classify("1"), Band::Yellow);
    }

    #[test]
    fn test_threshold_cutoffs_are_strict() {
        let threshold = Threshold {
            yellow: Some(10.0),
            red: Some(20.0),
        };
        assert_eq!(threshold.classify(10.0), Band::Green);
        assert_eq!(threshold.classify(10.5), Band::Yellow);
        assert_eq!(threshold.classify(20.0), Band::Yellow);
        assert_eq!(threshold.classify(21.0), Band::Red);
        assert_eq!(Threshold::default().classify(1e9), Band::Green);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = QaConfig::from_toml_str("[run]\njobs = 0\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("run.jobs"));

        let err = QaConfig::from_toml_str("[thresholds.ccn]\nyellow = 30.0\nred = 20.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("yellow must not exceed red"));

        let err =
            QaConfig::from_toml_str("[[scopes]]\nname = \"a\"\n[[scopes]]\nname = \"a\"\n")
                .unwrap_err();
        assert!(err.to_string().contains("duplicate scope"));
    }

    #[test]
    fn test_unknown_keys_are_parse_errors() {
        let err = QaConfig::from_toml_str("[run]\nthreads = 3\n").unwrap_err();
        assert!(matches!(err, QaError::ConfigParse { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_overrides_win() {
        let config = QaConfig::from_toml_str(SAMPLE)
            .unwrap()
            .apply_overrides(&ConfigOverrides {
                jobs: Some(2),
                timeout_secs: Some(30),
                fail_on_yellow: Some(false),
            })
            .unwrap();
        assert_eq!(config.effective_jobs(), 2);
        assert_eq!(config.run.default_timeout_secs, 30);
        assert!(!config.run.fail_on_yellow);

        let err = QaConfig::default()
            .apply_overrides(&ConfigOverrides {
                jobs: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        let config = QaConfig::discover(dir.path(), None).unwrap();
        assert_eq!(config, QaConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[run]\njobs = 3\n").unwrap();
        let config = QaConfig::discover(dir.path(), None).unwrap();
        assert_eq!(config.run.jobs, Some(3));

        let err = QaConfig::discover(dir.path(), Some(Path::new("missing.toml"))).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
