//! Normalized findings produced by tool wrappers.

use serde::{Deserialize, Serialize};

use super::severity::Band;

/// A single normalized finding from tool output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    /// Source file path (relative to the repository root when possible).
    pub file: Option<String>,

    /// Line number (1-indexed).
    pub line: Option<u32>,

    /// Human-readable message.
    pub message: String,

    /// Severity token exactly as the tool emitted it.
    pub raw_severity: String,

    /// Band the token was mapped to.
    pub band: Band,

    /// Rule or lint code (e.g. "no-unused-vars", "F401").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Finding {
    /// Create a new finding without location.
    pub fn new(message: impl Into<String>, raw_severity: impl Into<String>, band: Band) -> Self {
        Self {
            file: None,
            line: None,
            message: message.into(),
            raw_severity: raw_severity.into(),
            band,
            code: None,
        }
    }

    /// Set the file (and optionally line) location.
    pub fn with_location(mut self, file: impl Into<String>, line: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }

    /// Set the rule code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// `path:line` or just `path`, if known.
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_builder() {
        let finding = Finding::new("unused import", "F", Band::Red)
            .with_location("svc/app.py", Some(3))
            .with_code("F401");
        assert_eq!(finding.location().as_deref(), Some("svc/app.py:3"));
        assert_eq!(finding.code.as_deref(), Some("F401"));
        assert_eq!(finding.band, Band::Red);
    }

    #[test]
    fn test_location_without_line() {
        let finding = Finding::new("unformatted", "unformatted", Band::Red)
            .with_location("web/a.ts", None);
        assert_eq!(finding.location().as_deref(), Some("web/a.ts"));
        assert!(Finding::new("x", "y", Band::Green).location().is_none());
    }
}
