//! Validation dimensions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RequestError;

/// A category of quality check. Every tool declares the dimensions it satisfies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Format,
    Lint,
    Test,
    Build,
    Security,
    DesignMetrics,
    DataCompatibility,
}

impl Dimension {
    /// Every dimension, in report order.
    pub const ALL: [Dimension; 7] = [
        Dimension::Format,
        Dimension::Lint,
        Dimension::Test,
        Dimension::Build,
        Dimension::Security,
        Dimension::DesignMetrics,
        Dimension::DataCompatibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Format => "format",
            Dimension::Lint => "lint",
            Dimension::Test => "test",
            Dimension::Build => "build",
            Dimension::Security => "security",
            Dimension::DesignMetrics => "design-metrics",
            Dimension::DataCompatibility => "data-compatibility",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "format" | "fmt" => Ok(Dimension::Format),
            "lint" => Ok(Dimension::Lint),
            "test" => Ok(Dimension::Test),
            "build" => Ok(Dimension::Build),
            "security" => Ok(Dimension::Security),
            "design-metrics" | "metrics" => Ok(Dimension::DesignMetrics),
            "data-compatibility" | "data" => Ok(Dimension::DataCompatibility),
            _ => Err(RequestError::UnknownDimension(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_aliases() {
        assert_eq!("fmt".parse::<Dimension>().unwrap(), Dimension::Format);
        assert_eq!(
            "design_metrics".parse::<Dimension>().unwrap(),
            Dimension::DesignMetrics
        );
        assert_eq!(
            " Data-Compatibility ".parse::<Dimension>().unwrap(),
            Dimension::DataCompatibility
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "style".parse::<Dimension>().unwrap_err();
        assert!(err.to_string().contains("style"));
    }

    #[test]
    fn test_display_matches_serde() {
        for dim in Dimension::ALL {
            let json = serde_json::to_string(&dim).expect("serialize");
            assert_eq!(json, format!("\"{dim}\""));
        }
    }
}
