//! Severity bands and per-tool token mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Normalized severity band. Ordered so that `max` yields the worst band.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    /// Pass or informational.
    #[default]
    Green,
    /// Warning.
    Yellow,
    /// Error or blocking.
    Red,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Green => "green",
            Band::Yellow => "yellow",
            Band::Red => "red",
        }
    }

    /// Worst band of an iterator, `Green` when empty.
    pub fn worst<I: IntoIterator<Item = Band>>(bands: I) -> Band {
        bands.into_iter().max().unwrap_or(Band::Green)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Band::Green),
            "yellow" => Ok(Band::Yellow),
            "red" => Ok(Band::Red),
            other => Err(format!("unknown severity band: {other}")),
        }
    }
}

/// Mapping from a tool's raw severity tokens to bands.
///
/// Lookup is case-insensitive. Tokens without an entry classify as
/// [`Band::Red`], so the mapping is total and fails safe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SeverityMap(BTreeMap<String, Band>);

impl SeverityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str, band: Band) {
        self.0.insert(token.to_ascii_lowercase(), band);
    }

    /// Overlay `other` on top of `self`; entries in `other` win.
    pub fn merged(&self, other: &SeverityMap) -> SeverityMap {
        let mut out = SeverityMap::new();
        for (token, band) in self.0.iter().chain(other.0.iter()) {
            out.insert(token, *band);
        }
        out
    }

    pub fn classify(&self, token: &str) -> Band {
        let key = token.trim().to_ascii_lowercase();
        if let Some(band) = self.0.get(&key) {
            return *band;
        }
        // Maps deserialized from config may carry mixed-case keys.
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
            .map(|(_, band)| *band)
            .unwrap_or(Band::Red)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, Band); N]> for SeverityMap {
    fn from(entries: [(&str, Band); N]) -> Self {
        let mut map = SeverityMap::new();
        for (token, band) in entries {
            map.insert(token, band);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_ordering() {
        assert!(Band::Green < Band::Yellow);
        assert!(Band::Yellow < Band::Red);
        assert_eq!(Band::worst([Band::Yellow, Band::Green]), Band::Yellow);
        assert_eq!(Band::worst(Vec::new()), Band::Green);
    }

    #[test]
    fn test_unmapped_token_is_red() {
        let map = SeverityMap::from([("warning", Band::Yellow), ("note", Band::Green)]);
        assert_eq!(map.classify("warning"), Band::Yellow);
        assert_eq!(map.classify("NOTE"), Band::Green);
        assert_eq!(map.classify("catastrophe"), Band::Red);
        assert_eq!(SeverityMap::new().classify(""), Band::Red);
    }

    #[test]
    fn test_merged_overrides_win() {
        let base = SeverityMap::from([("1", Band::Yellow), ("2", Band::Red)]);
        let overrides = SeverityMap::from([("1", Band::Red)]);
        let merged = base.merged(&overrides);
        assert_eq!(merged.classify("1"), Band::Red);
        assert_eq!(merged.classify("2"), Band::Red);
    }

    #[test]
    fn test_deserialized_keys_are_case_insensitive() {
        let map: SeverityMap = serde_json::from_str(r#"{"Warning":"yellow"}"#).unwrap();
        assert_eq!(map.classify("warning"), Band::Yellow);
    }
}
