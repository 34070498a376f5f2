//! Sheet selectors
//!
//! Producers name their first sheet differently ("Sheet1", "Sheet 1",
//! "工作表1", ...), so reads probe an ordered list of selectors instead of
//! requiring the exact name up front.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy for picking one sheet of a workbook
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetSelector {
    ByName(String),
    /// Zero-based position
    ByIndex(usize),
    /// Whatever the engine reads when no sheet is named
    Default,
}

impl FromStr for SheetSelector {
    type Err = PipelineError;

    /// `default` → Default, `#N` → ByIndex(N), anything else → ByName.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PipelineError::Config("empty sheet selector".to_string()));
        }
        if s.eq_ignore_ascii_case("default") {
            return Ok(SheetSelector::Default);
        }
        if let Some(index) = s.strip_prefix('#') {
            return index
                .parse()
                .map(SheetSelector::ByIndex)
                .map_err(|_| PipelineError::Config(format!("invalid sheet index `{}`", s)));
        }
        Ok(SheetSelector::ByName(s.to_string()))
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::ByName(name) => write!(f, "'{}'", name),
            SheetSelector::ByIndex(index) => write!(f, "#{}", index),
            SheetSelector::Default => write!(f, "default"),
        }
    }
}

/// Ordered selectors, consumed by one read attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetCandidates(Vec<SheetSelector>);

impl SheetCandidates {
    pub fn new(selectors: Vec<SheetSelector>) -> Self {
        Self(selectors)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for SheetCandidates {
    type Item = SheetSelector;
    type IntoIter = std::vec::IntoIter<SheetSelector>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<SheetSelector> for SheetCandidates {
    fn from_iter<I: IntoIterator<Item = SheetSelector>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Why one selector did not produce a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub selector: SheetSelector,
    pub reason: String,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.selector, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selectors() {
        assert_eq!("default".parse::<SheetSelector>().unwrap(), SheetSelector::Default);
        assert_eq!("DEFAULT".parse::<SheetSelector>().unwrap(), SheetSelector::Default);
        assert_eq!("#2".parse::<SheetSelector>().unwrap(), SheetSelector::ByIndex(2));
        assert_eq!(
            " Sheet 1 ".parse::<SheetSelector>().unwrap(),
            SheetSelector::ByName("Sheet 1".to_string())
        );
        assert!("#two".parse::<SheetSelector>().is_err());
        assert!("  ".parse::<SheetSelector>().is_err());
    }

    #[test]
    fn test_candidates_keep_order() {
        let candidates: SheetCandidates = ["Sheet1", "#0", "default"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let rendered: Vec<String> = candidates.into_iter().map(|s| s.to_string()).collect();
        assert_eq!(rendered, vec!["'Sheet1'", "#0", "default"]);
    }
}
