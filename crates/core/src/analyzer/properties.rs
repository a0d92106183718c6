//! Properties analyzer.

use super::{run, AnalysisOptions, Analyzer, FormatRules};
use crate::errors::ParseError;
use crate::models::{ChangeClassification, FileChange, Insight};
use crate::structure::properties;

/// Compares `(key, value)` multisets; key order and comments are cosmetic.
#[derive(Debug, Clone, Default)]
pub struct PropertiesAnalyzer {
    options: AnalysisOptions,
}

impl PropertiesAnalyzer {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }
}

impl FormatRules for PropertiesAnalyzer {
    fn structural_insights(&self, before: &str, after: &str) -> Result<Vec<Insight>, ParseError> {
        let before = properties::parse(before)?;
        let after = properties::parse(after)?;
        Ok(properties::compare(&before, &after))
    }

    fn is_comment_line(&self, line: &str) -> bool {
        let line = line.trim_start();
        line.starts_with('#') || line.starts_with('!')
    }
}

impl Analyzer for PropertiesAnalyzer {
    fn name(&self) -> &'static str {
        "properties"
    }

    fn analyze(&self, change: &FileChange) -> ChangeClassification {
        run(change, self.name(), Some(self), &self.options)
    }
}
