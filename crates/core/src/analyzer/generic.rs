//! Line-diff analyzer for files without a structural parser.

use super::{run, AnalysisOptions, Analyzer};
use crate::models::{ChangeClassification, FileChange};

/// Classifies by line diff alone. Its verdicts are limited to `Semantic`,
/// `FormattingOnly`, `Moved` and `Unchanged` (plus `Conflict`).
#[derive(Debug, Clone, Default)]
pub struct GenericAnalyzer {
    options: AnalysisOptions,
}

impl GenericAnalyzer {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }
}

impl Analyzer for GenericAnalyzer {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn analyze(&self, change: &FileChange) -> ChangeClassification {
        run(change, self.name(), None, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, InsightKind};

    #[test]
    fn test_identical_content_is_unchanged() {
        let change = FileChange::modified("notes.txt", "one\ntwo\n", "one\ntwo\n");
        let verdict = GenericAnalyzer::default().analyze(&change);
        assert_eq!(verdict.category, Category::Unchanged);
        assert!(verdict.insights.is_empty());
        assert_eq!(verdict.analyzer, "generic");
    }

    #[test]
    fn test_moved_block_is_located() {
        let change = FileChange::modified("notes.txt", "A\nB\nC\nD\nE\n", "B\nC\nD\nA\nE\n");
        let verdict = GenericAnalyzer::default().analyze(&change);
        assert_eq!(verdict.category, Category::Moved);
        let moved = verdict
            .insights
            .iter()
            .find(|i| i.kind == InsightKind::Moved)
            .unwrap();
        assert_eq!(moved.location, "lines 2-4 -> lines 1-3");
    }

    #[test]
    fn test_indentation_change_is_formatting() {
        let change = FileChange::modified("run.sh", "if x; then\n  go\nfi\n", "if x; then\n    go\nfi\n");
        let verdict = GenericAnalyzer::default().analyze(&change);
        assert_eq!(verdict.category, Category::FormattingOnly);
    }

    #[test]
    fn test_reflowed_paragraph_is_formatting() {
        let change = FileChange::modified(
            "README",
            "the quick brown\nfox jumps\n",
            "the quick\nbrown fox jumps\n",
        );
        let verdict = GenericAnalyzer::default().analyze(&change);
        assert_eq!(verdict.category, Category::FormattingOnly);
    }

    #[test]
    fn test_line_endings_only() {
        let change = FileChange::modified("a.txt", "a\nb\n", "a\r\nb\r\n");
        let verdict = GenericAnalyzer::default().analyze(&change);
        assert_eq!(verdict.category, Category::FormattingOnly);
        assert_eq!(verdict.insights.len(), 1);
    }

    #[test]
    fn test_generic_never_reports_structural_categories() {
        let change = FileChange::modified("a.txt", "# note\nx\n", "# other\nx\n");
        let verdict = GenericAnalyzer::default().analyze(&change);
        assert_eq!(verdict.category, Category::Semantic);
    }

    #[test]
    fn test_emptied_file_is_never_moved() {
        let change = FileChange::modified("a.txt", "a\nb\nc\nd\n", "");
        let verdict = GenericAnalyzer::default().analyze(&change);
        assert_eq!(verdict.category, Category::Semantic);
        assert_eq!(verdict.insights[0].description, "4 lines removed");
    }
}
