//! XML analyzer.

use super::{run, AnalysisOptions, Analyzer, FormatRules};
use crate::errors::ParseError;
use crate::models::{ChangeClassification, FileChange, Insight};
use crate::structure::{self, xml, PathStyle};

/// Compares element trees: sibling and attribute permutations are reported
/// as reordering, prefix renames as formatting.
#[derive(Debug, Clone, Default)]
pub struct XmlAnalyzer {
    options: AnalysisOptions,
}

impl XmlAnalyzer {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }
}

impl FormatRules for XmlAnalyzer {
    fn structural_insights(&self, before: &str, after: &str) -> Result<Vec<Insight>, ParseError> {
        let before = xml::parse(before)?;
        let after = xml::parse(after)?;
        Ok(structure::compare(&before, &after, PathStyle::XPath))
    }

    fn is_comment_line(&self, line: &str) -> bool {
        let line = line.trim();
        line.starts_with("<!--") || line.ends_with("-->")
    }
}

impl Analyzer for XmlAnalyzer {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn analyze(&self, change: &FileChange) -> ChangeClassification {
        run(change, self.name(), Some(self), &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, InsightKind};

    fn classify(before: &str, after: &str) -> ChangeClassification {
        XmlAnalyzer::default().analyze(&FileChange::modified("pom.xml", before, after))
    }

    #[test]
    fn test_sibling_permutation_is_reordered() {
        let verdict = classify(
            "<deps>\n  <dep id=\"a\"/>\n  <dep id=\"b\"/>\n  <dep id=\"c\"/>\n</deps>\n",
            "<deps>\n  <dep id=\"c\"/>\n  <dep id=\"a\"/>\n  <dep id=\"b\"/>\n</deps>\n",
        );
        assert_eq!(verdict.category, Category::Reordered);
        assert!(verdict.insights.iter().all(|i| i.kind != InsightKind::Semantic));
        assert_eq!(verdict.analyzer, "xml");
    }

    #[test]
    fn test_attribute_order_is_reordered() {
        let verdict = classify("<a x=\"1\" y=\"2\"/>\n", "<a y=\"2\" x=\"1\"/>\n");
        assert_eq!(verdict.category, Category::Reordered);
        assert_eq!(verdict.insights[0].kind, InsightKind::Reordered);
        assert_eq!(verdict.insights[0].description, "attribute order changed: x, y -> y, x");
    }

    #[test]
    fn test_prefix_rename_is_formatting() {
        let verdict = classify(
            "<p:root xmlns:p=\"urn:x\"><p:a/></p:root>\n",
            "<q:root xmlns:q=\"urn:x\"><q:a/></q:root>\n",
        );
        assert_eq!(verdict.category, Category::FormattingOnly);
    }

    #[test]
    fn test_comment_edit_is_comment_only() {
        let verdict = classify(
            "<a>\n  <!-- old -->\n  <b/>\n</a>\n",
            "<a>\n  <!-- new -->\n  <b/>\n</a>\n",
        );
        assert_eq!(verdict.category, Category::CommentOnly);
    }

    #[test]
    fn test_value_change_is_semantic_with_xpath() {
        let verdict = classify(
            "<project><version>1.0</version></project>\n",
            "<project><version>1.1</version></project>\n",
        );
        assert_eq!(verdict.category, Category::Semantic);
        assert_eq!(verdict.insights[0].location, "/project/version");
    }

    #[test]
    fn test_blank_line_shift_is_formatting() {
        let verdict = classify(
            "<r>\n\n<a/>\n<b/>\n<c/>\n</r>\n",
            "<r>\n<a/>\n<b/>\n<c/>\n\n</r>\n",
        );
        assert_eq!(verdict.category, Category::FormattingOnly);
        assert!(verdict.insights.iter().all(|i| i.kind == InsightKind::FormattingOnly));
    }

    #[test]
    fn test_invalid_xml_falls_back_to_generic() {
        let verdict = classify("<a><b></a>\n", "<a><b></b></a>\n");
        assert_eq!(verdict.analyzer, "xml->generic");
        assert_eq!(verdict.insights[0].kind, InsightKind::Note);
        assert!(matches!(
            verdict.category,
            Category::Semantic | Category::FormattingOnly | Category::Moved | Category::Unchanged
        ));
    }
}
