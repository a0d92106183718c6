//! YAML analyzer.

use super::{run, AnalysisOptions, Analyzer, FormatRules};
use crate::errors::ParseError;
use crate::models::{ChangeClassification, FileChange, Insight};
use crate::structure::{self, yaml, PathStyle};

/// Compares document trees: mapping key order is cosmetic, sequence and
/// document order are not.
#[derive(Debug, Clone, Default)]
pub struct YamlAnalyzer {
    options: AnalysisOptions,
}

impl YamlAnalyzer {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }
}

impl FormatRules for YamlAnalyzer {
    fn structural_insights(&self, before: &str, after: &str) -> Result<Vec<Insight>, ParseError> {
        let before = yaml::parse(before)?;
        let after = yaml::parse(after)?;
        Ok(structure::compare(&before, &after, PathStyle::Dotted))
    }

    fn is_comment_line(&self, line: &str) -> bool {
        line.trim_start().starts_with('#')
    }
}

impl Analyzer for YamlAnalyzer {
    fn name(&self) -> &'static str {
        "yaml"
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
        YamlAnalyzer::default().analyze(&FileChange::modified("app.yml", before, after))
    }

    #[test]
    fn test_key_permutation_is_reordered() {
        let verdict = classify("name: demo\nport: 80\nhost: a\n", "port: 80\nhost: a\nname: demo\n");
        assert_eq!(verdict.category, Category::Reordered);
    }

    #[test]
    fn test_sequence_permutation_is_semantic() {
        let verdict = classify("steps:\n  - build\n  - test\n", "steps:\n  - test\n  - build\n");
        assert_eq!(verdict.category, Category::Semantic);
        assert!(verdict
            .insights
            .iter()
            .any(|i| i.kind == InsightKind::Semantic && i.location == "steps[0]"));
    }

    #[test]
    fn test_flow_to_block_style_is_formatting() {
        let verdict = classify("ports: [80, 443]\n", "ports:\n  - 80\n  - 443\n");
        assert_eq!(verdict.category, Category::FormattingOnly);
    }

    #[test]
    fn test_comment_change_is_comment_only() {
        let verdict = classify("# old\nname: demo\n", "# new\nname: demo\n");
        assert_eq!(verdict.category, Category::CommentOnly);
    }

    #[test]
    fn test_nested_value_change_location() {
        let verdict = classify("server:\n  port: 80\n", "server:\n  port: 8080\n");
        assert_eq!(verdict.category, Category::Semantic);
        assert_eq!(verdict.insights[0].location, "server.port");
    }

    #[test]
    fn test_document_order_is_semantic() {
        let verdict = classify("a: 1\n---\nb: 2\n", "b: 2\n---\na: 1\n");
        assert_eq!(verdict.category, Category::Semantic);
        assert!(verdict.insights.iter().any(|i| i.location.starts_with("doc[")));
    }

    #[test]
    fn test_malformed_yaml_degrades() {
        let verdict = classify("a: [1, 2\n", "a: [1, 2]\n");
        assert_eq!(verdict.analyzer, "yaml->generic");
    }
}
