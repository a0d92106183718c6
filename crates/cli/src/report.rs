//! Terminal and JSON rendering of comparison reports.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use branchdiff_core::{ClassifiedFile, ComparisonReport};

use crate::style;

const MAX_EVIDENCE_CHARS: usize = 80;

/// Print a summary of one report.
pub fn print_report(report: &ComparisonReport) {
    println!();
    println!(
        "{}  {}",
        style::header(&format!("{} → {}", report.from_branch, report.to_branch)),
        style::comparison_status(report.status)
    );
    if let Some(message) = &report.error_message {
        println!("  {}", style::dim(message));
        return;
    }
    if report.files.is_empty() {
        println!("  {}", style::dim("No changes."));
        print_ignored(report.ignored);
        return;
    }

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL);
    summary.set_header(vec!["Category", "Files"]);
    for (category, count) in report.category_counts().into_iter().rev() {
        summary.add_row(vec![style::category_cell(category), Cell::new(count)]);
    }
    println!("{summary}");

    let mut files = Table::new();
    files.load_preset(UTF8_FULL);
    files.set_content_arrangement(ContentArrangement::Dynamic);
    files.set_header(vec!["Path", "Status", "Category", "Lines", "Analyzer", "Evidence"]);
    for file in &report.files {
        files.add_row(vec![
            Cell::new(&file.change.path),
            Cell::new(file.change.status.to_string()),
            style::category_cell(file.classification.category),
            Cell::new(line_counts(file)),
            Cell::new(&file.classification.analyzer),
            Cell::new(evidence(file)),
        ]);
    }
    println!("{files}");
    print_ignored(report.ignored);
}

fn print_ignored(ignored: usize) {
    if ignored > 0 {
        println!("  {}", style::dim(&format!("{ignored} file(s) ignored by pattern")));
    }
}

/// Added and deleted lines as `+a/-d`.
fn line_counts(file: &ClassifiedFile) -> String {
    let stats = file.classification.stats;
    format!("+{}/-{}", stats.additions, stats.deletions)
}

/// First insight, shortened, with a count of the rest.
fn evidence(file: &ClassifiedFile) -> String {
    let insights = &file.classification.insights;
    let Some(first) = insights.first() else {
        return String::new();
    };
    let mut text = format!("{}: {}", first.location, first.description);
    if text.chars().count() > MAX_EVIDENCE_CHARS {
        text = text.chars().take(MAX_EVIDENCE_CHARS).collect::<String>() + "...";
    }
    if insights.len() > 1 {
        text.push_str(&format!(" (+{} more)", insights.len() - 1));
    }
    text
}

/// Write every report to `path` as a pretty-printed JSON array.
pub fn write_json(reports: &[ComparisonReport], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(reports).context("failed to serialize reports")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchdiff_core::{ChangeClassification, ChangeStats, FileChange, Insight, InsightKind};

    fn classified(insights: Vec<Insight>) -> ClassifiedFile {
        ClassifiedFile {
            change: FileChange::modified("a.txt", "a", "b"),
            classification: ChangeClassification::from_insights("generic", insights),
        }
    }

    #[test]
    fn test_evidence_counts_remaining_insights() {
        let file = classified(vec![
            Insight::new(InsightKind::Semantic, "line 1", "changed"),
            Insight::new(InsightKind::FormattingOnly, "line 3", "whitespace"),
        ]);
        assert_eq!(evidence(&file), "line 1: changed (+1 more)");
        assert_eq!(evidence(&classified(Vec::new())), "");
    }

    #[test]
    fn test_line_counts() {
        let mut file = classified(Vec::new());
        assert_eq!(line_counts(&file), "+0/-0");
        file.classification = file.classification.with_stats(ChangeStats::new(4, 2));
        assert_eq!(line_counts(&file), "+4/-2");
    }

    #[test]
    fn test_evidence_is_truncated() {
        let long = "x".repeat(200);
        let file = classified(vec![Insight::new(InsightKind::Semantic, "line 1", long)]);
        let text = evidence(&file);
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), MAX_EVIDENCE_CHARS + 3);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ComparisonReport::new("feature", "main", vec![classified(Vec::new())], 0);
        write_json(&[report], &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["to_branch"], "main");
        assert_eq!(value[0]["files"][0]["path"], "a.txt");
    }
}
