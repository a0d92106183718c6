//! End-to-end classification checks across every analyzer.

use branchdiff_core::{
    parse_conflict_markers, AnalysisOptions, Analyzer, AnalyzerKind, AnalyzerRegistry, AppConfig,
    Category, ComparisonEngine, ComparisonStatus, FileChange, InsightKind,
};

fn registry() -> AnalyzerRegistry {
    AnalyzerRegistry::with_defaults(AnalysisOptions::default())
}

fn classify(path: &str, before: &str, after: &str) -> branchdiff_core::ChangeClassification {
    registry().select(path).analyze(&FileChange::modified(path, before, after))
}

#[test]
fn identical_content_is_unchanged_for_every_analyzer() {
    let samples = [
        ("notes.txt", "hello\nworld\n"),
        ("pom.xml", "<project><a/></project>\n"),
        ("app.yml", "a: 1\nb: [1, 2]\n"),
        ("app.properties", "# c\na=1\n"),
    ];
    for (path, text) in samples {
        let verdict = classify(path, text, text);
        assert_eq!(verdict.category, Category::Unchanged, "{path}");
        assert!(verdict.insights.is_empty(), "{path}");
    }
}

#[test]
fn xml_sibling_permutation_is_never_semantic() {
    let before = "<project>\n  <modules>\n    <module>core</module>\n    <module>cli</module>\n    <module>web</module>\n  </modules>\n  <name>demo</name>\n</project>\n";
    let after = "<project>\n  <name>demo</name>\n  <modules>\n    <module>web</module>\n    <module>core</module>\n    <module>cli</module>\n  </modules>\n</project>\n";
    let verdict = classify("pom.xml", before, after);
    assert_eq!(verdict.category, Category::Reordered);
    assert!(verdict.insights.iter().all(|i| i.kind != InsightKind::Semantic));
}

#[test]
fn yaml_key_vs_sequence_permutation() {
    let keys = classify("ci.yaml", "image: rust\nstage: test\n", "stage: test\nimage: rust\n");
    assert_eq!(keys.category, Category::Reordered);

    let items = classify("ci.yaml", "stages:\n  - build\n  - test\n", "stages:\n  - test\n  - build\n");
    assert_eq!(items.category, Category::Semantic);
}

#[test]
fn properties_comment_and_value_changes() {
    let comment = classify("db.properties", "# primary\nurl=jdbc:x\n", "# replica\nurl=jdbc:x\n");
    assert_eq!(comment.category, Category::CommentOnly);

    let value = classify("db.properties", "url=jdbc:x\n", "url=jdbc:y\n");
    assert_eq!(value.category, Category::Semantic);
}

#[test]
fn moved_block_reports_both_positions() {
    let verdict = classify("list.txt", "A\nB\nC\nD\nE", "B\nC\nD\nA\nE");
    assert_eq!(verdict.category, Category::Moved);
    let moved = verdict
        .insights
        .iter()
        .find(|i| i.kind == InsightKind::Moved)
        .expect("moved insight");
    assert!(moved.location.contains("lines 2-4"));
    assert!(moved.location.contains("lines 1-3"));
}

#[test]
fn conflict_markers_win_regardless_of_content() {
    let merged = "a=1\n<<<<<<< ours\nb=2\n=======\nb=3\n>>>>>>> theirs\n";
    let regions = parse_conflict_markers(merged);
    assert_eq!(regions.len(), 1);
    let change = FileChange::conflicted("app.properties", Some(b"a=1\nb=1\n".to_vec()), merged, regions);
    for kind in [
        AnalyzerKind::Generic,
        AnalyzerKind::Xml,
        AnalyzerKind::Yaml,
        AnalyzerKind::Properties,
    ] {
        let verdict = kind.build(AnalysisOptions::default()).analyze(&change);
        assert_eq!(verdict.category, Category::Conflict, "{kind}");
    }
}

#[test]
fn invalid_xml_degrades_to_generic() {
    let verdict = classify("broken.xml", "<a>\n<b>\n</a>\n", "<a>\n<c>\n</a>\n");
    assert_eq!(verdict.analyzer, "xml->generic");
    assert!(matches!(
        verdict.category,
        Category::Semantic | Category::FormattingOnly | Category::Moved | Category::Unchanged
    ));
    assert_eq!(verdict.insights[0].kind, InsightKind::Note);
}

#[test]
fn dispatch_is_case_insensitive() {
    let registry = registry();
    assert_eq!(registry.select("config.YML"), registry.select("config.yml"));
    assert_eq!(registry.select("config.unknown").kind(), AnalyzerKind::Generic);
}

#[tokio::test]
async fn engine_from_config_produces_serializable_report() {
    let config = AppConfig::from_toml(
        r#"
[analysis]
ignore_patterns = ["*.lock"]
workers = 2

[analysis.extensions]
".pom" = "xml"
"#,
    )
    .unwrap();
    let engine = ComparisonEngine::from_config(&config).unwrap();
    assert_eq!(engine.registry().kind_for("module.pom"), AnalyzerKind::Xml);

    let changes = vec![
        FileChange::modified("module.pom", "<a x=\"1\" y=\"2\"/>\n", "<a y=\"2\" x=\"1\"/>\n"),
        FileChange::added("docs/new.md", "# title\n"),
        FileChange::modified("Cargo.lock", "a\n", "b\n"),
    ];
    let report = engine.compare("feature", "main", changes).await;
    assert_eq!(report.status, ComparisonStatus::Clean);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.files[0].change.path, "docs/new.md");
    assert_eq!(report.files[1].classification.category, Category::Reordered);
    assert_eq!(report.needs_review().count(), 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["from_branch"], "feature");
    assert_eq!(json["status"], "clean");
    assert_eq!(json["files"][0]["classification"]["category"], "semantic");
    assert_eq!(json["files"][0]["classification"]["stats"]["additions"], 1);
    assert_eq!(json["files"][0]["classification"]["stats"]["total_changes"], 1);
}

#[tokio::test]
async fn configured_move_threshold_is_honored() {
    let changes = || vec![FileChange::modified("list.txt", "A\nB\nC\nD\nE", "B\nC\nD\nA\nE")];

    let strict = AppConfig::from_toml("[analysis]\nmin_moved_block_lines = 4\n").unwrap();
    let engine = ComparisonEngine::from_config(&strict).unwrap();
    let report = engine.compare("feature", "main", changes()).await;
    assert_eq!(report.files[0].classification.category, Category::Semantic);

    let loose = AppConfig::from_toml("[analysis]\nmin_moved_block_lines = 3\n").unwrap();
    let engine = ComparisonEngine::from_config(&loose).unwrap();
    let report = engine.compare("feature", "main", changes()).await;
    assert_eq!(report.files[0].classification.category, Category::Moved);
}

#[test]
fn blank_line_shift_is_formatting_not_moved() {
    for path in ["notes.txt", "layout.xml"] {
        let before = "<r>\n\n<a/>\n<b/>\n<c/>\n</r>\n";
        let after = "<r>\n<a/>\n<b/>\n<c/>\n\n</r>\n";
        let verdict = classify(path, before, after);
        assert_eq!(verdict.category, Category::FormattingOnly, "{path}");
    }
}
