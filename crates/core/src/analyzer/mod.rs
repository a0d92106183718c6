//! File-change analyzers.
//!
//! Every analyzer runs the same pipeline: conflicts first, then missing or
//! binary content, then a line diff. Format-aware analyzers additionally
//! parse both sides and compare the resulting trees; when parsing fails they
//! degrade to the plain line diff and say so in the analyzer tag.

pub mod generic;
pub mod properties;
pub mod xml;
pub mod yaml;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff::{
    decode, fingerprint, line_span, range_label, same_tokens, token_diff, ChangeNature, LineChange,
    LineDiff, DEFAULT_MIN_MOVED_LINES,
};
use crate::errors::ParseError;
use crate::models::{ChangeClassification, ChangeStats, FileChange, Insight, InsightKind};
use crate::structure::truncate;

pub use generic::GenericAnalyzer;
pub use properties::PropertiesAnalyzer;
pub use xml::XmlAnalyzer;
pub use yaml::YamlAnalyzer;

const WHOLE_FILE: &str = "(whole file)";

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Classifies one file change. Implementations are stateless and never fail:
/// every input yields a verdict.
pub trait Analyzer: Send + Sync {
    /// Tag recorded in [`ChangeClassification::analyzer`].
    fn name(&self) -> &'static str;

    fn analyze(&self, change: &FileChange) -> ChangeClassification;
}

/// Tuning shared by all analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Minimum run length reported as a moved block.
    pub min_moved_lines: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            min_moved_lines: DEFAULT_MIN_MOVED_LINES,
        }
    }
}

/// Registered analyzer family, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    Generic,
    Xml,
    Yaml,
    Properties,
}

impl AnalyzerKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Xml => "xml",
            Self::Yaml => "yaml",
            Self::Properties => "properties",
        }
    }

    /// Parse a configuration name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "generic" => Some(Self::Generic),
            "xml" => Some(Self::Xml),
            "yaml" | "yml" => Some(Self::Yaml),
            "properties" => Some(Self::Properties),
            _ => None,
        }
    }

    /// Instantiate the analyzer for this kind.
    pub fn build(self, options: AnalysisOptions) -> FileAnalyzer {
        match self {
            Self::Generic => FileAnalyzer::Generic(GenericAnalyzer::new(options)),
            Self::Xml => FileAnalyzer::Xml(XmlAnalyzer::new(options)),
            Self::Yaml => FileAnalyzer::Yaml(YamlAnalyzer::new(options)),
            Self::Properties => FileAnalyzer::Properties(PropertiesAnalyzer::new(options)),
        }
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The analyzer chosen for a path.
#[derive(Debug, Clone)]
pub enum FileAnalyzer {
    Generic(GenericAnalyzer),
    Xml(XmlAnalyzer),
    Yaml(YamlAnalyzer),
    Properties(PropertiesAnalyzer),
}

impl FileAnalyzer {
    pub fn kind(&self) -> AnalyzerKind {
        match self {
            Self::Generic(_) => AnalyzerKind::Generic,
            Self::Xml(_) => AnalyzerKind::Xml,
            Self::Yaml(_) => AnalyzerKind::Yaml,
            Self::Properties(_) => AnalyzerKind::Properties,
        }
    }

    fn inner(&self) -> &dyn Analyzer {
        match self {
            Self::Generic(a) => a,
            Self::Xml(a) => a,
            Self::Yaml(a) => a,
            Self::Properties(a) => a,
        }
    }
}

impl Analyzer for FileAnalyzer {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn analyze(&self, change: &FileChange) -> ChangeClassification {
        self.inner().analyze(change)
    }
}

impl PartialEq for FileAnalyzer {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

// ---------------------------------------------------------------------------
// Shared pipeline
// ---------------------------------------------------------------------------

/// What a structural analyzer contributes to the pipeline.
pub(crate) trait FormatRules {
    /// Parse both sides and describe their structural differences.
    fn structural_insights(&self, before: &str, after: &str) -> Result<Vec<Insight>, ParseError>;

    /// Whether a source line carries no content besides a comment.
    fn is_comment_line(&self, line: &str) -> bool;
}

/// How diff findings are re-tagged once the structure is known to match.
struct Retag<'a> {
    rules: &'a dyn FormatRules,
    reorder_found: bool,
}

pub(crate) fn run(
    change: &FileChange,
    name: &'static str,
    rules: Option<&dyn FormatRules>,
    options: &AnalysisOptions,
) -> ChangeClassification {
    debug!(path = %change.path, analyzer = name, "analyzing file");

    if change.has_conflicts() {
        return conflict_verdict(change, name).with_stats(text_stats(change, options));
    }

    let (before, after) = match (&change.before, &change.after) {
        (Some(before), Some(after)) => (before, after),
        (None, Some(after)) => {
            let verdict = whole_file_verdict(name, "file added", after);
            let lines = text_line_count(after);
            return verdict.with_stats(ChangeStats::new(lines, 0));
        }
        (Some(before), None) => {
            let verdict = whole_file_verdict(name, "file deleted", before);
            let lines = text_line_count(before);
            return verdict.with_stats(ChangeStats::new(0, lines));
        }
        (None, None) => return ChangeClassification::unchanged(name),
    };
    if before == after {
        return ChangeClassification::unchanged(name);
    }

    let (before_text, after_text) = match (decode(before, "before"), decode(after, "after")) {
        (Ok(b), Ok(a)) => (b, a),
        (Err(e), _) | (_, Err(e)) => {
            debug!(path = %change.path, error = %e, "content is not text");
            return binary_verdict(name, before, after, &e.to_string());
        }
    };

    let diff = LineDiff::compute(before_text, after_text, options.min_moved_lines);
    let stats = diff.stats();
    let old: Vec<&str> = before_text.lines().collect();
    let new: Vec<&str> = after_text.lines().collect();

    let Some(rules) = rules else {
        return generic_verdict(name.to_string(), &diff, before_text, after_text, &old, &new)
            .with_stats(stats);
    };

    match rules.structural_insights(before_text, after_text) {
        Ok(structural) => {
            let semantic = structural.iter().any(|i| i.kind == InsightKind::Semantic);
            let retag = (!semantic).then(|| Retag {
                rules,
                reorder_found: structural.iter().any(|i| i.kind == InsightKind::Reordered),
            });
            let mut insights = structural;
            if diff.line_endings_only {
                insights.push(line_endings_insight());
            }
            insights.extend(diff_insights(&diff, &old, &new, retag.as_ref()));
            ChangeClassification::from_insights(name, insights).with_stats(stats)
        }
        Err(e) => {
            warn!(
                path = %change.path,
                format = e.format(),
                error = %e,
                "structural parse failed, falling back to line diff"
            );
            let mut verdict =
                generic_verdict(format!("{name}->generic"), &diff, before_text, after_text, &old, &new);
            verdict.insights.insert(
                0,
                Insight::new(
                    InsightKind::Note,
                    WHOLE_FILE,
                    format!("{e}; compared as plain text"),
                ),
            );
            verdict.with_stats(stats)
        }
    }
}

fn conflict_verdict(change: &FileChange, name: &str) -> ChangeClassification {
    let insights = change
        .conflicts
        .iter()
        .enumerate()
        .map(|(i, region)| {
            Insight::new(
                InsightKind::Conflict,
                format!("lines {}-{}", region.start_line, region.end_line),
                format!(
                    "conflict {}: ours {}, theirs {}",
                    i + 1,
                    count_lines(region.ours.lines().count()),
                    count_lines(region.theirs.lines().count())
                ),
            )
        })
        .collect();
    ChangeClassification::from_insights(name, insights)
}

/// Line counts between the two sides, when both are text.
fn text_stats(change: &FileChange, options: &AnalysisOptions) -> ChangeStats {
    let (Some(before), Some(after)) = (&change.before, &change.after) else {
        return ChangeStats::default();
    };
    match (decode(before, "before"), decode(after, "after")) {
        (Ok(b), Ok(a)) => LineDiff::compute(b, a, options.min_moved_lines).stats(),
        _ => ChangeStats::default(),
    }
}

fn text_line_count(content: &[u8]) -> usize {
    decode(content, "content").map_or(0, |text| text.lines().count())
}

fn whole_file_verdict(name: &str, what: &str, content: &[u8]) -> ChangeClassification {
    let size = match std::str::from_utf8(content) {
        Ok(text) => count_lines(text.lines().count()),
        Err(_) => format!("{} bytes", content.len()),
    };
    ChangeClassification::from_insights(
        name,
        vec![Insight::new(InsightKind::Semantic, WHOLE_FILE, format!("{what} ({size})"))],
    )
}

fn binary_verdict(name: &str, before: &[u8], after: &[u8], reason: &str) -> ChangeClassification {
    let short = |bytes: &[u8]| fingerprint(bytes)[..12].to_string();
    ChangeClassification::from_insights(
        format!("{name}+binary"),
        vec![
            Insight::new(
                InsightKind::Semantic,
                WHOLE_FILE,
                format!(
                    "content changed: {} bytes (sha256 {}) -> {} bytes (sha256 {})",
                    before.len(),
                    short(before),
                    after.len(),
                    short(after)
                ),
            ),
            Insight::new(InsightKind::Note, WHOLE_FILE, reason.to_string()),
        ],
    )
}

/// Plain line-diff verdict: Semantic, FormattingOnly, Moved or Unchanged.
fn generic_verdict(
    tag: String,
    diff: &LineDiff,
    before: &str,
    after: &str,
    old: &[&str],
    new: &[&str],
) -> ChangeClassification {
    if diff.line_endings_only {
        return ChangeClassification::from_insights(tag, vec![line_endings_insight()]);
    }

    let mut insights = diff_insights(diff, old, new, None);
    if same_tokens(before, after) {
        for insight in &mut insights {
            if insight.kind == InsightKind::Semantic {
                insight.kind = InsightKind::FormattingOnly;
                insight.description.push_str(" (whitespace reflow only)");
            }
        }
    }
    ChangeClassification::from_insights(tag, insights)
}

fn line_endings_insight() -> Insight {
    Insight::new(
        InsightKind::FormattingOnly,
        WHOLE_FILE,
        "only line endings or the trailing newline changed",
    )
}

/// Describe moved blocks and residual line changes.
fn diff_insights(diff: &LineDiff, old: &[&str], new: &[&str], retag: Option<&Retag<'_>>) -> Vec<Insight> {
    let mut out = Vec::new();

    for block in &diff.moved {
        let kind = match retag {
            None => InsightKind::Moved,
            Some(r) if r.reorder_found => InsightKind::Reordered,
            Some(r) if comments_only(r.rules, old[block.old.clone()].iter().copied()) => {
                InsightKind::CommentOnly
            }
            Some(_) => InsightKind::FormattingOnly,
        };
        let first = old.get(block.old.start).map(|l| l.trim()).unwrap_or_default();
        out.push(Insight::new(
            kind,
            format!("{} -> {}", range_label(&block.old), range_label(&block.new)),
            format!(
                "{} moved, starting \"{}\"",
                count_lines(block.old.len()),
                truncate(first, 60)
            ),
        ));
    }

    for change in &diff.changes {
        let kind = match (change.nature, retag) {
            (ChangeNature::Whitespace, _) => InsightKind::FormattingOnly,
            (ChangeNature::Semantic, None) => InsightKind::Semantic,
            (ChangeNature::Semantic, Some(r)) => {
                let lines = change
                    .old_lines
                    .iter()
                    .map(|&i| old[i])
                    .chain(change.new_lines.iter().map(|&j| new[j]));
                if comments_only(r.rules, lines) {
                    InsightKind::CommentOnly
                } else if r.reorder_found {
                    InsightKind::Reordered
                } else {
                    InsightKind::FormattingOnly
                }
            }
        };
        out.push(Insight::new(kind, change_location(change), describe_change(change, old, new)));
    }
    out
}

fn comments_only<'a>(rules: &dyn FormatRules, mut lines: impl Iterator<Item = &'a str>) -> bool {
    lines.all(|line| line.trim().is_empty() || rules.is_comment_line(line))
}

fn change_location(change: &LineChange) -> String {
    if change.new_lines.is_empty() {
        format!("{} (before)", line_span(&change.old_lines))
    } else {
        line_span(&change.new_lines)
    }
}

fn describe_change(change: &LineChange, old: &[&str], new: &[&str]) -> String {
    if change.nature == ChangeNature::Whitespace {
        return match (change.old_lines.len(), change.new_lines.len()) {
            (0, n) => format!("{} added", count_blank_lines(n)),
            (n, 0) => format!("{} removed", count_blank_lines(n)),
            (a, b) if a == b => format!("whitespace changed on {}", count_lines(b)),
            (a, b) => format!("whitespace changed: {} became {}", count_lines(a), count_lines(b)),
        };
    }
    match (change.old_lines.as_slice(), change.new_lines.as_slice()) {
        ([], added) => format!("{} added", count_lines(added.len())),
        (removed, []) => format!("{} removed", count_lines(removed.len())),
        ([i], [j]) => {
            let (removed, added) = token_diff(old[*i], new[*j]);
            format!(
                "changed: -[{}] +[{}]",
                truncate(&removed.join(" "), 60),
                truncate(&added.join(" "), 60)
            )
        }
        (removed, added) => format!(
            "{} replaced by {}",
            count_lines(removed.len()),
            count_lines(added.len())
        ),
    }
}

fn count_blank_lines(n: usize) -> String {
    if n == 1 {
        "1 blank line".to_string()
    } else {
        format!("{n} blank lines")
    }
}

fn count_lines(n: usize) -> String {
    if n == 1 {
        "1 line".to_string()
    } else {
        format!("{n} lines")
    }
}
