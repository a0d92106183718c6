//! Domain model types shared by the analyzers, the engine, and the report
//! collaborator.
//!
//! Everything here is created per comparison and per file; nothing is cached
//! across runs.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// File change
// ---------------------------------------------------------------------------

/// How a file participates in the scratch merge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
    Conflicted,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Deleted => write!(f, "deleted"),
            Self::Modified => write!(f, "modified"),
            Self::Conflicted => write!(f, "conflicted"),
        }
    }
}

/// A single conflict region within merged output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictRegion {
    /// Content between `<<<<<<<` and the base or `=======` separator.
    pub ours: String,
    /// Content between `=======` and `>>>>>>>`.
    pub theirs: String,
    /// Common-ancestor content (diff3 style markers only).
    pub base: Option<String>,
    /// Starting line number (1-indexed) of the `<<<<<<<` marker.
    pub start_line: usize,
    /// Ending line number (1-indexed) of the `>>>>>>>` marker.
    pub end_line: usize,
}

/// One changed or conflicted file discovered by the scratch merge.
///
/// Immutable once built; analyzers read it and attach a
/// [`ChangeClassification`] next to it.
#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    /// Repository-relative path, forward-slash separated.
    pub path: String,
    pub status: FileStatus,
    /// Content on the target branch before the merge. `None` for added files.
    #[serde(skip)]
    pub before: Option<Vec<u8>>,
    /// Content after the merge. `None` for deleted files.
    #[serde(skip)]
    pub after: Option<Vec<u8>>,
    /// Conflict regions, empty unless the merge could not reconcile the file.
    pub conflicts: Vec<ConflictRegion>,
}

impl FileChange {
    pub fn modified(
        path: impl Into<String>,
        before: impl Into<Vec<u8>>,
        after: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Modified,
            before: Some(before.into()),
            after: Some(after.into()),
            conflicts: Vec::new(),
        }
    }

    pub fn added(path: impl Into<String>, after: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Added,
            before: None,
            after: Some(after.into()),
            conflicts: Vec::new(),
        }
    }

    pub fn deleted(path: impl Into<String>, before: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Deleted,
            before: Some(before.into()),
            after: None,
            conflicts: Vec::new(),
        }
    }

    /// A conflicted file. `merged` is the marker-annotated merge output.
    pub fn conflicted(
        path: impl Into<String>,
        before: Option<Vec<u8>>,
        merged: impl Into<Vec<u8>>,
        conflicts: Vec<ConflictRegion>,
    ) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Conflicted,
            before,
            after: Some(merged.into()),
            conflicts,
        }
    }

    /// Lower-cased extension including the leading dot, e.g. `.yml`.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Lower-cased extension of `path` including the leading dot.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Verdict category. Variants are declared in ascending precedence, so the
/// derived `Ord` resolves ties: the maximum of all findings wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Unchanged,
    FormattingOnly,
    CommentOnly,
    Reordered,
    Moved,
    Semantic,
    Conflict,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::FormattingOnly => write!(f, "formatting_only"),
            Self::CommentOnly => write!(f, "comment_only"),
            Self::Reordered => write!(f, "reordered"),
            Self::Moved => write!(f, "moved"),
            Self::Semantic => write!(f, "semantic"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

/// Kind of a single finding. Mirrors [`Category`], plus `Note` for
/// diagnostics that must not influence the verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Semantic,
    Reordered,
    FormattingOnly,
    CommentOnly,
    Moved,
    Conflict,
    Note,
}

impl InsightKind {
    /// The category this finding argues for, if any.
    pub fn category(self) -> Option<Category> {
        match self {
            Self::Semantic => Some(Category::Semantic),
            Self::Reordered => Some(Category::Reordered),
            Self::FormattingOnly => Some(Category::FormattingOnly),
            Self::CommentOnly => Some(Category::CommentOnly),
            Self::Moved => Some(Category::Moved),
            Self::Conflict => Some(Category::Conflict),
            Self::Note => None,
        }
    }
}

/// One human-readable structural finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Insight {
    pub kind: InsightKind,
    /// XPath-like for XML, dotted path for YAML, key for properties, line
    /// range for plain text.
    pub location: String,
    pub description: String,
}

impl Insight {
    pub fn new(kind: InsightKind, location: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            description: description.into(),
        }
    }
}

/// Line counts of a change, as a unified diff would report them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeStats {
    pub additions: usize,
    pub deletions: usize,
    pub total_changes: usize,
}

impl ChangeStats {
    pub fn new(additions: usize, deletions: usize) -> Self {
        Self {
            additions,
            deletions,
            total_changes: additions + deletions,
        }
    }
}

/// The verdict attached to a [`FileChange`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeClassification {
    pub category: Category,
    pub insights: Vec<Insight>,
    /// Analyzer tag. Fallbacks read `xml->generic` or `yaml+binary`.
    pub analyzer: String,
    /// Added and deleted lines; zero when either side is not text.
    #[serde(default)]
    pub stats: ChangeStats,
}

impl ChangeClassification {
    /// Build a classification whose category is the highest-precedence
    /// finding among `insights`.
    pub fn from_insights(analyzer: impl Into<String>, insights: Vec<Insight>) -> Self {
        let category = insights
            .iter()
            .filter_map(|i| i.kind.category())
            .max()
            .unwrap_or(Category::Unchanged);
        Self {
            category,
            insights,
            analyzer: analyzer.into(),
            stats: ChangeStats::default(),
        }
    }

    /// Attach line counts.
    pub fn with_stats(mut self, stats: ChangeStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn unchanged(analyzer: impl Into<String>) -> Self {
        Self {
            category: Category::Unchanged,
            insights: Vec::new(),
            analyzer: analyzer.into(),
            stats: ChangeStats::default(),
        }
    }

    /// Whether the analyzer had to fall back from its preferred strategy.
    pub fn is_degraded(&self) -> bool {
        self.analyzer.contains("->") || self.analyzer.contains('+')
    }
}

/// A file paired with its verdict, as handed to the report collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedFile {
    #[serde(flatten)]
    pub change: FileChange,
    pub classification: ChangeClassification,
}

// ---------------------------------------------------------------------------
// Comparison report
// ---------------------------------------------------------------------------

/// Outcome of comparing one branch pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    /// The scratch merge applied cleanly.
    Clean,
    /// At least one file conflicted.
    Conflicted,
    /// The comparison could not run (missing branch, repository error).
    Error,
}

impl std::fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Results of comparing two branches.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub from_branch: String,
    pub to_branch: String,
    pub status: ComparisonStatus,
    pub generated_at: DateTime<Utc>,
    /// Files skipped by `ignore_patterns`.
    pub ignored: usize,
    pub files: Vec<ClassifiedFile>,
    pub error_message: Option<String>,
}

impl ComparisonReport {
    /// Assemble a report; the status follows from the files' conflict state.
    pub fn new(
        from_branch: impl Into<String>,
        to_branch: impl Into<String>,
        files: Vec<ClassifiedFile>,
        ignored: usize,
    ) -> Self {
        let status = if files.iter().any(|f| f.change.has_conflicts()) {
            ComparisonStatus::Conflicted
        } else {
            ComparisonStatus::Clean
        };
        Self {
            from_branch: from_branch.into(),
            to_branch: to_branch.into(),
            status,
            generated_at: Utc::now(),
            ignored,
            files,
            error_message: None,
        }
    }

    /// A report for a comparison that never got as far as analysis.
    pub fn failed(
        from_branch: impl Into<String>,
        to_branch: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            from_branch: from_branch.into(),
            to_branch: to_branch.into(),
            status: ComparisonStatus::Error,
            generated_at: Utc::now(),
            ignored: 0,
            files: Vec::new(),
            error_message: Some(error.into()),
        }
    }

    /// Number of files per category.
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.files {
            *counts.entry(file.classification.category).or_insert(0) += 1;
        }
        counts
    }

    /// Files whose change carries meaning (semantic or conflicting).
    pub fn needs_review(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.files.iter().filter(|f| {
            matches!(
                f.classification.category,
                Category::Semantic | Category::Conflict
            )
        })
    }
}
