//! Comparison engine: filters, classifies and reports a set of file changes.
//!
//! Classification of a single file is synchronous. [`ComparisonEngine::classify_concurrent`]
//! spreads files over a bounded pool of blocking tasks and merges the
//! results afterwards, ordered by path. A panic while analyzing one file
//! produces a degraded verdict for that file and never aborts the run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::analyzer::{Analyzer, AnalyzerKind, GenericAnalyzer};
use crate::config::AppConfig;
use crate::dispatch::AnalyzerRegistry;
use crate::errors::CoreError;
use crate::models::{
    ChangeClassification, ClassifiedFile, ComparisonReport, FileChange, Insight, InsightKind,
};

/// Classifies the file changes of a branch comparison.
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    registry: Arc<AnalyzerRegistry>,
    workers: usize,
    ignore_patterns: Vec<String>,
}

impl ComparisonEngine {
    pub fn new(registry: AnalyzerRegistry, workers: usize) -> Self {
        Self {
            registry: Arc::new(registry),
            workers: workers.max(1),
            ignore_patterns: Vec::new(),
        }
    }

    /// Skip paths matching any of `patterns` (glob syntax).
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Build an engine from validated configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let registry =
            AnalyzerRegistry::from_config(&config.analysis.extensions, config.analysis.options())?;
        Ok(Self::new(registry, config.analysis.workers)
            .with_ignore_patterns(config.analysis.ignore_patterns.clone()))
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Filtering
    // -----------------------------------------------------------------------

    /// Whether `path` matches an ignore pattern.
    pub fn is_ignored(&self, path: &str) -> bool {
        let path = path.replace('\\', "/");
        self.ignore_patterns
            .iter()
            .any(|pattern| glob_match::glob_match(&pattern.replace('\\', "/"), &path))
    }

    /// Drop ignored changes, returning the rest and how many were dropped.
    pub fn partition_ignored(&self, changes: Vec<FileChange>) -> (Vec<FileChange>, usize) {
        let before = changes.len();
        let kept: Vec<FileChange> = changes
            .into_iter()
            .filter(|change| {
                let ignored = self.is_ignored(&change.path);
                if ignored {
                    debug!(path = %change.path, "ignoring file");
                }
                !ignored
            })
            .collect();
        let ignored = before - kept.len();
        (kept, ignored)
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    /// Classify one file with the analyzer registered for its extension.
    pub fn classify(&self, change: &FileChange) -> ChangeClassification {
        classify_guarded(&self.registry, change)
    }

    /// Classify every change on the current thread, ordered by path.
    pub fn classify_all(&self, changes: Vec<FileChange>) -> Vec<ClassifiedFile> {
        let mut files: Vec<ClassifiedFile> = changes
            .into_iter()
            .map(|change| {
                let classification = self.classify(&change);
                ClassifiedFile {
                    change,
                    classification,
                }
            })
            .collect();
        files.sort_by(|a, b| a.change.path.cmp(&b.change.path));
        files
    }

    /// Classify every change on up to `workers` blocking tasks, ordered by path.
    pub async fn classify_concurrent(&self, changes: Vec<FileChange>) -> Vec<ClassifiedFile> {
        let total = changes.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = self.workers.min(total);
        info!(files = total, workers, "classifying files");

        let shared = Arc::new(changes);
        let next = Arc::new(AtomicUsize::new(0));
        let mut set = JoinSet::new();
        for _ in 0..workers {
            let shared = Arc::clone(&shared);
            let next = Arc::clone(&next);
            let registry = Arc::clone(&self.registry);
            set.spawn_blocking(move || {
                let mut done = Vec::new();
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(change) = shared.get(i) else { break };
                    done.push((i, classify_guarded(&registry, change)));
                }
                done
            });
        }

        let mut verdicts: Vec<Option<ChangeClassification>> = vec![None; total];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(batch) => {
                    for (i, verdict) in batch {
                        verdicts[i] = Some(verdict);
                    }
                }
                Err(e) => warn!(error = %e, "classification worker failed"),
            }
        }

        let changes = Arc::try_unwrap(shared).unwrap_or_else(|arc| (*arc).clone());
        let mut files: Vec<ClassifiedFile> = changes
            .into_iter()
            .zip(verdicts)
            .map(|(change, verdict)| {
                let classification = verdict.unwrap_or_else(|| {
                    let kind = self.registry.kind_for(&change.path);
                    unclassifiable(kind, "classification worker failed")
                });
                ClassifiedFile {
                    change,
                    classification,
                }
            })
            .collect();
        files.sort_by(|a, b| a.change.path.cmp(&b.change.path));
        files
    }

    /// Filter and classify the changes of one branch pair into a report.
    pub async fn compare(
        &self,
        from_branch: &str,
        to_branch: &str,
        changes: Vec<FileChange>,
    ) -> ComparisonReport {
        let (kept, ignored) = self.partition_ignored(changes);
        let files = self.classify_concurrent(kept).await;
        let report = ComparisonReport::new(from_branch, to_branch, files, ignored);
        info!(
            from = from_branch,
            to = to_branch,
            status = %report.status,
            files = report.files.len(),
            ignored,
            "comparison complete"
        );
        report
    }
}

/// Run the registered analyzer, falling back to the generic one if it panics.
fn classify_guarded(registry: &AnalyzerRegistry, change: &FileChange) -> ChangeClassification {
    let analyzer = registry.select(&change.path);
    let generic = GenericAnalyzer::new(registry.options());
    classify_with_fallback(&analyzer, analyzer.kind(), &generic, change)
}

fn classify_with_fallback(
    analyzer: &dyn Analyzer,
    kind: AnalyzerKind,
    fallback: &dyn Analyzer,
    change: &FileChange,
) -> ChangeClassification {
    debug!(path = %change.path, analyzer = kind.name(), "classifying file");

    match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(change))) {
        Ok(verdict) => verdict,
        Err(_) => {
            warn!(path = %change.path, analyzer = kind.name(), "analyzer panicked, retrying as generic");
            if kind == AnalyzerKind::Generic {
                return unclassifiable(kind, "analyzer panicked");
            }
            match catch_unwind(AssertUnwindSafe(|| fallback.analyze(change))) {
                Ok(mut verdict) => {
                    verdict.analyzer = format!("{}->generic", kind.name());
                    verdict.insights.insert(
                        0,
                        Insight::new(InsightKind::Note, "(whole file)", "analyzer panicked; compared as plain text"),
                    );
                    verdict
                }
                Err(_) => unclassifiable(kind, "analyzer panicked"),
            }
        }
    }
}

/// Verdict for a file no analyzer could handle: flagged for review.
fn unclassifiable(kind: AnalyzerKind, reason: &str) -> ChangeClassification {
    ChangeClassification::from_insights(
        format!("{}->generic", kind.name()),
        vec![
            Insight::new(InsightKind::Note, "(whole file)", reason),
            Insight::new(
                InsightKind::Semantic,
                "(whole file)",
                "change could not be classified; review manually",
            ),
        ],
    )
}
