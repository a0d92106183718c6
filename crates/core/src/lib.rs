//! branchdiff core library.
//!
//! This crate classifies the file changes produced by a branch comparison:
//! line and token diffing, structural parsers for XML, YAML and properties
//! files, per-format analyzers, analyzer dispatch, and the engine that runs
//! them concurrently. It never touches a repository; the git collaborator
//! hands it [`FileChange`] values.

pub mod analyzer;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod models;
pub mod structure;

// Re-exports for convenience.
pub use analyzer::{AnalysisOptions, Analyzer, AnalyzerKind, FileAnalyzer};
pub use config::{AppConfig, BranchPair};
pub use conflict::parse_conflict_markers;
pub use dispatch::AnalyzerRegistry;
pub use engine::ComparisonEngine;
pub use errors::CoreError;
pub use models::{
    Category, ChangeClassification, ChangeStats, ClassifiedFile, ComparisonReport, ComparisonStatus,
    ConflictRegion, FileChange, FileStatus, Insight, InsightKind,
};
