//! TOML-based configuration for branchdiff.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below. [`AppConfig::validate`] must pass before the config is
//! used to build an engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzer::{AnalysisOptions, AnalyzerKind};
use crate::diff::DEFAULT_MIN_MOVED_LINES;
use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which repository and branch pairs to compare.
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Classification tuning.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Repository and branch pair selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Path to the git repository (default `.`).
    #[serde(default = "default_repo")]
    pub repo: PathBuf,

    /// Branch pairs written as `from:to`.
    #[serde(default)]
    pub pairs: Vec<String>,

    /// Also compare every pair in the reverse direction.
    #[serde(default)]
    pub bidirectional: bool,
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            pairs: Vec::new(),
            bidirectional: false,
        }
    }
}

/// A validated `from:to` branch pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPair {
    /// Branch whose changes are merged in.
    pub from: String,
    /// Branch receiving the merge.
    pub to: String,
}

impl BranchPair {
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl std::fmt::Display for BranchPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Parse `from:to` into a [`BranchPair`].
pub fn parse_branch_pair(spec: &str) -> Result<BranchPair, ConfigError> {
    let invalid = |detail: &str| ConfigError::InvalidValue {
        field: "comparison.pairs".into(),
        detail: format!("'{spec}': {detail}"),
    };
    let (from, to) = spec
        .split_once(':')
        .ok_or_else(|| invalid("expected 'from:to'"))?;
    let (from, to) = (from.trim(), to.trim());
    if from.is_empty() || to.is_empty() {
        return Err(invalid("branch names must not be empty"));
    }
    if from == to {
        return Err(invalid("a branch cannot be compared with itself"));
    }
    Ok(BranchPair {
        from: from.to_string(),
        to: to.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Shortest run of lines reported as a moved block (default 3).
    #[serde(default = "default_min_moved_block_lines")]
    pub min_moved_block_lines: usize,

    /// Glob patterns for paths left out of the comparison.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Concurrent classification workers (default 4).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Extra extension registrations, e.g. `".pom" = "xml"`.
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

fn default_min_moved_block_lines() -> usize {
    DEFAULT_MIN_MOVED_LINES
}
fn default_workers() -> usize {
    4
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_moved_block_lines: default_min_moved_block_lines(),
            ignore_patterns: Vec::new(),
            workers: default_workers(),
            extensions: BTreeMap::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            min_moved_lines: self.min_moved_block_lines,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file on disk.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        debug!("configuration parsed successfully");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate field values that serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.min_moved_block_lines == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.min_moved_block_lines".into(),
                detail: "must be at least 1".into(),
            });
        }
        if self.analysis.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.workers".into(),
                detail: "must be at least 1".into(),
            });
        }
        for pair in &self.comparison.pairs {
            parse_branch_pair(pair)?;
        }
        for (ext, analyzer) in &self.analysis.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(ConfigError::InvalidValue {
                    field: format!("analysis.extensions.{ext}"),
                    detail: "extension must start with '.'".into(),
                });
            }
            if AnalyzerKind::from_name(analyzer).is_none() {
                return Err(ConfigError::UnknownAnalyzer(analyzer.clone()));
            }
        }
        Ok(())
    }

    /// Configured pairs, expanded with their reverses when bidirectional.
    pub fn branch_pairs(&self) -> Result<Vec<BranchPair>, ConfigError> {
        let mut pairs = Vec::new();
        for spec in &self.comparison.pairs {
            let pair = parse_branch_pair(spec)?;
            let reverse = pair.reversed();
            pairs.push(pair);
            if self.comparison.bidirectional && !pairs.contains(&reverse) {
                pairs.push(reverse);
            }
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[comparison]
repo = "/srv/repos/app"
pairs = ["development:master", "feature/x:development"]
bidirectional = true

[analysis]
min_moved_block_lines = 4
ignore_patterns = ["target/**", "*.lock"]
workers = 8

[analysis.extensions]
".pom" = "xml"

[logging]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.comparison.repo, PathBuf::from("/srv/repos/app"));
        assert_eq!(config.comparison.pairs.len(), 2);
        assert_eq!(config.analysis.min_moved_block_lines, 4);
        assert_eq!(config.analysis.workers, 8);
        assert_eq!(config.analysis.extensions.get(".pom").map(String::as_str), Some("xml"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("branchdiff.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.analysis.options().min_moved_lines, 4);
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/branchdiff.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = AppConfig::from_toml("[analysis\nworkers = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.comparison.repo, PathBuf::from("."));
        assert!(!config.comparison.bidirectional);
        assert_eq!(config.analysis.min_moved_block_lines, 3);
        assert_eq!(config.analysis.workers, 4);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = AppConfig::from_toml(sample_toml()).unwrap();
        config.analysis.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "analysis.workers"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_extension_and_analyzer() {
        let mut config = AppConfig::default();
        config.analysis.extensions.insert("pom".into(), "xml".into());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = AppConfig::default();
        config.analysis.extensions.insert(".cfg".into(), "ini".into());
        assert!(matches!(config.validate(), Err(ConfigError::UnknownAnalyzer(_))));
    }

    #[test]
    fn test_parse_branch_pair() {
        let pair = parse_branch_pair("development:master").unwrap();
        assert_eq!(pair.from, "development");
        assert_eq!(pair.to, "master");
        assert_eq!(pair.to_string(), "development -> master");

        for bad in ["master", ":master", "dev:", "main:main"] {
            assert!(parse_branch_pair(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_bidirectional_pairs() {
        let config = AppConfig::from_toml(sample_toml()).unwrap();
        let pairs = config.branch_pairs().unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[1], BranchPair {
            from: "master".into(),
            to: "development".into(),
        });
    }
}
