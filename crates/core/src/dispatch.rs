//! Analyzer selection by file extension.
//!
//! The registry is an explicit value built at startup and shared by the
//! engine. Lookups are a pure function of the path.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::analyzer::{AnalysisOptions, AnalyzerKind, FileAnalyzer};
use crate::errors::{ConfigError, CoreError, DispatchError};
use crate::models::extension_of;

/// Built-in extension table.
const DEFAULT_EXTENSIONS: &[(&str, AnalyzerKind)] = &[
    (".xml", AnalyzerKind::Xml),
    (".yml", AnalyzerKind::Yaml),
    (".yaml", AnalyzerKind::Yaml),
    (".properties", AnalyzerKind::Properties),
    (".props", AnalyzerKind::Properties),
];

/// Extension (lower-case, with dot) to analyzer kind.
#[derive(Debug, Clone)]
pub struct AnalyzerRegistry {
    table: HashMap<String, AnalyzerKind>,
    options: AnalysisOptions,
}

impl AnalyzerRegistry {
    /// An empty registry: every path goes to the generic analyzer.
    pub fn empty(options: AnalysisOptions) -> Self {
        Self {
            table: HashMap::new(),
            options,
        }
    }

    /// Registry holding the built-in XML, YAML and properties extensions.
    pub fn with_defaults(options: AnalysisOptions) -> Self {
        let table = DEFAULT_EXTENSIONS
            .iter()
            .map(|(ext, kind)| (ext.to_string(), *kind))
            .collect();
        Self { table, options }
    }

    /// Built-in registry extended with configured extensions.
    pub fn from_config(
        extensions: &BTreeMap<String, String>,
        options: AnalysisOptions,
    ) -> Result<Self, CoreError> {
        let mut registry = Self::with_defaults(options);
        for (ext, name) in extensions {
            let kind = AnalyzerKind::from_name(name)
                .ok_or_else(|| ConfigError::UnknownAnalyzer(name.clone()))?;
            registry.register(ext, kind)?;
        }
        Ok(registry)
    }

    /// Claim `extension` for `kind`. Extensions are matched
    /// case-insensitively and may only be claimed once.
    pub fn register(&mut self, extension: &str, kind: AnalyzerKind) -> Result<(), DispatchError> {
        let ext = extension.trim().to_ascii_lowercase();
        if ext.len() < 2 || !ext.starts_with('.') || ext[1..].contains(['.', '/', '\\']) {
            return Err(DispatchError::InvalidExtension(extension.to_string()));
        }
        if let Some(existing) = self.table.get(&ext) {
            return Err(DispatchError::DuplicateExtension {
                extension: ext,
                existing: existing.name(),
            });
        }
        debug!(extension = %ext, analyzer = kind.name(), "registered analyzer");
        self.table.insert(ext, kind);
        Ok(())
    }

    /// Analyzer kind for `path`; unknown or missing extensions are generic.
    pub fn kind_for(&self, path: &str) -> AnalyzerKind {
        extension_of(path)
            .and_then(|ext| self.table.get(&ext).copied())
            .unwrap_or(AnalyzerKind::Generic)
    }

    /// Analyzer for `path`.
    pub fn select(&self, path: &str) -> FileAnalyzer {
        self.kind_for(path).build(self.options)
    }

    pub fn options(&self) -> AnalysisOptions {
        self.options
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<(&str, AnalyzerKind)> {
        let mut out: Vec<(&str, AnalyzerKind)> =
            self.table.iter().map(|(ext, kind)| (ext.as_str(), *kind)).collect();
        out.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::with_defaults(AnalysisOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;

    #[test]
    fn test_defaults() {
        let registry = AnalyzerRegistry::default();
        assert_eq!(registry.kind_for("pom.xml"), AnalyzerKind::Xml);
        assert_eq!(registry.kind_for("deploy/app.yaml"), AnalyzerKind::Yaml);
        assert_eq!(registry.kind_for("app.props"), AnalyzerKind::Properties);
        assert_eq!(registry.kind_for("Makefile"), AnalyzerKind::Generic);
        assert_eq!(registry.extensions().len(), 5);
    }

    #[test]
    fn test_select_is_case_insensitive() {
        let registry = AnalyzerRegistry::default();
        assert_eq!(registry.select("config.YML"), registry.select("config.yml"));
        assert_eq!(registry.select("config.YML").name(), "yaml");
        assert_eq!(registry.select("config.unknown").name(), "generic");
    }

    #[test]
    fn test_register_custom_extension() {
        let mut registry = AnalyzerRegistry::default();
        registry.register(".POM", AnalyzerKind::Xml).unwrap();
        assert_eq!(registry.kind_for("module/pom.pom"), AnalyzerKind::Xml);
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let mut registry = AnalyzerRegistry::default();
        let err = registry.register(".Xml", AnalyzerKind::Yaml).unwrap_err();
        assert_eq!(
            err,
            DispatchError::DuplicateExtension {
                extension: ".xml".into(),
                existing: "xml",
            }
        );
    }

    #[test]
    fn test_invalid_extension_rejected() {
        let mut registry = AnalyzerRegistry::empty(AnalysisOptions::default());
        for bad in ["xml", ".", "", ".tar.gz"] {
            assert!(matches!(
                registry.register(bad, AnalyzerKind::Xml),
                Err(DispatchError::InvalidExtension(_))
            ));
        }
    }

    #[test]
    fn test_from_config() {
        let mut extensions = BTreeMap::new();
        extensions.insert(".pom".to_string(), "xml".to_string());
        let registry = AnalyzerRegistry::from_config(&extensions, AnalysisOptions::default()).unwrap();
        assert_eq!(registry.kind_for("a.pom"), AnalyzerKind::Xml);

        extensions.insert(".cfg".to_string(), "ini".to_string());
        let err = AnalyzerRegistry::from_config(&extensions, AnalysisOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownAnalyzer(_))));
    }
}
