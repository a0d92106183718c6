//! Error types for the branchdiff core library.
//!
//! Each subsystem has its own error type derived with `thiserror`.
//! [`ParseError`] and [`AnalysisError`] are recovered inside the analyzers;
//! the startup errors that can reach a caller are unified by [`CoreError`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Errors that escape the core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Malformed format-specific content.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The XML document is not well formed.
    #[error("malformed XML at line {line}: {detail}")]
    Xml { line: usize, detail: String },

    /// The YAML stream could not be loaded.
    #[error("malformed YAML: {0}")]
    Yaml(String),

    /// A properties line could not be decoded.
    #[error("malformed properties at line {line}: {detail}")]
    Properties { line: usize, detail: String },
}

impl ParseError {
    /// Short name of the format that failed to parse.
    pub fn format(&self) -> &'static str {
        match self {
            Self::Xml { .. } => "xml",
            Self::Yaml(_) => "yaml",
            Self::Properties { .. } => "properties",
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis errors
// ---------------------------------------------------------------------------

/// Errors raised while preparing a file for analysis.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// The content is binary or not valid UTF-8.
    #[error("unsupported content in {side} version: {detail}")]
    UnsupportedContent { side: &'static str, detail: String },
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Analyzer registration errors. These are startup configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Two analyzers claimed the same extension.
    #[error("extension '{extension}' is already registered to the {existing} analyzer")]
    DuplicateExtension {
        extension: String,
        existing: &'static str,
    },

    /// The extension is not of the form `.ext`.
    #[error("invalid extension '{0}': must start with '.' and name a suffix")]
    InvalidExtension(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// An analyzer name in `[analysis.extensions]` is unknown.
    #[error("unknown analyzer '{0}' (expected one of: generic, xml, yaml, properties)")]
    UnknownAnalyzer(String),

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ParseError::Xml {
            line: 4,
            detail: "mismatched closing tag".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed XML at line 4: mismatched closing tag"
        );
        assert_eq!(err.format(), "xml");

        let err = DispatchError::DuplicateExtension {
            extension: ".xml".into(),
            existing: "xml",
        };
        assert!(err.to_string().contains(".xml"));

        let err = AnalysisError::UnsupportedContent {
            side: "after",
            detail: "NUL byte at offset 3".into(),
        };
        assert!(err.to_string().contains("after"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let config_err = ConfigError::UnknownAnalyzer("ini".into());
        let core_err: CoreError = config_err.into();
        assert!(matches!(core_err, CoreError::Config(_)));
        assert!(core_err.to_string().contains("ini"));

        let dispatch_err = DispatchError::InvalidExtension("xml".into());
        let core_err: CoreError = dispatch_err.into();
        assert!(matches!(core_err, CoreError::Dispatch(_)));
    }
}
