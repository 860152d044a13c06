//! Engine configuration
//!
//! An [`EngineConfig`] is passed explicitly to [`crate::sparql::SparqlEngine`];
//! there is no global configuration state. Configuration can be built in code
//! or loaded from a YAML or JSON document.
//!
//! ```yaml
//! base_iri: "http://example.org/"
//! prefixes:
//!   ex: "http://example.org/"
//! describe: concise
//! logging:
//!   level: debug
//! ```

use crate::rdf::NamespaceManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension is neither YAML nor JSON
    #[error("Unsupported configuration file format: {0}")]
    UnsupportedExtension(String),

    /// `now` is not an RFC 3339 timestamp
    #[error("Invalid NOW override: {0}")]
    InvalidNow(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which triples DESCRIBE returns for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescribeStrategy {
    /// Triples with the resource as subject
    #[default]
    Subject,
    /// Subject triples, following blank-node objects recursively
    Concise,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "notegraph=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Query engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default BASE for relative IRIs
    pub base_iri: Option<String>,
    /// Extra prefixes, merged over the built-in ones
    pub prefixes: BTreeMap<String, String>,
    /// Pre-declare rdf, rdfs, xsd, owl, foaf, dc and dcterms
    pub use_default_prefixes: bool,
    pub describe: DescribeStrategy,
    /// RFC 3339 timestamp returned by NOW()
    pub now: Option<String>,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_iri: None,
            prefixes: BTreeMap::new(),
            use_default_prefixes: true,
            describe: DescribeStrategy::default(),
            now: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load configuration from a `.yaml`, `.yml` or `.json` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => {
                return Err(ConfigError::UnsupportedExtension(
                    path.display().to_string(),
                ))
            }
        };
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Prefixes pre-declared for every query
    pub fn namespaces(&self) -> NamespaceManager {
        let mut namespaces = if self.use_default_prefixes {
            NamespaceManager::new()
        } else {
            NamespaceManager::empty()
        };
        for (prefix, iri) in &self.prefixes {
            namespaces.add_prefix(prefix.clone(), iri.clone());
        }
        namespaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.use_default_prefixes);
        assert_eq!(config.describe, DescribeStrategy::Subject);
        assert_eq!(config.logging.level, "info");
        assert!(config.namespaces().get_iri("foaf").is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = EngineConfig::from_yaml_str(
            "describe: concise\nprefixes:\n  ex: \"http://example.org/\"\n",
        )
        .unwrap();
        assert_eq!(config.describe, DescribeStrategy::Concise);
        assert!(config.use_default_prefixes);
        assert_eq!(config.namespaces().get_iri("ex").unwrap(), "http://example.org/");
    }

    #[test]
    fn test_json_without_default_prefixes() {
        let config = EngineConfig::from_json_str(
            r#"{"use_default_prefixes": false, "logging": {"level": "debug"}}"#,
        )
        .unwrap();
        assert!(config.namespaces().is_empty());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_strategy() {
        assert!(matches!(
            EngineConfig::from_yaml_str("describe: everything"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "base_iri: \"http://example.org/base/\"").unwrap();
        writeln!(file, "now: \"2024-01-01T00:00:00Z\"").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_iri.as_deref(), Some("http://example.org/base/"));
        assert_eq!(config.now.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        assert!(matches!(
            EngineConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedExtension(_))
        ));
    }
}
