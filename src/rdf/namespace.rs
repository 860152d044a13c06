//! RDF namespace and prefix management
//!
//! Holds the prefixes pre-declared for every query, before the query's own
//! PREFIX declarations are applied.

use indexmap::IndexMap;
use thiserror::Error;

/// Prefix errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// Not a prefixed name
    #[error("Invalid prefixed name: {0}")]
    InvalidPrefixedName(String),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

/// Well-known prefixes declared by default
pub const DEFAULT_PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
];

/// Namespace manager with common prefixes
///
/// Keeps declaration order so that `compact` is deterministic when two
/// namespaces overlap (the longest matching namespace wins).
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    prefixes: IndexMap<String, String>,
}

impl NamespaceManager {
    /// Create a new namespace manager with common prefixes
    pub fn new() -> Self {
        let mut mgr = Self::empty();
        for (prefix, iri) in DEFAULT_PREFIXES {
            mgr.add_prefix(*prefix, *iri);
        }
        mgr
    }

    /// Create a namespace manager without any prefixes
    pub fn empty() -> Self {
        Self {
            prefixes: IndexMap::new(),
        }
    }

    /// Add or replace a prefix
    pub fn add_prefix(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    /// Get IRI for a prefix
    pub fn get_iri(&self, prefix: &str) -> PrefixResult<&str> {
        self.prefixes
            .get(prefix)
            .map(|s| s.as_str())
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Expand a compact IRI (prefix:local) to full IRI
    pub fn expand(&self, compact_iri: &str) -> PrefixResult<String> {
        let (prefix, local) = compact_iri
            .split_once(':')
            .ok_or_else(|| PrefixError::InvalidPrefixedName(compact_iri.to_string()))?;
        let iri = self.get_iri(prefix)?;
        Ok(format!("{}{}", iri, local))
    }

    /// Compact an IRI using known prefixes
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, ns)| iri.starts_with(ns.as_str()))
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{}:{}", prefix, &iri[ns.len()..]))
    }

    /// Iterate over (prefix, namespace IRI) pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, i)| (p.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_prefixes() {
        let mgr = NamespaceManager::new();

        assert_eq!(
            mgr.get_iri("rdf").unwrap(),
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#"
        );
        assert_eq!(mgr.get_iri("xsd").unwrap(), "http://www.w3.org/2001/XMLSchema#");
        assert_eq!(mgr.len(), DEFAULT_PREFIXES.len());
    }

    #[test]
    fn test_expand() {
        let mgr = NamespaceManager::new();

        assert_eq!(mgr.expand("foaf:name").unwrap(), "http://xmlns.com/foaf/0.1/name");
        assert_eq!(
            mgr.expand("nope:x"),
            Err(PrefixError::UnknownPrefix("nope".to_string()))
        );
        assert!(mgr.expand("plain").is_err());
    }

    #[test]
    fn test_compact_prefers_longest_namespace() {
        let mut mgr = NamespaceManager::new();
        mgr.add_prefix("ex", "http://example.org/");
        mgr.add_prefix("people", "http://example.org/people/");

        assert_eq!(
            mgr.compact("http://example.org/people/alice"),
            Some("people:alice".to_string())
        );
        assert_eq!(mgr.compact("http://example.org/x"), Some("ex:x".to_string()));
        assert_eq!(mgr.compact("urn:other"), None);
    }

    #[test]
    fn test_empty_manager() {
        let mgr = NamespaceManager::empty();
        assert!(mgr.is_empty());
        assert!(mgr.expand("rdf:type").is_err());
    }
}
