//! Notegraph
//!
//! An in-memory RDF triple store and SPARQL 1.1 query engine for facts
//! extracted from structured notes.
//!
//! # Architecture
//!
//! - [`rdf`]: term model (IRIs, blank nodes, literals, triples), the indexed
//!   triple store and namespace prefixes
//! - [`sparql`]: grammar and parser, algebra translator, expression and
//!   property-path evaluator, Volcano-style executor and result formats
//! - [`config`]: explicit engine configuration, loadable from YAML or JSON
//! - [`logging`]: optional `tracing` subscriber setup for hosts
//!
//! Triple extraction from notes, result rendering and persistence are left
//! to the host application.
//!
//! ## Example Usage
//!
//! ```rust
//! use notegraph::rdf::{Literal, NamedNode, RdfStore};
//! use notegraph::sparql::{ResultFormat, SparqlEngine};
//!
//! let mut store = RdfStore::new();
//! let age = NamedNode::new("http://example.org/age").unwrap();
//! for (name, years) in [("alice", 30), ("bob", 25), ("charlie", 35)] {
//!     let person = NamedNode::new(&format!("http://example.org/{}", name)).unwrap();
//!     store.add_terms(person, age.clone(), Literal::integer(years)).unwrap();
//! }
//!
//! let engine = SparqlEngine::new();
//! let results = engine
//!     .query(
//!         &store,
//!         "SELECT ?p WHERE { ?p <http://example.org/age> ?a FILTER(?a > 25) } ORDER BY ?a",
//!     )
//!     .unwrap();
//! assert_eq!(results.len(), 2);
//!
//! let csv = results.serialize(ResultFormat::Csv).unwrap();
//! assert!(csv.starts_with("p\r\n"));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod logging;
pub mod rdf;
pub mod sparql;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigResult, DescribeStrategy, EngineConfig, LoggingConfig};

pub use rdf::{
    BlankNode, Literal, NamedNode, NamespaceManager, RdfError, RdfObject, RdfPredicate,
    RdfStore, RdfStoreError, RdfStoreResult, RdfSubject, RdfTerm, SharedRdfStore, Triple,
    TriplePattern,
};

pub use sparql::{
    parse_query, translate_query, QuerySolutionIter, ResultFormat, SparqlEngine, SparqlError,
    SparqlExecutor, SparqlResult, SparqlResults,
};

pub use sparql::executor::Solution;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
