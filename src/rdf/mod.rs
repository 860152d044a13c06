//! RDF data model and in-memory triple store
//!
//! This module provides:
//! - RDF terms (IRIs, blank nodes, literals) wrapping the `oxrdf` primitives
//! - Triples and triple patterns
//! - An indexed, de-duplicating triple store
//! - Namespace prefix management
//!
//! # Example
//!
//! ```rust
//! use notegraph::rdf::{RdfStore, Triple, NamedNode, Literal, RdfPredicate};
//!
//! let mut store = RdfStore::new();
//!
//! let subject = NamedNode::new("http://example.org/alice").unwrap();
//! let predicate = RdfPredicate::new("http://xmlns.com/foaf/0.1/name").unwrap();
//! let object = Literal::new_simple_literal("Alice");
//!
//! let triple = Triple::new(subject.clone().into(), predicate, object.into());
//! assert!(store.add(triple.clone()));
//!
//! let results: Vec<_> = store.match_triples(Some(&subject.into()), None, None).collect();
//! assert_eq!(results, vec![&triple]);
//! ```

mod namespace;
mod store;
mod types;

pub use types::{
    BlankNode, Literal, NamedNode, RdfError, RdfObject, RdfPredicate, RdfResult, RdfSubject,
    RdfTerm, Triple, TriplePattern,
};

pub use store::{RdfStore, RdfStoreError, RdfStoreResult, SharedRdfStore, TripleIterator};

pub use namespace::{NamespaceManager, PrefixError, PrefixResult, DEFAULT_PREFIXES};
