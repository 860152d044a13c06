//! SPARQL 1.1 query language support
//!
//! Query text goes through four stages, each reachable on its own:
//!
//! 1. [`parse_query`] turns text into a [`ast::Query`]
//! 2. [`translate_query`] turns the AST into an [`algebra::Algebra`] tree
//! 3. [`SparqlExecutor`] plans the algebra into physical operators and
//!    pulls solutions from them
//! 4. [`SparqlResults::serialize`] renders results as JSON, CSV, TSV or
//!    N-Triples
//!
//! [`SparqlEngine`] runs the whole pipeline with an [`EngineConfig`].
//!
//! # Example
//!
//! ```rust
//! use notegraph::rdf::{Literal, NamedNode, RdfStore};
//! use notegraph::sparql::SparqlEngine;
//!
//! let mut store = RdfStore::new();
//! let alice = NamedNode::new("http://example.org/alice").unwrap();
//! let name = NamedNode::new("http://xmlns.com/foaf/0.1/name").unwrap();
//! store.add_terms(alice, name, Literal::new_simple_literal("Alice")).unwrap();
//!
//! let engine = SparqlEngine::new();
//! let results = engine
//!     .query(&store, "SELECT ?name WHERE { ?person foaf:name ?name }")
//!     .unwrap();
//! assert_eq!(results.len(), 1);
//! ```

pub mod algebra;
pub mod ast;
pub mod eval;
pub mod executor;
pub mod parser;
pub mod results;
pub mod translator;

pub use executor::{ExecutionError, ExecutionResult, SparqlExecutor};
pub use parser::{parse_query, parse_query_with, ParseError, ParseResult};
pub use results::{
    QuerySolutionIter, ResultFormat, SerializationError, SerializationResult, SparqlResults,
};
pub use translator::{translate_query, TranslateError, TranslateResult};

use crate::config::{ConfigError, ConfigResult, EngineConfig};
use crate::rdf::{Literal, NamespaceManager, RdfStore};
use ast::Query;
use thiserror::Error;
use tracing::debug;

/// SPARQL errors
#[derive(Error, Debug)]
pub enum SparqlError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type SparqlResult<T> = Result<T, SparqlError>;

/// SPARQL query engine
///
/// Holds configuration only; the store is passed to each query, so one
/// engine can serve any number of stores.
#[derive(Debug, Clone)]
pub struct SparqlEngine {
    config: EngineConfig,
    namespaces: NamespaceManager,
    now: Option<Literal>,
}

impl SparqlEngine {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        let config = EngineConfig::default();
        Self {
            namespaces: config.namespaces(),
            config,
            now: None,
        }
    }

    /// Create an engine from an explicit configuration
    ///
    /// Fails if the configured NOW override is not a valid timestamp.
    pub fn with_config(config: EngineConfig) -> ConfigResult<Self> {
        let now = match &config.now {
            Some(text) => {
                if eval::functions::parse_date_time(text).is_none() {
                    return Err(ConfigError::InvalidNow(text.clone()));
                }
                Some(Literal::date_time(text.trim()))
            }
            None => None,
        };
        Ok(Self {
            namespaces: config.namespaces(),
            config,
            now,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse query text with the configured prefixes and base IRI
    pub fn prepare(&self, text: &str) -> SparqlResult<Query> {
        Ok(parse_query_with(
            text,
            &self.namespaces,
            self.config.base_iri.as_deref(),
        )?)
    }

    /// Executor over `store` configured like this engine
    pub fn executor<'a>(&self, store: &'a RdfStore) -> SparqlExecutor<'a> {
        let mut executor = SparqlExecutor::new(store).with_describe_strategy(self.config.describe);
        if let Some(now) = &self.now {
            executor = executor.with_now(now.clone());
        }
        if let Some(base) = &self.config.base_iri {
            executor = executor.with_base_iri(base.clone());
        }
        executor
    }

    /// Parse, translate and execute a query of any form
    pub fn query(&self, store: &RdfStore, text: &str) -> SparqlResult<SparqlResults> {
        let query = self.prepare(text)?;
        let results = self.executor(store).execute(&query)?;
        debug!(results = results.len(), "query answered");
        Ok(results)
    }

    /// Run a SELECT query as a lazy solution stream
    pub fn select<'a>(&self, store: &'a RdfStore, text: &str) -> SparqlResult<QuerySolutionIter<'a>> {
        let query = self.prepare(text)?;
        Ok(self.executor(store).execute_select(&query)?)
    }

    pub fn ask(&self, store: &RdfStore, text: &str) -> SparqlResult<bool> {
        let query = self.prepare(text)?;
        Ok(self.executor(store).execute_ask(&query)?)
    }
}

impl Default for SparqlEngine {
    fn default() -> Self {
        Self::new()
    }
}
