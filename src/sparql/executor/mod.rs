//! SPARQL execution engine using the Volcano iterator model
//!
//! The executor translates a parsed query, plans the algebra into physical
//! operators and drives them for the four query forms.

pub mod operator;
pub mod planner;
pub mod solution;

pub use operator::{OperatorBox, PhysicalOperator};
pub use planner::QueryPlanner;
pub use solution::Solution;

use crate::config::DescribeStrategy;
use crate::rdf::{BlankNode, Literal, RdfObject, RdfStore, RdfSubject, RdfTerm, Triple};
use crate::sparql::algebra::{is_hidden_variable, Algebra};
use crate::sparql::ast::{DescribeTargets, PropertyPath, Query, QueryForm, TermPattern, VerbPattern};
use crate::sparql::results::{QuerySolutionIter, SparqlResults};
use crate::sparql::translator::{translate_query, TranslateError};
use chrono::{SecondsFormat, Utc};
use indexmap::IndexSet;
use regex::{Regex, RegexBuilder};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use thiserror::Error;
use tracing::{debug, warn};

/// Execution errors
///
/// Data-dependent failures inside expressions are not errors; they are
/// handled locally by the operators.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Query could not be translated to algebra
    #[error("Translation error: {0}")]
    TranslationError(#[from] TranslateError),

    /// Algebra could not be turned into an operator tree
    #[error("Planning error: {0}")]
    PlanningError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Per-execution state shared by all operators of one query
///
/// Fixes NOW() for the whole execution and caches compiled regular
/// expressions and BNODE(label) results.
pub struct ExecutionContext<'a> {
    pub store: &'a RdfStore,
    now: Literal,
    base_iri: Option<String>,
    blank_labels: RefCell<FxHashMap<String, BlankNode>>,
    regex_cache: RefCell<FxHashMap<(String, String), Option<Regex>>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(store: &'a RdfStore) -> Self {
        Self {
            store,
            now: Literal::date_time(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            base_iri: None,
            blank_labels: RefCell::new(FxHashMap::default()),
            regex_cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Pin the value returned by NOW()
    pub fn with_now(mut self, now: Literal) -> Self {
        self.now = now;
        self
    }

    /// Base IRI used by IRI() to resolve relative references
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Self {
        self.base_iri = Some(base_iri.into());
        self
    }

    pub fn now(&self) -> &Literal {
        &self.now
    }

    pub fn base_iri(&self) -> Option<&str> {
        self.base_iri.as_deref()
    }

    pub fn fresh_blank_node(&self) -> BlankNode {
        BlankNode::new()
    }

    /// BNODE(label): the same label yields the same node within one execution
    pub fn blank_node_for(&self, label: &str) -> BlankNode {
        self.blank_labels
            .borrow_mut()
            .entry(label.to_string())
            .or_default()
            .clone()
    }

    /// Compile a SPARQL regex with XPath flags; `None` for an invalid
    /// pattern or unknown flag
    pub fn compile_regex(&self, pattern: &str, flags: &str) -> Option<Regex> {
        let key = (pattern.to_string(), flags.to_string());
        if let Some(cached) = self.regex_cache.borrow().get(&key) {
            return cached.clone();
        }

        let compiled = build_regex(pattern, flags);
        if compiled.is_none() {
            debug!(pattern, flags, "invalid regular expression");
        }
        self.regex_cache.borrow_mut().insert(key, compiled.clone());
        compiled
    }
}

fn build_regex(pattern: &str, flags: &str) -> Option<Regex> {
    let literal = flags.contains('q');
    let escaped;
    let source = if literal {
        escaped = regex::escape(pattern);
        escaped.as_str()
    } else {
        pattern
    };

    let mut builder = RegexBuilder::new(source);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            's' => builder.dot_matches_new_line(true),
            'm' => builder.multi_line(true),
            'x' => builder.ignore_whitespace(true),
            'q' => &mut builder,
            _ => return None,
        };
    }
    builder.build().ok()
}

/// Query executor over a borrowed store
///
/// The store stays immutably borrowed for as long as any result iterator
/// is alive, so it cannot change under a running query.
pub struct SparqlExecutor<'a> {
    store: &'a RdfStore,
    planner: QueryPlanner,
    describe: DescribeStrategy,
    now: Option<Literal>,
    base_iri: Option<String>,
}

impl<'a> SparqlExecutor<'a> {
    /// Create a new executor
    pub fn new(store: &'a RdfStore) -> Self {
        Self {
            store,
            planner: QueryPlanner::new(),
            describe: DescribeStrategy::default(),
            now: None,
            base_iri: None,
        }
    }

    pub fn with_describe_strategy(mut self, strategy: DescribeStrategy) -> Self {
        self.describe = strategy;
        self
    }

    /// Pin NOW() instead of reading the clock at each execution
    pub fn with_now(mut self, now: Literal) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Self {
        self.base_iri = Some(base_iri.into());
        self
    }

    fn context(&self, query: &Query) -> ExecutionContext<'a> {
        let mut ctx = ExecutionContext::new(self.store);
        if let Some(now) = &self.now {
            ctx = ctx.with_now(now.clone());
        }
        if let Some(base) = query.base.as_ref().or(self.base_iri.as_ref()) {
            ctx = ctx.with_base_iri(base.clone());
        }
        ctx
    }

    /// Execute any query form and materialize its result
    pub fn execute(&self, query: &Query) -> ExecutionResult<SparqlResults> {
        let results = match &query.form {
            QueryForm::Select { .. } => self.execute_select(query)?.into_results()?,
            QueryForm::Ask => SparqlResults::Boolean(self.execute_ask(query)?),
            QueryForm::Construct { .. } => SparqlResults::Graph(self.execute_construct(query)?),
            QueryForm::Describe { .. } => SparqlResults::Graph(self.execute_describe(query)?),
        };
        debug!(results = results.len(), "query executed");
        Ok(results)
    }

    /// Execute a SELECT query as a lazy solution stream
    pub fn execute_select(&self, query: &Query) -> ExecutionResult<QuerySolutionIter<'a>> {
        if !matches!(query.form, QueryForm::Select { .. }) {
            return Err(ExecutionError::RuntimeError(
                "execute_select requires a SELECT query".to_string(),
            ));
        }
        let algebra = translate_query(query)?;
        let variables = result_variables(&algebra);
        let root = self.planner.plan(&algebra)?;
        Ok(QuerySolutionIter::new(variables, root, self.context(query)))
    }

    /// Execute an already translated algebra tree
    pub fn execute_algebra(&self, algebra: &Algebra) -> ExecutionResult<QuerySolutionIter<'a>> {
        let mut ctx = ExecutionContext::new(self.store);
        if let Some(now) = &self.now {
            ctx = ctx.with_now(now.clone());
        }
        if let Some(base) = &self.base_iri {
            ctx = ctx.with_base_iri(base.clone());
        }
        let root = self.planner.plan(algebra)?;
        Ok(QuerySolutionIter::new(result_variables(algebra), root, ctx))
    }

    /// ASK: true as soon as one solution exists
    pub fn execute_ask(&self, query: &Query) -> ExecutionResult<bool> {
        let algebra = translate_query(query)?;
        let ctx = self.context(query);
        let mut root = self.planner.plan(&algebra)?;
        Ok(root.next(&ctx)?.is_some())
    }

    /// CONSTRUCT: instantiate the template once per solution
    ///
    /// Template blank nodes are fresh for each solution. Triples that would
    /// be ill-formed (unbound variable, literal subject) are skipped.
    pub fn execute_construct(&self, query: &Query) -> ExecutionResult<Vec<Triple>> {
        let QueryForm::Construct { template } = &query.form else {
            return Err(ExecutionError::RuntimeError(
                "execute_construct requires a CONSTRUCT query".to_string(),
            ));
        };
        let algebra = translate_query(query)?;
        let ctx = self.context(query);
        let mut root = self.planner.plan(&algebra)?;

        let mut triples: IndexSet<Triple> = IndexSet::new();
        while let Some(solution) = root.next(&ctx)? {
            let mut blank_nodes: FxHashMap<String, BlankNode> = FxHashMap::default();
            for pattern in template {
                let mut instantiate = |term: &TermPattern| -> Option<RdfTerm> {
                    match term {
                        TermPattern::Variable(v) => solution.get(v).cloned(),
                        TermPattern::BlankNode(label) => Some(
                            blank_nodes
                                .entry(label.clone())
                                .or_default()
                                .clone()
                                .into(),
                        ),
                        TermPattern::Term(t) => Some(t.clone()),
                    }
                };
                let subject = instantiate(&pattern.subject);
                let object = instantiate(&pattern.object);
                let predicate = match &pattern.verb {
                    VerbPattern::Variable(v) => solution.get(v).cloned(),
                    VerbPattern::Path(PropertyPath::Link(iri)) => {
                        Some(crate::rdf::NamedNode::new_unchecked(iri.as_str()).into())
                    }
                    VerbPattern::Path(_) => None,
                };
                if let (Some(s), Some(p), Some(o)) = (subject, predicate, object) {
                    if let Ok(triple) = Triple::from_terms(s, p, o) {
                        triples.insert(triple);
                    }
                }
            }
        }
        debug!(triples = triples.len(), "constructed graph");
        Ok(triples.into_iter().collect())
    }

    /// DESCRIBE: triples about each resolved resource
    pub fn execute_describe(&self, query: &Query) -> ExecutionResult<Vec<Triple>> {
        let QueryForm::Describe { targets } = &query.form else {
            return Err(ExecutionError::RuntimeError(
                "execute_describe requires a DESCRIBE query".to_string(),
            ));
        };

        let mut resources: IndexSet<RdfTerm> = IndexSet::new();
        let mut variables: Vec<&str> = Vec::new();
        match targets {
            DescribeTargets::Terms(terms) => {
                for term in terms {
                    match term {
                        TermPattern::Term(t) => {
                            resources.insert(t.clone());
                        }
                        TermPattern::Variable(v) => variables.push(v),
                        TermPattern::BlankNode(_) => {}
                    }
                }
            }
            DescribeTargets::All => {}
        }

        let needs_solutions = !variables.is_empty() || matches!(targets, DescribeTargets::All);
        if needs_solutions {
            let algebra = translate_query(query)?;
            let ctx = self.context(query);
            let mut root = self.planner.plan(&algebra)?;
            while let Some(solution) = root.next(&ctx)? {
                match targets {
                    DescribeTargets::All => {
                        for (variable, term) in solution.iter() {
                            if !is_hidden_variable(variable) {
                                resources.insert(term.clone());
                            }
                        }
                    }
                    DescribeTargets::Terms(_) => {
                        for variable in &variables {
                            if let Some(term) = solution.get(variable) {
                                resources.insert(term.clone());
                            }
                        }
                    }
                }
            }
        }

        let mut triples: IndexSet<Triple> = IndexSet::new();
        for resource in resources {
            match RdfSubject::try_from(resource) {
                Ok(subject) => self.describe_resource(&subject, &mut triples),
                Err(e) => warn!(error = %e, "skipping DESCRIBE target"),
            }
        }
        Ok(triples.into_iter().collect())
    }

    fn describe_resource(&self, subject: &RdfSubject, out: &mut IndexSet<Triple>) {
        let mut visited: FxHashSet<RdfSubject> = FxHashSet::default();
        let mut pending = vec![subject.clone()];

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for triple in self.store.match_triples(Some(&current), None, None) {
                out.insert(triple.clone());
                if self.describe == DescribeStrategy::Concise {
                    if let RdfObject::BlankNode(b) = &triple.object {
                        pending.push(RdfSubject::BlankNode(b.clone()));
                    }
                }
            }
        }
    }
}

/// Variables a SELECT result reports, in projection order
fn result_variables(algebra: &Algebra) -> Vec<String> {
    match algebra {
        Algebra::Slice { inner, .. } | Algebra::Distinct(inner) | Algebra::Reduced(inner) => {
            result_variables(inner)
        }
        Algebra::Project { variables, .. } => variables.clone(),
        other => other
            .in_scope_variables()
            .into_iter()
            .filter(|v| !is_hidden_variable(v))
            .collect(),
    }
}
