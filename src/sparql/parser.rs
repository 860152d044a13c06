//! SPARQL query parser using Pest
//!
//! Builds the [`Query`] AST from query text. Prefixed names and relative
//! IRIs are resolved here against the prologue and the configured base, so
//! later stages only ever see absolute IRIs.

use crate::rdf::{Literal, NamedNode, NamespaceManager, RdfTerm};
use crate::sparql::ast::*;
use oxiri::Iri;
use oxrdf::vocab::{rdf, xsd};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::cell::Cell;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

#[derive(Parser)]
#[grammar = "sparql/sparql.pest"]
struct SparqlGrammar;

static EXPR_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::comparison_op, Assoc::Left))
        .op(Op::postfix(Rule::in_op))
        .op(Op::infix(Rule::add_sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_div_op, Assoc::Left))
        .op(Op::prefix(Rule::unary_op))
});

static PATH_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::path_alt, Assoc::Left))
        .op(Op::infix(Rule::path_seq, Assoc::Left))
        .op(Op::prefix(Rule::path_inverse))
        .op(Op::postfix(Rule::path_mod))
});

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Grammar violation, with the position and expected tokens
    #[error("Syntax error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {found}")]
    WrongArity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("Invalid VALUES block: {0}")]
    InvalidValues(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Unexpected grammar rule: {0}")]
    Unexpected(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a SPARQL query using the default prefixes and no base IRI
pub fn parse_query(input: &str) -> ParseResult<Query> {
    parse_query_with(input, &NamespaceManager::new(), None)
}

/// Parse a SPARQL query with pre-declared prefixes and an optional base IRI
pub fn parse_query_with(
    input: &str,
    namespaces: &NamespaceManager,
    base_iri: Option<&str>,
) -> ParseResult<Query> {
    debug!(query = input, "parsing SPARQL query");

    let base = base_iri
        .map(|iri| {
            Iri::parse(iri.to_string())
                .map_err(|e| ParseError::InvalidIri(format!("{}: {}", iri, e)))
        })
        .transpose()?;

    let mut pairs = SparqlGrammar::parse(Rule::query, input)?;
    let pair = pairs
        .next()
        .ok_or_else(|| ParseError::Unexpected("empty parse tree".to_string()))?;

    let mut parser = QueryParser {
        namespaces: namespaces.clone(),
        base,
        blank_counter: Cell::new(0),
    };
    parser.parse_query(pair)
}

fn unexpected(pair: &Pair<Rule>) -> ParseError {
    ParseError::Unexpected(format!("{:?} '{}'", pair.as_rule(), pair.as_str()))
}

fn var_name(pair: &Pair<Rule>) -> String {
    // `?` and `$` are both one byte
    pair.as_str()[1..].to_string()
}

struct QueryParser {
    namespaces: NamespaceManager,
    base: Option<Iri<String>>,
    blank_counter: Cell<usize>,
}

impl QueryParser {
    fn parse_query(&mut self, pair: Pair<Rule>) -> ParseResult<Query> {
        let mut query = None;
        let mut values = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::prologue => self.parse_prologue(inner)?,
                Rule::select_query => query = Some(self.parse_select_query(inner)?),
                Rule::construct_query => query = Some(self.parse_construct_query(inner)?),
                Rule::describe_query => query = Some(self.parse_describe_query(inner)?),
                Rule::ask_query => query = Some(self.parse_ask_query(inner)?),
                Rule::values_clause => values = Some(self.parse_values_clause(inner)?),
                Rule::EOI => {}
                _ => return Err(unexpected(&inner)),
            }
        }

        let mut query =
            query.ok_or_else(|| ParseError::Unexpected("missing query form".to_string()))?;
        if values.is_some() {
            query.values = values;
        }
        query.base = self.base.as_ref().map(|b| b.as_str().to_string());
        debug!(form = ?query.form, "parsed SPARQL query");
        Ok(query)
    }

    fn parse_prologue(&mut self, pair: Pair<Rule>) -> ParseResult<()> {
        for decl in pair.into_inner() {
            match decl.as_rule() {
                Rule::base_decl => {
                    let iri_pair = decl.into_inner().next().ok_or_else(|| {
                        ParseError::Unexpected("BASE without IRI".to_string())
                    })?;
                    let resolved = self.resolve_iri(strip_iriref(iri_pair.as_str()))?;
                    self.base = Some(
                        Iri::parse(resolved.clone())
                            .map_err(|e| ParseError::InvalidIri(format!("{}: {}", resolved, e)))?,
                    );
                }
                Rule::prefix_decl => {
                    let mut inner = decl.into_inner();
                    let (Some(ns), Some(iri)) = (inner.next(), inner.next()) else {
                        return Err(ParseError::Unexpected("incomplete PREFIX".to_string()));
                    };
                    let prefix = ns.as_str().trim_end_matches(':').to_string();
                    let namespace = self.resolve_iri(strip_iriref(iri.as_str()))?;
                    self.namespaces.add_prefix(prefix, namespace);
                }
                _ => return Err(unexpected(&decl)),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------ query forms

    fn parse_select_query(&self, pair: Pair<Rule>) -> ParseResult<Query> {
        let mut form = None;
        let mut pattern = GroupGraphPattern::empty();
        let mut modifiers = SolutionModifiers::default();
        let mut values = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::select_clause => form = Some(self.parse_select_clause(inner)?),
                Rule::where_clause => pattern = self.parse_where_clause(inner)?,
                Rule::solution_modifier => modifiers = self.parse_solution_modifier(inner)?,
                Rule::values_clause => values = Some(self.parse_values_clause(inner)?),
                _ => return Err(unexpected(&inner)),
            }
        }

        Ok(Query {
            base: None,
            form: form.ok_or_else(|| ParseError::Unexpected("missing SELECT".to_string()))?,
            pattern,
            modifiers,
            values,
        })
    }

    fn parse_select_clause(&self, pair: Pair<Rule>) -> ParseResult<QueryForm> {
        let mut modifier = None;
        let mut items = Vec::new();
        let mut all = false;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::select_modifier => {
                    modifier = Some(if inner.as_str().eq_ignore_ascii_case("DISTINCT") {
                        SelectModifier::Distinct
                    } else {
                        SelectModifier::Reduced
                    });
                }
                Rule::select_all => all = true,
                Rule::select_item => items.push(self.parse_select_item(inner)?),
                _ => return Err(unexpected(&inner)),
            }
        }

        let projection = if all {
            Projection::All
        } else {
            Projection::Items(items)
        };
        Ok(QueryForm::Select {
            modifier,
            projection,
        })
    }

    fn parse_select_item(&self, pair: Pair<Rule>) -> ParseResult<SelectItem> {
        let mut expression = None;
        let mut variable = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::expression => expression = Some(self.parse_expression(inner)?),
                Rule::var => variable = Some(var_name(&inner)),
                _ => return Err(unexpected(&inner)),
            }
        }
        Ok(SelectItem {
            variable: variable
                .ok_or_else(|| ParseError::Unexpected("select item without variable".into()))?,
            expression,
        })
    }

    fn parse_construct_query(&self, pair: Pair<Rule>) -> ParseResult<Query> {
        let mut template = Vec::new();
        let mut pattern = GroupGraphPattern::empty();
        let mut modifiers = SolutionModifiers::default();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::construct_template => template = self.parse_template(inner)?,
                Rule::construct_short => {
                    template = self.parse_template(inner)?;
                    if !template.is_empty() {
                        pattern = GroupGraphPattern::Group(vec![PatternElement::Triples(
                            template.clone(),
                        )]);
                    }
                }
                Rule::where_clause => pattern = self.parse_where_clause(inner)?,
                Rule::solution_modifier => modifiers = self.parse_solution_modifier(inner)?,
                _ => return Err(unexpected(&inner)),
            }
        }

        for triple in &template {
            if let VerbPattern::Path(path) = &triple.verb {
                if path.as_link().is_none() {
                    return Err(ParseError::UnsupportedFeature(format!(
                        "property path {} in CONSTRUCT template",
                        path
                    )));
                }
            }
        }

        Ok(Query {
            base: None,
            form: QueryForm::Construct { template },
            pattern,
            modifiers,
            values: None,
        })
    }

    fn parse_template(&self, pair: Pair<Rule>) -> ParseResult<Vec<TriplePath>> {
        let mut triples = Vec::new();
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::triples_template {
                self.parse_triples_block(inner, &mut triples)?;
            }
        }
        Ok(triples)
    }

    fn parse_describe_query(&self, pair: Pair<Rule>) -> ParseResult<Query> {
        let mut targets = Vec::new();
        let mut all = false;
        let mut pattern = GroupGraphPattern::empty();
        let mut modifiers = SolutionModifiers::default();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::describe_all => all = true,
                Rule::var_or_iri => targets.push(self.parse_var_or_iri(inner)?),
                Rule::where_clause => pattern = self.parse_where_clause(inner)?,
                Rule::solution_modifier => modifiers = self.parse_solution_modifier(inner)?,
                _ => return Err(unexpected(&inner)),
            }
        }

        let targets = if all {
            DescribeTargets::All
        } else {
            DescribeTargets::Terms(targets)
        };
        Ok(Query {
            base: None,
            form: QueryForm::Describe { targets },
            pattern,
            modifiers,
            values: None,
        })
    }

    fn parse_ask_query(&self, pair: Pair<Rule>) -> ParseResult<Query> {
        let mut pattern = GroupGraphPattern::empty();
        let mut modifiers = SolutionModifiers::default();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::where_clause => pattern = self.parse_where_clause(inner)?,
                Rule::solution_modifier => modifiers = self.parse_solution_modifier(inner)?,
                _ => return Err(unexpected(&inner)),
            }
        }

        Ok(Query {
            base: None,
            form: QueryForm::Ask,
            pattern,
            modifiers,
            values: None,
        })
    }

    fn parse_where_clause(&self, pair: Pair<Rule>) -> ParseResult<GroupGraphPattern> {
        let mut pattern = GroupGraphPattern::empty();
        let mut trailing = Vec::new();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::group_graph_pattern => pattern = self.parse_group_graph_pattern(inner)?,
                Rule::filter_clause => trailing.push(self.parse_filter(inner)?),
                _ => return Err(unexpected(&inner)),
            }
        }

        if trailing.is_empty() {
            return Ok(pattern);
        }

        // Filters written after the closing brace scope over the whole group
        let mut elements = match pattern {
            GroupGraphPattern::Group(elements) => elements,
            sub @ GroupGraphPattern::SubSelect(_) => vec![PatternElement::Group(sub)],
        };
        elements.extend(trailing.into_iter().map(PatternElement::Filter));
        Ok(GroupGraphPattern::Group(elements))
    }

    // ------------------------------------------------------------ modifiers

    fn parse_solution_modifier(&self, pair: Pair<Rule>) -> ParseResult<SolutionModifiers> {
        let mut modifiers = SolutionModifiers::default();

        for clause in pair.into_inner() {
            match clause.as_rule() {
                Rule::group_clause => {
                    for condition in clause.into_inner() {
                        modifiers.group_by.push(self.parse_group_condition(condition)?);
                    }
                }
                Rule::having_clause => {
                    for constraint in clause.into_inner() {
                        modifiers.having.push(self.parse_constraint(constraint)?);
                    }
                }
                Rule::order_clause => {
                    for condition in clause.into_inner() {
                        modifiers.order_by.push(self.parse_order_condition(condition)?);
                    }
                }
                Rule::limit_offset => {
                    for part in clause.into_inner() {
                        let rule = part.as_rule();
                        let value = parse_count(part)?;
                        match rule {
                            Rule::limit_clause => modifiers.limit = Some(value),
                            Rule::offset_clause => modifiers.offset = Some(value),
                            _ => {}
                        }
                    }
                }
                _ => return Err(unexpected(&clause)),
            }
        }

        Ok(modifiers)
    }

    fn parse_group_condition(&self, pair: Pair<Rule>) -> ParseResult<GroupCondition> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty GROUP BY condition".to_string()))?;

        match inner.as_rule() {
            Rule::var => Ok(GroupCondition {
                expression: Expression::Variable(var_name(&inner)),
                alias: None,
            }),
            Rule::function_call => Ok(GroupCondition {
                expression: self.parse_function_call(inner)?,
                alias: None,
            }),
            Rule::group_alias => {
                let mut expression = None;
                let mut alias = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::expression => expression = Some(self.parse_expression(part)?),
                        Rule::var => alias = Some(var_name(&part)),
                        _ => return Err(unexpected(&part)),
                    }
                }
                Ok(GroupCondition {
                    expression: expression.ok_or_else(|| {
                        ParseError::Unexpected("GROUP BY without expression".to_string())
                    })?,
                    alias,
                })
            }
            _ => Err(unexpected(&inner)),
        }
    }

    fn parse_order_condition(&self, pair: Pair<Rule>) -> ParseResult<OrderCondition> {
        let mut descending = false;
        let mut expression = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::order_direction => {
                    descending = inner.as_str().eq_ignore_ascii_case("DESC");
                }
                Rule::bracketted => expression = Some(self.parse_primary(inner)?),
                Rule::constraint => expression = Some(self.parse_constraint(inner)?),
                Rule::var => expression = Some(Expression::Variable(var_name(&inner))),
                _ => return Err(unexpected(&inner)),
            }
        }

        Ok(OrderCondition {
            expression: expression
                .ok_or_else(|| ParseError::Unexpected("ORDER BY without key".to_string()))?,
            descending,
        })
    }

    fn parse_constraint(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty constraint".to_string()))?;
        self.parse_primary(inner)
    }

    fn parse_filter(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let constraint = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("FILTER without constraint".to_string()))?;
        self.parse_constraint(constraint)
    }

    // ------------------------------------------------------------ inline data

    fn parse_values_clause(&self, pair: Pair<Rule>) -> ParseResult<InlineData> {
        let block = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("VALUES without data".to_string()))?;
        self.parse_data_block(block)
    }

    fn parse_data_block(&self, pair: Pair<Rule>) -> ParseResult<InlineData> {
        let block = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty data block".to_string()))?;

        let mut variables = Vec::new();
        let mut rows = Vec::new();

        match block.as_rule() {
            Rule::inline_data_one_var => {
                for inner in block.into_inner() {
                    match inner.as_rule() {
                        Rule::var => variables.push(var_name(&inner)),
                        Rule::data_block_value => rows.push(vec![self.parse_data_value(inner)?]),
                        _ => return Err(unexpected(&inner)),
                    }
                }
            }
            Rule::inline_data_full => {
                for inner in block.into_inner() {
                    match inner.as_rule() {
                        Rule::var => variables.push(var_name(&inner)),
                        Rule::data_row => {
                            let row = inner
                                .into_inner()
                                .map(|value| self.parse_data_value(value))
                                .collect::<ParseResult<Vec<_>>>()?;
                            if row.len() != variables.len() {
                                return Err(ParseError::InvalidValues(format!(
                                    "row has {} value(s) for {} variable(s)",
                                    row.len(),
                                    variables.len()
                                )));
                            }
                            rows.push(row);
                        }
                        _ => return Err(unexpected(&inner)),
                    }
                }
            }
            _ => return Err(unexpected(&block)),
        }

        Ok(InlineData { variables, rows })
    }

    fn parse_data_value(&self, pair: Pair<Rule>) -> ParseResult<Option<RdfTerm>> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty data value".to_string()))?;
        match inner.as_rule() {
            Rule::undef => Ok(None),
            _ => self.parse_constant(inner).map(Some),
        }
    }

    // ------------------------------------------------------------ graph patterns

    fn parse_group_graph_pattern(&self, pair: Pair<Rule>) -> ParseResult<GroupGraphPattern> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty group".to_string()))?;

        match inner.as_rule() {
            Rule::sub_select => Ok(GroupGraphPattern::SubSelect(Box::new(
                self.parse_select_query(inner)?,
            ))),
            Rule::group_body => Ok(GroupGraphPattern::Group(self.parse_group_body(inner)?)),
            _ => Err(unexpected(&inner)),
        }
    }

    fn parse_group_body(&self, pair: Pair<Rule>) -> ParseResult<Vec<PatternElement>> {
        let mut elements: Vec<PatternElement> = Vec::new();

        for inner in pair.into_inner() {
            let element = match inner.as_rule() {
                Rule::triples_block => {
                    let mut triples = Vec::new();
                    self.parse_triples_block(inner, &mut triples)?;
                    // Merge with a directly preceding block
                    if let Some(PatternElement::Triples(previous)) = elements.last_mut() {
                        previous.extend(triples);
                        continue;
                    }
                    PatternElement::Triples(triples)
                }
                Rule::group_or_union => {
                    let mut groups = inner
                        .into_inner()
                        .map(|g| self.parse_group_graph_pattern(g))
                        .collect::<ParseResult<Vec<_>>>()?;
                    if groups.len() == 1 {
                        PatternElement::Group(groups.remove(0))
                    } else {
                        PatternElement::Union(groups)
                    }
                }
                Rule::optional_pattern => {
                    PatternElement::Optional(self.parse_single_group(inner)?)
                }
                Rule::minus_pattern => PatternElement::Minus(self.parse_single_group(inner)?),
                Rule::filter_clause => PatternElement::Filter(self.parse_filter(inner)?),
                Rule::bind_clause => {
                    let mut expression = None;
                    let mut variable = None;
                    for part in inner.into_inner() {
                        match part.as_rule() {
                            Rule::expression => expression = Some(self.parse_expression(part)?),
                            Rule::var => variable = Some(var_name(&part)),
                            _ => return Err(unexpected(&part)),
                        }
                    }
                    match (expression, variable) {
                        (Some(expression), Some(variable)) => PatternElement::Bind {
                            expression,
                            variable,
                        },
                        _ => return Err(ParseError::Unexpected("incomplete BIND".to_string())),
                    }
                }
                Rule::inline_values => PatternElement::Values(self.parse_values_clause(inner)?),
                _ => return Err(unexpected(&inner)),
            };
            elements.push(element);
        }

        Ok(elements)
    }

    fn parse_single_group(&self, pair: Pair<Rule>) -> ParseResult<GroupGraphPattern> {
        let group = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("missing group".to_string()))?;
        self.parse_group_graph_pattern(group)
    }

    /// Collects the triples of a `triples_block` or `triples_template`
    fn parse_triples_block(&self, pair: Pair<Rule>, out: &mut Vec<TriplePath>) -> ParseResult<()> {
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::triples_same_subject_path => self.parse_triples_same_subject(inner, out)?,
                Rule::triples_block | Rule::triples_template => {
                    self.parse_triples_block(inner, out)?
                }
                _ => return Err(unexpected(&inner)),
            }
        }
        Ok(())
    }

    fn parse_triples_same_subject(
        &self,
        pair: Pair<Rule>,
        out: &mut Vec<TriplePath>,
    ) -> ParseResult<()> {
        let mut subject = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::var_or_term => subject = Some(self.parse_var_or_term(inner)?),
                Rule::blank_node_property_list => {
                    subject = Some(self.parse_blank_node_property_list(inner, out)?);
                }
                Rule::property_list => {
                    let subject = subject.clone().ok_or_else(|| {
                        ParseError::Unexpected("property list without subject".to_string())
                    })?;
                    self.parse_property_list(&subject, inner, out)?;
                }
                _ => return Err(unexpected(&inner)),
            }
        }
        Ok(())
    }

    fn parse_property_list(
        &self,
        subject: &TermPattern,
        pair: Pair<Rule>,
        out: &mut Vec<TriplePath>,
    ) -> ParseResult<()> {
        for property in pair.into_inner() {
            let mut verb = None;
            for inner in property.into_inner() {
                match inner.as_rule() {
                    Rule::verb => verb = Some(self.parse_verb(inner)?),
                    Rule::object_list => {
                        let verb = verb.clone().ok_or_else(|| {
                            ParseError::Unexpected("object list without verb".to_string())
                        })?;
                        for node in inner.into_inner() {
                            let mut nested = Vec::new();
                            let object = self.parse_graph_node(node, &mut nested)?;
                            out.push(TriplePath {
                                subject: subject.clone(),
                                verb: verb.clone(),
                                object,
                            });
                            out.extend(nested);
                        }
                    }
                    _ => return Err(unexpected(&inner)),
                }
            }
        }
        Ok(())
    }

    fn parse_verb(&self, pair: Pair<Rule>) -> ParseResult<VerbPattern> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty verb".to_string()))?;
        match inner.as_rule() {
            Rule::var => Ok(VerbPattern::Variable(var_name(&inner))),
            Rule::path => Ok(VerbPattern::Path(self.parse_path(inner)?)),
            _ => Err(unexpected(&inner)),
        }
    }

    fn parse_graph_node(
        &self,
        pair: Pair<Rule>,
        out: &mut Vec<TriplePath>,
    ) -> ParseResult<TermPattern> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty graph node".to_string()))?;
        match inner.as_rule() {
            Rule::var_or_term => self.parse_var_or_term(inner),
            Rule::blank_node_property_list => self.parse_blank_node_property_list(inner, out),
            _ => Err(unexpected(&inner)),
        }
    }

    /// `[ p o ; q r ]` introduces a fresh blank node as the subject of its list
    fn parse_blank_node_property_list(
        &self,
        pair: Pair<Rule>,
        out: &mut Vec<TriplePath>,
    ) -> ParseResult<TermPattern> {
        let node = self.fresh_blank_node();
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::property_list {
                self.parse_property_list(&node, inner, out)?;
            }
        }
        Ok(node)
    }

    fn fresh_blank_node(&self) -> TermPattern {
        let id = self.blank_counter.get();
        self.blank_counter.set(id + 1);
        // '#' never appears in a written label, so these cannot collide
        TermPattern::BlankNode(format!("#{}", id))
    }

    fn parse_var_or_term(&self, pair: Pair<Rule>) -> ParseResult<TermPattern> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty term".to_string()))?;
        match inner.as_rule() {
            Rule::var => Ok(TermPattern::Variable(var_name(&inner))),
            Rule::graph_term => {
                let term = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::Unexpected("empty graph term".to_string()))?;
                if term.as_rule() == Rule::blank_node {
                    let node = term
                        .into_inner()
                        .next()
                        .ok_or_else(|| ParseError::Unexpected("empty blank node".to_string()))?;
                    return Ok(match node.as_rule() {
                        Rule::BLANK_NODE_LABEL => TermPattern::BlankNode(node.as_str()[2..].to_string()),
                        _ => self.fresh_blank_node(),
                    });
                }
                Ok(TermPattern::Term(self.parse_constant(term)?))
            }
            _ => Err(unexpected(&inner)),
        }
    }

    fn parse_var_or_iri(&self, pair: Pair<Rule>) -> ParseResult<TermPattern> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty term".to_string()))?;
        match inner.as_rule() {
            Rule::var => Ok(TermPattern::Variable(var_name(&inner))),
            Rule::iri => Ok(TermPattern::Term(self.parse_iri(inner)?.into())),
            _ => Err(unexpected(&inner)),
        }
    }

    // ------------------------------------------------------------ property paths

    fn parse_path(&self, pair: Pair<Rule>) -> ParseResult<PropertyPath> {
        PATH_PARSER
            .map_primary(|primary| match primary.as_rule() {
                Rule::iri => Ok(PropertyPath::Link(self.parse_iri(primary)?.as_str().to_string())),
                Rule::kw_a => Ok(PropertyPath::Link(rdf::TYPE.as_str().to_string())),
                Rule::path_negated => self.parse_negated_path(primary),
                Rule::path => self.parse_path(primary),
                _ => Err(unexpected(&primary)),
            })
            .map_prefix(|op, path| match op.as_rule() {
                Rule::path_inverse => Ok(PropertyPath::Inverse(Box::new(path?))),
                _ => Err(unexpected(&op)),
            })
            .map_postfix(|path, op| {
                let path = Box::new(path?);
                Ok(match op.as_str() {
                    "?" => PropertyPath::ZeroOrOne(path),
                    "*" => PropertyPath::ZeroOrMore(path),
                    _ => PropertyPath::OneOrMore(path),
                })
            })
            .map_infix(|left, op, right| {
                let left = Box::new(left?);
                let right = Box::new(right?);
                match op.as_rule() {
                    Rule::path_alt => Ok(PropertyPath::Alternative(left, right)),
                    Rule::path_seq => Ok(PropertyPath::Sequence(left, right)),
                    _ => Err(unexpected(&op)),
                }
            })
            .parse(pair.into_inner())
    }

    fn parse_negated_path(&self, pair: Pair<Rule>) -> ParseResult<PropertyPath> {
        let mut forward = Vec::new();
        let mut inverse = Vec::new();

        for item in pair.into_inner() {
            let mut is_inverse = false;
            for inner in item.into_inner() {
                match inner.as_rule() {
                    Rule::path_inverse => is_inverse = true,
                    Rule::iri | Rule::kw_a => {
                        let iri = if inner.as_rule() == Rule::kw_a {
                            rdf::TYPE.as_str().to_string()
                        } else {
                            self.parse_iri(inner)?.as_str().to_string()
                        };
                        if is_inverse {
                            inverse.push(iri);
                        } else {
                            forward.push(iri);
                        }
                    }
                    _ => return Err(unexpected(&inner)),
                }
            }
        }

        Ok(PropertyPath::NegatedPropertySet { forward, inverse })
    }

    // ------------------------------------------------------------ expressions

    fn parse_expression(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        EXPR_PARSER
            .map_primary(|primary| self.parse_primary(primary))
            .map_prefix(|op, expr| {
                let op = match op.as_str() {
                    "!" => UnaryOp::Not,
                    "+" => UnaryOp::Plus,
                    _ => UnaryOp::Minus,
                };
                Ok(Expression::Unary {
                    op,
                    expr: Box::new(expr?),
                })
            })
            .map_postfix(|expr, op| self.parse_in(expr?, op))
            .map_infix(|left, op, right| {
                let left = left?;
                let right = right?;

                let op = match op.as_rule() {
                    Rule::or_op => BinaryOp::Or,
                    Rule::and_op => BinaryOp::And,
                    Rule::comparison_op | Rule::add_sub_op | Rule::mul_div_op => {
                        parse_op_str(op.as_str())?
                    }
                    _ => return Err(unexpected(&op)),
                };

                Ok(Expression::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            })
            .parse(pair.into_inner())
    }

    fn parse_in(&self, expr: Expression, op: Pair<Rule>) -> ParseResult<Expression> {
        let mut negated = false;
        let mut list = Vec::new();
        for inner in op.into_inner() {
            match inner.as_rule() {
                Rule::not_kw => negated = true,
                Rule::expression_list => {
                    for item in inner.into_inner() {
                        list.push(self.parse_expression(item)?);
                    }
                }
                _ => return Err(unexpected(&inner)),
            }
        }
        Ok(Expression::In {
            expr: Box::new(expr),
            list,
            negated,
        })
    }

    fn parse_primary(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        match pair.as_rule() {
            Rule::bracketted => {
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::Unexpected("empty brackets".to_string()))?;
                self.parse_expression(inner)
            }
            Rule::exists_expr => {
                let mut negated = false;
                let mut pattern = None;
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::not_kw => negated = true,
                        Rule::group_graph_pattern => {
                            pattern = Some(self.parse_group_graph_pattern(inner)?)
                        }
                        _ => return Err(unexpected(&inner)),
                    }
                }
                Ok(Expression::Exists {
                    pattern: Box::new(pattern.ok_or_else(|| {
                        ParseError::Unexpected("EXISTS without pattern".to_string())
                    })?),
                    negated,
                })
            }
            Rule::aggregate => self.parse_aggregate(pair),
            Rule::function_call => self.parse_function_call(pair),
            Rule::var => Ok(Expression::Variable(var_name(&pair))),
            Rule::expression => self.parse_expression(pair),
            Rule::rdf_literal
            | Rule::numeric_literal
            | Rule::signed_numeric
            | Rule::boolean_literal
            | Rule::iri => Ok(Expression::Constant(self.parse_constant(pair)?)),
            _ => Err(unexpected(&pair)),
        }
    }

    fn parse_aggregate(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut function = None;
        let mut distinct = false;
        let mut expr = None;
        let mut separator = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::aggregate_name => {
                    function = AggregateFunction::from_name(inner.as_str());
                }
                Rule::distinct_kw => distinct = true,
                Rule::star => expr = None,
                Rule::expression => expr = Some(Box::new(self.parse_expression(inner)?)),
                Rule::string => separator = Some(parse_string(inner)?),
                _ => return Err(unexpected(&inner)),
            }
        }

        let function =
            function.ok_or_else(|| ParseError::Unexpected("unknown aggregate".to_string()))?;
        if expr.is_none() && function != AggregateFunction::Count {
            return Err(ParseError::UnsupportedFeature(format!(
                "{:?}(*) is only defined for COUNT",
                function
            )));
        }

        Ok(Expression::Aggregate(AggregateExpr {
            function,
            distinct,
            expr,
            separator,
        }))
    }

    fn parse_function_call(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut callee = None;
        let mut args = Vec::new();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::iri | Rule::builtin_name => callee = Some(inner),
                Rule::arg_list => {
                    for arg in inner.into_inner() {
                        if arg.as_rule() == Rule::expression {
                            args.push(self.parse_expression(arg)?);
                        }
                    }
                }
                _ => return Err(unexpected(&inner)),
            }
        }

        let callee =
            callee.ok_or_else(|| ParseError::Unexpected("function without name".to_string()))?;

        let (name, function) = match callee.as_rule() {
            Rule::builtin_name => {
                let name = callee.as_str().to_ascii_uppercase();
                if name == "BOUND" {
                    return match args.as_slice() {
                        [Expression::Variable(v)] => Ok(Expression::Bound(v.clone())),
                        _ => Err(ParseError::WrongArity {
                            function: name,
                            expected: "one variable".to_string(),
                            found: args.len(),
                        }),
                    };
                }
                let function = Function::from_name(&name)
                    .ok_or_else(|| ParseError::UnknownFunction(callee.as_str().to_string()))?;
                (name, function)
            }
            _ => {
                let iri = self.parse_iri(callee)?;
                let cast = XsdCast::from_iri(iri.as_str())
                    .ok_or_else(|| ParseError::UnknownFunction(iri.to_string()))?;
                (iri.to_string(), Function::Cast(cast))
            }
        };

        let (min, max) = match function {
            Function::Cast(_) => (1, Some(1)),
            other => other.arity(),
        };
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{}..{}", min, max),
                None => format!("at least {}", min),
            };
            return Err(ParseError::WrongArity {
                function: name,
                expected,
                found: args.len(),
            });
        }

        Ok(Expression::Function { function, args })
    }

    // ------------------------------------------------------------ terms

    /// Parses a literal or IRI pair into a term
    fn parse_constant(&self, pair: Pair<Rule>) -> ParseResult<RdfTerm> {
        match pair.as_rule() {
            Rule::iri => Ok(self.parse_iri(pair)?.into()),
            Rule::rdf_literal => Ok(self.parse_rdf_literal(pair)?.into()),
            Rule::numeric_literal | Rule::signed_numeric => Ok(parse_numeric(pair)?.into()),
            Rule::boolean_literal => Ok(Literal::boolean(pair.as_str() == "true").into()),
            _ => Err(unexpected(&pair)),
        }
    }

    fn parse_rdf_literal(&self, pair: Pair<Rule>) -> ParseResult<Literal> {
        let mut value = String::new();
        let mut literal = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::string => value = parse_string(inner)?,
                Rule::LANGTAG => {
                    literal = Some(
                        Literal::new_language_tagged_literal(value.clone(), &inner.as_str()[1..])
                            .map_err(|e| ParseError::InvalidLiteral(e.to_string()))?,
                    );
                }
                Rule::iri => {
                    let datatype = self.parse_iri(inner)?;
                    literal = Some(Literal::new_typed_literal(value.clone(), datatype));
                }
                _ => return Err(unexpected(&inner)),
            }
        }

        Ok(literal.unwrap_or_else(|| Literal::new_simple_literal(value)))
    }

    fn parse_iri(&self, pair: Pair<Rule>) -> ParseResult<NamedNode> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Unexpected("empty IRI".to_string()))?;

        let iri = match inner.as_rule() {
            Rule::IRIREF => self.resolve_iri(strip_iriref(inner.as_str()))?,
            Rule::prefixed_name => {
                let text = inner.as_str();
                let (prefix, local) = text
                    .split_once(':')
                    .ok_or_else(|| ParseError::Unexpected(text.to_string()))?;
                let namespace = self
                    .namespaces
                    .get_iri(prefix)
                    .map_err(|_| ParseError::UnknownPrefix(prefix.to_string()))?;
                format!("{}{}", namespace, unescape_local(local))
            }
            _ => return Err(unexpected(&inner)),
        };

        NamedNode::new(&iri).map_err(|e| ParseError::InvalidIri(e.to_string()))
    }

    fn resolve_iri(&self, raw: &str) -> ParseResult<String> {
        match &self.base {
            Some(base) => base
                .resolve(raw)
                .map(|iri| iri.into_inner())
                .map_err(|e| ParseError::InvalidIri(format!("{}: {}", raw, e))),
            None => Ok(raw.to_string()),
        }
    }
}

fn strip_iriref(text: &str) -> &str {
    text.trim_start_matches('<').trim_end_matches('>')
}

fn unescape_local(local: &str) -> String {
    let mut out = String::with_capacity(local.len());
    let mut chars = local.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_op_str(op_str: &str) -> ParseResult<BinaryOp> {
    Ok(match op_str {
        "=" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        _ => return Err(ParseError::Unexpected(format!("operator {}", op_str))),
    })
}

fn parse_count(pair: Pair<Rule>) -> ParseResult<usize> {
    let text = pair.as_str().to_string();
    let digits = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::Unexpected(text.clone()))?;
    digits
        .as_str()
        .parse()
        .map_err(|_| ParseError::InvalidLiteral(format!("count out of range: {}", text)))
}

fn parse_numeric(pair: Pair<Rule>) -> ParseResult<Literal> {
    let text = pair.as_str();
    let kind = pair
        .into_inner()
        .next()
        .map(|inner| inner.as_rule())
        .ok_or_else(|| ParseError::InvalidLiteral(text.to_string()))?;

    let datatype = match kind {
        Rule::INTEGER => xsd::INTEGER,
        Rule::DECIMAL => xsd::DECIMAL,
        Rule::DOUBLE => xsd::DOUBLE,
        _ => return Err(ParseError::InvalidLiteral(text.to_string())),
    };
    Ok(Literal::new_typed_literal(text, datatype.into_owned().into()))
}

fn parse_string(pair: Pair<Rule>) -> ParseResult<String> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::Unexpected("empty string".to_string()))?;
    let text = inner.as_str();
    let quote_len = match inner.as_rule() {
        Rule::STRING_LITERAL_LONG1 | Rule::STRING_LITERAL_LONG2 => 3,
        _ => 1,
    };
    unescape_string(&text[quote_len..text.len() - quote_len])
}

fn unescape_string(raw: &str) -> ParseResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('t') => '\t',
            Some('b') => '\u{8}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('f') => '\u{c}',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('\\') => '\\',
            Some(u @ ('u' | 'U')) => {
                let len = if u == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(len).collect();
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ParseError::InvalidLiteral(format!("\\{}{}", u, hex)))?
            }
            other => {
                return Err(ParseError::InvalidLiteral(format!(
                    "bad escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        };
        out.push(escaped);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOAF: &str = "http://xmlns.com/foaf/0.1/";

    fn select_items(query: &Query) -> Vec<SelectItem> {
        match &query.form {
            QueryForm::Select {
                projection: Projection::Items(items),
                ..
            } => items.clone(),
            other => panic!("expected SELECT with items, got {:?}", other),
        }
    }

    fn group_elements(pattern: &GroupGraphPattern) -> &[PatternElement] {
        match pattern {
            GroupGraphPattern::Group(elements) => elements,
            other => panic!("expected group, got {:?}", other),
        }
    }

    fn parse_filter_expr(filter: &str) -> Expression {
        let query = parse_query(&format!("SELECT * WHERE {{ ?s ?p ?o FILTER({}) }}", filter))
            .unwrap();
        match &group_elements(&query.pattern)[1] {
            PatternElement::Filter(expr) => expr.clone(),
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let query = parse_query("SELECT ?name WHERE { ?p foaf:name ?name }").unwrap();

        let items = select_items(&query);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].variable, "name");

        let elements = group_elements(&query.pattern);
        match &elements[0] {
            PatternElement::Triples(triples) => {
                assert_eq!(triples.len(), 1);
                assert_eq!(triples[0].subject, TermPattern::Variable("p".into()));
                assert_eq!(
                    triples[0].verb,
                    VerbPattern::Path(PropertyPath::Link(format!("{}name", FOAF)))
                );
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let query = parse_query("select distinct ?s where { ?s a ?t } limit 5").unwrap();
        match query.form {
            QueryForm::Select { modifier, .. } => {
                assert_eq!(modifier, Some(SelectModifier::Distinct))
            }
            _ => panic!("expected SELECT"),
        }
        assert_eq!(query.modifiers.limit, Some(5));
    }

    #[test]
    fn test_prefix_and_base_resolution() {
        let query = parse_query(
            "BASE <http://example.org/base/>
             PREFIX ex: <http://example.org/ns#>
             SELECT * WHERE { <alice> ex:knows ?x }",
        )
        .unwrap();

        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => {
                assert_eq!(
                    triples[0].subject,
                    TermPattern::Term(NamedNode::new("http://example.org/base/alice").unwrap().into())
                );
                assert_eq!(
                    triples[0].verb,
                    VerbPattern::Path(PropertyPath::Link("http://example.org/ns#knows".into()))
                );
            }
            other => panic!("unexpected element {:?}", other),
        }
        assert_eq!(query.base.as_deref(), Some("http://example.org/base/"));
    }

    #[test]
    fn test_unknown_prefix_is_rejected() {
        let err = parse_query("SELECT * WHERE { ?s nope:p ?o }").unwrap_err();
        assert!(matches!(err, ParseError::UnknownPrefix(p) if p == "nope"));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse_query("SELECT ?x WHERE { ?x ?y }").unwrap_err();
        match err {
            ParseError::Syntax(e) => assert!(e.to_string().contains("1:")),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_predicate_object_lists() {
        let query = parse_query(
            "SELECT * WHERE { ?p foaf:name ?n ; foaf:age ?a , 30 . ?q a foaf:Person }",
        )
        .unwrap();
        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => {
                assert_eq!(triples.len(), 4);
                assert_eq!(triples[2].object, TermPattern::Term(Literal::new_typed_literal("30", xsd::INTEGER.into_owned().into()).into()));
                assert_eq!(
                    triples[3].verb,
                    VerbPattern::Path(PropertyPath::Link(rdf::TYPE.as_str().into()))
                );
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_blank_node_property_list() {
        let query = parse_query("SELECT * WHERE { ?s foaf:knows [ foaf:name \"Bob\" ] }").unwrap();
        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => {
                assert_eq!(triples.len(), 2);
                assert!(matches!(triples[0].object, TermPattern::BlankNode(_)));
                assert_eq!(triples[0].object, triples[1].subject);
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_property_path_precedence() {
        let query = parse_query("SELECT * WHERE { ?s foaf:knows/^foaf:member|foaf:friend+ ?o }")
            .unwrap();
        let knows = PropertyPath::Link(format!("{}knows", FOAF));
        let member = PropertyPath::Link(format!("{}member", FOAF));
        let friend = PropertyPath::Link(format!("{}friend", FOAF));
        let expected = PropertyPath::Alternative(
            Box::new(PropertyPath::Sequence(
                Box::new(knows),
                Box::new(PropertyPath::Inverse(Box::new(member))),
            )),
            Box::new(PropertyPath::OneOrMore(Box::new(friend))),
        );
        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => {
                assert_eq!(triples[0].verb, VerbPattern::Path(expected))
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_zero_or_one_path_before_variable() {
        let query = parse_query("SELECT * WHERE { ?s foaf:knows? ?o }").unwrap();
        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => {
                assert!(matches!(
                    &triples[0].verb,
                    VerbPattern::Path(PropertyPath::ZeroOrOne(_))
                ));
                assert_eq!(triples[0].object, TermPattern::Variable("o".into()));
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_negated_property_set() {
        let query = parse_query("SELECT * WHERE { ?s !(a|^foaf:knows) ?o }").unwrap();
        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => match &triples[0].verb {
                VerbPattern::Path(PropertyPath::NegatedPropertySet { forward, inverse }) => {
                    assert_eq!(forward, &vec![rdf::TYPE.as_str().to_string()]);
                    assert_eq!(inverse, &vec![format!("{}knows", FOAF)]);
                }
                other => panic!("unexpected verb {:?}", other),
            },
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_expression_precedence() {
        let expr = parse_filter_expr("?a + 2 * 3 > 10 || !?b && ?c");
        match expr {
            Expression::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                assert!(matches!(*left, Expression::Binary { op: BinaryOp::Gt, .. }));
                assert!(matches!(*right, Expression::Binary { op: BinaryOp::And, .. }));
                if let Expression::Binary { left: sum, .. } = *left {
                    match *sum {
                        Expression::Binary {
                            op: BinaryOp::Add,
                            right: product,
                            ..
                        } => assert!(matches!(*product, Expression::Binary { op: BinaryOp::Mul, .. })),
                        other => panic!("unexpected {:?}", other),
                    }
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_in_and_not_in() {
        let expr = parse_filter_expr("?x + 1 NOT IN (1, 2)");
        match expr {
            Expression::In {
                expr,
                list,
                negated,
            } => {
                assert!(negated);
                assert_eq!(list.len(), 2);
                assert!(matches!(*expr, Expression::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_calls() {
        let expr = parse_filter_expr("STRLEN(CONCAT(?a, \"x\")) > 2");
        assert!(matches!(expr, Expression::Binary { op: BinaryOp::Gt, .. }));

        let expr = parse_filter_expr("xsd:integer(?a) = 3");
        match expr {
            Expression::Binary { left, .. } => assert!(matches!(
                *left,
                Expression::Function {
                    function: Function::Cast(XsdCast::Integer),
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(parse_filter_expr("BOUND(?a)"), Expression::Bound("a".into()));
    }

    #[test]
    fn test_function_errors() {
        assert!(matches!(
            parse_query("SELECT * WHERE { ?s ?p ?o FILTER(FROB(?o)) }"),
            Err(ParseError::UnknownFunction(_))
        ));
        assert!(matches!(
            parse_query("SELECT * WHERE { ?s ?p ?o FILTER(STRLEN(?o, ?s)) }"),
            Err(ParseError::WrongArity { .. })
        ));
    }

    #[test]
    fn test_exists() {
        let expr = parse_filter_expr("NOT EXISTS { ?s foaf:knows ?x }");
        assert!(matches!(expr, Expression::Exists { negated: true, .. }));
    }

    #[test]
    fn test_literals() {
        let query = parse_query(
            r#"SELECT * WHERE { ?s ?p "chat"@fr , 'x\ty' , """multi
line""" , "5"^^xsd:integer , -4.5 , true }"#,
        )
        .unwrap();
        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => {
                let objects: Vec<String> = triples.iter().map(|t| t.object.to_string()).collect();
                assert_eq!(objects[0], "\"chat\"@fr");
                assert_eq!(objects[1], "\"x\\ty\"");
                assert_eq!(objects[2], "\"multi\\nline\"");
                assert_eq!(objects[3], "\"5\"^^<http://www.w3.org/2001/XMLSchema#integer>");
                assert_eq!(objects[4], "\"-4.5\"^^<http://www.w3.org/2001/XMLSchema#decimal>");
                assert_eq!(objects[5], "\"true\"^^<http://www.w3.org/2001/XMLSchema#boolean>");
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_group_patterns() {
        let query = parse_query(
            "SELECT * WHERE {
                ?s foaf:name ?n .
                OPTIONAL { ?s foaf:age ?a FILTER(?a > 3) }
                { ?s a foaf:Person } UNION { ?s a foaf:Agent }
                MINUS { ?s foaf:status \"gone\" }
                BIND(STRLEN(?n) AS ?len)
                VALUES ?n { \"Alice\" UNDEF }
            }",
        )
        .unwrap();
        let elements = group_elements(&query.pattern);
        assert!(matches!(elements[0], PatternElement::Triples(_)));
        assert!(matches!(elements[1], PatternElement::Optional(_)));
        assert!(matches!(&elements[2], PatternElement::Union(groups) if groups.len() == 2));
        assert!(matches!(elements[3], PatternElement::Minus(_)));
        assert!(matches!(&elements[4], PatternElement::Bind { variable, .. } if variable == "len"));
        match &elements[5] {
            PatternElement::Values(data) => {
                assert_eq!(data.variables, vec!["n".to_string()]);
                assert_eq!(data.rows.len(), 2);
                assert!(data.rows[1][0].is_none());
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_trailing_filter_joins_group() {
        let query = parse_query(
            "SELECT ?name ?age WHERE {?p foaf:name ?name; foaf:age ?age} FILTER(?age > 25)",
        )
        .unwrap();
        let elements = group_elements(&query.pattern);
        assert_eq!(elements.len(), 2);
        assert!(matches!(elements[1], PatternElement::Filter(_)));
    }

    #[test]
    fn test_solution_modifiers() {
        let query = parse_query(
            "SELECT ?c (SUM(?v) AS ?total) WHERE { ?i ?c ?v }
             GROUP BY ?c HAVING (SUM(?v) > 10)
             ORDER BY DESC(?total) ?c
             OFFSET 2 LIMIT 3",
        )
        .unwrap();
        let items = select_items(&query);
        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[1].expression,
            Some(Expression::Aggregate(AggregateExpr {
                function: AggregateFunction::Sum,
                ..
            }))
        ));
        assert_eq!(query.modifiers.group_by.len(), 1);
        assert_eq!(query.modifiers.having.len(), 1);
        assert_eq!(query.modifiers.order_by.len(), 2);
        assert!(query.modifiers.order_by[0].descending);
        assert!(!query.modifiers.order_by[1].descending);
        assert_eq!(query.modifiers.offset, Some(2));
        assert_eq!(query.modifiers.limit, Some(3));
    }

    #[test]
    fn test_group_concat_separator_and_count_distinct() {
        let query = parse_query(
            "SELECT (COUNT(DISTINCT ?x) AS ?n) (GROUP_CONCAT(?x ; SEPARATOR=\"|\") AS ?all) WHERE { ?s ?p ?x }",
        )
        .unwrap();
        let items = select_items(&query);
        match &items[0].expression {
            Some(Expression::Aggregate(agg)) => assert!(agg.distinct),
            other => panic!("unexpected {:?}", other),
        }
        match &items[1].expression {
            Some(Expression::Aggregate(agg)) => assert_eq!(agg.separator.as_deref(), Some("|")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_query_forms() {
        assert!(matches!(
            parse_query("ASK { ?s ?p ?o }").unwrap().form,
            QueryForm::Ask
        ));
        assert!(matches!(
            parse_query("DESCRIBE <http://example.org/a>").unwrap().form,
            QueryForm::Describe { targets: DescribeTargets::Terms(t) } if t.len() == 1
        ));
        assert!(matches!(
            parse_query("DESCRIBE * WHERE { ?s ?p ?o }").unwrap().form,
            QueryForm::Describe { targets: DescribeTargets::All }
        ));

        let construct = parse_query("CONSTRUCT WHERE { ?s foaf:knows ?o }").unwrap();
        match (&construct.form, &construct.pattern) {
            (QueryForm::Construct { template }, GroupGraphPattern::Group(elements)) => {
                assert_eq!(template.len(), 1);
                assert_eq!(elements.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_trailing_values() {
        let query = parse_query(
            "SELECT * WHERE { ?s ?p ?o } VALUES (?s ?o) { (<http://example.org/a> 1) (UNDEF 2) }",
        )
        .unwrap();
        let values = query.values.unwrap();
        assert_eq!(values.variables, vec!["s".to_string(), "o".to_string()]);
        assert_eq!(values.rows.len(), 2);
        assert!(values.rows[1][0].is_none());
    }

    #[test]
    fn test_values_row_width_mismatch() {
        let err = parse_query("SELECT * WHERE { VALUES (?a ?b) { (1) } }").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValues(_)));
    }

    #[test]
    fn test_sub_select() {
        let query = parse_query(
            "SELECT ?s WHERE { { SELECT ?s WHERE { ?s ?p ?o } LIMIT 1 } }",
        )
        .unwrap();
        match &group_elements(&query.pattern)[0] {
            PatternElement::Group(GroupGraphPattern::SubSelect(sub)) => {
                assert_eq!(sub.modifiers.limit, Some(1))
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_constructs_are_rejected() {
        assert!(parse_query("SELECT * WHERE { GRAPH ?g { ?s ?p ?o } }").is_err());
        assert!(parse_query("SELECT * WHERE { SERVICE <http://x.org/> { ?s ?p ?o } }").is_err());
        assert!(parse_query("INSERT DATA { <http://a.org/> <http://b.org/> 1 }").is_err());
        assert!(parse_query("SELECT * WHERE { ?s ?p (1 2) }").is_err());
    }

    #[test]
    fn test_comments_are_skipped() {
        let query = parse_query(
            "# leading comment
             SELECT ?s # trailing
             WHERE { ?s ?p <http://example.org/#frag> }",
        )
        .unwrap();
        assert_eq!(select_items(&query)[0].variable, "s");
    }

    #[test]
    fn test_custom_namespaces_and_base() {
        let mut namespaces = NamespaceManager::empty();
        namespaces.add_prefix("ex", "http://example.org/");
        let query = parse_query_with(
            "SELECT * WHERE { ex:a <rel> ?o }",
            &namespaces,
            Some("http://base.org/"),
        )
        .unwrap();
        match &group_elements(&query.pattern)[0] {
            PatternElement::Triples(triples) => assert_eq!(
                triples[0].verb,
                VerbPattern::Path(PropertyPath::Link("http://base.org/rel".into()))
            ),
            other => panic!("unexpected element {:?}", other),
        }
        assert!(parse_query_with("SELECT * WHERE { foaf:a ?p ?o }", &namespaces, None).is_err());
    }
}
