//! AST to algebra translation
//!
//! Follows the standard SPARQL translation: triple blocks become BGPs (or
//! path nodes), OPTIONAL becomes LeftJoin with the group's filter as the join
//! condition, MINUS becomes Diff, and the filters of a group scope over the
//! whole group. Solution modifiers wrap the pattern in the order
//! Group, Filter (HAVING), Extend, OrderBy, Project, Distinct/Reduced, Slice.

use crate::sparql::algebra::{
    is_hidden_variable, AggregateCall, Algebra, Expr, OrderKey, PatternTerm, PatternTriple,
};
use crate::sparql::ast::*;
use crate::rdf::RdfTerm;
use indexmap::IndexSet;
use thiserror::Error;
use tracing::debug;

/// Translation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// BIND target already bound by the preceding patterns
    #[error("BIND target ?{0} is already in scope")]
    BindScope(String),

    /// (expr AS ?v) where ?v is already bound
    #[error("Projected variable ?{0} is already in scope")]
    ProjectionScope(String),

    /// Same variable projected twice
    #[error("Variable ?{0} is projected more than once")]
    DuplicateProjection(String),

    /// Non-key variable used in a grouped query
    #[error("Variable ?{0} is neither grouped nor aggregated")]
    UngroupedVariable(String),

    #[error("SELECT * cannot be combined with GROUP BY or aggregates")]
    WildcardWithGrouping,

    /// Aggregate outside SELECT, HAVING or ORDER BY, or nested in another
    #[error("Aggregate not allowed here: {0}")]
    MisplacedAggregate(String),
}

pub type TranslateResult<T> = Result<T, TranslateError>;

/// Translate a parsed query into its algebra tree
pub fn translate_query(query: &Query) -> TranslateResult<Algebra> {
    let mut translator = Translator::default();
    let algebra = translator.translate_query(query)?;
    debug!(algebra = %algebra, "translated query");
    Ok(algebra)
}

#[derive(Default)]
struct Translator {
    aggregate_counter: usize,
    group_counter: usize,
}

impl Translator {
    fn translate_query(&mut self, query: &Query) -> TranslateResult<Algebra> {
        let mut algebra = self.translate_group(&query.pattern)?;
        if let Some(values) = &query.values {
            algebra = Algebra::join(algebra, table(values));
        }

        let modifiers = &query.modifiers;
        let (select_modifier, projection) = match &query.form {
            QueryForm::Select {
                modifier,
                projection,
            } => (*modifier, Some(projection)),
            _ => (None, None),
        };
        let items: &[SelectItem] = match projection {
            Some(Projection::Items(items)) => items,
            _ => &[],
        };

        let grouped = modifiers.is_grouped()
            || items
                .iter()
                .filter_map(|item| item.expression.as_ref())
                .any(Expression::contains_aggregate)
            || modifiers
                .order_by
                .iter()
                .any(|c| c.expression.contains_aggregate());

        let mut aggregates: Vec<(String, AggregateCall)> = Vec::new();
        let mut keys: Vec<String> = Vec::new();

        if grouped {
            if matches!(projection, Some(Projection::All)) {
                return Err(TranslateError::WildcardWithGrouping);
            }
            for condition in &modifiers.group_by {
                match (&condition.expression, &condition.alias) {
                    (Expression::Variable(v), None) => keys.push(v.clone()),
                    (expression, alias) => {
                        let variable = match alias {
                            Some(alias) => alias.clone(),
                            None => {
                                let name = format!("#group{}", self.group_counter);
                                self.group_counter += 1;
                                name
                            }
                        };
                        algebra = Algebra::Extend {
                            inner: Box::new(algebra),
                            variable: variable.clone(),
                            expr: self.translate_expr(expression)?,
                        };
                        keys.push(variable);
                    }
                }
            }
        }

        // Aggregates are lifted out of HAVING, SELECT and ORDER BY into the
        // Group node and replaced by hidden variables.
        let having = modifiers
            .having
            .iter()
            .map(|e| self.lift_aggregates(e, &mut aggregates))
            .collect::<TranslateResult<Vec<_>>>()?;

        let mut select_exprs = Vec::new();
        for item in items {
            if let Some(expression) = &item.expression {
                let expr = if grouped {
                    self.lift_aggregates(expression, &mut aggregates)?
                } else {
                    self.translate_expr(expression)?
                };
                select_exprs.push((item.variable.clone(), expr));
            }
        }

        let order_keys = modifiers
            .order_by
            .iter()
            .map(|c| {
                let expr = if grouped {
                    self.lift_aggregates(&c.expression, &mut aggregates)?
                } else {
                    self.translate_expr(&c.expression)?
                };
                Ok(OrderKey {
                    expr,
                    descending: c.descending,
                })
            })
            .collect::<TranslateResult<Vec<_>>>()?;

        if grouped {
            self.check_grouped_projection(items, &keys, &aggregates, &select_exprs)?;
            algebra = Algebra::Group {
                inner: Box::new(algebra),
                keys,
                aggregates,
            };
        }

        if let Some(expr) = conjunction(having) {
            algebra = Algebra::Filter {
                expr,
                inner: Box::new(algebra),
            };
        }

        let mut projected = IndexSet::new();
        for item in items {
            if !projected.insert(item.variable.clone()) {
                return Err(TranslateError::DuplicateProjection(item.variable.clone()));
            }
        }

        for (variable, expr) in select_exprs {
            if algebra.in_scope_variables().contains(&variable) {
                return Err(TranslateError::ProjectionScope(variable));
            }
            algebra = Algebra::Extend {
                inner: Box::new(algebra),
                variable,
                expr,
            };
        }

        if !order_keys.is_empty() {
            algebra = Algebra::OrderBy {
                inner: Box::new(algebra),
                keys: order_keys,
            };
        }

        if let Some(projection) = projection {
            let variables: Vec<String> = match projection {
                Projection::All => algebra
                    .in_scope_variables()
                    .into_iter()
                    .filter(|v| !is_hidden_variable(v))
                    .collect(),
                Projection::Items(_) => projected.into_iter().collect(),
            };
            algebra = Algebra::Project {
                inner: Box::new(algebra),
                variables,
            };
        }

        match select_modifier {
            Some(SelectModifier::Distinct) => algebra = Algebra::Distinct(Box::new(algebra)),
            Some(SelectModifier::Reduced) => algebra = Algebra::Reduced(Box::new(algebra)),
            None => {}
        }

        if modifiers.limit.is_some() || modifiers.offset.is_some() {
            algebra = Algebra::Slice {
                inner: Box::new(algebra),
                offset: modifiers.offset.unwrap_or(0),
                limit: modifiers.limit,
            };
        }

        Ok(algebra)
    }

    fn check_grouped_projection(
        &self,
        items: &[SelectItem],
        keys: &[String],
        aggregates: &[(String, AggregateCall)],
        select_exprs: &[(String, Expr)],
    ) -> TranslateResult<()> {
        let mut allowed: IndexSet<&str> = keys.iter().map(String::as_str).collect();
        allowed.extend(aggregates.iter().map(|(v, _)| v.as_str()));

        let mut exprs = select_exprs.iter();
        for item in items {
            if item.expression.is_none() {
                if !allowed.contains(item.variable.as_str()) {
                    return Err(TranslateError::UngroupedVariable(item.variable.clone()));
                }
                continue;
            }
            if let Some((variable, expr)) = exprs.next() {
                let mut used = IndexSet::new();
                expr.collect_variables(&mut used);
                if let Some(bad) = used.iter().find(|v| !allowed.contains(*v)) {
                    return Err(TranslateError::UngroupedVariable(bad.to_string()));
                }
                allowed.insert(variable.as_str());
            }
        }
        Ok(())
    }

    fn translate_group(&mut self, pattern: &GroupGraphPattern) -> TranslateResult<Algebra> {
        let elements = match pattern {
            GroupGraphPattern::SubSelect(query) => return self.translate_query(query),
            GroupGraphPattern::Group(elements) => elements,
        };

        let mut algebra = Algebra::unit();
        let mut filters = Vec::new();

        for element in elements {
            match element {
                PatternElement::Triples(triples) => {
                    algebra = Algebra::join(algebra, translate_triples(triples));
                }
                PatternElement::Group(group) => {
                    let inner = self.translate_group(group)?;
                    algebra = Algebra::join(algebra, inner);
                }
                PatternElement::Union(groups) => {
                    let mut branches = groups.iter();
                    let mut union = match branches.next() {
                        Some(first) => self.translate_group(first)?,
                        None => Algebra::unit(),
                    };
                    for branch in branches {
                        union = Algebra::Union(Box::new(union), Box::new(self.translate_group(branch)?));
                    }
                    algebra = Algebra::join(algebra, union);
                }
                PatternElement::Optional(group) => {
                    let (right, expr) = match self.translate_group(group)? {
                        Algebra::Filter { expr, inner } => (*inner, Some(expr)),
                        other => (other, None),
                    };
                    algebra = Algebra::LeftJoin {
                        left: Box::new(algebra),
                        right: Box::new(right),
                        expr,
                    };
                }
                PatternElement::Minus(group) => {
                    algebra = Algebra::Diff(Box::new(algebra), Box::new(self.translate_group(group)?));
                }
                PatternElement::Filter(expression) => {
                    filters.push(self.translate_expr(expression)?);
                }
                PatternElement::Bind {
                    expression,
                    variable,
                } => {
                    if algebra.in_scope_variables().contains(variable) {
                        return Err(TranslateError::BindScope(variable.clone()));
                    }
                    algebra = Algebra::Extend {
                        inner: Box::new(algebra),
                        variable: variable.clone(),
                        expr: self.translate_expr(expression)?,
                    };
                }
                PatternElement::Values(data) => {
                    algebra = Algebra::join(algebra, table(data));
                }
            }
        }

        if let Some(expr) = conjunction(filters) {
            algebra = Algebra::Filter {
                expr,
                inner: Box::new(algebra),
            };
        }

        Ok(algebra)
    }

    fn translate_expr(&mut self, expression: &Expression) -> TranslateResult<Expr> {
        Ok(match expression {
            Expression::Variable(v) => Expr::Variable(v.clone()),
            Expression::Constant(t) => Expr::Constant(t.clone()),
            Expression::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.translate_expr(left)?),
                op: *op,
                right: Box::new(self.translate_expr(right)?),
            },
            Expression::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(self.translate_expr(expr)?),
            },
            Expression::In {
                expr,
                list,
                negated,
            } => Expr::In {
                expr: Box::new(self.translate_expr(expr)?),
                list: list
                    .iter()
                    .map(|e| self.translate_expr(e))
                    .collect::<TranslateResult<_>>()?,
                negated: *negated,
            },
            Expression::Function { function, args } => Expr::Function {
                function: *function,
                args: args
                    .iter()
                    .map(|e| self.translate_expr(e))
                    .collect::<TranslateResult<_>>()?,
            },
            Expression::Bound(v) => Expr::Bound(v.clone()),
            Expression::Exists { pattern, negated } => Expr::Exists {
                pattern: Box::new(self.translate_group(pattern)?),
                negated: *negated,
            },
            Expression::Aggregate(agg) => {
                return Err(TranslateError::MisplacedAggregate(format!(
                    "{:?}",
                    agg.function
                )))
            }
        })
    }

    /// Translates an expression, replacing each aggregate by a hidden
    /// variable bound by the Group node
    fn lift_aggregates(
        &mut self,
        expression: &Expression,
        aggregates: &mut Vec<(String, AggregateCall)>,
    ) -> TranslateResult<Expr> {
        Ok(match expression {
            Expression::Aggregate(agg) => {
                let call = AggregateCall {
                    function: agg.function,
                    distinct: agg.distinct,
                    expr: agg
                        .expr
                        .as_ref()
                        .map(|e| self.translate_expr(e))
                        .transpose()?,
                    separator: agg.separator.clone(),
                };
                if let Some((variable, _)) = aggregates.iter().find(|(_, c)| *c == call) {
                    return Ok(Expr::Variable(variable.clone()));
                }
                let variable = format!("#agg{}", self.aggregate_counter);
                self.aggregate_counter += 1;
                aggregates.push((variable.clone(), call));
                Expr::Variable(variable)
            }
            Expression::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.lift_aggregates(left, aggregates)?),
                op: *op,
                right: Box::new(self.lift_aggregates(right, aggregates)?),
            },
            Expression::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(self.lift_aggregates(expr, aggregates)?),
            },
            Expression::In {
                expr,
                list,
                negated,
            } => Expr::In {
                expr: Box::new(self.lift_aggregates(expr, aggregates)?),
                list: list
                    .iter()
                    .map(|e| self.lift_aggregates(e, aggregates))
                    .collect::<TranslateResult<_>>()?,
                negated: *negated,
            },
            Expression::Function { function, args } => Expr::Function {
                function: *function,
                args: args
                    .iter()
                    .map(|e| self.lift_aggregates(e, aggregates))
                    .collect::<TranslateResult<_>>()?,
            },
            other => self.translate_expr(other)?,
        })
    }
}

fn conjunction(exprs: Vec<Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|left, right| Expr::Binary {
        left: Box::new(left),
        op: BinaryOp::And,
        right: Box::new(right),
    })
}

fn table(data: &InlineData) -> Algebra {
    Algebra::Table {
        variables: data.variables.clone(),
        rows: data.rows.clone(),
    }
}

fn pattern_term(term: &TermPattern) -> PatternTerm {
    match term {
        TermPattern::Variable(v) => PatternTerm::Variable(v.clone()),
        // Blank nodes in a pattern act as variables that are never projected
        TermPattern::BlankNode(label) => PatternTerm::Variable(format!("_:{}", label)),
        TermPattern::Term(t) => PatternTerm::Term(t.clone()),
    }
}

fn link(iri: &str) -> PatternTerm {
    PatternTerm::Term(RdfTerm::NamedNode(crate::rdf::NamedNode::new_unchecked(iri)))
}

/// Consecutive simple triples form one BGP; other paths become Path nodes
fn translate_triples(triples: &[TriplePath]) -> Algebra {
    let mut algebra = Algebra::unit();

    for triple in triples {
        let subject = pattern_term(&triple.subject);
        let object = pattern_term(&triple.object);

        let node = match &triple.verb {
            VerbPattern::Variable(v) => Algebra::Bgp(vec![PatternTriple {
                subject,
                predicate: PatternTerm::Variable(v.clone()),
                object,
            }]),
            VerbPattern::Path(PropertyPath::Link(iri)) => Algebra::Bgp(vec![PatternTriple {
                subject,
                predicate: link(iri),
                object,
            }]),
            VerbPattern::Path(PropertyPath::Inverse(inner)) if inner.as_link().is_some() => {
                let iri = inner.as_link().unwrap_or_default();
                Algebra::Bgp(vec![PatternTriple {
                    subject: object,
                    predicate: link(iri),
                    object: subject,
                }])
            }
            VerbPattern::Path(path) => Algebra::Path {
                subject,
                path: path.clone(),
                object,
            },
        };
        algebra = Algebra::join(algebra, node);
    }

    algebra
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparql::parser::parse_query;

    fn translate(query: &str) -> TranslateResult<Algebra> {
        translate_query(&parse_query(query).unwrap())
    }

    fn unwrap_project(algebra: Algebra) -> (Vec<String>, Algebra) {
        match algebra {
            Algebra::Project { inner, variables } => (variables, *inner),
            other => panic!("expected project, got {}", other),
        }
    }

    #[test]
    fn test_simple_bgp() {
        let (vars, inner) = unwrap_project(
            translate("SELECT ?n WHERE { ?p foaf:name ?n ; foaf:age ?a }").unwrap(),
        );
        assert_eq!(vars, vec!["n"]);
        assert!(matches!(inner, Algebra::Bgp(ref p) if p.len() == 2));
    }

    #[test]
    fn test_filter_scopes_over_whole_group() {
        let (_, inner) = unwrap_project(
            translate("SELECT * WHERE { ?s foaf:age ?a FILTER(?a > 1) ?s foaf:name ?n }").unwrap(),
        );
        match inner {
            Algebra::Filter { inner, .. } => {
                assert!(matches!(*inner, Algebra::Bgp(ref p) if p.len() == 2))
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_optional_filter_becomes_join_condition() {
        let (_, inner) = unwrap_project(
            translate("SELECT * WHERE { ?s foaf:name ?n OPTIONAL { ?s foaf:age ?a FILTER(?a > 1) } }")
                .unwrap(),
        );
        match inner {
            Algebra::LeftJoin { right, expr, .. } => {
                assert!(expr.is_some());
                assert!(matches!(*right, Algebra::Bgp(_)));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_minus_and_union() {
        let (_, inner) = unwrap_project(
            translate(
                "SELECT * WHERE { { ?s a foaf:Person } UNION { ?s a foaf:Agent } MINUS { ?s foaf:age ?a } }",
            )
            .unwrap(),
        );
        match inner {
            Algebra::Diff(left, _) => assert!(matches!(*left, Algebra::Union(_, _))),
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_bind_extends_in_place() {
        let (_, inner) = unwrap_project(
            translate("SELECT * WHERE { ?s foaf:name ?n BIND(STRLEN(?n) AS ?l) ?s foaf:age ?l }")
                .unwrap(),
        );
        match inner {
            Algebra::Join(left, right) => {
                assert!(matches!(*left, Algebra::Extend { ref variable, .. } if variable == "l"));
                assert!(matches!(*right, Algebra::Bgp(_)));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_bind_rejects_bound_variable() {
        let err = translate("SELECT * WHERE { ?s foaf:name ?n BIND(1 AS ?n) }").unwrap_err();
        assert_eq!(err, TranslateError::BindScope("n".into()));
    }

    #[test]
    fn test_blank_nodes_are_hidden_from_star() {
        let (vars, _) =
            unwrap_project(translate("SELECT * WHERE { ?s foaf:knows [ foaf:name ?n ] }").unwrap());
        assert_eq!(vars, vec!["s", "n"]);
    }

    #[test]
    fn test_complex_path_becomes_path_node() {
        let (_, inner) =
            unwrap_project(translate("SELECT * WHERE { ?s foaf:knows+ ?o }").unwrap());
        assert!(matches!(inner, Algebra::Path { .. }));

        let (_, inner) =
            unwrap_project(translate("SELECT * WHERE { ?s ^foaf:knows ?o }").unwrap());
        match inner {
            Algebra::Bgp(patterns) => {
                assert_eq!(patterns[0].subject, PatternTerm::Variable("o".into()))
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_grouping_and_modifier_order() {
        let algebra = translate(
            "SELECT DISTINCT ?c (SUM(?v) AS ?total) WHERE { ?i ?c ?v }
             GROUP BY ?c HAVING (SUM(?v) > 10) ORDER BY ?total LIMIT 2",
        )
        .unwrap();

        let Algebra::Slice { inner, offset, limit } = algebra else {
            panic!("expected slice");
        };
        assert_eq!((offset, limit), (0, Some(2)));
        let Algebra::Distinct(inner) = *inner else {
            panic!("expected distinct");
        };
        let (vars, inner) = unwrap_project(*inner);
        assert_eq!(vars, vec!["c", "total"]);
        let Algebra::OrderBy { inner, .. } = inner else {
            panic!("expected order");
        };
        let Algebra::Extend { inner, variable, .. } = *inner else {
            panic!("expected extend");
        };
        assert_eq!(variable, "total");
        let Algebra::Filter { inner, .. } = *inner else {
            panic!("expected having filter");
        };
        match *inner {
            Algebra::Group {
                keys, aggregates, ..
            } => {
                assert_eq!(keys, vec!["c"]);
                // SUM(?v) appears twice but is computed once
                assert_eq!(aggregates.len(), 1);
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_implicit_group_for_aggregate() {
        let (vars, inner) =
            unwrap_project(translate("SELECT (COUNT(*) AS ?c) WHERE { ?p foaf:name ?n }").unwrap());
        assert_eq!(vars, vec!["c"]);
        match inner {
            Algebra::Extend { inner, .. } => assert!(matches!(
                *inner,
                Algebra::Group { ref keys, .. } if keys.is_empty()
            )),
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_grouping_errors() {
        assert_eq!(
            translate("SELECT ?s (COUNT(*) AS ?c) WHERE { ?s ?p ?o }").unwrap_err(),
            TranslateError::UngroupedVariable("s".into())
        );
        assert_eq!(
            translate("SELECT * WHERE { ?s ?p ?o } GROUP BY ?s").unwrap_err(),
            TranslateError::WildcardWithGrouping
        );
        assert!(matches!(
            translate("SELECT * WHERE { ?s ?p ?o FILTER(COUNT(?o) > 1) }").unwrap_err(),
            TranslateError::MisplacedAggregate(_)
        ));
    }

    #[test]
    fn test_group_by_expression_with_alias() {
        let algebra = translate(
            "SELECT ?len (COUNT(*) AS ?c) WHERE { ?s foaf:name ?n } GROUP BY (STRLEN(?n) AS ?len)",
        )
        .unwrap();
        let (_, inner) = unwrap_project(algebra);
        let Algebra::Extend { inner, .. } = inner else {
            panic!("expected extend");
        };
        match *inner {
            Algebra::Group { inner, keys, .. } => {
                assert_eq!(keys, vec!["len"]);
                assert!(matches!(*inner, Algebra::Extend { ref variable, .. } if variable == "len"));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_projection_errors() {
        assert_eq!(
            translate("SELECT ?s ?s WHERE { ?s ?p ?o }").unwrap_err(),
            TranslateError::DuplicateProjection("s".into())
        );
        assert_eq!(
            translate("SELECT (1 AS ?s) WHERE { ?s ?p ?o }").unwrap_err(),
            TranslateError::ProjectionScope("s".into())
        );
    }

    #[test]
    fn test_values_join() {
        let (_, inner) = unwrap_project(
            translate("SELECT * WHERE { ?s ?p ?o } VALUES ?s { <http://example.org/a> }").unwrap(),
        );
        match inner {
            Algebra::Join(left, right) => {
                assert!(matches!(*left, Algebra::Bgp(_)));
                assert!(matches!(*right, Algebra::Table { .. }));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_ask_has_no_projection() {
        let algebra = translate("ASK { ?s ?p ?o }").unwrap();
        assert!(matches!(algebra, Algebra::Bgp(_)));
    }
}
