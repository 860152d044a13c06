//! SPARQL algebra
//!
//! The translator lowers the AST into this tree; the planner compiles it into
//! physical operators. Nodes are plain immutable values.

use crate::rdf::RdfTerm;
use crate::sparql::ast::{AggregateFunction, BinaryOp, Function, PropertyPath, UnaryOp};
use indexmap::IndexSet;
use std::fmt;

/// Variables invented during translation (blank nodes in patterns, lifted
/// aggregates, unnamed group keys) carry a prefix no query variable can have.
pub fn is_hidden_variable(name: &str) -> bool {
    name.starts_with("_:") || name.starts_with('#')
}

/// Subject, predicate or object of a triple pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    Variable(String),
    Term(RdfTerm),
}

impl PatternTerm {
    pub fn variable(&self) -> Option<&str> {
        match self {
            PatternTerm::Variable(v) => Some(v),
            PatternTerm::Term(_) => None,
        }
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTerm::Variable(v) => write!(f, "?{}", v),
            PatternTerm::Term(t) => write!(f, "{}", t),
        }
    }
}

/// Triple pattern of a basic graph pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternTriple {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl PatternTriple {
    /// Variables in subject, predicate, object order
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(|t| t.variable())
    }
}

impl fmt::Display for PatternTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Scalar expression evaluated per solution
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Variable(String),
    Constant(RdfTerm),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Function {
        function: Function,
        args: Vec<Expr>,
    },
    Bound(String),
    Exists {
        pattern: Box<Algebra>,
        negated: bool,
    },
}

impl Expr {
    /// Collects the variables the expression reads, outside EXISTS patterns
    pub fn collect_variables<'a>(&'a self, out: &mut IndexSet<&'a str>) {
        match self {
            Expr::Variable(v) | Expr::Bound(v) => {
                out.insert(v);
            }
            Expr::Constant(_) | Expr::Exists { .. } => {}
            Expr::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::Unary { expr, .. } => expr.collect_variables(out),
            Expr::In { expr, list, .. } => {
                expr.collect_variables(out);
                for item in list {
                    item.collect_variables(out);
                }
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Variable(v) => write!(f, "?{}", v),
            Expr::Constant(t) => write!(f, "{}", t),
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op, expr } => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Plus => "+",
                    UnaryOp::Minus => "-",
                };
                write!(f, "{}{}", symbol, expr)
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                let items: Vec<String> = list.iter().map(|e| e.to_string()).collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                write!(f, "({} {} ({}))", expr, keyword, items.join(", "))
            }
            Expr::Function { function, args } => {
                let items: Vec<String> = args.iter().map(|e| e.to_string()).collect();
                write!(f, "{}({})", function, items.join(", "))
            }
            Expr::Bound(v) => write!(f, "BOUND(?{})", v),
            Expr::Exists { pattern, negated } => {
                let keyword = if *negated { "NOT EXISTS" } else { "EXISTS" };
                write!(f, "{} {}", keyword, pattern)
            }
        }
    }
}

/// Aggregate computed by a Group node
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub distinct: bool,
    /// `None` for COUNT(*)
    pub expr: Option<Expr>,
    pub separator: Option<String>,
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        match &self.expr {
            Some(expr) => write!(f, "{:?}({}{})", self.function, distinct, expr),
            None => write!(f, "{:?}({}*)", self.function, distinct),
        }
    }
}

/// ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub expr: Expr,
    pub descending: bool,
}

/// Algebra tree
#[derive(Debug, Clone, PartialEq)]
pub enum Algebra {
    /// Basic graph pattern; empty means the single empty solution
    Bgp(Vec<PatternTriple>),
    /// Property path between two terms
    Path {
        subject: PatternTerm,
        path: PropertyPath,
        object: PatternTerm,
    },
    Join(Box<Algebra>, Box<Algebra>),
    LeftJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        expr: Option<Expr>,
    },
    Union(Box<Algebra>, Box<Algebra>),
    /// MINUS
    Diff(Box<Algebra>, Box<Algebra>),
    Filter {
        expr: Expr,
        inner: Box<Algebra>,
    },
    /// BIND and projected expressions
    Extend {
        inner: Box<Algebra>,
        variable: String,
        expr: Expr,
    },
    Group {
        inner: Box<Algebra>,
        keys: Vec<String>,
        aggregates: Vec<(String, AggregateCall)>,
    },
    OrderBy {
        inner: Box<Algebra>,
        keys: Vec<OrderKey>,
    },
    Project {
        inner: Box<Algebra>,
        variables: Vec<String>,
    },
    Distinct(Box<Algebra>),
    Reduced(Box<Algebra>),
    Slice {
        inner: Box<Algebra>,
        offset: usize,
        limit: Option<usize>,
    },
    /// VALUES; `None` cells are unbound
    Table {
        variables: Vec<String>,
        rows: Vec<Vec<Option<RdfTerm>>>,
    },
}

impl Algebra {
    /// The identity of Join: one empty solution
    pub fn unit() -> Self {
        Algebra::Bgp(Vec::new())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Algebra::Bgp(patterns) if patterns.is_empty())
    }

    /// Join that drops identity operands and merges adjacent BGPs
    pub fn join(left: Algebra, right: Algebra) -> Algebra {
        match (left, right) {
            (left, right) if right.is_unit() => left,
            (left, right) if left.is_unit() => right,
            (Algebra::Bgp(mut left), Algebra::Bgp(right)) => {
                left.extend(right);
                Algebra::Bgp(left)
            }
            (left, right) => Algebra::Join(Box::new(left), Box::new(right)),
        }
    }

    /// Variables a solution of this node may bind, in first-seen order
    pub fn in_scope_variables(&self) -> IndexSet<String> {
        let mut vars = IndexSet::new();
        self.collect_in_scope(&mut vars);
        vars
    }

    fn collect_in_scope(&self, vars: &mut IndexSet<String>) {
        match self {
            Algebra::Bgp(patterns) => {
                for pattern in patterns {
                    for v in pattern.variables() {
                        vars.insert(v.to_string());
                    }
                }
            }
            Algebra::Path {
                subject, object, ..
            } => {
                for term in [subject, object] {
                    if let Some(v) = term.variable() {
                        vars.insert(v.to_string());
                    }
                }
            }
            Algebra::Join(left, right)
            | Algebra::Union(left, right)
            | Algebra::LeftJoin { left, right, .. } => {
                left.collect_in_scope(vars);
                right.collect_in_scope(vars);
            }
            Algebra::Diff(left, _) => left.collect_in_scope(vars),
            Algebra::Filter { inner, .. }
            | Algebra::OrderBy { inner, .. }
            | Algebra::Distinct(inner)
            | Algebra::Reduced(inner)
            | Algebra::Slice { inner, .. } => inner.collect_in_scope(vars),
            Algebra::Extend {
                inner, variable, ..
            } => {
                inner.collect_in_scope(vars);
                vars.insert(variable.clone());
            }
            Algebra::Group {
                keys, aggregates, ..
            } => {
                vars.extend(keys.iter().cloned());
                vars.extend(aggregates.iter().map(|(v, _)| v.clone()));
            }
            Algebra::Project { variables, .. } | Algebra::Table { variables, .. } => {
                vars.extend(variables.iter().cloned());
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Algebra::Bgp(patterns) => {
                let items: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
                writeln!(f, "{}(bgp {})", pad, items.join(" . "))
            }
            Algebra::Path {
                subject,
                path,
                object,
            } => writeln!(f, "{}(path {} {} {})", pad, subject, path, object),
            Algebra::Join(left, right) => {
                writeln!(f, "{}(join", pad)?;
                left.fmt_indented(f, depth + 1)?;
                right.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::LeftJoin { left, right, expr } => {
                match expr {
                    Some(expr) => writeln!(f, "{}(leftjoin {}", pad, expr)?,
                    None => writeln!(f, "{}(leftjoin", pad)?,
                }
                left.fmt_indented(f, depth + 1)?;
                right.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Union(left, right) => {
                writeln!(f, "{}(union", pad)?;
                left.fmt_indented(f, depth + 1)?;
                right.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Diff(left, right) => {
                writeln!(f, "{}(minus", pad)?;
                left.fmt_indented(f, depth + 1)?;
                right.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Filter { expr, inner } => {
                writeln!(f, "{}(filter {}", pad, expr)?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Extend {
                inner,
                variable,
                expr,
            } => {
                writeln!(f, "{}(extend ?{} {}", pad, variable, expr)?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Group {
                inner,
                keys,
                aggregates,
            } => {
                let aggs: Vec<String> = aggregates
                    .iter()
                    .map(|(v, call)| format!("?{}={}", v, call))
                    .collect();
                writeln!(f, "{}(group ({}) ({})", pad, keys.join(" "), aggs.join(" "))?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::OrderBy { inner, keys } => {
                let items: Vec<String> = keys
                    .iter()
                    .map(|k| {
                        if k.descending {
                            format!("desc({})", k.expr)
                        } else {
                            k.expr.to_string()
                        }
                    })
                    .collect();
                writeln!(f, "{}(order {}", pad, items.join(" "))?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Project { inner, variables } => {
                writeln!(f, "{}(project ({})", pad, variables.join(" "))?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Distinct(inner) => {
                writeln!(f, "{}(distinct", pad)?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Reduced(inner) => {
                writeln!(f, "{}(reduced", pad)?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Slice {
                inner,
                offset,
                limit,
            } => {
                let limit = limit.map_or_else(|| "_".to_string(), |l| l.to_string());
                writeln!(f, "{}(slice {} {}", pad, offset, limit)?;
                inner.fmt_indented(f, depth + 1)?;
                writeln!(f, "{})", pad)
            }
            Algebra::Table { variables, rows } => {
                writeln!(f, "{}(table ({}) {} rows)", pad, variables.join(" "), rows.len())
            }
        }
    }
}

impl fmt::Display for Algebra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
