//! Abstract Syntax Tree for SPARQL queries
//!
//! The parser produces these types with every prefixed name and relative IRI
//! already resolved. No semantic validation has happened yet; scoping rules
//! and aggregate placement are checked by the translator.

use crate::rdf::RdfTerm;
use std::fmt;

/// Complete SPARQL query representation
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// BASE IRI in effect at the end of the prologue
    pub base: Option<String>,
    /// Query form (SELECT/CONSTRUCT/ASK/DESCRIBE)
    pub form: QueryForm,
    /// WHERE clause
    pub pattern: GroupGraphPattern,
    /// GROUP BY / HAVING / ORDER BY / LIMIT / OFFSET
    pub modifiers: SolutionModifiers,
    /// Trailing VALUES block
    pub values: Option<InlineData>,
}

/// Query form
#[derive(Debug, Clone, PartialEq)]
pub enum QueryForm {
    Select {
        modifier: Option<SelectModifier>,
        projection: Projection,
    },
    Construct {
        template: Vec<TriplePath>,
    },
    Ask,
    Describe {
        targets: DescribeTargets,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectModifier {
    Distinct,
    Reduced,
}

/// SELECT projection
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// SELECT *
    All,
    /// Explicit variables and (expr AS ?var) items
    Items(Vec<SelectItem>),
}

/// One projected variable, optionally computed
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub variable: String,
    pub expression: Option<Expression>,
}

/// DESCRIBE targets
#[derive(Debug, Clone, PartialEq)]
pub enum DescribeTargets {
    /// DESCRIBE *
    All,
    Terms(Vec<TermPattern>),
}

/// Solution modifiers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolutionModifiers {
    pub group_by: Vec<GroupCondition>,
    pub having: Vec<Expression>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SolutionModifiers {
    /// True if the query groups, explicitly or through HAVING
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || !self.having.is_empty()
    }
}

/// GROUP BY key: `?x`, `(expr)` or `(expr AS ?x)`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCondition {
    pub expression: Expression,
    pub alias: Option<String>,
}

/// ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCondition {
    pub expression: Expression,
    pub descending: bool,
}

/// `{ ... }` group
#[derive(Debug, Clone, PartialEq)]
pub enum GroupGraphPattern {
    Group(Vec<PatternElement>),
    SubSelect(Box<Query>),
}

impl GroupGraphPattern {
    pub fn empty() -> Self {
        GroupGraphPattern::Group(Vec::new())
    }
}

/// Element of a group, in source order
#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    /// Consecutive triple patterns
    Triples(Vec<TriplePath>),
    /// Nested `{ }` group
    Group(GroupGraphPattern),
    /// `{ } UNION { } UNION ...`
    Union(Vec<GroupGraphPattern>),
    Optional(GroupGraphPattern),
    Minus(GroupGraphPattern),
    Filter(Expression),
    Bind {
        expression: Expression,
        variable: String,
    },
    Values(InlineData),
}

/// VALUES block; `None` cells are UNDEF
#[derive(Debug, Clone, PartialEq)]
pub struct InlineData {
    pub variables: Vec<String>,
    pub rows: Vec<Vec<Option<RdfTerm>>>,
}

/// Triple pattern whose predicate may be a property path
#[derive(Debug, Clone, PartialEq)]
pub struct TriplePath {
    pub subject: TermPattern,
    pub verb: VerbPattern,
    pub object: TermPattern,
}

/// Subject or object position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermPattern {
    Variable(String),
    /// `_:label`, or a generated label for `[]`
    BlankNode(String),
    Term(RdfTerm),
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermPattern::Variable(v) => write!(f, "?{}", v),
            TermPattern::BlankNode(b) => write!(f, "_:{}", b),
            TermPattern::Term(t) => write!(f, "{}", t),
        }
    }
}

/// Predicate position
#[derive(Debug, Clone, PartialEq)]
pub enum VerbPattern {
    Variable(String),
    Path(PropertyPath),
}

/// Property path expression over predicate IRIs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    /// Single predicate
    Link(String),
    /// `^p`
    Inverse(Box<PropertyPath>),
    /// `p / q`
    Sequence(Box<PropertyPath>, Box<PropertyPath>),
    /// `p | q`
    Alternative(Box<PropertyPath>, Box<PropertyPath>),
    /// `p?`
    ZeroOrOne(Box<PropertyPath>),
    /// `p*`
    ZeroOrMore(Box<PropertyPath>),
    /// `p+`
    OneOrMore(Box<PropertyPath>),
    /// `!(p | ^q)`
    NegatedPropertySet {
        forward: Vec<String>,
        inverse: Vec<String>,
    },
}

impl PropertyPath {
    /// The predicate IRI if this path is a plain link
    pub fn as_link(&self) -> Option<&str> {
        match self {
            PropertyPath::Link(iri) => Some(iri),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPath::Link(iri) => write!(f, "<{}>", iri),
            PropertyPath::Inverse(p) => write!(f, "^({})", p),
            PropertyPath::Sequence(a, b) => write!(f, "({} / {})", a, b),
            PropertyPath::Alternative(a, b) => write!(f, "({} | {})", a, b),
            PropertyPath::ZeroOrOne(p) => write!(f, "({})?", p),
            PropertyPath::ZeroOrMore(p) => write!(f, "({})*", p),
            PropertyPath::OneOrMore(p) => write!(f, "({})+", p),
            PropertyPath::NegatedPropertySet { forward, inverse } => {
                let items: Vec<String> = forward
                    .iter()
                    .map(|iri| format!("<{}>", iri))
                    .chain(inverse.iter().map(|iri| format!("^<{}>", iri)))
                    .collect();
                write!(f, "!({})", items.join(" | "))
            }
        }
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Variable(String),
    Constant(RdfTerm),
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    /// `expr [NOT] IN (list)`
    In {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    /// Built-in or cast function call
    Function {
        function: Function,
        args: Vec<Expression>,
    },
    /// BOUND(?var)
    Bound(String),
    /// `[NOT] EXISTS { ... }`
    Exists {
        pattern: Box<GroupGraphPattern>,
        negated: bool,
    },
    Aggregate(AggregateExpr),
}

impl Expression {
    /// True if an aggregate appears anywhere in this expression
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate(_) => true,
            Expression::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expression::Unary { expr, .. } => expr.contains_aggregate(),
            Expression::In { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(|e| e.contains_aggregate())
            }
            Expression::Function { args, .. } => args.iter().any(|e| e.contains_aggregate()),
            Expression::Variable(_)
            | Expression::Constant(_)
            | Expression::Bound(_)
            | Expression::Exists { .. } => false,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        f.write_str(s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Plus,
    Minus,
}

/// Aggregate call inside SELECT, HAVING or ORDER BY
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub distinct: bool,
    /// `None` for COUNT(*)
    pub expr: Option<Box<Expression>>,
    /// GROUP_CONCAT separator
    pub separator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Sample,
    GroupConcat,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "COUNT" => AggregateFunction::Count,
            "SUM" => AggregateFunction::Sum,
            "AVG" => AggregateFunction::Avg,
            "MIN" => AggregateFunction::Min,
            "MAX" => AggregateFunction::Max,
            "SAMPLE" => AggregateFunction::Sample,
            "GROUP_CONCAT" => AggregateFunction::GroupConcat,
            _ => return None,
        })
    }
}

/// Target datatype of an XSD constructor function such as `xsd:integer(?x)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XsdCast {
    String,
    Integer,
    Decimal,
    Double,
    Float,
    Boolean,
    DateTime,
}

impl XsdCast {
    pub fn from_iri(iri: &str) -> Option<Self> {
        let local = iri.strip_prefix("http://www.w3.org/2001/XMLSchema#")?;
        Some(match local {
            "string" => XsdCast::String,
            "integer" => XsdCast::Integer,
            "decimal" => XsdCast::Decimal,
            "double" => XsdCast::Double,
            "float" => XsdCast::Float,
            "boolean" => XsdCast::Boolean,
            "dateTime" => XsdCast::DateTime,
            _ => return None,
        })
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Str,
    Lang,
    LangMatches,
    Datatype,
    Iri,
    BNode,
    Rand,
    Abs,
    Ceil,
    Floor,
    Round,
    Concat,
    SubStr,
    StrLen,
    Replace,
    UCase,
    LCase,
    EncodeForUri,
    Contains,
    StrStarts,
    StrEnds,
    StrBefore,
    StrAfter,
    Year,
    Month,
    Day,
    Hours,
    Minutes,
    Seconds,
    Tz,
    Now,
    Uuid,
    StrUuid,
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Coalesce,
    If,
    StrLang,
    StrDt,
    SameTerm,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Regex,
    Cast(XsdCast),
}

impl Function {
    /// Look up a built-in by its (case-insensitive) keyword
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "STR" => Function::Str,
            "LANG" => Function::Lang,
            "LANGMATCHES" => Function::LangMatches,
            "DATATYPE" => Function::Datatype,
            "IRI" | "URI" => Function::Iri,
            "BNODE" => Function::BNode,
            "RAND" => Function::Rand,
            "ABS" => Function::Abs,
            "CEIL" => Function::Ceil,
            "FLOOR" => Function::Floor,
            "ROUND" => Function::Round,
            "CONCAT" => Function::Concat,
            "SUBSTR" => Function::SubStr,
            "STRLEN" => Function::StrLen,
            "REPLACE" => Function::Replace,
            "UCASE" => Function::UCase,
            "LCASE" => Function::LCase,
            "ENCODE_FOR_URI" => Function::EncodeForUri,
            "CONTAINS" => Function::Contains,
            "STRSTARTS" => Function::StrStarts,
            "STRENDS" => Function::StrEnds,
            "STRBEFORE" => Function::StrBefore,
            "STRAFTER" => Function::StrAfter,
            "YEAR" => Function::Year,
            "MONTH" => Function::Month,
            "DAY" => Function::Day,
            "HOURS" => Function::Hours,
            "MINUTES" => Function::Minutes,
            "SECONDS" => Function::Seconds,
            "TZ" => Function::Tz,
            "NOW" => Function::Now,
            "UUID" => Function::Uuid,
            "STRUUID" => Function::StrUuid,
            "MD5" => Function::Md5,
            "SHA1" => Function::Sha1,
            "SHA256" => Function::Sha256,
            "SHA512" => Function::Sha512,
            "COALESCE" => Function::Coalesce,
            "IF" => Function::If,
            "STRLANG" => Function::StrLang,
            "STRDT" => Function::StrDt,
            "SAMETERM" => Function::SameTerm,
            "ISIRI" | "ISURI" => Function::IsIri,
            "ISBLANK" => Function::IsBlank,
            "ISLITERAL" => Function::IsLiteral,
            "ISNUMERIC" => Function::IsNumeric,
            "REGEX" => Function::Regex,
            _ => return None,
        })
    }

    /// Accepted argument count range (inclusive); `None` upper bound is variadic
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Rand | Function::Now | Function::Uuid | Function::StrUuid => (0, Some(0)),
            Function::BNode => (0, Some(1)),
            Function::Concat => (0, None),
            Function::Coalesce => (1, None),
            Function::LangMatches
            | Function::Contains
            | Function::StrStarts
            | Function::StrEnds
            | Function::StrBefore
            | Function::StrAfter
            | Function::StrLang
            | Function::StrDt
            | Function::SameTerm => (2, Some(2)),
            Function::SubStr | Function::Regex => (2, Some(3)),
            Function::Replace => (3, Some(4)),
            Function::If => (3, Some(3)),
            _ => (1, Some(1)),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Cast(cast) => write!(f, "xsd:{:?}", cast),
            other => write!(f, "{}", format!("{:?}", other).to_ascii_uppercase()),
        }
    }
}
