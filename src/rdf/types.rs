//! RDF type definitions
//!
//! Thin wrappers around the oxrdf primitives. Every term kind is a closed
//! variant so evaluators are forced to handle all of them.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{
    BlankNode as OxBlankNode,
    Literal as OxLiteral,
    NamedNode as OxNamedNode,
    Subject as OxSubject,
    Term as OxTerm,
    Triple as OxTriple,
};
use std::fmt;
use thiserror::Error;

/// RDF errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RdfError {
    /// Invalid IRI
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    /// Invalid blank node
    #[error("Invalid blank node: {0}")]
    InvalidBlankNode(String),

    /// Invalid literal
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    /// Term cannot appear in the requested triple position
    #[error("{term} cannot be used as a triple {position}")]
    InvalidPosition {
        term: String,
        position: &'static str,
    },
}

pub type RdfResult<T> = Result<T, RdfError>;

/// Named node (IRI)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedNode(OxNamedNode);

impl NamedNode {
    /// Create a new named node from an absolute IRI string
    pub fn new(iri: &str) -> RdfResult<Self> {
        OxNamedNode::new(iri)
            .map(Self)
            .map_err(|e| RdfError::InvalidIri(format!("{}: {}", iri, e)))
    }

    /// Create a named node without validating the IRI
    pub fn new_unchecked(iri: impl Into<String>) -> Self {
        Self(OxNamedNode::new_unchecked(iri))
    }

    /// Get the IRI string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner oxrdf NamedNode
    pub fn inner(&self) -> &OxNamedNode {
        &self.0
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.as_str())
    }
}

impl From<OxNamedNode> for NamedNode {
    fn from(node: OxNamedNode) -> Self {
        Self(node)
    }
}

impl From<NamedNode> for OxNamedNode {
    fn from(node: NamedNode) -> Self {
        node.0
    }
}

/// Blank node (anonymous node)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlankNode(OxBlankNode);

impl BlankNode {
    /// Create a new blank node with a unique identifier
    pub fn new() -> Self {
        Self(OxBlankNode::default())
    }

    /// Create a blank node from a string identifier
    pub fn from_str(s: &str) -> RdfResult<Self> {
        OxBlankNode::new(s)
            .map(Self)
            .map_err(|e| RdfError::InvalidBlankNode(format!("{}: {}", s, e)))
    }

    /// Get the blank node identifier
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner oxrdf BlankNode
    pub fn inner(&self) -> &OxBlankNode {
        &self.0
    }
}

impl Default for BlankNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.as_str())
    }
}

impl From<OxBlankNode> for BlankNode {
    fn from(node: OxBlankNode) -> Self {
        Self(node)
    }
}

impl From<BlankNode> for OxBlankNode {
    fn from(node: BlankNode) -> Self {
        node.0
    }
}

/// RDF literal value
///
/// Carries either a datatype or a language tag, never both. Simple literals
/// report `xsd:string` as their datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal(OxLiteral);

impl Literal {
    /// Create a simple literal (plain string)
    pub fn new_simple_literal(value: impl Into<String>) -> Self {
        Self(OxLiteral::new_simple_literal(value))
    }

    /// Create a literal with language tag
    pub fn new_language_tagged_literal(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> RdfResult<Self> {
        OxLiteral::new_language_tagged_literal(value, language)
            .map(Self)
            .map_err(|e| RdfError::InvalidLiteral(e.to_string()))
    }

    /// Create a typed literal
    pub fn new_typed_literal(value: impl Into<String>, datatype: NamedNode) -> Self {
        Self(OxLiteral::new_typed_literal(value, datatype.0))
    }

    /// xsd:integer literal
    pub fn integer(value: i64) -> Self {
        Self(OxLiteral::from(value))
    }

    /// xsd:decimal literal in canonical form (always carries a fraction digit)
    pub fn decimal(value: f64) -> Self {
        let lexical = if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
            format!("{:.1}", value)
        } else {
            format!("{}", value)
        };
        Self(OxLiteral::new_typed_literal(lexical, xsd::DECIMAL))
    }

    /// xsd:double literal
    pub fn double(value: f64) -> Self {
        Self(OxLiteral::from(value))
    }

    /// xsd:boolean literal
    pub fn boolean(value: bool) -> Self {
        Self(OxLiteral::from(value))
    }

    /// xsd:dateTime literal from an already formatted lexical form
    pub fn date_time(lexical: impl Into<String>) -> Self {
        Self(OxLiteral::new_typed_literal(lexical, xsd::DATE_TIME))
    }

    /// Get the lexical value
    pub fn value(&self) -> &str {
        self.0.value()
    }

    /// Get the language tag if present
    pub fn language(&self) -> Option<&str> {
        self.0.language()
    }

    /// Get the datatype
    pub fn datatype(&self) -> NamedNode {
        NamedNode(self.0.datatype().into_owned())
    }

    /// Datatype IRI as a string slice, without allocating
    pub fn datatype_str(&self) -> &str {
        self.0.datatype().as_str()
    }

    /// True for literals without language tag typed as xsd:string
    pub fn is_plain_string(&self) -> bool {
        self.language().is_none() && self.datatype_str() == xsd::STRING.as_str()
    }

    /// True for xsd:string and rdf:langString literals
    pub fn is_string_like(&self) -> bool {
        self.language().is_some() || self.datatype_str() == xsd::STRING.as_str()
    }

    /// True if the datatype is rdf:langString
    pub fn is_lang_string(&self) -> bool {
        self.datatype_str() == rdf::LANG_STRING.as_str()
    }

    /// Get the inner oxrdf Literal
    pub fn inner(&self) -> &OxLiteral {
        &self.0
    }
}

/// Escape a lexical form for N-Triples output
pub(crate) fn escape_lexical(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = escape_lexical(self.value());
        if let Some(lang) = self.language() {
            write!(f, "\"{}\"@{}", value, lang)
        } else if self.is_plain_string() {
            write!(f, "\"{}\"", value)
        } else {
            write!(f, "\"{}\"^^<{}>", value, self.datatype_str())
        }
    }
}

impl From<OxLiteral> for Literal {
    fn from(lit: OxLiteral) -> Self {
        Self(lit)
    }
}

impl From<Literal> for OxLiteral {
    fn from(lit: Literal) -> Self {
        lit.0
    }
}

/// RDF subject (NamedNode or BlankNode)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfSubject {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
}

impl RdfSubject {
    /// Check if this is a named node
    pub fn is_named_node(&self) -> bool {
        matches!(self, RdfSubject::NamedNode(_))
    }

    /// Check if this is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, RdfSubject::BlankNode(_))
    }
}

impl fmt::Display for RdfSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfSubject::NamedNode(n) => write!(f, "{}", n),
            RdfSubject::BlankNode(b) => write!(f, "{}", b),
        }
    }
}

impl From<NamedNode> for RdfSubject {
    fn from(node: NamedNode) -> Self {
        RdfSubject::NamedNode(node)
    }
}

impl From<BlankNode> for RdfSubject {
    fn from(node: BlankNode) -> Self {
        RdfSubject::BlankNode(node)
    }
}

impl From<RdfSubject> for OxSubject {
    fn from(subject: RdfSubject) -> Self {
        match subject {
            RdfSubject::NamedNode(n) => OxSubject::NamedNode(n.0),
            RdfSubject::BlankNode(b) => OxSubject::BlankNode(b.0),
        }
    }
}

impl TryFrom<RdfTerm> for RdfSubject {
    type Error = RdfError;

    fn try_from(term: RdfTerm) -> RdfResult<Self> {
        match term {
            RdfTerm::NamedNode(n) => Ok(RdfSubject::NamedNode(n)),
            RdfTerm::BlankNode(b) => Ok(RdfSubject::BlankNode(b)),
            RdfTerm::Literal(l) => Err(RdfError::InvalidPosition {
                term: l.to_string(),
                position: "subject",
            }),
        }
    }
}

/// RDF predicate (always a NamedNode)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RdfPredicate(NamedNode);

impl RdfPredicate {
    /// Create a new predicate from an IRI
    pub fn new(iri: &str) -> RdfResult<Self> {
        Ok(Self(NamedNode::new(iri)?))
    }

    /// Get the underlying named node
    pub fn as_named_node(&self) -> &NamedNode {
        &self.0
    }

    /// Get the IRI string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RdfPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NamedNode> for RdfPredicate {
    fn from(node: NamedNode) -> Self {
        RdfPredicate(node)
    }
}

impl From<RdfPredicate> for NamedNode {
    fn from(pred: RdfPredicate) -> Self {
        pred.0
    }
}

impl TryFrom<RdfTerm> for RdfPredicate {
    type Error = RdfError;

    fn try_from(term: RdfTerm) -> RdfResult<Self> {
        match term {
            RdfTerm::NamedNode(n) => Ok(RdfPredicate(n)),
            other => Err(RdfError::InvalidPosition {
                term: other.to_string(),
                position: "predicate",
            }),
        }
    }
}

/// RDF object (NamedNode, BlankNode, or Literal)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfObject {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
    /// Literal value
    Literal(Literal),
}

impl RdfObject {
    /// Check if this is a named node
    pub fn is_named_node(&self) -> bool {
        matches!(self, RdfObject::NamedNode(_))
    }

    /// Check if this is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, RdfObject::BlankNode(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, RdfObject::Literal(_))
    }
}

impl fmt::Display for RdfObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfObject::NamedNode(n) => write!(f, "{}", n),
            RdfObject::BlankNode(b) => write!(f, "{}", b),
            RdfObject::Literal(l) => write!(f, "{}", l),
        }
    }
}

impl From<NamedNode> for RdfObject {
    fn from(node: NamedNode) -> Self {
        RdfObject::NamedNode(node)
    }
}

impl From<BlankNode> for RdfObject {
    fn from(node: BlankNode) -> Self {
        RdfObject::BlankNode(node)
    }
}

impl From<Literal> for RdfObject {
    fn from(lit: Literal) -> Self {
        RdfObject::Literal(lit)
    }
}

impl From<RdfSubject> for RdfObject {
    fn from(subject: RdfSubject) -> Self {
        match subject {
            RdfSubject::NamedNode(n) => RdfObject::NamedNode(n),
            RdfSubject::BlankNode(b) => RdfObject::BlankNode(b),
        }
    }
}

impl From<RdfTerm> for RdfObject {
    fn from(term: RdfTerm) -> Self {
        match term {
            RdfTerm::NamedNode(n) => RdfObject::NamedNode(n),
            RdfTerm::BlankNode(b) => RdfObject::BlankNode(b),
            RdfTerm::Literal(l) => RdfObject::Literal(l),
        }
    }
}

impl From<RdfObject> for OxTerm {
    fn from(object: RdfObject) -> Self {
        match object {
            RdfObject::NamedNode(n) => OxTerm::NamedNode(n.0),
            RdfObject::BlankNode(b) => OxTerm::BlankNode(b.0),
            RdfObject::Literal(l) => OxTerm::Literal(l.0),
        }
    }
}

/// RDF term (any RDF value)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfTerm {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
    /// Literal value
    Literal(Literal),
}

impl RdfTerm {
    pub fn is_named_node(&self) -> bool {
        matches!(self, RdfTerm::NamedNode(_))
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, RdfTerm::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, RdfTerm::Literal(_))
    }

    /// Borrow as literal
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            RdfTerm::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// Borrow as named node
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            RdfTerm::NamedNode(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for RdfTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfTerm::NamedNode(n) => write!(f, "{}", n),
            RdfTerm::BlankNode(b) => write!(f, "{}", b),
            RdfTerm::Literal(l) => write!(f, "{}", l),
        }
    }
}

impl From<NamedNode> for RdfTerm {
    fn from(node: NamedNode) -> Self {
        RdfTerm::NamedNode(node)
    }
}

impl From<BlankNode> for RdfTerm {
    fn from(node: BlankNode) -> Self {
        RdfTerm::BlankNode(node)
    }
}

impl From<Literal> for RdfTerm {
    fn from(lit: Literal) -> Self {
        RdfTerm::Literal(lit)
    }
}

impl From<RdfSubject> for RdfTerm {
    fn from(subject: RdfSubject) -> Self {
        match subject {
            RdfSubject::NamedNode(n) => RdfTerm::NamedNode(n),
            RdfSubject::BlankNode(b) => RdfTerm::BlankNode(b),
        }
    }
}

impl From<RdfPredicate> for RdfTerm {
    fn from(predicate: RdfPredicate) -> Self {
        RdfTerm::NamedNode(predicate.0)
    }
}

impl From<RdfObject> for RdfTerm {
    fn from(object: RdfObject) -> Self {
        match object {
            RdfObject::NamedNode(n) => RdfTerm::NamedNode(n),
            RdfObject::BlankNode(b) => RdfTerm::BlankNode(b),
            RdfObject::Literal(l) => RdfTerm::Literal(l),
        }
    }
}

/// RDF triple (subject-predicate-object)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    /// Subject
    pub subject: RdfSubject,
    /// Predicate
    pub predicate: RdfPredicate,
    /// Object
    pub object: RdfObject,
}

impl Triple {
    /// Create a new triple
    pub fn new(subject: RdfSubject, predicate: RdfPredicate, object: RdfObject) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Build a triple from arbitrary terms, checking position constraints
    pub fn from_terms(subject: RdfTerm, predicate: RdfTerm, object: RdfTerm) -> RdfResult<Self> {
        Ok(Self {
            subject: subject.try_into()?,
            predicate: predicate.try_into()?,
            object: object.into(),
        })
    }

    /// Convert to oxrdf Triple
    pub fn to_oxrdf(&self) -> OxTriple {
        let subject: OxSubject = self.subject.clone().into();
        let predicate: OxNamedNode = self.predicate.clone().0.into();
        let object: OxTerm = self.object.clone().into();

        OxTriple::new(subject, predicate, object)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Triple pattern for store lookups (None = unbound position)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    /// Subject (None = variable)
    pub subject: Option<RdfSubject>,
    /// Predicate (None = variable)
    pub predicate: Option<RdfPredicate>,
    /// Object (None = variable)
    pub object: Option<RdfObject>,
}

impl TriplePattern {
    /// Create a new triple pattern
    pub fn new(
        subject: Option<RdfSubject>,
        predicate: Option<RdfPredicate>,
        object: Option<RdfObject>,
    ) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Check if a triple matches this pattern
    pub fn matches(&self, triple: &Triple) -> bool {
        if let Some(ref s) = self.subject {
            if s != &triple.subject {
                return false;
            }
        }
        if let Some(ref p) = self.predicate {
            if p != &triple.predicate {
                return false;
            }
        }
        if let Some(ref o) = self.object {
            if o != &triple.object {
                return false;
            }
        }
        true
    }
}
