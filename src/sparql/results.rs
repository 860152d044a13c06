//! SPARQL query results and their text serializations

use crate::rdf::{RdfTerm, Triple};
use crate::sparql::executor::{ExecutionContext, ExecutionResult, OperatorBox, Solution};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// SPARQL result format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    /// SPARQL 1.1 Query Results JSON
    Json,
    /// SPARQL 1.1 Query Results CSV
    Csv,
    /// SPARQL 1.1 Query Results TSV
    Tsv,
    /// N-Triples, for CONSTRUCT and DESCRIBE
    NTriples,
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultFormat::Json => "JSON",
            ResultFormat::Csv => "CSV",
            ResultFormat::Tsv => "TSV",
            ResultFormat::NTriples => "N-Triples",
        };
        write!(f, "{}", name)
    }
}

/// Serialization errors
#[derive(Error, Debug)]
pub enum SerializationError {
    /// Format cannot represent this kind of result
    #[error("{format} cannot represent {kind} results")]
    UnsupportedFormat {
        format: ResultFormat,
        kind: &'static str,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SerializationResult<T> = Result<T, SerializationError>;

/// SPARQL query results
#[derive(Debug, Clone, PartialEq)]
pub enum SparqlResults {
    /// Bindings from a SELECT query
    Solutions {
        /// Projected variables, in order
        variables: Vec<String>,
        solutions: Vec<Solution>,
    },

    /// Boolean result from ASK query
    Boolean(bool),

    /// Graph from CONSTRUCT/DESCRIBE query
    Graph(Vec<Triple>),
}

impl SparqlResults {
    /// Create empty bindings result
    pub fn empty() -> Self {
        SparqlResults::Solutions {
            variables: Vec::new(),
            solutions: Vec::new(),
        }
    }

    /// Number of solutions or triples; 1 for a boolean
    pub fn len(&self) -> usize {
        match self {
            SparqlResults::Solutions { solutions, .. } => solutions.len(),
            SparqlResults::Boolean(_) => 1,
            SparqlResults::Graph(triples) => triples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn variables(&self) -> &[String] {
        match self {
            SparqlResults::Solutions { variables, .. } => variables,
            _ => &[],
        }
    }

    pub fn solutions(&self) -> Option<&[Solution]> {
        match self {
            SparqlResults::Solutions { solutions, .. } => Some(solutions),
            _ => None,
        }
    }

    pub fn boolean(&self) -> Option<bool> {
        match self {
            SparqlResults::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn triples(&self) -> Option<&[Triple]> {
        match self {
            SparqlResults::Graph(triples) => Some(triples),
            _ => None,
        }
    }

    /// Serialize results to string
    pub fn serialize(&self, format: ResultFormat) -> SerializationResult<String> {
        match (self, format) {
            (SparqlResults::Solutions { variables, solutions }, ResultFormat::Json) => {
                Ok(serde_json::to_string(&solutions_json(variables, solutions))?)
            }
            (SparqlResults::Solutions { variables, solutions }, ResultFormat::Csv) => {
                Ok(solutions_csv(variables, solutions))
            }
            (SparqlResults::Solutions { variables, solutions }, ResultFormat::Tsv) => {
                Ok(solutions_tsv(variables, solutions))
            }
            (SparqlResults::Boolean(b), ResultFormat::Json) => {
                Ok(serde_json::to_string(&json!({ "head": {}, "boolean": b }))?)
            }
            (SparqlResults::Boolean(b), ResultFormat::Csv | ResultFormat::Tsv) => {
                Ok(format!("{}\n", b))
            }
            (SparqlResults::Graph(triples), ResultFormat::NTriples) => Ok(triples
                .iter()
                .map(|t| format!("{}\n", t))
                .collect()),
            (SparqlResults::Solutions { .. }, format) => {
                Err(SerializationError::UnsupportedFormat { format, kind: "solution" })
            }
            (SparqlResults::Boolean(_), format) => {
                Err(SerializationError::UnsupportedFormat { format, kind: "boolean" })
            }
            (SparqlResults::Graph(_), format) => {
                Err(SerializationError::UnsupportedFormat { format, kind: "graph" })
            }
        }
    }
}

fn term_json(term: &RdfTerm) -> Value {
    match term {
        RdfTerm::NamedNode(n) => json!({ "type": "uri", "value": n.as_str() }),
        RdfTerm::BlankNode(b) => json!({ "type": "bnode", "value": b.as_str() }),
        RdfTerm::Literal(l) => {
            let mut object = Map::new();
            object.insert("type".into(), "literal".into());
            object.insert("value".into(), l.value().into());
            if let Some(lang) = l.language() {
                object.insert("xml:lang".into(), lang.into());
            } else if !l.is_plain_string() {
                object.insert("datatype".into(), l.datatype_str().into());
            }
            Value::Object(object)
        }
    }
}

fn solutions_json(variables: &[String], solutions: &[Solution]) -> Value {
    let bindings: Vec<Value> = solutions
        .iter()
        .map(|solution| {
            let row: Map<String, Value> = variables
                .iter()
                .filter_map(|v| solution.get(v).map(|t| (v.clone(), term_json(t))))
                .collect();
            Value::Object(row)
        })
        .collect();
    json!({
        "head": { "vars": variables },
        "results": { "bindings": bindings },
    })
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn solutions_csv(variables: &[String], solutions: &[Solution]) -> String {
    let mut out = variables.join(",");
    out.push_str("\r\n");
    for solution in solutions {
        let row: Vec<String> = variables
            .iter()
            .map(|v| match solution.get(v) {
                Some(RdfTerm::NamedNode(n)) => csv_field(n.as_str()),
                Some(RdfTerm::BlankNode(b)) => format!("_:{}", b.as_str()),
                Some(RdfTerm::Literal(l)) => csv_field(l.value()),
                None => String::new(),
            })
            .collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

fn solutions_tsv(variables: &[String], solutions: &[Solution]) -> String {
    let header: Vec<String> = variables.iter().map(|v| format!("?{}", v)).collect();
    let mut out = header.join("\t");
    out.push('\n');
    for solution in solutions {
        let row: Vec<String> = variables
            .iter()
            .map(|v| solution.get(v).map(|t| t.to_string()).unwrap_or_default())
            .collect();
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}

/// Lazy stream of SELECT solutions
///
/// Owns the operator tree and the execution context; dropping it cancels
/// the query.
pub struct QuerySolutionIter<'a> {
    variables: Vec<String>,
    root: OperatorBox<'a>,
    ctx: ExecutionContext<'a>,
    finished: bool,
}

impl<'a> QuerySolutionIter<'a> {
    pub(crate) fn new(
        variables: Vec<String>,
        root: OperatorBox<'a>,
        ctx: ExecutionContext<'a>,
    ) -> Self {
        Self {
            variables,
            root,
            ctx,
            finished: false,
        }
    }

    /// Projected variables, in order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Drain the stream into a materialized result
    pub fn into_results(self) -> ExecutionResult<SparqlResults> {
        let variables = self.variables.clone();
        let solutions = self.collect::<ExecutionResult<Vec<_>>>()?;
        Ok(SparqlResults::Solutions {
            variables,
            solutions,
        })
    }
}

impl<'a> Iterator for QuerySolutionIter<'a> {
    type Item = ExecutionResult<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.root.next(&self.ctx) {
            Ok(Some(solution)) => Some(Ok(solution)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{BlankNode, Literal, NamedNode};

    fn sample() -> SparqlResults {
        let mut first = Solution::new();
        first.bind("s", NamedNode::new("http://example.org/a").unwrap().into());
        first.bind("o", Literal::new_simple_literal("x, \"y\"").into());
        let mut second = Solution::new();
        second.bind("s", BlankNode::from_str("b0").unwrap().into());
        second.bind("o", Literal::integer(3).into());
        let mut third = Solution::new();
        third.bind("s", NamedNode::new("http://example.org/c").unwrap().into());

        SparqlResults::Solutions {
            variables: vec!["s".to_string(), "o".to_string()],
            solutions: vec![first, second, third],
        }
    }

    #[test]
    fn test_empty_results() {
        let results = SparqlResults::empty();
        assert!(results.is_empty());
        assert!(results.variables().is_empty());
        assert_eq!(results.solutions().map(<[Solution]>::len), Some(0));
    }

    #[test]
    fn test_json_serialization() {
        let text = sample().serialize(ResultFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["head"]["vars"], json!(["s", "o"]));

        let bindings = value["results"]["bindings"].as_array().unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0]["s"]["type"], "uri");
        assert_eq!(bindings[1]["s"], json!({ "type": "bnode", "value": "b0" }));
        assert_eq!(
            bindings[1]["o"]["datatype"],
            "http://www.w3.org/2001/XMLSchema#integer"
        );
        assert!(bindings[0]["o"].get("datatype").is_none());
        // Unbound variables are omitted
        assert!(bindings[2].get("o").is_none());
    }

    #[test]
    fn test_csv_serialization() {
        let text = sample().serialize(ResultFormat::Csv).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "s,o");
        assert_eq!(lines[1], "http://example.org/a,\"x, \"\"y\"\"\"");
        assert_eq!(lines[2], "_:b0,3");
        assert_eq!(lines[3], "http://example.org/c,");
    }

    #[test]
    fn test_tsv_serialization() {
        let text = sample().serialize(ResultFormat::Tsv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "?s\t?o");
        assert_eq!(
            lines[2],
            "_:b0\t\"3\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn test_boolean_and_graph() {
        let ask = SparqlResults::Boolean(true);
        let text = ask.serialize(ResultFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["boolean"], true);
        assert_eq!(ask.boolean(), Some(true));

        let triple = Triple::new(
            NamedNode::new("http://example.org/a").unwrap().into(),
            NamedNode::new("http://example.org/p").unwrap().into(),
            Literal::new_simple_literal("v").into(),
        );
        let graph = SparqlResults::Graph(vec![triple]);
        assert_eq!(
            graph.serialize(ResultFormat::NTriples).unwrap(),
            "<http://example.org/a> <http://example.org/p> \"v\" .\n"
        );
        assert!(matches!(
            graph.serialize(ResultFormat::Csv),
            Err(SerializationError::UnsupportedFormat { kind: "graph", .. })
        ));
    }
}
