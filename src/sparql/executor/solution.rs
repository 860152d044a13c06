//! Solution mappings flowing through the operator pipeline

use crate::rdf::RdfTerm;
use std::collections::BTreeMap;
use std::fmt;

/// A partial mapping from variable names to RDF terms
///
/// Bindings are kept sorted by variable name so that structurally equal
/// solutions hash and compare equal regardless of binding order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Solution {
    bindings: BTreeMap<String, RdfTerm>,
}

impl Solution {
    /// Create an empty solution
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, replacing any previous binding
    pub fn bind(&mut self, variable: impl Into<String>, term: RdfTerm) {
        self.bindings.insert(variable.into(), term);
    }

    /// Get the term bound to a variable
    pub fn get(&self, variable: &str) -> Option<&RdfTerm> {
        self.bindings.get(variable)
    }

    /// Check if a variable is bound
    pub fn contains(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    pub fn remove(&mut self, variable: &str) -> Option<RdfTerm> {
        self.bindings.remove(variable)
    }

    /// Bound variables, in name order
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RdfTerm)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Two solutions are compatible when they agree on every shared variable
    pub fn is_compatible(&self, other: &Solution) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .bindings
            .iter()
            .all(|(var, term)| large.get(var).map_or(true, |t| t == term))
    }

    /// True if at least one variable is bound in both
    pub fn shares_variable(&self, other: &Solution) -> bool {
        self.bindings.keys().any(|var| other.contains(var))
    }

    /// Union of two compatible solutions; `None` if they conflict
    pub fn merge(&self, other: &Solution) -> Option<Solution> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut merged = self.clone();
        for (var, term) in &other.bindings {
            if !merged.contains(var) {
                merged.bindings.insert(var.clone(), term.clone());
            }
        }
        Some(merged)
    }

    /// Restrict to the given variables
    pub fn project(&self, variables: &[String]) -> Solution {
        let bindings = variables
            .iter()
            .filter_map(|var| self.bindings.get(var).map(|t| (var.clone(), t.clone())))
            .collect();
        Solution { bindings }
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "?{} -> {}", var, term)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, RdfTerm)> for Solution {
    fn from_iter<I: IntoIterator<Item = (String, RdfTerm)>>(iter: I) -> Self {
        Solution {
            bindings: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Literal, NamedNode};

    fn iri(s: &str) -> RdfTerm {
        NamedNode::new(&format!("http://example.org/{}", s)).unwrap().into()
    }

    #[test]
    fn test_bind_and_get() {
        let mut solution = Solution::new();
        solution.bind("x", iri("a"));
        assert_eq!(solution.get("x"), Some(&iri("a")));
        assert!(solution.contains("x"));
        assert!(!solution.contains("y"));
        assert_eq!(solution.len(), 1);
    }

    #[test]
    fn test_compatibility_and_merge() {
        let mut left = Solution::new();
        left.bind("x", iri("a"));
        left.bind("y", iri("b"));

        let mut right = Solution::new();
        right.bind("y", iri("b"));
        right.bind("z", Literal::integer(1).into());

        assert!(left.is_compatible(&right));
        assert!(left.shares_variable(&right));
        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.len(), 3);

        let mut conflicting = Solution::new();
        conflicting.bind("y", iri("c"));
        assert!(!left.is_compatible(&conflicting));
        assert!(left.merge(&conflicting).is_none());
    }

    #[test]
    fn test_disjoint_solutions_are_compatible() {
        let mut a = Solution::new();
        a.bind("x", iri("a"));
        let mut b = Solution::new();
        b.bind("y", iri("b"));
        assert!(a.is_compatible(&b));
        assert!(!a.shares_variable(&b));
    }

    #[test]
    fn test_project() {
        let mut solution = Solution::new();
        solution.bind("x", iri("a"));
        solution.bind("y", iri("b"));
        let projected = solution.project(&["y".to_string(), "missing".to_string()]);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("y"), Some(&iri("b")));
    }

    #[test]
    fn test_structural_equality_ignores_bind_order() {
        let mut a = Solution::new();
        a.bind("x", iri("a"));
        a.bind("y", iri("b"));
        let mut b = Solution::new();
        b.bind("y", iri("b"));
        b.bind("x", iri("a"));
        assert_eq!(a, b);
    }
}
