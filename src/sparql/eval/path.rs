//! Property path evaluation against the triple store
//!
//! Closures walk a frontier with a visited set, so cyclic data terminates.

use crate::rdf::{NamedNode, RdfObject, RdfPredicate, RdfStore, RdfSubject, RdfTerm};
use crate::sparql::ast::PropertyPath;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tracing::trace;

/// All `(start, end)` pairs connected by `path`
///
/// Bound ends restrict the walk; with both ends free every node in the
/// store is tried as a start.
pub fn evaluate_path(
    store: &RdfStore,
    path: &PropertyPath,
    subject: Option<&RdfTerm>,
    object: Option<&RdfTerm>,
) -> Vec<(RdfTerm, RdfTerm)> {
    match (subject, object) {
        (Some(s), Some(o)) => {
            let reached = path_targets(store, path, s, true);
            reached
                .into_iter()
                .filter(|end| end == o)
                .map(|end| (s.clone(), end))
                .collect()
        }
        (Some(s), None) => path_targets(store, path, s, true)
            .into_iter()
            .map(|end| (s.clone(), end))
            .collect(),
        (None, Some(o)) => path_targets(store, path, o, false)
            .into_iter()
            .map(|start| (start, o.clone()))
            .collect(),
        (None, None) => {
            let nodes = all_nodes(store);
            trace!(nodes = nodes.len(), "evaluating path with both ends free");
            let mut pairs = Vec::new();
            for node in nodes {
                for end in path_targets(store, path, &node, true) {
                    pairs.push((node.clone(), end));
                }
            }
            pairs
        }
    }
}

/// Nodes reachable from `node` along `path`; against the path direction when
/// `forward` is false
pub fn path_targets(
    store: &RdfStore,
    path: &PropertyPath,
    node: &RdfTerm,
    forward: bool,
) -> Vec<RdfTerm> {
    let mut out = Vec::new();
    step(store, path, node, forward, &mut out);
    out
}

fn step(store: &RdfStore, path: &PropertyPath, node: &RdfTerm, forward: bool, out: &mut Vec<RdfTerm>) {
    match path {
        PropertyPath::Link(iri) => {
            let predicate = RdfPredicate::from(NamedNode::new_unchecked(iri.as_str()));
            edges(store, Some(&predicate), node, forward, out);
        }
        PropertyPath::Inverse(inner) => step(store, inner, node, !forward, out),
        PropertyPath::Sequence(first, second) => {
            let (first, second) = if forward {
                (first, second)
            } else {
                (second, first)
            };
            let middle = path_targets(store, first, node, forward);
            for mid in &middle {
                step(store, second, mid, forward, out);
            }
        }
        PropertyPath::Alternative(left, right) => {
            step(store, left, node, forward, out);
            step(store, right, node, forward, out);
        }
        PropertyPath::ZeroOrOne(inner) => {
            let mut seen = FxHashSet::default();
            seen.insert(node.clone());
            out.push(node.clone());
            for next in path_targets(store, inner, node, forward) {
                if seen.insert(next.clone()) {
                    out.push(next);
                }
            }
        }
        PropertyPath::ZeroOrMore(inner) => closure(store, inner, node, forward, true, out),
        PropertyPath::OneOrMore(inner) => closure(store, inner, node, forward, false, out),
        PropertyPath::NegatedPropertySet {
            forward: excluded_forward,
            inverse: excluded_inverse,
        } => {
            if !excluded_forward.is_empty() || excluded_inverse.is_empty() {
                negated_edges(store, excluded_forward, node, forward, out);
            }
            if !excluded_inverse.is_empty() {
                negated_edges(store, excluded_inverse, node, !forward, out);
            }
        }
    }
}

/// Reachability closure. The start node is emitted only when `reflexive`
/// or when a cycle leads back to it.
fn closure(
    store: &RdfStore,
    path: &PropertyPath,
    start: &RdfTerm,
    forward: bool,
    reflexive: bool,
    out: &mut Vec<RdfTerm>,
) {
    let mut visited: FxHashSet<RdfTerm> = FxHashSet::default();
    let mut frontier: VecDeque<RdfTerm> = VecDeque::new();

    if reflexive {
        visited.insert(start.clone());
        out.push(start.clone());
    }
    frontier.push_back(start.clone());
    let mut expanded: FxHashSet<RdfTerm> = FxHashSet::default();

    while let Some(node) = frontier.pop_front() {
        if !expanded.insert(node.clone()) {
            continue;
        }
        for next in path_targets(store, path, &node, forward) {
            if visited.insert(next.clone()) {
                out.push(next.clone());
                frontier.push_back(next);
            }
        }
    }
}

/// Direct edges from (forward) or into (backward) `node`
fn edges(
    store: &RdfStore,
    predicate: Option<&RdfPredicate>,
    node: &RdfTerm,
    forward: bool,
    out: &mut Vec<RdfTerm>,
) {
    if forward {
        let Ok(subject) = RdfSubject::try_from(node.clone()) else {
            return;
        };
        out.extend(
            store
                .match_triples(Some(&subject), predicate, None)
                .map(|t| RdfTerm::from(t.object.clone())),
        );
    } else {
        let object = RdfObject::from(node.clone());
        out.extend(
            store
                .match_triples(None, predicate, Some(&object))
                .map(|t| RdfTerm::from(t.subject.clone())),
        );
    }
}

fn negated_edges(
    store: &RdfStore,
    excluded: &[String],
    node: &RdfTerm,
    forward: bool,
    out: &mut Vec<RdfTerm>,
) {
    let allowed = |p: &RdfPredicate| !excluded.iter().any(|e| e == p.as_str());
    if forward {
        let Ok(subject) = RdfSubject::try_from(node.clone()) else {
            return;
        };
        out.extend(
            store
                .match_triples(Some(&subject), None, None)
                .filter(|t| allowed(&t.predicate))
                .map(|t| RdfTerm::from(t.object.clone())),
        );
    } else {
        let object = RdfObject::from(node.clone());
        out.extend(
            store
                .match_triples(None, None, Some(&object))
                .filter(|t| allowed(&t.predicate))
                .map(|t| RdfTerm::from(t.subject.clone())),
        );
    }
}

/// Every subject and object in the store, first-seen order
fn all_nodes(store: &RdfStore) -> Vec<RdfTerm> {
    let mut seen = FxHashSet::default();
    let mut nodes = Vec::new();
    for triple in store.iter() {
        for term in [
            RdfTerm::from(triple.subject.clone()),
            RdfTerm::from(triple.object.clone()),
        ] {
            if seen.insert(term.clone()) {
                nodes.push(term);
            }
        }
    }
    nodes
}
