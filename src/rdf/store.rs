//! RDF triple store implementation
//!
//! In-memory set of triples with three covering indexes. Each triple is
//! assigned a monotonically increasing sequence number on insertion; every
//! lookup returns triples in that order so query results are reproducible.

use super::types::{RdfError, RdfObject, RdfPredicate, RdfSubject, RdfTerm, Triple, TriplePattern};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::trace;

/// RDF store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RdfStoreError {
    /// Terms cannot form a triple
    #[error("Invalid triple: {0}")]
    InvalidTriple(#[from] RdfError),
}

pub type RdfStoreResult<T> = Result<T, RdfStoreError>;

/// Store shared between threads; readers hold the read guard while iterating
pub type SharedRdfStore = Arc<RwLock<RdfStore>>;

/// Restartable iterator over the triples matching one lookup
///
/// Holds only sequence numbers plus a borrow of the store, so cloning and
/// resetting are cheap.
#[derive(Clone)]
pub struct TripleIterator<'a> {
    store: &'a RdfStore,
    ids: Vec<u64>,
    current: usize,
}

impl<'a> TripleIterator<'a> {
    fn new(store: &'a RdfStore, ids: Vec<u64>) -> Self {
        Self {
            store,
            ids,
            current: 0,
        }
    }

    /// Rewind to the first matching triple
    pub fn reset(&mut self) {
        self.current = 0;
    }

    /// Total number of matches, independent of the current position
    pub fn total(&self) -> usize {
        self.ids.len()
    }
}

impl<'a> Iterator for TripleIterator<'a> {
    type Item = &'a Triple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current < self.ids.len() {
            let id = self.ids[self.current];
            self.current += 1;
            if let Some(triple) = self.store.by_id.get(&id) {
                return Some(triple);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ids.len() - self.current;
        (remaining, Some(remaining))
    }
}

type Index<A, B> = FxHashMap<A, FxHashMap<B, BTreeSet<u64>>>;

/// RDF triple store with multiple indices for efficient queries
///
/// Implements:
/// - SPO index (Subject -> Predicate -> triple ids)
/// - POS index (Predicate -> Object -> triple ids)
/// - OSP index (Object -> Subject -> triple ids)
///
/// Any pattern with at least one bound position is answered from an index;
/// a fully unbound pattern scans the whole store.
#[derive(Clone, Default)]
pub struct RdfStore {
    /// Triple -> sequence number
    triples: FxHashMap<Triple, u64>,

    /// Sequence number -> triple, in insertion order
    by_id: BTreeMap<u64, Triple>,

    spo_index: Index<RdfSubject, RdfPredicate>,
    pos_index: Index<RdfPredicate, RdfObject>,
    osp_index: Index<RdfObject, RdfSubject>,

    next_id: u64,
}

impl RdfStore {
    /// Create a new empty RDF store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store wrapped for sharing across threads
    pub fn shared() -> SharedRdfStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Add a triple. Returns false if it was already present.
    pub fn add(&mut self, triple: Triple) -> bool {
        if self.triples.contains_key(&triple) {
            return false;
        }

        let id = self.next_id;
        self.next_id += 1;

        trace!(id, %triple, "add triple");
        self.update_indices_insert(&triple, id);
        self.triples.insert(triple.clone(), id);
        self.by_id.insert(id, triple);
        true
    }

    /// Add a triple built from arbitrary terms
    pub fn add_terms(
        &mut self,
        subject: impl Into<RdfTerm>,
        predicate: impl Into<RdfTerm>,
        object: impl Into<RdfTerm>,
    ) -> RdfStoreResult<bool> {
        let triple = Triple::from_terms(subject.into(), predicate.into(), object.into())?;
        Ok(self.add(triple))
    }

    /// Remove a triple. Returns false if it was not present.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        let Some(id) = self.triples.remove(triple) else {
            return false;
        };

        trace!(id, %triple, "remove triple");
        self.by_id.remove(&id);
        self.update_indices_remove(triple, id);
        true
    }

    /// Check if a triple exists in the store
    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains_key(triple)
    }

    /// Get the total number of triples
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Clear all triples
    pub fn clear(&mut self) {
        self.triples.clear();
        self.by_id.clear();
        self.spo_index.clear();
        self.pos_index.clear();
        self.osp_index.clear();
    }

    /// Iterate over all triples in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.by_id.values()
    }

    /// Match triples against optional subject, predicate and object
    pub fn match_triples(
        &self,
        subject: Option<&RdfSubject>,
        predicate: Option<&RdfPredicate>,
        object: Option<&RdfObject>,
    ) -> TripleIterator<'_> {
        let ids: Vec<u64> = match (subject, predicate, object) {
            (None, None, None) => self.by_id.keys().copied().collect(),
            (Some(s), Some(p), Some(o)) => {
                let triple = Triple::new(s.clone(), p.clone(), o.clone());
                self.triples.get(&triple).copied().into_iter().collect()
            }
            (Some(s), Some(p), None) => lookup(&self.spo_index, s, p),
            (Some(s), None, Some(o)) => lookup(&self.osp_index, o, s),
            (None, Some(p), Some(o)) => lookup(&self.pos_index, p, o),
            (Some(s), None, None) => lookup_all(&self.spo_index, s),
            (None, Some(p), None) => lookup_all(&self.pos_index, p),
            (None, None, Some(o)) => lookup_all(&self.osp_index, o),
        };
        TripleIterator::new(self, ids)
    }

    /// Query triples matching a pattern
    pub fn query(&self, pattern: &TriplePattern) -> TripleIterator<'_> {
        self.match_triples(
            pattern.subject.as_ref(),
            pattern.predicate.as_ref(),
            pattern.object.as_ref(),
        )
    }

    /// Get all distinct subjects, in order of first appearance
    pub fn subjects(&self) -> Vec<RdfSubject> {
        first_seen(self.iter().map(|t| &t.subject))
    }

    /// Get all distinct predicates, in order of first appearance
    pub fn predicates(&self) -> Vec<RdfPredicate> {
        first_seen(self.iter().map(|t| &t.predicate))
    }

    /// Get all distinct objects, in order of first appearance
    pub fn objects(&self) -> Vec<RdfObject> {
        first_seen(self.iter().map(|t| &t.object))
    }

    fn update_indices_insert(&mut self, triple: &Triple, id: u64) {
        self.spo_index
            .entry(triple.subject.clone())
            .or_default()
            .entry(triple.predicate.clone())
            .or_default()
            .insert(id);

        self.pos_index
            .entry(triple.predicate.clone())
            .or_default()
            .entry(triple.object.clone())
            .or_default()
            .insert(id);

        self.osp_index
            .entry(triple.object.clone())
            .or_default()
            .entry(triple.subject.clone())
            .or_default()
            .insert(id);
    }

    fn update_indices_remove(&mut self, triple: &Triple, id: u64) {
        unindex(&mut self.spo_index, &triple.subject, &triple.predicate, id);
        unindex(&mut self.pos_index, &triple.predicate, &triple.object, id);
        unindex(&mut self.osp_index, &triple.object, &triple.subject, id);
    }
}

impl Extend<Triple> for RdfStore {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for triple in iter {
            self.add(triple);
        }
    }
}

impl FromIterator<Triple> for RdfStore {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

fn lookup<A, B>(index: &Index<A, B>, first: &A, second: &B) -> Vec<u64>
where
    A: std::hash::Hash + Eq,
    B: std::hash::Hash + Eq,
{
    index
        .get(first)
        .and_then(|inner| inner.get(second))
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default()
}

fn lookup_all<A, B>(index: &Index<A, B>, first: &A) -> Vec<u64>
where
    A: std::hash::Hash + Eq,
{
    let mut ids: Vec<u64> = index
        .get(first)
        .map(|inner| inner.values().flatten().copied().collect())
        .unwrap_or_default();
    ids.sort_unstable();
    ids
}

fn unindex<A, B>(index: &mut Index<A, B>, first: &A, second: &B, id: u64)
where
    A: std::hash::Hash + Eq,
    B: std::hash::Hash + Eq,
{
    let Some(inner) = index.get_mut(first) else {
        return;
    };
    if let Some(ids) = inner.get_mut(second) {
        ids.remove(&id);
        if ids.is_empty() {
            inner.remove(second);
        }
    }
    if inner.is_empty() {
        index.remove(first);
    }
}

fn first_seen<'a, T, I>(items: I) -> Vec<T>
where
    T: Clone + Eq + std::hash::Hash + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut seen = rustc_hash::FxHashSet::default();
    items
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Literal, NamedNode};

    fn node(name: &str) -> NamedNode {
        NamedNode::new(&format!("http://example.org/{}", name)).unwrap()
    }

    fn pred(name: &str) -> RdfPredicate {
        RdfPredicate::new(&format!("http://example.org/{}", name)).unwrap()
    }

    fn create_test_triple() -> Triple {
        Triple::new(
            node("alice").into(),
            RdfPredicate::new("http://xmlns.com/foaf/0.1/name").unwrap(),
            Literal::new_simple_literal("Alice").into(),
        )
    }

    #[test]
    fn test_add_triple() {
        let mut store = RdfStore::new();
        let triple = create_test_triple();

        assert!(store.add(triple.clone()));
        assert_eq!(store.len(), 1);
        assert!(store.contains(&triple));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = RdfStore::new();
        let triple = create_test_triple();

        assert!(store.add(triple.clone()));
        assert!(!store.add(triple));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_triple() {
        let mut store = RdfStore::new();
        let triple = create_test_triple();

        store.add(triple.clone());
        assert!(store.remove(&triple));
        assert!(!store.remove(&triple));
        assert!(store.is_empty());
        assert!(store.spo_index.is_empty());
        assert!(store.pos_index.is_empty());
        assert!(store.osp_index.is_empty());
    }

    #[test]
    fn test_match_every_binding_combination() {
        let mut store = RdfStore::new();
        let knows = pred("knows");
        let likes = pred("likes");
        store.add(Triple::new(node("a").into(), knows.clone(), node("b").into()));
        store.add(Triple::new(node("a").into(), likes.clone(), node("c").into()));
        store.add(Triple::new(node("b").into(), knows.clone(), node("c").into()));

        let a: RdfSubject = node("a").into();
        let c: RdfObject = node("c").into();

        assert_eq!(store.match_triples(None, None, None).count(), 3);
        assert_eq!(store.match_triples(Some(&a), None, None).count(), 2);
        assert_eq!(store.match_triples(None, Some(&knows), None).count(), 2);
        assert_eq!(store.match_triples(None, None, Some(&c)).count(), 2);
        assert_eq!(store.match_triples(Some(&a), Some(&knows), None).count(), 1);
        assert_eq!(store.match_triples(Some(&a), None, Some(&c)).count(), 1);
        assert_eq!(store.match_triples(None, Some(&knows), Some(&c)).count(), 1);
        assert_eq!(store.match_triples(Some(&a), Some(&likes), Some(&c)).count(), 1);
        assert_eq!(store.match_triples(Some(&a), Some(&knows), Some(&c)).count(), 0);
    }

    #[test]
    fn test_match_preserves_insertion_order() {
        let mut store = RdfStore::new();
        let p = pred("p");
        for name in ["z", "m", "a"] {
            store.add(Triple::new(node(name).into(), p.clone(), node("o").into()));
        }

        let subjects: Vec<String> = store
            .match_triples(None, Some(&p), None)
            .map(|t| t.subject.to_string())
            .collect();
        assert_eq!(
            subjects,
            vec![
                "<http://example.org/z>",
                "<http://example.org/m>",
                "<http://example.org/a>"
            ]
        );
    }

    #[test]
    fn test_iterator_reset_and_clone() {
        let mut store = RdfStore::new();
        store.add(create_test_triple());
        store.add(Triple::new(node("bob").into(), pred("p"), node("x").into()));

        let mut iter = store.match_triples(None, None, None);
        assert_eq!(iter.total(), 2);
        assert!(iter.next().is_some());
        let copy = iter.clone();
        assert_eq!(copy.count(), 1);
        iter.reset();
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn test_subjects_are_distinct() {
        let mut store = RdfStore::new();
        store.add(Triple::new(node("a").into(), pred("p"), node("x").into()));
        store.add(Triple::new(node("a").into(), pred("q"), node("y").into()));
        store.add(Triple::new(node("b").into(), pred("p"), node("x").into()));

        assert_eq!(store.subjects().len(), 2);
        assert_eq!(store.predicates().len(), 2);
        assert_eq!(store.objects().len(), 2);
    }

    #[test]
    fn test_add_terms_rejects_literal_subject() {
        let mut store = RdfStore::new();
        let result = store.add_terms(
            Literal::new_simple_literal("x"),
            node("p"),
            node("o"),
        );
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut store: RdfStore = vec![create_test_triple()].into_iter().collect();
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.match_triples(None, None, None).count(), 0);
    }
}
