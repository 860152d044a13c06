use notegraph::rdf::{
    Literal, NamedNode, RdfObject, RdfPredicate, RdfStore, RdfSubject, Triple,
};
use notegraph::sparql::SparqlEngine;
use std::thread;

fn ex(local: &str) -> NamedNode {
    NamedNode::new(&format!("http://example.org/{}", local)).unwrap()
}

fn triple(s: &str, p: &str, o: &str) -> Triple {
    Triple::new(ex(s).into(), RdfPredicate::from(ex(p)), ex(o).into())
}

#[test]
fn test_add_remove_idempotent() {
    let mut store = RdfStore::new();
    assert!(store.add(triple("a", "p", "b")));
    assert!(!store.add(triple("a", "p", "b")));
    assert_eq!(store.len(), 1);

    assert!(store.remove(&triple("a", "p", "b")));
    assert!(!store.remove(&triple("a", "p", "b")));
    assert!(store.is_empty());
}

#[test]
fn test_match_every_binding_combination() {
    let mut store = RdfStore::new();
    store.extend([
        triple("a", "p", "b"),
        triple("a", "q", "c"),
        triple("d", "p", "b"),
    ]);

    let a = RdfSubject::from(ex("a"));
    let p = RdfPredicate::from(ex("p"));
    let b = RdfObject::from(ex("b"));

    assert_eq!(store.match_triples(None, None, None).count(), 3);
    assert_eq!(store.match_triples(Some(&a), None, None).count(), 2);
    assert_eq!(store.match_triples(None, Some(&p), None).count(), 2);
    assert_eq!(store.match_triples(None, None, Some(&b)).count(), 2);
    assert_eq!(store.match_triples(Some(&a), Some(&p), None).count(), 1);
    assert_eq!(store.match_triples(Some(&a), None, Some(&b)).count(), 1);
    assert_eq!(store.match_triples(None, Some(&p), Some(&b)).count(), 2);
    assert_eq!(store.match_triples(Some(&a), Some(&p), Some(&b)).count(), 1);
}

#[test]
fn test_match_is_restartable() {
    let mut store = RdfStore::new();
    store.extend([triple("a", "p", "b"), triple("a", "p", "c")]);
    let a = RdfSubject::from(ex("a"));

    let mut matches = store.match_triples(Some(&a), None, None);
    let first: Vec<Triple> = matches.by_ref().cloned().collect();
    matches.reset();
    let second: Vec<Triple> = matches.cloned().collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn test_removed_triples_are_not_matched() {
    let mut store = RdfStore::new();
    store.extend([triple("a", "p", "b"), triple("a", "p", "c")]);
    store.remove(&triple("a", "p", "b"));

    let a = RdfSubject::from(ex("a"));
    let remaining: Vec<&Triple> = store.match_triples(Some(&a), None, None).collect();
    assert_eq!(remaining, vec![&triple("a", "p", "c")]);
}

#[test]
fn test_literal_subject_rejected() {
    let mut store = RdfStore::new();
    let result = store.add_terms(Literal::new_simple_literal("x"), ex("p"), ex("o"));
    assert!(result.is_err());
    assert!(store.is_empty());
}

#[test]
fn test_construct_round_trip() {
    let mut store = RdfStore::new();
    store.extend([triple("a", "p", "b"), triple("b", "p", "c")]);
    store
        .add_terms(ex("a"), ex("label"), Literal::new_language_tagged_literal("eins", "de").unwrap())
        .unwrap();

    let graph = SparqlEngine::new()
        .query(&store, "CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }")
        .unwrap();
    let copy: RdfStore = graph.triples().unwrap().iter().cloned().collect();

    assert_eq!(copy.len(), store.len());
    for t in store.iter() {
        assert!(copy.contains(t));
    }
}

#[test]
fn test_shared_store_readers() {
    let shared = RdfStore::shared();
    shared.write().unwrap().add(triple("a", "p", "b"));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                let store = shared.read().unwrap();
                SparqlEngine::new()
                    .ask(&store, "ASK { ?s <http://example.org/p> ?o }")
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
