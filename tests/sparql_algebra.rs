use notegraph::rdf::{Literal, NamedNode, RdfStore, RdfTerm};
use notegraph::sparql::algebra::Algebra;
use notegraph::sparql::{parse_query, translate_query, SparqlEngine, SparqlExecutor, SparqlResults};

fn ex(local: &str) -> NamedNode {
    NamedNode::new(&format!("http://example.org/{}", local)).unwrap()
}

fn term(local: &str) -> RdfTerm {
    ex(local).into()
}

/// alice knows bob, bob knows charlie; only alice and bob have emails
fn social() -> RdfStore {
    let mut store = RdfStore::new();
    store.add_terms(ex("alice"), ex("knows"), ex("bob")).unwrap();
    store.add_terms(ex("bob"), ex("knows"), ex("charlie")).unwrap();
    for person in ["alice", "bob", "charlie"] {
        store.add_terms(ex(person), ex("type"), ex("Person")).unwrap();
    }
    store
        .add_terms(ex("alice"), ex("email"), Literal::new_simple_literal("alice@example.org"))
        .unwrap();
    store
        .add_terms(ex("bob"), ex("email"), Literal::new_simple_literal("bob@example.org"))
        .unwrap();
    store.add_terms(ex("charlie"), ex("blocked"), Literal::boolean(true)).unwrap();
    store
}

fn run(store: &RdfStore, body: &str) -> SparqlResults {
    let text = format!("PREFIX ex: <http://example.org/> {}", body);
    SparqlEngine::new().query(store, &text).unwrap()
}

fn bound(results: &SparqlResults, variable: &str) -> Vec<Option<RdfTerm>> {
    results
        .solutions()
        .unwrap()
        .iter()
        .map(|s| s.get(variable).cloned())
        .collect()
}

#[test]
fn test_optional_keeps_unmatched_rows() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p ?mail WHERE { ?p ex:type ex:Person OPTIONAL { ?p ex:email ?mail } } ORDER BY ?p",
    );
    assert_eq!(results.len(), 3);
    let mails = bound(&results, "mail");
    assert!(mails[0].is_some());
    assert!(mails[1].is_some());
    // charlie has no email but is still returned
    assert_eq!(bound(&results, "p")[2], Some(term("charlie")));
    assert!(mails[2].is_none());
}

#[test]
fn test_optional_with_filter() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p ?mail WHERE { ?p ex:type ex:Person \
           OPTIONAL { ?p ex:email ?mail FILTER(STRSTARTS(?mail, \"bob\")) } } ORDER BY ?p",
    );
    assert_eq!(results.len(), 3);
    let mails = bound(&results, "mail");
    assert!(mails[0].is_none());
    assert!(mails[1].is_some());
    assert!(mails[2].is_none());
}

#[test]
fn test_bound_after_optional() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p WHERE { ?p ex:type ex:Person OPTIONAL { ?p ex:email ?mail } FILTER(!BOUND(?mail)) }",
    );
    assert_eq!(bound(&results, "p"), vec![Some(term("charlie"))]);
}

#[test]
fn test_minus_excludes_compatible() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p WHERE { ?p ex:type ex:Person MINUS { ?p ex:blocked true } } ORDER BY ?p",
    );
    assert_eq!(bound(&results, "p"), vec![Some(term("alice")), Some(term("bob"))]);
}

#[test]
fn test_minus_without_shared_variables_removes_nothing() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p WHERE { ?p ex:type ex:Person MINUS { ?x ex:blocked true } }",
    );
    assert_eq!(results.len(), 3);
}

#[test]
fn test_not_exists() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p WHERE { ?p ex:type ex:Person FILTER NOT EXISTS { ?p ex:knows ?other } }",
    );
    assert_eq!(bound(&results, "p"), vec![Some(term("charlie"))]);

    let results = run(
        &store,
        "SELECT ?p WHERE { ?p ex:type ex:Person FILTER EXISTS { ?p ex:knows ?other } }",
    );
    assert_eq!(results.len(), 2);
}

#[test]
fn test_union_is_a_bag() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?x WHERE { { ex:alice ex:knows ?x } UNION { ?x ex:knows ex:charlie } }",
    );
    // bob comes from both branches
    assert_eq!(bound(&results, "x"), vec![Some(term("bob")), Some(term("bob"))]);
}

#[test]
fn test_values_join() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p ?mail WHERE { VALUES ?p { ex:bob ex:charlie } ?p ex:email ?mail }",
    );
    assert_eq!(bound(&results, "p"), vec![Some(term("bob"))]);
}

#[test]
fn test_trailing_values_with_undef() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p ?o WHERE { ?p ex:knows ?o } VALUES (?p ?o) { (ex:alice UNDEF) (UNDEF ex:charlie) }",
    );
    assert_eq!(results.len(), 2);
}

#[test]
fn test_sub_select() {
    let store = social();
    let results = run(
        &store,
        "SELECT ?p ?n WHERE { \
           ?p ex:type ex:Person \
           { SELECT ?p (COUNT(?o) AS ?n) WHERE { ?p ex:knows ?o } GROUP BY ?p } \
         } ORDER BY ?p",
    );
    assert_eq!(bound(&results, "p"), vec![Some(term("alice")), Some(term("bob"))]);
    assert_eq!(
        bound(&results, "n"),
        vec![Some(Literal::integer(1).into()), Some(Literal::integer(1).into())]
    );
}

#[test]
fn test_translated_algebra_shape() {
    let query = parse_query(
        "PREFIX ex: <http://example.org/> \
         SELECT DISTINCT ?p WHERE { ?p ex:knows ?o OPTIONAL { ?o ex:email ?m } } LIMIT 5",
    )
    .unwrap();
    let algebra = translate_query(&query).unwrap();

    let Algebra::Slice { inner, limit, .. } = &algebra else {
        panic!("expected slice, got {:?}", algebra);
    };
    assert_eq!(*limit, Some(5));
    let Algebra::Distinct(inner) = inner.as_ref() else {
        panic!("expected distinct");
    };
    let Algebra::Project { inner, variables } = inner.as_ref() else {
        panic!("expected project");
    };
    assert_eq!(variables, &vec!["p".to_string()]);
    assert!(matches!(inner.as_ref(), Algebra::LeftJoin { .. }));
}

#[test]
fn test_execute_algebra_directly() {
    let store = social();
    let query = parse_query("SELECT ?s WHERE { ?s <http://example.org/knows> ?o }").unwrap();
    let algebra = translate_query(&query).unwrap();
    let solutions = SparqlExecutor::new(&store)
        .execute_algebra(&algebra)
        .unwrap()
        .into_results()
        .unwrap();
    assert_eq!(solutions.len(), 2);
}
