//! Term comparison: value equality, relational operators and ORDER BY order

use super::functions::parse_date_time;
use super::numeric::Numeric;
use crate::rdf::{Literal, RdfTerm};
use std::cmp::Ordering;

const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// Literal values that have a comparison beyond term identity
enum Comparable<'t> {
    Numeric(Numeric),
    Boolean(bool),
    DateTime(chrono::DateTime<chrono::FixedOffset>),
    String(&'t str, Option<&'t str>),
}

fn comparable(literal: &Literal) -> Option<Comparable<'_>> {
    if let Some(n) = Numeric::from_literal(literal) {
        return Some(Comparable::Numeric(n));
    }
    if literal.is_string_like() {
        return Some(Comparable::String(literal.value(), literal.language()));
    }
    match literal.datatype_str() {
        XSD_BOOLEAN => parse_boolean(literal.value()).map(Comparable::Boolean),
        XSD_DATE_TIME => parse_date_time(literal.value()).map(Comparable::DateTime),
        _ => None,
    }
}

pub(crate) fn parse_boolean(lexical: &str) -> Option<bool> {
    match lexical {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn compare_values(a: &Comparable<'_>, b: &Comparable<'_>) -> Option<Ordering> {
    match (a, b) {
        (Comparable::Numeric(x), Comparable::Numeric(y)) => x.compare(*y),
        (Comparable::Boolean(x), Comparable::Boolean(y)) => Some(x.cmp(y)),
        (Comparable::DateTime(x), Comparable::DateTime(y)) => Some(x.cmp(y)),
        (Comparable::String(x, lx), Comparable::String(y, ly)) if lx == ly => Some(x.cmp(y)),
        _ => None,
    }
}

/// `=` semantics. `None` signals a type error.
pub fn terms_equal(a: &RdfTerm, b: &RdfTerm) -> Option<bool> {
    if a == b {
        return Some(true);
    }
    match (a, b) {
        (RdfTerm::Literal(x), RdfTerm::Literal(y)) => match (comparable(x), comparable(y)) {
            (Some(cx), Some(cy)) => match compare_values(&cx, &cy) {
                Some(ordering) => Some(ordering == Ordering::Equal),
                // Differently typed known literals are simply unequal
                None => Some(false),
            },
            // Ill-typed numerics or unknown datatypes: equal only when identical
            _ if x.datatype_str() == y.datatype_str() && !Numeric::is_numeric_datatype(x) => None,
            _ => Some(false),
        },
        _ => Some(false),
    }
}

/// `<`, `>`, `<=`, `>=` semantics. `None` signals a type error.
pub fn compare_for_operator(a: &RdfTerm, b: &RdfTerm) -> Option<Ordering> {
    match (a, b) {
        (RdfTerm::Literal(x), RdfTerm::Literal(y)) => {
            compare_values(&comparable(x)?, &comparable(y)?)
        }
        _ => None,
    }
}

fn kind_rank(term: Option<&RdfTerm>) -> u8 {
    match term {
        None => 0,
        Some(RdfTerm::BlankNode(_)) => 1,
        Some(RdfTerm::NamedNode(_)) => 2,
        Some(RdfTerm::Literal(_)) => 3,
    }
}

/// Total order used by ORDER BY, MIN and MAX:
/// unbound < blank nodes < IRIs < literals
pub fn compare_terms(a: Option<&RdfTerm>, b: Option<&RdfTerm>) -> Ordering {
    match (a, b) {
        (Some(RdfTerm::BlankNode(x)), Some(RdfTerm::BlankNode(y))) => x.as_str().cmp(y.as_str()),
        (Some(RdfTerm::NamedNode(x)), Some(RdfTerm::NamedNode(y))) => x.as_str().cmp(y.as_str()),
        (Some(RdfTerm::Literal(x)), Some(RdfTerm::Literal(y))) => compare_literals(x, y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Literal categories for ORDER BY: numeric < boolean < dateTime < string < other
fn literal_rank(literal: &Literal) -> u8 {
    match comparable(literal) {
        Some(Comparable::Numeric(n)) if !n.is_nan() => 0,
        Some(Comparable::Numeric(_)) => 4,
        Some(Comparable::Boolean(_)) => 1,
        Some(Comparable::DateTime(_)) => 2,
        Some(Comparable::String(..)) => 3,
        None => 4,
    }
}

fn compare_literals(x: &Literal, y: &Literal) -> Ordering {
    let rank = literal_rank(x).cmp(&literal_rank(y));
    if rank != Ordering::Equal {
        return rank;
    }
    let by_value = match (comparable(x), comparable(y)) {
        (Some(Comparable::String(..)), _) => Ordering::Equal,
        (Some(cx), Some(cy)) => compare_values(&cx, &cy).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    };
    // Ties and strings fall back to a stable syntactic order
    by_value.then_with(|| {
        x.value()
            .cmp(y.value())
            .then_with(|| x.datatype_str().cmp(y.datatype_str()))
            .then_with(|| x.language().cmp(&y.language()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{BlankNode, NamedNode};

    fn iri(s: &str) -> RdfTerm {
        NamedNode::new(s).unwrap().into()
    }

    fn int(i: i64) -> RdfTerm {
        Literal::integer(i).into()
    }

    fn string(s: &str) -> RdfTerm {
        Literal::new_simple_literal(s).into()
    }

    #[test]
    fn test_numeric_equality_across_types() {
        let decimal: RdfTerm = Literal::decimal(2.0).into();
        assert_eq!(terms_equal(&int(2), &decimal), Some(true));
        assert_eq!(terms_equal(&int(2), &int(3)), Some(false));
    }

    #[test]
    fn test_mixed_type_equality() {
        assert_eq!(terms_equal(&int(2), &string("2")), Some(false));
        assert_eq!(terms_equal(&iri("http://a"), &string("http://a")), Some(false));
        assert_eq!(terms_equal(&iri("http://a"), &iri("http://a")), Some(true));
    }

    #[test]
    fn test_operator_comparison() {
        assert_eq!(compare_for_operator(&int(30), &int(25)), Some(Ordering::Greater));
        assert_eq!(
            compare_for_operator(&string("abc"), &string("abd")),
            Some(Ordering::Less)
        );
        assert_eq!(compare_for_operator(&int(1), &string("1")), None);
        assert_eq!(compare_for_operator(&iri("http://a"), &iri("http://b")), None);
    }

    #[test]
    fn test_date_time_comparison() {
        let earlier: RdfTerm = Literal::date_time("2024-01-01T00:00:00Z").into();
        let later: RdfTerm = Literal::date_time("2024-01-01T01:00:00+00:30").into();
        assert_eq!(compare_for_operator(&earlier, &later), Some(Ordering::Less));
    }

    #[test]
    fn test_order_by_kinds() {
        let blank: RdfTerm = BlankNode::from_str("b").unwrap().into();
        let named = iri("http://example.org/a");
        let literal = int(1);

        assert_eq!(compare_terms(None, Some(&blank)), Ordering::Less);
        assert_eq!(compare_terms(Some(&blank), Some(&named)), Ordering::Less);
        assert_eq!(compare_terms(Some(&named), Some(&literal)), Ordering::Less);
        assert_eq!(compare_terms(None, None), Ordering::Equal);
    }

    #[test]
    fn test_order_by_mixed_literals_is_total() {
        let flag: RdfTerm = Literal::boolean(true).into();
        let created: RdfTerm = Literal::date_time("2024-01-01T00:00:00Z").into();
        let custom: RdfTerm =
            Literal::new_typed_literal("x", NamedNode::new("http://example.org/dt").unwrap())
                .into();
        let mut values = vec![
            string("2"),
            custom.clone(),
            int(10),
            string("15"),
            flag.clone(),
            int(2),
            created.clone(),
            string("10"),
        ];
        values.sort_by(|a, b| compare_terms(Some(a), Some(b)));
        assert_eq!(
            values,
            vec![
                int(2),
                int(10),
                flag,
                created,
                string("10"),
                string("15"),
                string("2"),
                custom,
            ]
        );

        assert_eq!(compare_terms(Some(&int(5)), Some(&string("5"))), Ordering::Less);
        assert_eq!(compare_terms(Some(&string("1")), Some(&int(5))), Ordering::Greater);
    }

    #[test]
    fn test_order_by_numeric_not_lexical() {
        assert_eq!(compare_terms(Some(&int(9)), Some(&int(10))), Ordering::Less);
        assert_eq!(compare_terms(Some(&int(10)), Some(&int(10))), Ordering::Equal);
    }
}
