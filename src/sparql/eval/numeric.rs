//! Numeric values and arithmetic with XSD type promotion
//!
//! integer < decimal < float < double. Binary operations promote both sides
//! to the wider type; integer division yields a decimal.

use crate::rdf::{Literal, NamedNode};
use oxrdf::vocab::xsd;
use std::cmp::Ordering;

/// Datatypes derived from xsd:integer
const INTEGER_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "negativeInteger",
    "positiveInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// A typed numeric value. Decimals are carried as f64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Decimal(f64),
    Float(f64),
    Double(f64),
}

impl Numeric {
    /// Interpret a literal as a number; `None` if it is not numeric or its
    /// lexical form is invalid for its datatype
    pub fn from_literal(literal: &Literal) -> Option<Self> {
        let local = literal.datatype_str().strip_prefix(XSD)?;
        let lexical = literal.value().trim();

        if INTEGER_TYPES.contains(&local) {
            return lexical.parse::<i64>().ok().map(Numeric::Integer);
        }
        match local {
            "decimal" => {
                if lexical.contains(['e', 'E']) || lexical.is_empty() {
                    return None;
                }
                lexical.parse::<f64>().ok().map(Numeric::Decimal)
            }
            "float" => parse_floating(lexical).map(Numeric::Float),
            "double" => parse_floating(lexical).map(Numeric::Double),
            _ => None,
        }
    }

    /// True if the literal's datatype is numeric, regardless of lexical form
    pub fn is_numeric_datatype(literal: &Literal) -> bool {
        literal
            .datatype_str()
            .strip_prefix(XSD)
            .is_some_and(|local| {
                INTEGER_TYPES.contains(&local) || matches!(local, "decimal" | "float" | "double")
            })
    }

    pub fn to_literal(self) -> Literal {
        match self {
            Numeric::Integer(i) => Literal::integer(i),
            Numeric::Decimal(d) => Literal::decimal(d),
            Numeric::Float(f) => Literal::new_typed_literal(
                format_floating(f),
                NamedNode::from(xsd::FLOAT.into_owned()),
            ),
            Numeric::Double(d) => Literal::new_typed_literal(
                format_floating(d),
                NamedNode::from(xsd::DOUBLE.into_owned()),
            ),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Decimal(v) | Numeric::Float(v) | Numeric::Double(v) => v,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Numeric::Integer(_) => 0,
            Numeric::Decimal(_) => 1,
            Numeric::Float(_) => 2,
            Numeric::Double(_) => 3,
        }
    }

    fn with_rank(self, rank: u8) -> Self {
        let value = self.as_f64();
        match (self, rank) {
            (n, r) if n.rank() >= r => n,
            (_, 1) => Numeric::Decimal(value),
            (_, 2) => Numeric::Float(value),
            _ => Numeric::Double(value),
        }
    }

    fn promote(self, other: Self) -> (Self, Self) {
        let rank = self.rank().max(other.rank());
        (self.with_rank(rank), other.with_rank(rank))
    }

    pub fn add(self, other: Self) -> Option<Self> {
        self.arith(other, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(self, other: Self) -> Option<Self> {
        self.arith(other, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(self, other: Self) -> Option<Self> {
        self.arith(other, i64::checked_mul, |a, b| a * b)
    }

    /// Division; integer and decimal division by zero is an error
    pub fn div(self, other: Self) -> Option<Self> {
        match self.promote(other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => {
                if b == 0 {
                    None
                } else {
                    Some(Numeric::Decimal(a as f64 / b as f64))
                }
            }
            (Numeric::Decimal(a), Numeric::Decimal(b)) => {
                if b == 0.0 {
                    None
                } else {
                    Some(Numeric::Decimal(a / b))
                }
            }
            (Numeric::Float(a), Numeric::Float(b)) => Some(Numeric::Float(a / b)),
            (a, b) => Some(Numeric::Double(a.as_f64() / b.as_f64())),
        }
    }

    fn arith(
        self,
        other: Self,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Option<Self> {
        Some(match self.promote(other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => Numeric::Integer(int_op(a, b)?),
            (Numeric::Decimal(a), Numeric::Decimal(b)) => Numeric::Decimal(float_op(a, b)),
            (Numeric::Float(a), Numeric::Float(b)) => Numeric::Float(float_op(a, b)),
            (a, b) => Numeric::Double(float_op(a.as_f64(), b.as_f64())),
        })
    }

    pub fn negate(self) -> Option<Self> {
        Some(match self {
            Numeric::Integer(i) => Numeric::Integer(i.checked_neg()?),
            Numeric::Decimal(v) => Numeric::Decimal(-v),
            Numeric::Float(v) => Numeric::Float(-v),
            Numeric::Double(v) => Numeric::Double(-v),
        })
    }

    pub fn abs(self) -> Option<Self> {
        Some(match self {
            Numeric::Integer(i) => Numeric::Integer(i.checked_abs()?),
            Numeric::Decimal(v) => Numeric::Decimal(v.abs()),
            Numeric::Float(v) => Numeric::Float(v.abs()),
            Numeric::Double(v) => Numeric::Double(v.abs()),
        })
    }

    pub fn ceil(self) -> Self {
        self.map_float(f64::ceil)
    }

    pub fn floor(self) -> Self {
        self.map_float(f64::floor)
    }

    /// Rounds half towards positive infinity
    pub fn round(self) -> Self {
        self.map_float(|v| (v + 0.5).floor())
    }

    fn map_float(self, f: fn(f64) -> f64) -> Self {
        match self {
            Numeric::Integer(i) => Numeric::Integer(i),
            Numeric::Decimal(v) => Numeric::Decimal(f(v)),
            Numeric::Float(v) => Numeric::Float(f(v)),
            Numeric::Double(v) => Numeric::Double(f(v)),
        }
    }

    /// Value comparison; `None` when NaN is involved
    pub fn compare(self, other: Self) -> Option<Ordering> {
        match self.promote(other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Numeric::Integer(i) => i == 0,
            Numeric::Decimal(v) | Numeric::Float(v) | Numeric::Double(v) => v == 0.0,
        }
    }

    pub fn is_nan(self) -> bool {
        match self {
            Numeric::Integer(_) => false,
            Numeric::Decimal(v) | Numeric::Float(v) | Numeric::Double(v) => v.is_nan(),
        }
    }
}

fn parse_floating(lexical: &str) -> Option<f64> {
    match lexical {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => {
            // Rust accepts "inf" and "nan" spellings XSD does not
            if lexical.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                return None;
            }
            lexical.parse().ok()
        }
    }
}

/// Canonical-ish XSD double lexical form: `1.5E0`, `INF`, `NaN`
fn format_floating(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        let formatted = format!("{:E}", value);
        match formatted.split_once('E') {
            Some((mantissa, exp)) if !mantissa.contains('.') => format!("{}.0E{}", mantissa, exp),
            _ => formatted,
        }
    }
}
