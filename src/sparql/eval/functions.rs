//! Built-in function library
//!
//! Every function receives already-evaluated arguments. IF, COALESCE and
//! BOUND need lazy evaluation and are handled by the expression evaluator.

use super::numeric::Numeric;
use super::ordering::parse_boolean;
use crate::rdf::{Literal, NamedNode, RdfTerm};
use crate::sparql::ast::{Function, XsdCast};
use crate::sparql::executor::ExecutionContext;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};
use oxiri::Iri;
use oxrdf::vocab::{rdf, xsd};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Digest;

/// Characters ENCODE_FOR_URI leaves untouched: ALPHA / DIGIT / "-" / "." / "_" / "~"
const URI_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Parse an `xsd:dateTime` lexical form. Values without a timezone are read as UTC.
pub(crate) fn parse_date_time(lexical: &str) -> Option<DateTime<FixedOffset>> {
    let lexical = lexical.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(lexical) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let utc = FixedOffset::east_opt(0)?;
    Some(utc.from_utc_datetime(&naive))
}

/// Timezone suffix of a dateTime lexical form, if it carries one
fn timezone_suffix(lexical: &str) -> Option<&str> {
    let lexical = lexical.trim();
    if lexical.ends_with('Z') {
        return Some("Z");
    }
    let time = lexical.split_once('T')?.1;
    time.rfind(['+', '-']).map(|idx| &time[idx..])
}

fn boolean(value: bool) -> Option<RdfTerm> {
    Some(Literal::boolean(value).into())
}

fn integer(value: i64) -> Option<RdfTerm> {
    Some(Literal::integer(value).into())
}

fn simple(value: impl Into<String>) -> Option<RdfTerm> {
    Some(Literal::new_simple_literal(value).into())
}

fn string_literal(term: &RdfTerm) -> Option<&Literal> {
    term.as_literal().filter(|l| l.is_string_like())
}

fn numeric(term: &RdfTerm) -> Option<Numeric> {
    term.as_literal().and_then(Numeric::from_literal)
}

/// Typed `xsd:dateTime` values, or strings holding a dateTime lexical form
fn date_time(term: &RdfTerm) -> Option<DateTime<FixedOffset>> {
    let literal = term.as_literal()?;
    if literal.datatype_str() != xsd::DATE_TIME.as_str() && !literal.is_string_like() {
        return None;
    }
    parse_date_time(literal.value())
}

fn utc_date_time(term: &RdfTerm) -> Option<DateTime<Utc>> {
    date_time(term).map(|dt| dt.with_timezone(&Utc))
}

/// A string result carrying the same language tag as `like`
fn string_like(like: &Literal, value: String) -> Option<RdfTerm> {
    match like.language() {
        Some(lang) => Literal::new_language_tagged_literal(value, lang)
            .ok()
            .map(Into::into),
        None => simple(value),
    }
}

/// Argument compatibility for two-argument string functions
fn compatible<'t>(a: &'t RdfTerm, b: &'t RdfTerm) -> Option<(&'t Literal, &'t Literal)> {
    let a = string_literal(a)?;
    let b = string_literal(b)?;
    match b.language() {
        Some(lang) if a.language() != Some(lang) => None,
        _ => Some((a, b)),
    }
}

fn digest_hex<D: Digest>(term: &RdfTerm) -> Option<RdfTerm> {
    let literal = term.as_literal()?;
    simple(hex::encode(D::digest(literal.value().as_bytes())))
}

fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    let tag = tag.to_ascii_lowercase();
    let range = range.to_ascii_lowercase();
    tag == range || (tag.starts_with(&range) && tag.as_bytes().get(range.len()) == Some(&b'-'))
}

/// 1-based substring with SPARQL rounding rules, counted in characters
fn substring(value: &str, start: Numeric, length: Option<Numeric>) -> Option<String> {
    let start = start.round().as_f64();
    let end = match length {
        Some(length) => start + length.round().as_f64(),
        None => f64::INFINITY,
    };
    if start.is_nan() || end.is_nan() {
        return Some(String::new());
    }
    Some(
        value
            .chars()
            .enumerate()
            .filter(|(idx, _)| {
                let position = (*idx + 1) as f64;
                position >= start && position < end
            })
            .map(|(_, c)| c)
            .collect(),
    )
}

fn resolve_iri(value: &str, ctx: &ExecutionContext<'_>) -> Option<RdfTerm> {
    if let Some(base) = ctx.base_iri() {
        let base = Iri::parse(base).ok()?;
        let resolved = base.resolve(value).ok()?;
        return Some(NamedNode::new_unchecked(resolved.into_inner()).into());
    }
    NamedNode::new(value).ok().map(Into::into)
}

/// Apply a built-in to evaluated arguments. `None` is an evaluation error.
pub(crate) fn call(
    function: Function,
    args: &[RdfTerm],
    ctx: &ExecutionContext<'_>,
) -> Option<RdfTerm> {
    match (function, args) {
        (Function::Str, [term]) => match term {
            RdfTerm::NamedNode(n) => simple(n.as_str()),
            RdfTerm::Literal(l) => simple(l.value()),
            RdfTerm::BlankNode(_) => None,
        },
        (Function::Lang, [term]) => simple(term.as_literal()?.language().unwrap_or("")),
        (Function::LangMatches, [tag, range]) => {
            let tag = tag.as_literal()?;
            let range = range.as_literal()?;
            boolean(lang_matches(tag.value(), range.value()))
        }
        (Function::Datatype, [term]) => Some(term.as_literal()?.datatype().into()),
        (Function::Iri, [term]) => match term {
            RdfTerm::NamedNode(_) => Some(term.clone()),
            RdfTerm::Literal(l) if l.is_plain_string() => resolve_iri(l.value(), ctx),
            _ => None,
        },
        (Function::BNode, []) => Some(ctx.fresh_blank_node().into()),
        (Function::BNode, [label]) => {
            let label = label.as_literal().filter(|l| l.is_plain_string())?;
            Some(ctx.blank_node_for(label.value()).into())
        }
        (Function::Rand, []) => Some(Literal::double(rand::random::<f64>()).into()),

        (Function::Abs, [n]) => Some(numeric(n)?.abs()?.to_literal().into()),
        (Function::Ceil, [n]) => Some(numeric(n)?.ceil().to_literal().into()),
        (Function::Floor, [n]) => Some(numeric(n)?.floor().to_literal().into()),
        (Function::Round, [n]) => Some(numeric(n)?.round().to_literal().into()),

        (Function::Concat, parts) => {
            let mut value = String::new();
            let mut language: Option<Option<&str>> = None;
            for part in parts {
                let literal = string_literal(part)?;
                value.push_str(literal.value());
                language = match language {
                    None => Some(literal.language()),
                    Some(lang) if lang == literal.language() => Some(lang),
                    Some(_) => Some(None),
                };
            }
            match language.flatten() {
                Some(lang) => Literal::new_language_tagged_literal(value, lang)
                    .ok()
                    .map(Into::into),
                None => simple(value),
            }
        }
        (Function::SubStr, [text, start]) => {
            let literal = string_literal(text)?;
            string_like(literal, substring(literal.value(), numeric(start)?, None)?)
        }
        (Function::SubStr, [text, start, length]) => {
            let literal = string_literal(text)?;
            let sub = substring(literal.value(), numeric(start)?, Some(numeric(length)?))?;
            string_like(literal, sub)
        }
        (Function::StrLen, [text]) => integer(string_literal(text)?.value().chars().count() as i64),
        (Function::UCase, [text]) => {
            let literal = string_literal(text)?;
            string_like(literal, literal.value().to_uppercase())
        }
        (Function::LCase, [text]) => {
            let literal = string_literal(text)?;
            string_like(literal, literal.value().to_lowercase())
        }
        (Function::EncodeForUri, [text]) => {
            let literal = string_literal(text)?;
            simple(utf8_percent_encode(literal.value(), URI_UNRESERVED).to_string())
        }
        (Function::Contains, [a, b]) => {
            let (a, b) = compatible(a, b)?;
            boolean(a.value().contains(b.value()))
        }
        (Function::StrStarts, [a, b]) => {
            let (a, b) = compatible(a, b)?;
            boolean(a.value().starts_with(b.value()))
        }
        (Function::StrEnds, [a, b]) => {
            let (a, b) = compatible(a, b)?;
            boolean(a.value().ends_with(b.value()))
        }
        (Function::StrBefore, [a, b]) => {
            let (a, b) = compatible(a, b)?;
            match a.value().find(b.value()) {
                Some(idx) => string_like(a, a.value()[..idx].to_string()),
                None => simple(""),
            }
        }
        (Function::StrAfter, [a, b]) => {
            let (a, b) = compatible(a, b)?;
            match a.value().find(b.value()) {
                Some(idx) => string_like(a, a.value()[idx + b.value().len()..].to_string()),
                None => simple(""),
            }
        }
        (Function::Replace, [text, pattern, replacement]) => {
            replace(text, pattern, replacement, None, ctx)
        }
        (Function::Replace, [text, pattern, replacement, flags]) => {
            replace(text, pattern, replacement, Some(flags), ctx)
        }
        (Function::Regex, [text, pattern]) => regex_match(text, pattern, None, ctx),
        (Function::Regex, [text, pattern, flags]) => regex_match(text, pattern, Some(flags), ctx),

        (Function::Year, [dt]) => integer(utc_date_time(dt)?.year() as i64),
        (Function::Month, [dt]) => integer(utc_date_time(dt)?.month() as i64),
        (Function::Day, [dt]) => integer(utc_date_time(dt)?.day() as i64),
        (Function::Hours, [dt]) => integer(utc_date_time(dt)?.hour() as i64),
        (Function::Minutes, [dt]) => integer(utc_date_time(dt)?.minute() as i64),
        (Function::Seconds, [dt]) => {
            let dt = utc_date_time(dt)?;
            let seconds = dt.second() as f64 + dt.nanosecond() as f64 / 1e9;
            Some(Literal::decimal(seconds).into())
        }
        (Function::Tz, [dt]) => {
            let literal = dt.as_literal()?;
            date_time(dt)?;
            simple(timezone_suffix(literal.value()).unwrap_or(""))
        }
        (Function::Now, []) => Some(ctx.now().clone().into()),
        (Function::Uuid, []) => Some(
            NamedNode::new_unchecked(format!("urn:uuid:{}", uuid::Uuid::new_v4())).into(),
        ),
        (Function::StrUuid, []) => simple(uuid::Uuid::new_v4().to_string()),

        (Function::Md5, [text]) => digest_hex::<md5::Md5>(text),
        (Function::Sha1, [text]) => digest_hex::<sha1::Sha1>(text),
        (Function::Sha256, [text]) => digest_hex::<sha2::Sha256>(text),
        (Function::Sha512, [text]) => digest_hex::<sha2::Sha512>(text),

        (Function::StrLang, [text, lang]) => {
            let text = text.as_literal().filter(|l| l.is_plain_string())?;
            let lang = lang.as_literal().filter(|l| l.is_plain_string())?;
            if lang.value().is_empty() {
                return None;
            }
            Literal::new_language_tagged_literal(text.value(), lang.value())
                .ok()
                .map(Into::into)
        }
        (Function::StrDt, [text, datatype]) => {
            let text = text.as_literal().filter(|l| l.is_plain_string())?;
            let datatype = datatype.as_named_node()?;
            if datatype.as_str() == rdf::LANG_STRING.as_str() {
                return None;
            }
            Some(Literal::new_typed_literal(text.value(), datatype.clone()).into())
        }
        (Function::SameTerm, [a, b]) => boolean(a == b),
        (Function::IsIri, [term]) => boolean(term.is_named_node()),
        (Function::IsBlank, [term]) => boolean(term.is_blank_node()),
        (Function::IsLiteral, [term]) => boolean(term.is_literal()),
        (Function::IsNumeric, [term]) => boolean(numeric(term).is_some()),
        (Function::Cast(target), [term]) => cast(target, term),
        _ => None,
    }
}

fn regex_match(
    text: &RdfTerm,
    pattern: &RdfTerm,
    flags: Option<&RdfTerm>,
    ctx: &ExecutionContext<'_>,
) -> Option<RdfTerm> {
    let text = string_literal(text)?;
    let pattern = pattern.as_literal().filter(|l| l.is_string_like())?;
    let flags = match flags {
        Some(flags) => flags.as_literal()?.value(),
        None => "",
    };
    let regex = ctx.compile_regex(pattern.value(), flags)?;
    boolean(regex.is_match(text.value()))
}

fn replace(
    text: &RdfTerm,
    pattern: &RdfTerm,
    replacement: &RdfTerm,
    flags: Option<&RdfTerm>,
    ctx: &ExecutionContext<'_>,
) -> Option<RdfTerm> {
    let literal = string_literal(text)?;
    let pattern = pattern.as_literal().filter(|l| l.is_string_like())?;
    let replacement = replacement.as_literal().filter(|l| l.is_string_like())?;
    let flags = match flags {
        Some(flags) => flags.as_literal()?.value(),
        None => "",
    };
    let regex = ctx.compile_regex(pattern.value(), flags)?;
    // A pattern matching the empty string is an error
    if regex.is_match("") {
        return None;
    }
    let replaced = regex.replace_all(literal.value(), replacement.value());
    string_like(literal, replaced.into_owned())
}

fn cast(target: XsdCast, term: &RdfTerm) -> Option<RdfTerm> {
    let literal = match term {
        RdfTerm::NamedNode(n) if target == XsdCast::String => return simple(n.as_str()),
        RdfTerm::Literal(l) => l,
        _ => return None,
    };
    let lexical = literal.value().trim();
    let from_string = literal.is_plain_string();
    let number = Numeric::from_literal(literal);
    let flag = if literal.datatype_str() == xsd::BOOLEAN.as_str() {
        parse_boolean(lexical)
    } else {
        None
    };

    match target {
        XsdCast::String => simple(literal.value()),
        XsdCast::Integer => {
            let value = match (number, flag) {
                (Some(Numeric::Integer(i)), _) => i,
                (Some(n), _) => {
                    let v = n.as_f64();
                    if !v.is_finite() {
                        return None;
                    }
                    v.trunc() as i64
                }
                (None, Some(b)) => b as i64,
                _ if from_string => lexical.parse().ok()?,
                _ => return None,
            };
            integer(value)
        }
        XsdCast::Decimal => {
            let value = match (number, flag) {
                (Some(n), _) if n.as_f64().is_finite() => n.as_f64(),
                (None, Some(b)) => b as i64 as f64,
                (None, None) if from_string => {
                    Numeric::from_literal(&typed(lexical, xsd::DECIMAL))?.as_f64()
                }
                _ => return None,
            };
            Some(Literal::decimal(value).into())
        }
        XsdCast::Double | XsdCast::Float => {
            let value = match (number, flag) {
                (Some(n), _) => n.as_f64(),
                (None, Some(b)) => b as i64 as f64,
                (None, None) if from_string => {
                    Numeric::from_literal(&typed(lexical, xsd::DOUBLE))?.as_f64()
                }
                _ => return None,
            };
            let result = if target == XsdCast::Float {
                Numeric::Float(value)
            } else {
                Numeric::Double(value)
            };
            Some(result.to_literal().into())
        }
        XsdCast::Boolean => {
            let value = match (number, flag) {
                (Some(n), _) => !(n.is_zero() || n.is_nan()),
                (None, Some(b)) => b,
                _ if from_string => parse_boolean(lexical)?,
                _ => return None,
            };
            boolean(value)
        }
        XsdCast::DateTime => {
            let is_date_time = literal.datatype_str() == xsd::DATE_TIME.as_str();
            if !(from_string || is_date_time) {
                return None;
            }
            parse_date_time(lexical)?;
            Some(Literal::date_time(lexical).into())
        }
    }
}

fn typed(lexical: &str, datatype: oxrdf::NamedNodeRef<'_>) -> Literal {
    Literal::new_typed_literal(lexical, NamedNode::from(datatype.into_owned()))
}
