//! Expression and property-path evaluation
//!
//! Expressions evaluate against one solution and yield `Option<RdfTerm>`,
//! where `None` is the error value. Data-dependent failures never abort a
//! query: FILTER drops the row, BIND leaves the variable unbound.

pub mod functions;
pub mod numeric;
pub mod ordering;
pub mod path;

pub use numeric::Numeric;
pub use ordering::{compare_for_operator, compare_terms, terms_equal};
pub use path::{evaluate_path, path_targets};

use crate::rdf::{Literal, RdfTerm};
use crate::sparql::algebra::Expr;
use crate::sparql::ast::{BinaryOp, Function, UnaryOp};
use crate::sparql::executor::{ExecutionContext, QueryPlanner, Solution};
use std::cmp::Ordering;
use tracing::warn;

const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

/// Effective boolean value of a term; `None` when it has none
pub fn effective_boolean_value(term: &RdfTerm) -> Option<bool> {
    let literal = term.as_literal()?;
    if literal.datatype_str() == XSD_BOOLEAN {
        return ordering::parse_boolean(literal.value());
    }
    if let Some(n) = Numeric::from_literal(literal) {
        return Some(!(n.is_zero() || n.is_nan()));
    }
    if Numeric::is_numeric_datatype(literal) {
        // Ill-typed numeric
        return Some(false);
    }
    if literal.is_string_like() {
        return Some(!literal.value().is_empty());
    }
    None
}

fn boolean(value: bool) -> Option<RdfTerm> {
    Some(Literal::boolean(value).into())
}

/// Evaluate an expression against a solution
pub fn evaluate(expr: &Expr, solution: &Solution, ctx: &ExecutionContext<'_>) -> Option<RdfTerm> {
    match expr {
        Expr::Variable(name) => solution.get(name).cloned(),
        Expr::Constant(term) => Some(term.clone()),
        Expr::Bound(name) => boolean(solution.contains(name)),
        Expr::Unary { op, expr } => {
            let value = evaluate(expr, solution, ctx)?;
            match op {
                UnaryOp::Not => boolean(!effective_boolean_value(&value)?),
                UnaryOp::Plus => {
                    let n = Numeric::from_literal(value.as_literal()?)?;
                    Some(n.to_literal().into())
                }
                UnaryOp::Minus => {
                    let n = Numeric::from_literal(value.as_literal()?)?;
                    Some(n.negate()?.to_literal().into())
                }
            }
        }
        Expr::Binary { left, op, right } => evaluate_binary(left, *op, right, solution, ctx),
        Expr::In {
            expr,
            list,
            negated,
        } => {
            let value = evaluate(expr, solution, ctx)?;
            let mut saw_error = false;
            for item in list {
                match evaluate(item, solution, ctx).and_then(|v| terms_equal(&value, &v)) {
                    Some(true) => return boolean(!negated),
                    Some(false) => {}
                    None => saw_error = true,
                }
            }
            if saw_error {
                None
            } else {
                boolean(*negated)
            }
        }
        Expr::Function { function, args } => match function {
            Function::If => {
                let [condition, then, otherwise] = args.as_slice() else {
                    return None;
                };
                let condition = evaluate(condition, solution, ctx)?;
                if effective_boolean_value(&condition)? {
                    evaluate(then, solution, ctx)
                } else {
                    evaluate(otherwise, solution, ctx)
                }
            }
            Function::Coalesce => args.iter().find_map(|arg| evaluate(arg, solution, ctx)),
            _ => {
                let values = args
                    .iter()
                    .map(|arg| evaluate(arg, solution, ctx))
                    .collect::<Option<Vec<_>>>()?;
                functions::call(*function, &values, ctx)
            }
        },
        Expr::Exists { pattern, negated } => {
            let planner = QueryPlanner::new();
            let mut operator = match planner.plan_with_seed(pattern, solution.clone()) {
                Ok(operator) => operator,
                Err(e) => {
                    warn!(error = %e, "could not plan EXISTS pattern");
                    return None;
                }
            };
            match operator.next(ctx) {
                Ok(found) => boolean(found.is_some() != *negated),
                Err(e) => {
                    warn!(error = %e, "EXISTS evaluation failed");
                    None
                }
            }
        }
    }
}

fn evaluate_binary(
    left: &Expr,
    op: BinaryOp,
    right: &Expr,
    solution: &Solution,
    ctx: &ExecutionContext<'_>,
) -> Option<RdfTerm> {
    match op {
        BinaryOp::Or | BinaryOp::And => {
            let l = evaluate(left, solution, ctx).and_then(|t| effective_boolean_value(&t));
            let r = evaluate(right, solution, ctx).and_then(|t| effective_boolean_value(&t));
            let deciding = op == BinaryOp::Or;
            match (l, r) {
                (Some(a), _) if a == deciding => boolean(deciding),
                (_, Some(b)) if b == deciding => boolean(deciding),
                (Some(_), Some(_)) => boolean(!deciding),
                _ => None,
            }
        }
        _ => {
            let l = evaluate(left, solution, ctx)?;
            let r = evaluate(right, solution, ctx)?;
            match op {
                BinaryOp::Eq => boolean(terms_equal(&l, &r)?),
                BinaryOp::Ne => boolean(!terms_equal(&l, &r)?),
                BinaryOp::Lt => boolean(compare_for_operator(&l, &r)? == Ordering::Less),
                BinaryOp::Le => boolean(compare_for_operator(&l, &r)? != Ordering::Greater),
                BinaryOp::Gt => boolean(compare_for_operator(&l, &r)? == Ordering::Greater),
                BinaryOp::Ge => boolean(compare_for_operator(&l, &r)? != Ordering::Less),
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                    let a = Numeric::from_literal(l.as_literal()?)?;
                    let b = Numeric::from_literal(r.as_literal()?)?;
                    let result = match op {
                        BinaryOp::Add => a.add(b),
                        BinaryOp::Sub => a.sub(b),
                        BinaryOp::Mul => a.mul(b),
                        _ => a.div(b),
                    }?;
                    Some(result.to_literal().into())
                }
                BinaryOp::Or | BinaryOp::And => None,
            }
        }
    }
}

/// FILTER semantics: true only when the effective boolean value is true
pub fn evaluate_condition(expr: &Expr, solution: &Solution, ctx: &ExecutionContext<'_>) -> bool {
    evaluate(expr, solution, ctx)
        .and_then(|term| effective_boolean_value(&term))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{NamedNode, RdfStore};
    use crate::sparql::algebra::{Algebra, PatternTerm, PatternTriple};

    fn var(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    fn int(i: i64) -> Expr {
        Expr::Constant(Literal::integer(i).into())
    }

    fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn eval(expr: &Expr, solution: &Solution) -> Option<RdfTerm> {
        let store = RdfStore::new();
        let ctx = ExecutionContext::new(&store);
        evaluate(expr, solution, &ctx)
    }

    #[test]
    fn test_arithmetic() {
        let solution = Solution::new();
        let expr = binary(int(7), BinaryOp::Div, int(2));
        assert_eq!(eval(&expr, &solution), Some(Literal::decimal(3.5).into()));

        let expr = binary(int(2), BinaryOp::Add, int(3));
        assert_eq!(eval(&expr, &solution), Some(Literal::integer(5).into()));

        let expr = binary(int(1), BinaryOp::Div, int(0));
        assert_eq!(eval(&expr, &solution), None);
    }

    #[test]
    fn test_comparison_against_binding() {
        let mut solution = Solution::new();
        solution.bind("age", Literal::integer(30).into());
        let expr = binary(var("age"), BinaryOp::Gt, int(25));
        assert_eq!(eval(&expr, &solution), Some(Literal::boolean(true).into()));

        let unbound = binary(var("missing"), BinaryOp::Gt, int(25));
        assert_eq!(eval(&unbound, &solution), None);
    }

    #[test]
    fn test_three_valued_logic() {
        let solution = Solution::new();
        let error = var("missing");
        let t = Expr::Constant(Literal::boolean(true).into());
        let f = Expr::Constant(Literal::boolean(false).into());

        let or = binary(error.clone(), BinaryOp::Or, t.clone());
        assert_eq!(eval(&or, &solution), Some(Literal::boolean(true).into()));

        let and = binary(error.clone(), BinaryOp::And, f.clone());
        assert_eq!(eval(&and, &solution), Some(Literal::boolean(false).into()));

        let and = binary(error, BinaryOp::And, t);
        assert_eq!(eval(&and, &solution), None);
    }

    #[test]
    fn test_effective_boolean_value() {
        let ebv = |t: RdfTerm| effective_boolean_value(&t);
        assert_eq!(ebv(Literal::new_simple_literal("").into()), Some(false));
        assert_eq!(ebv(Literal::new_simple_literal("x").into()), Some(true));
        assert_eq!(ebv(Literal::integer(0).into()), Some(false));
        assert_eq!(ebv(Literal::double(f64::NAN).into()), Some(false));
        assert_eq!(
            ebv(NamedNode::new("http://example.org/").unwrap().into()),
            None
        );
    }

    #[test]
    fn test_bound_ignores_value() {
        let mut solution = Solution::new();
        solution.bind("x", Literal::new_simple_literal("").into());
        assert_eq!(
            eval(&Expr::Bound("x".to_string()), &solution),
            Some(Literal::boolean(true).into())
        );
        assert_eq!(
            eval(&Expr::Bound("y".to_string()), &solution),
            Some(Literal::boolean(false).into())
        );
    }

    #[test]
    fn test_coalesce_and_if() {
        let solution = Solution::new();
        let coalesce = Expr::Function {
            function: Function::Coalesce,
            args: vec![var("missing"), int(4)],
        };
        assert_eq!(eval(&coalesce, &solution), Some(Literal::integer(4).into()));

        let if_expr = Expr::Function {
            function: Function::If,
            args: vec![binary(int(1), BinaryOp::Lt, int(2)), int(10), int(20)],
        };
        assert_eq!(eval(&if_expr, &solution), Some(Literal::integer(10).into()));

        let if_error = Expr::Function {
            function: Function::If,
            args: vec![var("missing"), int(10), int(20)],
        };
        assert_eq!(eval(&if_error, &solution), None);
    }

    #[test]
    fn test_in_list() {
        let solution = Solution::new();
        let expr = Expr::In {
            expr: Box::new(int(2)),
            list: vec![int(1), int(2)],
            negated: false,
        };
        assert_eq!(eval(&expr, &solution), Some(Literal::boolean(true).into()));

        let expr = Expr::In {
            expr: Box::new(int(3)),
            list: vec![int(1), int(2)],
            negated: true,
        };
        assert_eq!(eval(&expr, &solution), Some(Literal::boolean(true).into()));
    }

    #[test]
    fn test_now_is_fixed_per_execution() {
        let store = RdfStore::new();
        let ctx = ExecutionContext::new(&store);
        let now = Expr::Function {
            function: Function::Now,
            args: vec![],
        };
        let first = evaluate(&now, &Solution::new(), &ctx);
        let second = evaluate(&now, &Solution::new(), &ctx);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_exists_uses_current_bindings() {
        let ex = |s: &str| NamedNode::new(&format!("http://example.org/{}", s)).unwrap();
        let mut store = RdfStore::new();
        store
            .add_terms(ex("alice"), ex("knows"), ex("bob"))
            .unwrap();
        let ctx = ExecutionContext::new(&store);

        let pattern = Algebra::Bgp(vec![PatternTriple {
            subject: PatternTerm::Variable("p".to_string()),
            predicate: PatternTerm::Term(ex("knows").into()),
            object: PatternTerm::Variable("o".to_string()),
        }]);
        let exists = Expr::Exists {
            pattern: Box::new(pattern),
            negated: false,
        };

        let mut alice = Solution::new();
        alice.bind("p", ex("alice").into());
        assert_eq!(
            evaluate(&exists, &alice, &ctx),
            Some(Literal::boolean(true).into())
        );

        let mut bob = Solution::new();
        bob.bind("p", ex("bob").into());
        assert_eq!(
            evaluate(&exists, &bob, &ctx),
            Some(Literal::boolean(false).into())
        );
    }
}
