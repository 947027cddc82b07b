//! Evaluation of expressions against a variable mapping.

use indexmap::IndexMap;

use crate::error::{EvalError, Result};
use crate::parser::{parse, BinaryOp, Expr};

/// Ordered name → value mapping that expressions are resolved against.
pub type Variables = IndexMap<String, f64>;

/// Something that can compute the value of an expression.
///
/// The resolver is generic over this trait so that callers can wrap the
/// default [`Evaluator`] (for example to count invocations).
pub trait Evaluate {
    /// Compute the value of `expression` against `variables`.
    fn compute(&self, expression: &str, variables: &Variables) -> Result<f64>;
}

/// The default evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluate for Evaluator {
    fn compute(&self, expression: &str, variables: &Variables) -> Result<f64> {
        compute(expression, variables)
    }
}

impl<E: Evaluate + ?Sized> Evaluate for &E {
    fn compute(&self, expression: &str, variables: &Variables) -> Result<f64> {
        (**self).compute(expression, variables)
    }
}

/// Compute the value of `expression` against `variables`.
///
/// If the trimmed expression is exactly the name of a variable, its value is
/// returned without parsing.
pub fn compute(expression: &str, variables: &Variables) -> Result<f64> {
    let trimmed = expression.trim();
    if let Some(value) = variables.get(trimmed) {
        return Ok(*value);
    }
    let expr = parse(trimmed)?;
    evaluate(&expr, variables, trimmed)
}

/// Evaluate a parsed expression tree.
///
/// `source` is only used for error messages.
pub fn evaluate(expr: &Expr, variables: &Variables, source: &str) -> Result<f64> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Ident(name) => {
            variables
                .get(name)
                .copied()
                .ok_or_else(|| EvalError::UnresolvedIdentifier {
                    name: name.clone(),
                    expression: source.to_string(),
                })
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = evaluate(lhs, variables, source)?;
            let r = evaluate(rhs, variables, source)?;
            apply(*op, l, r, source)
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if evaluate(cond, variables, source)? != 0.0 {
                evaluate(then, variables, source)
            } else {
                evaluate(otherwise, variables, source)
            }
        }
    }
}

fn apply(op: BinaryOp, l: f64, r: f64, source: &str) -> Result<f64> {
    let truth = |b: bool| if b { 1.0 } else { 0.0 };
    Ok(match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return Err(EvalError::DivisionByZero {
                    expression: source.to_string(),
                });
            }
            l / r
        }
        BinaryOp::Lt => truth(l < r),
        BinaryOp::Gt => truth(l > r),
        BinaryOp::Le => truth(l <= r),
        BinaryOp::Ge => truth(l >= r),
        BinaryOp::Eq => truth(l == r),
        BinaryOp::Ne => truth(l != r),
    })
}
