//! Arithmetic expression evaluator for level and timing equations.
//!
//! Expressions are the right-hand sides found in equation sets, pin blocks,
//! DPS blocks and timing edge blocks:
//! - `+ - * /` with the usual precedence and parentheses
//! - unary `+` (no-op) and unary `-` (evaluated as `0 - value`)
//! - the conditional `cond ? a : b` with `< > <= >= == !=`
//! - bare identifiers resolved against a [`Variables`] mapping
//!
//! An expression that is exactly the name of a known variable short-circuits
//! to that variable's value without being parsed.

pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use error::{EvalError, Result};
pub use eval::{compute, Evaluate, Evaluator, Variables};
pub use parser::{parse, BinaryOp, Expr};
