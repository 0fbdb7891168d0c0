//! Trellis condition expressions
//!
//! A small boolean expression language evaluated against named variable
//! bindings. Configuration trees use it for the reserved `condition` key:
//! a string such as `env.enabled == true and env.mode != 'off'` compiles
//! once and is then evaluated against the live variable context on every
//! apply.
//!
//! The language supports:
//! - literals: `true`, `false`, `null`, integers, floats, single- or
//!   double-quoted strings
//! - variables: dotted paths (`provider.some.key`) resolved through a
//!   [`VarStore`]
//! - comparisons: `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - boolean connectives: `and`, `or`, `not`, parentheses
//!
//! Evaluation is strict by default: referencing an unknown variable is an
//! error. In lenient mode an unknown variable evaluates as `null`, which
//! compares unequal to everything except `null`.

pub mod ast;
pub mod errors;
mod eval;
mod parser;

pub use ast::{CmpOp, Expr, Expression, Value};
pub use errors::{EvalError, ParseError};
pub use eval::VarStore;

use chumsky::prelude::*;

/// Compile an expression source string.
///
/// The returned [`Expression`] keeps its source text for diagnostics and can
/// be evaluated any number of times.
///
/// # Errors
/// Returns [`ParseError::Invalid`] when the source does not conform to the
/// grammar.
pub fn compile(source: &str) -> Result<Expression, ParseError> {
    let ast = parser::expr_parser()
        .then_ignore(end())
        .parse(source)
        .into_result()
        .map_err(|errs| {
            let message = errs
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            ParseError::Invalid {
                source_text: source.to_string(),
                message,
            }
        })?;
    Ok(Expression::new(source, ast))
}
