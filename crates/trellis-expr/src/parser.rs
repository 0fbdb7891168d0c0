//! Chumsky parser for the condition grammar.
//!
//! Precedence, loosest to tightest: `or` < `and` < `not` < comparison <
//! operand. Comparisons do not chain (`a < b < c` is a parse error), which
//! matches how conditions are written in configuration documents.

use chumsky::prelude::*;

use crate::ast::{CmpOp, Expr, Value};

pub(crate) fn expr_parser<'a>() -> impl Parser<'a, &'a str, Expr, extra::Err<Rich<'a, char>>> {
    recursive(|expr| {
        // Numbers: optional sign, digits, optional fraction. Int when there
        // is no fraction part, float otherwise.
        let number = just('-')
            .or_not()
            .then(text::int(10))
            .then(just('.').then(text::digits(10)).or_not())
            .to_slice()
            .try_map(|s: &str, span| {
                if s.contains('.') {
                    s.parse::<f64>()
                        .map(|v| Expr::Literal(Value::Float(v)))
                        .map_err(|e| Rich::custom(span, format!("invalid float '{s}': {e}")))
                } else {
                    s.parse::<i64>()
                        .map(|v| Expr::Literal(Value::Int(v)))
                        .map_err(|e| Rich::custom(span, format!("invalid integer '{s}': {e}")))
                }
            });

        let single_quoted = just('\'')
            .ignore_then(
                any()
                    .filter(|c: &char| *c != '\'')
                    .repeated()
                    .collect::<String>(),
            )
            .then_ignore(just('\''));
        let double_quoted = just('"')
            .ignore_then(
                any()
                    .filter(|c: &char| *c != '"')
                    .repeated()
                    .collect::<String>(),
            )
            .then_ignore(just('"'));
        let string = single_quoted
            .or(double_quoted)
            .map(|s| Expr::Literal(Value::Str(s)));

        // A word is either a keyword literal or a dotted variable path.
        // `and`/`or`/`not` are reserved so a stray connective at operand
        // position errors instead of becoming a variable.
        let word = text::ident()
            .separated_by(just('.'))
            .at_least(1)
            .collect::<Vec<&str>>()
            .try_map(|parts: Vec<&str>, span| {
                if parts.len() == 1 {
                    match parts[0] {
                        "true" => return Ok(Expr::Literal(Value::Bool(true))),
                        "false" => return Ok(Expr::Literal(Value::Bool(false))),
                        "null" => return Ok(Expr::Literal(Value::Null)),
                        "and" | "or" | "not" => {
                            return Err(Rich::custom(
                                span,
                                format!("'{}' is a reserved word", parts[0]),
                            ))
                        }
                        _ => {}
                    }
                }
                Ok(Expr::Variable(parts.join(".")))
            });

        let paren = expr
            .clone()
            .delimited_by(just('(').padded(), just(')').padded());

        let operand = choice((number, string, word, paren)).padded();

        let cmp_op = choice((
            just("==").to(CmpOp::Eq),
            just("!=").to(CmpOp::Ne),
            just("<=").to(CmpOp::Le),
            just(">=").to(CmpOp::Ge),
            just('<').to(CmpOp::Lt),
            just('>').to(CmpOp::Gt),
        ));

        let cmp = operand
            .clone()
            .then(cmp_op.padded().then(operand).or_not())
            .map(|(lhs, rest)| match rest {
                None => lhs,
                Some((op, rhs)) => Expr::Compare(Box::new(lhs), op, Box::new(rhs)),
            });

        let unary = recursive(|u| {
            text::keyword("not")
                .padded()
                .ignore_then(u)
                .map(|e: Expr| Expr::Not(Box::new(e)))
                .or(cmp)
        });

        let and = unary.clone().foldl(
            text::keyword("and").padded().ignore_then(unary).repeated(),
            |lhs, rhs| Expr::And(Box::new(lhs), Box::new(rhs)),
        );

        and.clone()
            .foldl(
                text::keyword("or").padded().ignore_then(and).repeated(),
                |lhs, rhs| Expr::Or(Box::new(lhs), Box::new(rhs)),
            )
            .padded()
    })
}
