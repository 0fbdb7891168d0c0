//! Expression evaluation over a variable store.

use std::cmp::Ordering;

use crate::ast::{CmpOp, Expr, Expression, Value};
use crate::errors::EvalError;

/// Source of variable bindings consulted during evaluation.
///
/// `name` is the dotted path as written in the expression
/// (e.g. `env.enabled`). Returning `None` means the variable is not defined.
pub trait VarStore {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Expression {
    /// Evaluate the expression to a boolean.
    ///
    /// When `strict` is true, a reference to an undefined variable is an
    /// error; otherwise it evaluates as [`Value::Null`].
    ///
    /// # Errors
    /// [`EvalError::MissingVariable`] on a strict lookup miss,
    /// [`EvalError::TypeMismatch`] when an operator meets an unsupported
    /// operand, and [`EvalError::NotBoolean`] when the expression as a whole
    /// does not produce a boolean.
    pub fn eval(&self, vars: &dyn VarStore, strict: bool) -> Result<bool, EvalError> {
        match eval_expr(self.ast(), vars, strict)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::NotBoolean {
                found: other.type_name(),
            }),
        }
    }
}

fn eval_expr(expr: &Expr, vars: &dyn VarStore, strict: bool) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Variable(name) => match vars.lookup(name) {
            Some(v) => Ok(v),
            None if strict => Err(EvalError::MissingVariable { name: name.clone() }),
            None => Ok(Value::Null),
        },
        Expr::Not(inner) => match eval_expr(inner, vars, strict)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(EvalError::TypeMismatch {
                op: "not",
                found: other.type_name(),
            }),
        },
        Expr::And(lhs, rhs) => {
            let l = as_bool("and", eval_expr(lhs, vars, strict)?)?;
            let r = as_bool("and", eval_expr(rhs, vars, strict)?)?;
            Ok(Value::Bool(l && r))
        }
        Expr::Or(lhs, rhs) => {
            let l = as_bool("or", eval_expr(lhs, vars, strict)?)?;
            let r = as_bool("or", eval_expr(rhs, vars, strict)?)?;
            Ok(Value::Bool(l || r))
        }
        Expr::Compare(lhs, op, rhs) => {
            let l = eval_expr(lhs, vars, strict)?;
            let r = eval_expr(rhs, vars, strict)?;
            compare(*op, &l, &r)
        }
    }
}

fn as_bool(op: &'static str, v: Value) -> Result<bool, EvalError> {
    match v {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch {
            op,
            found: other.type_name(),
        }),
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let result = match op {
        // Mixed-type equality is false, never an error.
        CmpOp::Eq => values_equal(lhs, rhs),
        CmpOp::Ne => !values_equal(lhs, rhs),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let Some(ord) = values_order(lhs, rhs) else {
                return Err(EvalError::TypeMismatch {
                    op: op.symbol(),
                    found: lhs.type_name(),
                });
            };
            match op {
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            }
        }
    };
    Ok(Value::Bool(result))
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => false,
    }
}

/// Ordering is defined for number pairs and string pairs only.
fn values_order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use std::collections::HashMap;

    struct MapStore(HashMap<String, Value>);

    impl VarStore for MapStore {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn store(pairs: &[(&str, Value)]) -> MapStore {
        MapStore(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_eval_comparisons() {
        let vars = store(&[("env.enabled", Value::Bool(true)), ("env.n", Value::Int(3))]);
        for (src, expected) in [
            ("env.enabled == true", true),
            ("env.enabled != true", false),
            ("env.n < 4", true),
            ("env.n >= 3", true),
            ("env.n > 3.5", false),
            ("'a' < 'b'", true),
        ] {
            let got = compile(src).unwrap().eval(&vars, true).unwrap();
            assert_eq!(got, expected, "{src}");
        }
    }

    #[test]
    fn test_eval_mixed_type_equality_is_false() {
        let vars = store(&[("x", Value::Str("1".to_string()))]);
        assert!(!compile("x == 1").unwrap().eval(&vars, true).unwrap());
        assert!(compile("x != 1").unwrap().eval(&vars, true).unwrap());
    }

    #[test]
    fn test_eval_strict_missing_variable() {
        let vars = store(&[]);
        let err = compile("env.missing == true")
            .unwrap()
            .eval(&vars, true)
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::MissingVariable {
                name: "env.missing".to_string()
            }
        );
    }

    #[test]
    fn test_eval_lenient_missing_variable_is_null() {
        let vars = store(&[]);
        assert!(compile("env.missing == null")
            .unwrap()
            .eval(&vars, false)
            .unwrap());
        assert!(!compile("env.missing == true")
            .unwrap()
            .eval(&vars, false)
            .unwrap());
    }

    #[test]
    fn test_eval_connectives() {
        let vars = store(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]);
        assert!(compile("a and not b").unwrap().eval(&vars, true).unwrap());
        assert!(compile("b or a").unwrap().eval(&vars, true).unwrap());
        assert!(!compile("a and b").unwrap().eval(&vars, true).unwrap());
    }

    #[test]
    fn test_eval_non_boolean_operand_errors() {
        let vars = store(&[("n", Value::Int(1))]);
        assert!(matches!(
            compile("n and true").unwrap().eval(&vars, true),
            Err(EvalError::TypeMismatch { op: "and", .. })
        ));
        assert!(matches!(
            compile("n").unwrap().eval(&vars, true),
            Err(EvalError::NotBoolean { .. })
        ));
    }

    #[test]
    fn test_eval_ordering_undefined_for_mixed_types() {
        let vars = store(&[]);
        assert!(matches!(
            compile("'a' < 1").unwrap().eval(&vars, true),
            Err(EvalError::TypeMismatch { .. })
        ));
    }
}
