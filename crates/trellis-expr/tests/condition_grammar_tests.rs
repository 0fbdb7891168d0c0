use std::collections::HashMap;

use trellis_expr::{compile, EvalError, Value, VarStore};

struct Bindings(HashMap<String, Value>);

impl Bindings {
    fn new(pairs: &[(&str, Value)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }
}

impl VarStore for Bindings {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

#[test]
fn test_typical_condition_forms() {
    let vars = Bindings::new(&[
        ("env.enabled", Value::Bool(true)),
        ("host.platform", Value::Str("linux".to_string())),
        ("host.cores", Value::Int(8)),
    ]);
    for src in [
        "env.enabled == true",
        "host.platform == 'linux'",
        "host.platform != \"windows\"",
        "host.cores >= 4 and env.enabled",
        "not (host.cores < 2) or host.platform == 'linux'",
        "host.cores > 7.5",
    ] {
        let expr = compile(src).unwrap_or_else(|e| panic!("{src}: {e}"));
        assert!(expr.eval(&vars, true).unwrap(), "{src}");
    }
}

#[test]
fn test_strict_vs_lenient_evaluation() {
    let vars = Bindings::new(&[]);
    let expr = compile("env.missing == 'x'").unwrap();
    assert!(matches!(
        expr.eval(&vars, true),
        Err(EvalError::MissingVariable { .. })
    ));
    assert_eq!(expr.eval(&vars, false).unwrap(), false);

    let null_check = compile("env.missing == null").unwrap();
    assert!(null_check.eval(&vars, false).unwrap());
}

#[test]
fn test_compiled_expression_is_reusable() {
    let expr = compile("n > 2").unwrap();
    for (n, expected) in [(1, false), (3, true), (100, true)] {
        let vars = Bindings::new(&[("n", Value::Int(n))]);
        assert_eq!(expr.eval(&vars, true).unwrap(), expected);
    }
}

#[test]
fn test_grammar_rejections() {
    for src in ["", "a ==", "== b", "(a", "a |", "1 < 2 < 3", "'unterminated"] {
        assert!(compile(src).is_err(), "{src:?} should not compile");
    }
}
