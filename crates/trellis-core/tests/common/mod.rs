use trellis_core::{MapProvider, Provider, Tree, Vars};

/// Load a tree from a json! fixture
#[allow(dead_code)]
pub fn tree(value: serde_json::Value) -> Tree {
    Tree::from_value(&value).expect("fixture must load")
}

/// Unwrap a json! fixture into a native mapping
#[allow(dead_code)]
pub fn mapping(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other:?}"),
    }
}

/// Build a mapping-backed provider from a json! fixture
#[allow(dead_code)]
pub fn provider(name: &str, value: serde_json::Value) -> Box<dyn Provider> {
    Box::new(MapProvider::new(name, &mapping(value)).expect("provider fixture must load"))
}

/// Build a Vars context with a single provider and no default
#[allow(dead_code)]
pub fn vars_with(name: &str, value: serde_json::Value) -> Vars {
    Vars::new(vec![provider(name, value)], "")
}

/// Materialize a tree and compare against a json! fixture
#[allow(dead_code)]
pub fn assert_materializes(tree: &Tree, expected: serde_json::Value) {
    assert_eq!(
        serde_json::Value::Object(tree.to_map().expect("tree must materialize")),
        expected
    );
}
