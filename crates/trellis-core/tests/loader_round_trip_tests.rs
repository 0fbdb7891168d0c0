mod common;

use common::{assert_materializes, tree};
use serde_json::json;
use trellis_core::{ErrorKind, Node, Tree};

#[test]
fn test_round_trip_preserves_values() {
    let fixture = json!({
        "name": "agent",
        "enabled": true,
        "timeout": 30,
        "backoff": 1.5,
        "offset": -4,
        "tags": ["a", "b"],
        "nested": {"inner": {"leaf": "v"}},
        "absent": null,
    });
    let t = tree(fixture.clone());
    assert_materializes(&t, fixture);
}

#[test]
fn test_round_trip_explodes_dotted_keys() {
    let t = tree(json!({"a.b": 1}));
    assert_materializes(&t, json!({"a": {"b": 1}}));
}

#[test]
fn test_dotted_siblings_merge_into_one_mapping() {
    let t = tree(json!({"a.b": 1, "a.c": 2}));
    assert_materializes(&t, json!({"a": {"b": 1, "c": 2}}));
}

#[test]
fn test_dotted_and_nested_forms_are_equivalent() {
    let dotted = tree(json!({"outputs.default.type": "es", "outputs.default.hosts": ["h1"]}));
    let nested = tree(json!({"outputs": {"default": {"type": "es", "hosts": ["h1"]}}}));
    assert!(dotted.equal(&nested));
    assert_eq!(dotted.hash(), nested.hash());
}

#[test]
fn test_order_determinism_across_source_orderings() {
    // same content written in two iteration orders
    let a = tree(json!({"z": {"q": 1, "a": 2}, "m": [1, 2], "a": "s"}));
    let b = tree(json!({"a": "s", "m": [1, 2], "z": {"a": 2, "q": 1}}));
    assert_eq!(a.hash(), b.hash());
    assert_eq!(a.fast_hash(), b.fast_hash());
}

#[test]
fn test_loading_twice_is_byte_identical() {
    let fixture = json!({"b": {"c.d": true}, "a": [1.25, "x"]});
    let t1 = tree(fixture.clone());
    let t2 = tree(fixture);
    assert_eq!(t1.hash(), t2.hash());
}

#[test]
fn test_from_value_rejects_non_mappings() {
    for fixture in [json!(null), json!(3), json!("s"), json!([1])] {
        let err = Tree::from_value(&fixture).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadType);
    }
}

#[test]
fn test_yaml_document_loads_and_round_trips() {
    let doc = "
outputs:
  default:
    type: es
    hosts:
      - localhost:9200
agent.monitoring:
  enabled: true
programs:
  - name: filebeat
    enabled: false
";
    let value: serde_json::Value = serde_yaml::from_str(doc).expect("yaml must parse");
    let t = Tree::from_value(&value).expect("yaml document must load");
    assert_materializes(
        &t,
        json!({
            "agent": {"monitoring": {"enabled": true}},
            "outputs": {"default": {"type": "es", "hosts": ["localhost:9200"]}},
            "programs": [{"name": "filebeat", "enabled": false}],
        }),
    );
}

#[test]
fn test_lookup_returns_native_values() {
    let t = tree(json!({"a": {"b": [10, 20]}}));
    assert_eq!(t.lookup("a.b.0"), Some(json!(10)));
    assert_eq!(t.lookup("a.b"), Some(json!([10, 20])));
    assert_eq!(t.lookup(""), Some(json!({"a": {"b": [10, 20]}})));
}

#[test]
fn test_to_map_accepts_only_mapping_roots() {
    let t = tree(json!({"a": 1}));
    assert_eq!(
        serde_json::Value::Object(t.to_map().unwrap()),
        json!({"a": 1})
    );

    let bare = Tree::new(Node::int(1));
    let err = bare.to_map().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadType);
}
