mod common;

use std::collections::BTreeMap;

use common::{assert_materializes, tree};
use serde_json::json;
use trellis_core::{ErrorKind, Node, Rule, RuleList};

#[test]
fn test_copy_inserts_cloned_subtree() {
    let mut t = tree(json!({"outputs": {"default": {"type": "es"}}}));
    Rule::copy("outputs.default", "output").apply(&mut t).unwrap();
    assert_materializes(
        &t,
        json!({
            "output": {"type": "es"},
            "outputs": {"default": {"type": "es"}},
        }),
    );
}

#[test]
fn test_copy_is_a_noop_when_source_absent() {
    let mut t = tree(json!({"a": 1}));
    Rule::copy("missing.path", "output").apply(&mut t).unwrap();
    assert_materializes(&t, json!({"a": 1}));
}

#[test]
fn test_copy_is_deep() {
    let mut t = tree(json!({"outputs": {"default": {"type": "es"}}}));
    Rule::copy("outputs.default", "output").apply(&mut t).unwrap();
    // mutating the copy must not touch the source
    t.insert(Node::str("logstash"), "output.type").unwrap();
    assert_eq!(t.lookup("outputs.default.type"), Some(json!("es")));
}

#[test]
fn test_rename_rekeys_the_entry() {
    let mut t = tree(json!({"outputs": {"default": {"type": "es"}}}));
    Rule::rename("outputs.default", "es").apply(&mut t).unwrap();
    assert_materializes(&t, json!({"outputs": {"es": {"type": "es"}}}));
}

#[test]
fn test_rename_replaces_existing_sibling() {
    let mut t = tree(json!({"outputs": {"default": {"v": 1}, "es": {"v": 2}}}));
    Rule::rename("outputs.default", "es").apply(&mut t).unwrap();
    assert_materializes(&t, json!({"outputs": {"es": {"v": 1}}}));
}

#[test]
fn test_rename_is_a_noop_when_absent() {
    let mut t = tree(json!({"outputs": {}}));
    Rule::rename("outputs.default", "es").apply(&mut t).unwrap();
    assert_materializes(&t, json!({"outputs": {}}));
}

#[test]
fn test_filter_retains_named_top_level_keys() {
    let mut t = tree(json!({
        "a": 1,
        "monitoring": {"enabled": true},
        "programs": [1, 2],
        "output": {"type": "es"},
        "b": 2,
    }));
    Rule::filter(["monitoring", "programs", "output"])
        .apply(&mut t)
        .unwrap();
    assert_materializes(
        &t,
        json!({
            "monitoring": {"enabled": true},
            "output": {"type": "es"},
            "programs": [1, 2],
        }),
    );
    // remaining entries stay in ascending order
    let Node::Dict(root) = t.root() else {
        panic!("root must be a mapping");
    };
    let names: Vec<&str> = root
        .nodes()
        .iter()
        .filter_map(|n| match n {
            Node::Key(k) => Some(k.name()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["monitoring", "output", "programs"]);
}

#[test]
fn test_translate_replaces_table_hits() {
    let table = BTreeMap::from([
        ("es".to_string(), Node::str("elasticsearch")),
        ("ls".to_string(), Node::str("logstash")),
    ]);
    let mut t = tree(json!({"output": {"type": "es"}}));
    Rule::translate("output.type", table.clone())
        .apply(&mut t)
        .unwrap();
    assert_materializes(&t, json!({"output": {"type": "elasticsearch"}}));

    // a value outside the table is untouched
    let mut t = tree(json!({"output": {"type": "kafka"}}));
    Rule::translate("output.type", table).apply(&mut t).unwrap();
    assert_materializes(&t, json!({"output": {"type": "kafka"}}));
}

#[test]
fn test_translate_with_regex_substitutes_all_matches() {
    let rule = Rule::translate_with_regex("path", "^/usr", "/opt").unwrap();
    let mut t = tree(json!({"path": "/usr/share/agent"}));
    rule.apply(&mut t).unwrap();
    assert_materializes(&t, json!({"path": "/opt/share/agent"}));
}

#[test]
fn test_translate_with_regex_rejects_bad_patterns() {
    let err = Rule::translate_with_regex("path", "(unclosed", "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuleFailed);
}

#[test]
fn test_map_applies_sub_rules_per_element() {
    let mut t = tree(json!({
        "programs": [
            {"name": "a", "old": 1},
            {"name": "b", "old": 2},
        ]
    }));
    let sub = RuleList::new(vec![Rule::rename("old", "new")]);
    Rule::map("programs", sub).apply(&mut t).unwrap();
    assert_materializes(
        &t,
        json!({
            "programs": [
                {"name": "a", "new": 1},
                {"name": "b", "new": 2},
            ]
        }),
    );
}

#[test]
fn test_map_requires_a_sequence() {
    let mut t = tree(json!({"programs": {"not": "a list"}}));
    let err = Rule::map("programs", RuleList::default())
        .apply(&mut t)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuleFailed);
}

#[test]
fn test_map_is_a_noop_when_absent() {
    let mut t = tree(json!({"a": 1}));
    Rule::map("programs", RuleList::default())
        .apply(&mut t)
        .unwrap();
    assert_materializes(&t, json!({"a": 1}));
}

#[test]
fn test_filter_values_keeps_matching_elements() {
    let mut t = tree(json!({
        "inputs": [
            {"type": "log", "id": 1},
            {"type": "metrics", "id": 2},
            {"type": "log", "id": 3},
            {"id": 4},
        ]
    }));
    Rule::filter_values("inputs", "type", ["log"])
        .apply(&mut t)
        .unwrap();
    assert_materializes(
        &t,
        json!({"inputs": [{"type": "log", "id": 1}, {"type": "log", "id": 3}]}),
    );
}

#[test]
fn test_inject_headers_merges_into_headers_mapping() {
    let mut t = tree(json!({"output": {"type": "es", "headers": {"existing": "kept"}}}));
    Rule::inject_headers("output", &[("x-agent", "trellis"), ("existing", "replaced")])
        .apply(&mut t)
        .unwrap();
    assert_materializes(
        &t,
        json!({
            "output": {
                "type": "es",
                "headers": {"existing": "replaced", "x-agent": "trellis"},
            }
        }),
    );
}

#[test]
fn test_inject_headers_creates_missing_mapping() {
    let mut t = tree(json!({"output": {"type": "es"}}));
    Rule::inject_headers("output", &[("x-agent", "trellis")])
        .apply(&mut t)
        .unwrap();
    assert_materializes(
        &t,
        json!({"output": {"headers": {"x-agent": "trellis"}, "type": "es"}}),
    );
}

#[test]
fn test_extract_list_item_collects_child_values() {
    let mut t = tree(json!({
        "programs": [
            {"name": "filebeat"},
            {"name": "metricbeat"},
        ]
    }));
    Rule::extract_list_item("programs", "name", "names")
        .apply(&mut t)
        .unwrap();
    assert_eq!(t.lookup("names"), Some(json!(["filebeat", "metricbeat"])));
}

#[test]
fn test_insert_defaults_fills_missing_entries_only() {
    let defaults = BTreeMap::from([
        ("level".to_string(), Node::str("info")),
        ("to_files".to_string(), Node::bool(true)),
    ]);
    let mut t = tree(json!({"logging": {"level": "debug"}}));
    Rule::insert_defaults("logging", defaults.clone())
        .apply(&mut t)
        .unwrap();
    assert_materializes(
        &t,
        json!({"logging": {"level": "debug", "to_files": true}}),
    );

    // absent path gets the whole default mapping
    let mut t = tree(json!({}));
    Rule::insert_defaults("logging", defaults).apply(&mut t).unwrap();
    assert_materializes(
        &t,
        json!({"logging": {"level": "info", "to_files": true}}),
    );
}

#[test]
fn test_make_array_wraps_value() {
    let mut t = tree(json!({"output": {"host": "h1"}}));
    Rule::make_array("output.host", "output.hosts")
        .apply(&mut t)
        .unwrap();
    assert_eq!(t.lookup("output.hosts"), Some(json!(["h1"])));
}

#[test]
fn test_remove_requires_a_mapping_parent() {
    let mut t = tree(json!({"xs": [1, 2], "s": "scalar"}));
    let err = Rule::remove("xs.0.k").apply(&mut t).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuleFailed);
    let err = Rule::remove("s.k").apply(&mut t).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuleFailed);
}

#[test]
fn test_remove_deletes_the_entry() {
    let mut t = tree(json!({"a": {"b": 1, "c": 2}}));
    Rule::remove("a.b").apply(&mut t).unwrap();
    assert_materializes(&t, json!({"a": {"c": 2}}));
    // removing again is a no-op
    Rule::remove("a.b").apply(&mut t).unwrap();
    assert_materializes(&t, json!({"a": {"c": 2}}));
}

#[test]
fn test_rule_list_applies_in_order_and_aborts_on_failure() {
    let mut t = tree(json!({"outputs": {"default": {"type": "es"}}}));
    let rules = RuleList::new(vec![
        Rule::copy("outputs.default", "output"),
        Rule::rename("outputs.default", "es"),
        // map over a mapping: fails, aborting before the final rename
        Rule::map("output", RuleList::default()),
        Rule::rename("output", "never_applied"),
    ]);
    let err = rules.apply(&mut t).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuleFailed);
    assert_eq!(t.lookup("outputs.es.type"), Some(json!("es")));
    assert!(t.lookup("never_applied").is_none());
}

#[test]
fn test_pipeline_rules_then_apply() {
    // a small end-to-end: rewrite, then substitute and prune
    let vars = common::vars_with("env", json!({"monitoring": true, "host": "h1"}));
    let mut t = tree(json!({
        "outputs": {"default": {"type": "es", "hosts": "${env.host}"}},
        "monitoring": {"condition": "env.monitoring == true", "enabled": true},
        "extra": {"dropped": 1},
    }));
    RuleList::new(vec![
        Rule::rename("outputs.default", "es"),
        Rule::filter(["outputs", "monitoring"]),
    ])
    .apply(&mut t)
    .unwrap();
    let applied = t.apply(&vars).unwrap();
    assert_materializes(
        &applied,
        json!({
            "monitoring": {"enabled": true},
            "outputs": {"es": {"type": "es", "hosts": "h1"}},
        }),
    );
}
