//! Loading native mappings into trees.
//!
//! Keys are processed in ascending lexicographic order regardless of the
//! source iteration order, and every key containing `.` is exploded into
//! nested mappings, so `{"a.b.c": x}` and `{"a": {"b": {"c": x}}}` load into
//! equivalent trees. Each mapping ends up sorted by entry name, which makes
//! the canonical serialization of equivalent inputs byte-identical.

use serde_json::Value;

use crate::errors::Result;
use crate::node::{Dict, Key, Node};

/// Load a native mapping into a root node.
pub(crate) fn load_root(map: &serde_json::Map<String, Value>) -> Result<Node> {
    load_map(map)
}

fn load_map(map: &serde_json::Map<String, Value>) -> Result<Node> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by_key(|(name, _)| *name);

    let mut dict = Dict::default();
    for (name, value) in entries {
        let node = load_value(name, value)?;
        place(&mut dict, name, node)?;
    }
    Ok(Node::Dict(dict))
}

fn load_value(key: &str, value: &Value) -> Result<Option<Node>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(Node::bool(*b))),
        Value::String(s) => Ok(Some(Node::str(s.clone()))),
        Value::Number(n) => {
            // Signedness is not recorded in the native form: anything that
            // fits i64 loads signed, larger magnitudes stay unsigned.
            if let Some(i) = n.as_i64() {
                Ok(Some(Node::int(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Some(Node::uint(u)))
            } else if let Some(f) = n.as_f64() {
                Ok(Some(Node::float(f)))
            } else {
                Err(crate::errors::TrellisError::UnsupportedValue {
                    key: key.to_string(),
                })
            }
        }
        Value::Array(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            for item in items {
                match load_value(key, item)? {
                    Some(node) => nodes.push(node),
                    None => tracing::debug!(key, "dropping null sequence element"),
                }
            }
            Ok(Some(Node::list(nodes)))
        }
        Value::Object(m) => Ok(Some(load_map(m)?)),
    }
}

/// Deposit a loaded value under a possibly dotted key, materializing
/// intermediate mappings and re-using any existing prefix of the path.
fn place(root: &mut Dict, name: &str, value: Option<Node>) -> Result<()> {
    let components: Vec<&str> = name.split('.').collect();
    let Some((leaf, ancestors)) = components.split_last() else {
        return Ok(());
    };
    let mut current = root;
    for component in ancestors {
        current = current.ensure_child_dict(component);
    }
    deposit(current, leaf, value);
    Ok(())
}

fn deposit(dict: &mut Dict, name: &str, value: Option<Node>) {
    let target_is_dict = matches!(
        dict.find(name),
        Some(Node::Key(k)) if matches!(k.value(), Some(Node::Dict(_))));
    match value {
        // two mappings meeting on the same path merge, incoming entries win
        Some(Node::Dict(incoming)) if target_is_dict => {
            let target = dict.ensure_child_dict(name);
            for child in incoming.into_nodes() {
                if let Node::Key(key) = child {
                    target.insert_key(key);
                }
            }
        }
        other => dict.insert_key(Key::new(name.to_string(), other)),
    }
}
