//! The tree handle: a root node plus the operators that query, mutate,
//! fingerprint, and materialize it.
//!
//! A tree is a value, not a shared service. It is single-writer: `insert`
//! mutates in place, `apply` returns a new tree and leaves the source
//! untouched, and `clone` is the prescribed handoff between threads.

use serde_json::Value;
use xxhash_rust::xxh64::Xxh64;

use crate::errors::{Result, TrellisError};
use crate::loader;
use crate::node::{Dict, Key, Node};
use crate::vars::Vars;
use crate::visitor::{accept, MapVisitor, Visitor};

/// A dotted path addressing a position within a tree.
pub type Selector = String;

pub(crate) fn split_path(selector: &str) -> Vec<&str> {
    if selector.is_empty() {
        return Vec::new();
    }
    selector.split('.').collect()
}

/// A configuration tree. The root is conventionally a mapping.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Node,
}

impl Tree {
    /// Wrap an existing node as a tree root.
    pub fn new(root: Node) -> Tree {
        Tree { root }
    }

    /// Load a native mapping into a tree.
    ///
    /// Keys are processed in ascending lexicographic order and dotted keys
    /// are exploded into nested mappings; see the loader contract.
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Result<Tree> {
        Ok(Tree {
            root: loader::load_root(map)?,
        })
    }

    /// Load a native value that must be a mapping.
    ///
    /// # Errors
    /// `NotAMapping` when the value is anything else.
    pub fn from_value(value: &Value) -> Result<Tree> {
        match value {
            Value::Object(map) => Tree::from_map(map),
            other => Err(TrellisError::NotAMapping {
                found: value_type_name(other),
            }),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub(crate) fn into_root(self) -> Node {
        self.root
    }

    /// See [`Node::shallow_clone`].
    pub fn shallow_clone(&self) -> Tree {
        Tree {
            root: self.root.shallow_clone(),
        }
    }

    /// Strong hash of the whole tree.
    pub fn hash(&self) -> Vec<u8> {
        self.root.hash()
    }

    /// Strong hash as a hex string.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Feed the tree into an xxhash-64 digest.
    pub fn hash64_with(&self, hasher: &mut Xxh64) {
        self.root.hash64_with(hasher);
    }

    /// Fast structural fingerprint (xxhash-64, seed 0).
    pub fn fast_hash(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        self.root.hash64_with(&mut hasher);
        hasher.digest()
    }

    /// Two trees compare equal iff their fast hashes are equal.
    pub fn equal(&self, other: &Tree) -> bool {
        self.fast_hash() == other.fast_hash()
    }

    /// Resolve a selector to the addressed node. Mappings resolve entry
    /// names, sequences resolve base-10 indices. The returned node is the
    /// keyed entry itself when the terminal component names one.
    pub fn lookup_node(&self, selector: &str) -> Option<&Node> {
        let mut current = &self.root;
        for part in split_path(selector) {
            current = current.find(part)?;
        }
        Some(current)
    }

    pub(crate) fn lookup_node_mut(&mut self, selector: &str) -> Option<&mut Node> {
        let mut current = &mut self.root;
        for part in split_path(selector) {
            current = current.find_mut(part)?;
        }
        Some(current)
    }

    /// Resolve a selector and materialize the addressed value in native
    /// form (a keyed entry materializes its value).
    pub fn lookup(&self, selector: &str) -> Option<Value> {
        let node = self.lookup_node(selector)?;
        Some(accept(node, MapVisitor))
    }

    /// Insert a node at the selector position.
    ///
    /// Intermediate mappings are created as needed (each owning mapping is
    /// re-sorted by name after an insertion), and the value at the terminal
    /// keyed entry is replaced. Inserting a keyed entry grafts it into the
    /// terminal mapping, replacing any same-named entry.
    ///
    /// # Errors
    /// `BadSelector` kinds: walking through a scalar, addressing a sequence
    /// with a non-numeric or out-of-range component, or a terminal position
    /// that is not a keyed entry.
    pub fn insert(&mut self, node: Node, to: &str) -> Result<()> {
        let parts = split_path(to);
        if parts.is_empty() {
            return Err(TrellisError::InsertTarget {
                selector: to.to_string(),
                found: self.root.variant_name(),
            });
        }
        let mut current: &mut Node = &mut self.root;
        for part in parts {
            current = walk_step(current, part, to)?;
        }
        let Node::Key(key) = current else {
            return Err(TrellisError::InsertTarget {
                selector: to.to_string(),
                found: current.variant_name(),
            });
        };
        match node {
            container @ (Node::Dict(_) | Node::List(_)) => key.set_value(Some(container)),
            Node::Key(new_key) => match key.value_mut() {
                Some(Node::Dict(dict)) => dict.insert_key(new_key),
                _ => key.set_value(Some(Node::Dict(Dict::new(vec![Node::Key(new_key)])))),
            },
            scalar => key.set_value(Some(scalar)),
        }
        Ok(())
    }

    /// Apply the variable context, returning the substituted tree. A root
    /// pruned by its condition yields an empty mapping.
    pub fn apply(&self, vars: &Vars) -> Result<Tree> {
        match self.root.apply(vars)? {
            Some(root) => Ok(Tree { root }),
            None => Ok(Tree {
                root: Node::Dict(Dict::default()),
            }),
        }
    }

    /// Collect every variable reference in the tree without resolving.
    pub fn vars(&self, acc: &mut Vec<String>, default_provider: &str) {
        self.root.vars(acc, default_provider);
    }

    /// Materialize the tree back to a native mapping.
    ///
    /// # Errors
    /// `NotAMapping` when the root is not a mapping.
    pub fn to_map(&self) -> Result<serde_json::Map<String, Value>> {
        match accept(&self.root, MapVisitor) {
            Value::Object(map) => Ok(map),
            other => Err(TrellisError::NotAMapping {
                found: value_type_name(&other),
            }),
        }
    }

    /// Walk the tree with a visitor.
    pub fn accept<V>(&self, visitor: V) -> V::Output
    where
        V: Visitor,
        V::Sub: Visitor<Output = V::Output, Sub = V::Sub>,
    {
        accept(&self.root, visitor)
    }

    /// See [`Node::processors`].
    pub fn processors(&self) -> &[serde_json::Map<String, Value>] {
        self.root.processors()
    }
}

/// One step of an insert walk: descend into `part`, creating a keyed entry
/// with an empty mapping when the component does not exist yet.
fn walk_step<'a>(current: &'a mut Node, part: &str, selector: &str) -> Result<&'a mut Node> {
    if current.find(part).is_none() {
        match current {
            Node::Dict(dict) => {
                dict.insert_key(Key::new(part.to_string(), Some(Node::Dict(Dict::default()))));
            }
            Node::Key(key) => match key.value_mut() {
                Some(Node::Dict(dict)) => {
                    dict.insert_key(Key::new(part.to_string(), Some(Node::Dict(Dict::default()))));
                }
                Some(Node::List(_)) => {
                    return Err(TrellisError::ListIndex {
                        selector: selector.to_string(),
                        component: part.to_string(),
                    })
                }
                _ => {
                    return Err(TrellisError::NotACollection {
                        selector: selector.to_string(),
                        component: part.to_string(),
                        found: key.value().map_or("nothing", Node::variant_name),
                    })
                }
            },
            Node::List(_) => {
                return Err(TrellisError::ListIndex {
                    selector: selector.to_string(),
                    component: part.to_string(),
                })
            }
            other => {
                return Err(TrellisError::NotACollection {
                    selector: selector.to_string(),
                    component: part.to_string(),
                    found: other.variant_name(),
                })
            }
        }
    }
    current
        .find_mut(part)
        .ok_or_else(|| TrellisError::NotACollection {
            selector: selector.to_string(),
            component: part.to_string(),
            found: "nothing",
        })
}

pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> Tree {
        Tree::from_value(&value).unwrap()
    }

    #[test]
    fn test_from_value_requires_mapping() {
        let err = Tree::from_value(&json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::BadType);
    }

    #[test]
    fn test_lookup_through_dicts_and_lists() {
        let t = tree(json!({"a": {"b": [{"c": 1}, {"c": 2}]}}));
        assert_eq!(t.lookup("a.b.1.c"), Some(json!(2)));
        assert_eq!(t.lookup("a.b.5.c"), None);
        assert_eq!(t.lookup("a.missing"), None);
        assert_eq!(t.lookup("a"), Some(json!({"b": [{"c": 1}, {"c": 2}]})));
    }

    #[test]
    fn test_insert_creates_intermediate_mappings() {
        let mut t = tree(json!({}));
        t.insert(Node::int(1), "a.b.c").unwrap();
        assert_eq!(t.lookup("a.b.c"), Some(json!(1)));
    }

    #[test]
    fn test_insert_replaces_and_sorts() {
        let mut t = tree(json!({"z": 1, "a": 2}));
        t.insert(Node::str("new"), "m").unwrap();
        assert_eq!(
            t.to_map().unwrap(),
            json!({"a": 2, "m": "new", "z": 1})
                .as_object()
                .unwrap()
                .clone()
        );
        t.insert(Node::str("replaced"), "m").unwrap();
        assert_eq!(t.lookup("m"), Some(json!("replaced")));
    }

    #[test]
    fn test_insert_under_scalar_is_bad_selector() {
        let mut t = tree(json!({"a": 1}));
        let err = t.insert(Node::int(2), "a.b").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::BadSelector);
    }

    #[test]
    fn test_insert_into_list_by_non_numeric_component_fails() {
        let mut t = tree(json!({"xs": [1, 2]}));
        let err = t.insert(Node::int(3), "xs.head.y").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::BadSelector);
    }

    #[test]
    fn test_insert_at_terminal_list_index_fails() {
        // the terminal position must be a keyed entry, never a sequence slot
        let mut t = tree(json!({"xs": [1, 2]}));
        let err = t.insert(Node::int(3), "xs.0").unwrap_err();
        assert!(matches!(err, TrellisError::InsertTarget { .. }));
        assert_eq!(err.kind(), crate::errors::ErrorKind::BadSelector);
        // the tree is untouched
        assert_eq!(t.lookup("xs"), Some(json!([1, 2])));
    }

    #[test]
    fn test_equal_by_fast_hash() {
        let a = tree(json!({"a": {"b": 1}}));
        let b = tree(json!({"a.b": 1}));
        assert!(a.equal(&b));
        let c = tree(json!({"a": {"b": 2}}));
        assert!(!a.equal(&c));
    }
}
