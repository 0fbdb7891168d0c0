//! The configuration tree's value model.
//!
//! A [`Node`] is a tagged variant: mappings ([`Dict`]), sequences
//! ([`List`]), keyed entries ([`Key`], the only legal child of a mapping),
//! and five scalar cases. Every non-key node can carry an attached
//! processor list, contributed by the variable engine during substitution
//! and surfaced through [`Node::processors`].
//!
//! Two fingerprints are computed over the same canonical serialization: a
//! strong SHA-256 digest (containers digest the digests of their children,
//! scalars contribute their canonical bytes) and a fast 64-bit xxhash that
//! streams the canonical bytes flat. Both are bit-stable across runs and
//! hosts; sibling bytes are fed without delimiters, so hash equality is an
//! optimistic signal of logical equality for well-formed trees.

use std::cell::OnceCell;
use std::fmt;

use sha2::{Digest, Sha256};
use trellis_expr::Expression;
use xxhash_rust::xxh64::Xxh64;

use crate::errors::{Result, TrellisError};
use crate::vars::{collect_references, Vars};

/// The reserved key whose value gates its containing mapping.
///
/// A `condition` entry is evaluated during apply: `false` prunes the whole
/// mapping, `true` keeps it, and the entry itself is never emitted.
pub const CONDITION_KEY: &str = "condition";

/// An attached list of processors, carried through substitution so
/// downstream consumers can stitch processor pipelines.
pub type Processors = Vec<serde_json::Map<String, serde_json::Value>>;

/// One node of the configuration tree.
#[derive(Debug, Clone)]
pub enum Node {
    Dict(Dict),
    List(List),
    Key(Key),
    Str(StrVal),
    Int(IntVal),
    UInt(UIntVal),
    Float(FloatVal),
    Bool(BoolVal),
}

impl Node {
    /// Build a mapping node from its children (callers supply `Key` nodes).
    pub fn dict(nodes: Vec<Node>) -> Node {
        Node::Dict(Dict::new(nodes))
    }

    /// Build a sequence node.
    pub fn list(nodes: Vec<Node>) -> Node {
        Node::List(List::new(nodes))
    }

    /// Build a keyed entry; `None` is the absent value.
    pub fn key(name: impl Into<String>, value: Option<Node>) -> Node {
        Node::Key(Key::new(name.into(), value))
    }

    pub fn str(value: impl Into<String>) -> Node {
        Node::Str(StrVal::new(value))
    }

    pub fn int(value: i64) -> Node {
        Node::Int(IntVal::new(value))
    }

    pub fn uint(value: u64) -> Node {
        Node::UInt(UIntVal::new(value))
    }

    pub fn float(value: f64) -> Node {
        Node::Float(FloatVal::new(value))
    }

    pub fn bool(value: bool) -> Node {
        Node::Bool(BoolVal::new(value))
    }

    /// Human-readable variant name, used in error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Node::Dict(_) => "mapping",
            Node::List(_) => "sequence",
            Node::Key(_) => "keyed entry",
            Node::Str(_) => "string",
            Node::Int(_) => "integer",
            Node::UInt(_) => "unsigned integer",
            Node::Float(_) => "float",
            Node::Bool(_) => "boolean",
        }
    }

    /// Look up a named child.
    ///
    /// Mappings resolve `name` against their entries (returning the entry
    /// itself), keyed entries delegate to their container value, sequences
    /// parse `name` as a base-10 index, and scalars never match.
    pub fn find(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Dict(d) => d.find(name),
            Node::List(l) => l.find_index(name),
            Node::Key(k) => match k.value() {
                Some(v) if matches!(v, Node::Dict(_) | Node::List(_)) => v.find(name),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self {
            Node::Dict(d) => d.find_mut(name),
            Node::List(l) => l.find_index_mut(name),
            Node::Key(k) => match k.value_mut() {
                Some(v) if matches!(v, Node::Dict(_) | Node::List(_)) => v.find_mut(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// A shallow clone duplicates only container spines. Scalar payloads are
    /// plain owned values in this representation, so the result is
    /// observably identical to [`Clone::clone`]; the method exists for API
    /// parity and is covered by the hash-stability properties.
    pub fn shallow_clone(&self) -> Node {
        self.clone()
    }

    /// Strong hash: SHA-256 over the canonical serialization.
    ///
    /// Containers and keyed entries digest their children's hashes; scalars
    /// return their canonical bytes directly (so the result length varies by
    /// variant).
    pub fn hash(&self) -> Vec<u8> {
        match self {
            Node::Dict(d) => {
                let mut hasher = Sha256::new();
                for child in &d.nodes {
                    hasher.update(child.hash());
                }
                hasher.finalize().to_vec()
            }
            Node::List(l) => {
                let mut hasher = Sha256::new();
                for child in &l.nodes {
                    hasher.update(child.hash());
                }
                hasher.finalize().to_vec()
            }
            Node::Key(k) => {
                let mut hasher = Sha256::new();
                hasher.update(k.name.as_bytes());
                if let Some(value) = &k.value {
                    hasher.update(value.hash());
                }
                hasher.finalize().to_vec()
            }
            Node::Str(s) => s.value.as_bytes().to_vec(),
            Node::Int(i) => i.value.to_string().into_bytes(),
            Node::UInt(u) => u.value.to_string().into_bytes(),
            Node::Float(f) => canonical_float(f.value).into_bytes(),
            Node::Bool(b) => vec![u8::from(b.value)],
        }
    }

    /// Fast hash: stream the canonical serialization into an xxhash-64
    /// digest, flat, with no per-subtree nesting.
    pub fn hash64_with(&self, hasher: &mut Xxh64) {
        match self {
            Node::Dict(d) => {
                for child in &d.nodes {
                    child.hash64_with(hasher);
                }
            }
            Node::List(l) => {
                for child in &l.nodes {
                    child.hash64_with(hasher);
                }
            }
            Node::Key(k) => {
                hasher.update(k.name.as_bytes());
                if let Some(value) = &k.value {
                    value.hash64_with(hasher);
                }
            }
            Node::Str(s) => hasher.update(s.value.as_bytes()),
            Node::Int(i) => hasher.update(i.value.to_string().as_bytes()),
            Node::UInt(u) => hasher.update(u.value.to_string().as_bytes()),
            Node::Float(f) => hasher.update(canonical_float(f.value).as_bytes()),
            Node::Bool(b) => hasher.update(&[u8::from(b.value)]),
        }
    }

    /// Collect every variable reference found in string payloads,
    /// recursively, without resolving anything.
    pub fn vars(&self, acc: &mut Vec<String>, default_provider: &str) {
        match self {
            Node::Dict(d) => {
                for child in &d.nodes {
                    child.vars(acc, default_provider);
                }
            }
            Node::List(l) => {
                for child in &l.nodes {
                    child.vars(acc, default_provider);
                }
            }
            Node::Key(k) => {
                if let Some(value) = &k.value {
                    value.vars(acc, default_provider);
                }
            }
            Node::Str(s) => collect_references(&s.value, acc, default_provider),
            _ => {}
        }
    }

    /// Apply the variable context, returning the substituted node.
    ///
    /// `None` is the pruned sentinel: the whole node should be dropped
    /// (its mapping's condition evaluated to false). The original node is
    /// left untouched.
    pub fn apply(&self, vars: &Vars) -> Result<Option<Node>> {
        match self {
            Node::Str(s) => vars.replace(&s.value).map(Some),
            Node::Int(_) | Node::UInt(_) | Node::Float(_) | Node::Bool(_) => {
                Ok(Some(self.clone()))
            }
            Node::List(l) => {
                let mut nodes = Vec::with_capacity(l.nodes.len());
                for child in &l.nodes {
                    if let Some(node) = child.apply(vars)? {
                        nodes.push(node);
                    }
                }
                Ok(Some(Node::List(List::new(nodes))))
            }
            Node::Dict(d) => {
                let mut nodes = Vec::with_capacity(d.nodes.len());
                for child in &d.nodes {
                    let applied = match child.apply(vars)? {
                        Some(node) => node,
                        None => continue,
                    };
                    if let (Node::Key(original), Node::Key(new_key)) = (child, &applied) {
                        if original.name == CONDITION_KEY {
                            match new_key.value() {
                                Some(Node::Bool(b)) => {
                                    if !b.value {
                                        tracing::debug!("condition is false, pruning mapping");
                                        return Ok(None);
                                    }
                                    // condition held, but it is never emitted
                                    continue;
                                }
                                other => {
                                    return Err(TrellisError::ConditionValue {
                                        found: other.map_or("nothing", Node::variant_name),
                                    })
                                }
                            }
                        }
                    }
                    nodes.push(applied);
                }
                Ok(Some(Node::Dict(Dict::new(nodes))))
            }
            Node::Key(k) => k.apply(vars),
        }
    }

    /// First non-empty processor list attached anywhere in the subtree,
    /// preorder and shallow-first.
    pub fn processors(&self) -> &[serde_json::Map<String, serde_json::Value>] {
        match self {
            Node::Dict(d) => {
                if !d.processors.is_empty() {
                    return &d.processors;
                }
                first_child_processors(&d.nodes)
            }
            Node::List(l) => {
                if !l.processors.is_empty() {
                    return &l.processors;
                }
                first_child_processors(&l.nodes)
            }
            Node::Key(k) => k.value().map_or(&[], Node::processors),
            Node::Str(s) => &s.processors,
            Node::Int(i) => &i.processors,
            Node::UInt(u) => &u.processors,
            Node::Float(f) => &f.processors,
            Node::Bool(b) => &b.processors,
        }
    }

    /// Attach a processor list, replacing any existing one. Keyed entries do
    /// not carry processors themselves.
    pub(crate) fn set_processors(&mut self, processors: Processors) {
        match self {
            Node::Dict(d) => d.processors = processors,
            Node::List(l) => l.processors = processors,
            Node::Str(s) => s.processors = processors,
            Node::Int(i) => i.processors = processors,
            Node::UInt(u) => u.processors = processors,
            Node::Float(f) => f.processors = processors,
            Node::Bool(b) => b.processors = processors,
            Node::Key(_) => {}
        }
    }
}

fn first_child_processors(nodes: &[Node]) -> &[serde_json::Map<String, serde_json::Value>] {
    for child in nodes {
        let p = child.processors();
        if !p.is_empty() {
            return p;
        }
    }
    &[]
}

/// Canonical textual form for floats: Rust's shortest round-trip rendering,
/// used for both hash feeds and display splicing.
pub(crate) fn canonical_float(value: f64) -> String {
    value.to_string()
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Dict(d) => {
                for (i, child) in d.nodes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{{{child}}}")?;
                }
                Ok(())
            }
            Node::List(l) => {
                write!(f, "[")?;
                for (i, child) in l.nodes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, "]")
            }
            Node::Key(k) => match &k.value {
                Some(value) => write!(f, "{}:{}", k.name, value),
                None => write!(f, "{}:nil", k.name),
            },
            Node::Str(s) => write!(f, "{}", s.value),
            Node::Int(i) => write!(f, "{}", i.value),
            Node::UInt(u) => write!(f, "{}", u.value),
            Node::Float(v) => write!(f, "{}", canonical_float(v.value)),
            Node::Bool(b) => write!(f, "{}", if b.value { "true" } else { "false" }),
        }
    }
}

/// A mapping: an ordered collection of keyed entries.
///
/// Insertion order is preserved; structural inserts re-sort the entries by
/// name so equivalent trees serialize identically.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    nodes: Vec<Node>,
    processors: Processors,
}

impl Dict {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            processors: Vec::new(),
        }
    }

    pub fn with_processors(nodes: Vec<Node>, processors: Processors) -> Self {
        Self { nodes, processors }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    pub(crate) fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    /// Find the entry with the given name.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| matches!(n, Node::Key(k) if k.name == name))
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| matches!(n, Node::Key(k) if k.name == name))
    }

    /// Insert an entry, replacing any existing entry with the same name,
    /// then re-sort by name.
    pub(crate) fn insert_key(&mut self, key: Key) {
        self.nodes
            .retain(|n| !matches!(n, Node::Key(k) if k.name == key.name));
        self.nodes.push(Node::Key(key));
        self.sort();
    }

    /// Remove and return the entry with the given name.
    pub(crate) fn remove_key(&mut self, name: &str) -> Option<Key> {
        let idx = self
            .nodes
            .iter()
            .position(|n| matches!(n, Node::Key(k) if k.name == name))?;
        match self.nodes.remove(idx) {
            Node::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Retain only entries whose name passes the predicate.
    pub(crate) fn retain_keys(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.nodes
            .retain(|n| matches!(n, Node::Key(k) if keep(&k.name)));
    }

    pub(crate) fn sort(&mut self) {
        self.nodes.sort_by(|a, b| entry_name(a).cmp(entry_name(b)));
    }

    /// Get or create the child mapping stored under `name`. A non-mapping
    /// value already present at `name` is replaced.
    pub(crate) fn ensure_child_dict(&mut self, name: &str) -> &mut Dict {
        let is_dict = matches!(
            self.find(name),
            Some(Node::Key(k)) if matches!(k.value(), Some(Node::Dict(_))));
        if !is_dict {
            if self.find(name).is_some() {
                tracing::debug!(key = name, "replacing non-mapping value with a mapping");
            }
            self.insert_key(Key::new(name.to_string(), Some(Node::Dict(Dict::default()))));
        }
        for node in &mut self.nodes {
            if let Node::Key(k) = node {
                if k.name == name {
                    if let Some(Node::Dict(d)) = k.value_mut() {
                        return d;
                    }
                }
            }
        }
        unreachable!("entry was just inserted")
    }
}

fn entry_name(node: &Node) -> &str {
    match node {
        Node::Key(k) => &k.name,
        _ => "",
    }
}

/// A sequence of nodes; order is significant.
#[derive(Debug, Clone, Default)]
pub struct List {
    nodes: Vec<Node>,
    processors: Processors,
}

impl List {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            processors: Vec::new(),
        }
    }

    pub fn with_processors(nodes: Vec<Node>, processors: Processors) -> Self {
        Self { nodes, processors }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    /// Resolve `name` as a base-10 index; out of range is not found.
    pub fn find_index(&self, name: &str) -> Option<&Node> {
        let idx: usize = name.parse().ok()?;
        self.nodes.get(idx)
    }

    pub(crate) fn find_index_mut(&mut self, name: &str) -> Option<&mut Node> {
        let idx: usize = name.parse().ok()?;
        self.nodes.get_mut(idx)
    }
}

/// A named entry of a mapping, optionally gated by a compiled condition.
///
/// The compiled form of a `condition` string is memoized here so repeated
/// applies do not re-parse it. Apply returns fresh entries without touching
/// the cache on the copies.
#[derive(Debug, Clone)]
pub struct Key {
    name: String,
    value: Option<Box<Node>>,
    condition: OnceCell<Expression>,
}

impl Key {
    pub fn new(name: String, value: Option<Node>) -> Self {
        Self {
            name,
            value: value.map(Box::new),
            condition: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn value(&self) -> Option<&Node> {
        self.value.as_deref()
    }

    pub(crate) fn value_mut(&mut self) -> Option<&mut Node> {
        self.value.as_deref_mut()
    }

    pub(crate) fn set_value(&mut self, value: Option<Node>) {
        self.value = value.map(Box::new);
    }

    /// Take the entry's value, leaving it absent.
    pub(crate) fn take_value(&mut self) -> Option<Node> {
        self.value.take().map(|b| *b)
    }

    fn apply(&self, vars: &Vars) -> Result<Option<Node>> {
        let Some(value) = &self.value else {
            return Ok(Some(Node::Key(self.clone())));
        };
        if self.name == CONDITION_KEY {
            return match &**value {
                Node::Bool(_) => Ok(Some(Node::Key(self.clone()))),
                Node::Str(s) => {
                    let expr = match self.condition.get() {
                        Some(expr) => expr,
                        None => {
                            let compiled = trellis_expr::compile(&s.value).map_err(|e| {
                                TrellisError::InvalidCondition {
                                    source_text: s.value.clone(),
                                    reason: e.to_string(),
                                }
                            })?;
                            self.condition.get_or_init(|| compiled)
                        }
                    };
                    // conditions always evaluate strictly
                    let result =
                        expr.eval(vars, true)
                            .map_err(|e| TrellisError::ConditionEval {
                                source_text: s.value.clone(),
                                reason: e.to_string(),
                            })?;
                    Ok(Some(Node::key(self.name.clone(), Some(Node::bool(result)))))
                }
                other => Err(TrellisError::ConditionValue {
                    found: other.variant_name(),
                }),
            };
        }
        match value.apply(vars)? {
            Some(applied) => Ok(Some(Node::key(self.name.clone(), Some(applied)))),
            None => Ok(None),
        }
    }
}

/// A string value; may contain variable references.
#[derive(Debug, Clone)]
pub struct StrVal {
    value: String,
    processors: Processors,
}

impl StrVal {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            processors: Vec::new(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A signed 64-bit integer value.
#[derive(Debug, Clone)]
pub struct IntVal {
    value: i64,
    processors: Processors,
}

impl IntVal {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            processors: Vec::new(),
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

/// An unsigned 64-bit integer value.
#[derive(Debug, Clone)]
pub struct UIntVal {
    value: u64,
    processors: Processors,
}

impl UIntVal {
    pub fn new(value: u64) -> Self {
        Self {
            value,
            processors: Vec::new(),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

/// A 64-bit IEEE-754 value. Single-precision inputs widen on load.
#[derive(Debug, Clone)]
pub struct FloatVal {
    value: f64,
    processors: Processors,
}

impl FloatVal {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            processors: Vec::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// A boolean value.
#[derive(Debug, Clone)]
pub struct BoolVal {
    value: bool,
    processors: Processors,
}

impl BoolVal {
    pub fn new(value: bool) -> Self {
        Self {
            value,
            processors: Vec::new(),
        }
    }

    pub fn value(&self) -> bool {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dict() -> Node {
        Node::dict(vec![
            Node::key("a", Some(Node::int(1))),
            Node::key("b", Some(Node::str("x"))),
        ])
    }

    #[test]
    fn test_find_in_dict_and_list() {
        let dict = sample_dict();
        assert!(dict.find("a").is_some());
        assert!(dict.find("missing").is_none());

        let list = Node::list(vec![Node::int(10), Node::int(20)]);
        assert!(matches!(list.find("1"), Some(Node::Int(i)) if i.value() == 20));
        assert!(list.find("2").is_none());
        assert!(list.find("x").is_none());

        assert!(Node::int(1).find("anything").is_none());
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(sample_dict().to_string(), "{a:1},{b:x}");
        let list = Node::list(vec![Node::bool(true), Node::float(1.5)]);
        assert_eq!(list.to_string(), "[true,1.5]");
        assert_eq!(Node::key("k", None).to_string(), "k:nil");
    }

    #[test]
    fn test_scalar_hashes_are_canonical_bytes() {
        assert_eq!(Node::str("abc").hash(), b"abc".to_vec());
        assert_eq!(Node::int(-7).hash(), b"-7".to_vec());
        assert_eq!(Node::uint(7).hash(), b"7".to_vec());
        assert_eq!(Node::bool(true).hash(), vec![1u8]);
        assert_eq!(Node::bool(false).hash(), vec![0u8]);
        assert_eq!(Node::float(-1.0).hash(), b"-1".to_vec());
        assert_eq!(Node::float(3.14).hash(), b"3.14".to_vec());
    }

    #[test]
    fn test_clone_preserves_hash() {
        let node = sample_dict();
        assert_eq!(node.hash(), node.clone().hash());
        assert_eq!(node.hash(), node.shallow_clone().hash());
    }

    #[test]
    fn test_processors_shallow_first() {
        let mut inner = Node::str("v");
        let mut procs = Processors::new();
        let mut m = serde_json::Map::new();
        m.insert("add_fields".to_string(), serde_json::json!({"f": 1}));
        procs.push(m);
        inner.set_processors(procs.clone());

        let tree = Node::dict(vec![Node::key("k", Some(inner))]);
        assert_eq!(tree.processors(), procs.as_slice());

        let empty = sample_dict();
        assert!(empty.processors().is_empty());
    }
}
