//! Tree traversal through visitors, and the canonical map materializer.
//!
//! A [`Visitor`] consumes itself into an output per scalar, or into a
//! [`DictVisitor`] / [`ListVisitor`] for containers; container visitors hand
//! out fresh sub-visitors for their children and fold the children's outputs
//! back in. Traversal order is the node's child order, so materializing a
//! loaded tree yields mappings in ascending key order.

use serde_json::Value;

use crate::node::Node;

/// Per-variant entry points for a traversal.
pub trait Visitor {
    type Output;
    type DictV: DictVisitor<Output = Self::Output, Sub = Self::Sub>;
    type ListV: ListVisitor<Output = Self::Output, Sub = Self::Sub>;
    type Sub: Visitor<Output = Self::Output>;

    fn on_dict(self) -> Self::DictV;
    fn on_list(self) -> Self::ListV;
    fn on_str(self, value: &str) -> Self::Output;
    fn on_int(self, value: i64) -> Self::Output;
    fn on_uint(self, value: u64) -> Self::Output;
    fn on_float(self, value: f64) -> Self::Output;
    fn on_bool(self, value: bool) -> Self::Output;
    /// An absent value (a keyed entry with no payload).
    fn on_nil(self) -> Self::Output;
}

/// Builder for a mapping's output.
pub trait DictVisitor {
    type Output;
    type Sub: Visitor<Output = Self::Output>;

    /// Announce the next entry's name.
    fn on_key(&mut self, name: &str);
    /// A fresh visitor for the announced entry's value.
    fn visitor(&self) -> Self::Sub;
    /// Fold the announced entry's completed value back in.
    fn on_value(&mut self, value: Self::Output);
    fn on_complete(self) -> Self::Output;
}

/// Builder for a sequence's output.
pub trait ListVisitor {
    type Output;
    type Sub: Visitor<Output = Self::Output>;

    fn visitor(&self) -> Self::Sub;
    fn on_value(&mut self, value: Self::Output);
    fn on_complete(self) -> Self::Output;
}

/// Walk a node with the visitor and return the visitor's output.
pub fn accept<V>(node: &Node, visitor: V) -> V::Output
where
    V: Visitor,
    V::Sub: Visitor<Output = V::Output, Sub = V::Sub>,
{
    match node {
        Node::Dict(d) => {
            let mut dv = visitor.on_dict();
            for child in d.nodes() {
                if let Node::Key(k) = child {
                    dv.on_key(k.name());
                    let sub = dv.visitor();
                    let out = match k.value() {
                        Some(value) => accept(value, sub),
                        None => sub.on_nil(),
                    };
                    dv.on_value(out);
                }
            }
            dv.on_complete()
        }
        Node::List(l) => {
            let mut lv = visitor.on_list();
            for child in l.nodes() {
                let sub = lv.visitor();
                let out = accept(child, sub);
                lv.on_value(out);
            }
            lv.on_complete()
        }
        Node::Key(k) => match k.value() {
            Some(value) => accept(value, visitor),
            None => visitor.on_nil(),
        },
        Node::Str(s) => visitor.on_str(s.value()),
        Node::Int(i) => visitor.on_int(i.value()),
        Node::UInt(u) => visitor.on_uint(u.value()),
        Node::Float(f) => visitor.on_float(f.value()),
        Node::Bool(b) => visitor.on_bool(b.value()),
    }
}

/// The canonical visitor: rebuilds the native mapping form.
///
/// Container types mirror the variants; unsigned integers materialize as
/// u64 numbers, absent values as null. Non-finite floats have no native
/// representation and also materialize as null.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapVisitor;

impl Visitor for MapVisitor {
    type Output = Value;
    type DictV = MapDictVisitor;
    type ListV = MapListVisitor;
    type Sub = MapVisitor;

    fn on_dict(self) -> MapDictVisitor {
        MapDictVisitor {
            doc: serde_json::Map::new(),
            pending: None,
        }
    }

    fn on_list(self) -> MapListVisitor {
        MapListVisitor { items: Vec::new() }
    }

    fn on_str(self, value: &str) -> Value {
        Value::String(value.to_string())
    }

    fn on_int(self, value: i64) -> Value {
        Value::from(value)
    }

    fn on_uint(self, value: u64) -> Value {
        Value::from(value)
    }

    fn on_float(self, value: f64) -> Value {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    fn on_bool(self, value: bool) -> Value {
        Value::Bool(value)
    }

    fn on_nil(self) -> Value {
        Value::Null
    }
}

#[derive(Debug, Default)]
pub struct MapDictVisitor {
    doc: serde_json::Map<String, Value>,
    pending: Option<String>,
}

impl DictVisitor for MapDictVisitor {
    type Output = Value;
    type Sub = MapVisitor;

    fn on_key(&mut self, name: &str) {
        self.pending = Some(name.to_string());
    }

    fn visitor(&self) -> MapVisitor {
        MapVisitor
    }

    fn on_value(&mut self, value: Value) {
        if let Some(key) = self.pending.take() {
            self.doc.insert(key, value);
        }
    }

    fn on_complete(self) -> Value {
        Value::Object(self.doc)
    }
}

#[derive(Debug, Default)]
pub struct MapListVisitor {
    items: Vec<Value>,
}

impl ListVisitor for MapListVisitor {
    type Output = Value;
    type Sub = MapVisitor;

    fn visitor(&self) -> MapVisitor {
        MapVisitor
    }

    fn on_value(&mut self, value: Value) {
        self.items.push(value);
    }

    fn on_complete(self) -> Value {
        Value::Array(self.items)
    }
}
