//! Variable substitution over provider-supplied bindings.
//!
//! A [`Vars`] context holds an ordered list of named [`Provider`]s plus a
//! default provider name. String values may embed references of the form
//! `${path|other.path|'literal'}`: alternatives are tried left to right and
//! the first that resolves wins. A path whose first component names a
//! registered provider is fetched from that provider; any other path goes,
//! whole, to the default provider. `$$` escapes a literal `$`.
//!
//! By default an unresolved reference is an error; in best-effort mode the
//! containing string survives untouched. Conditions always evaluate
//! strictly regardless of the mode.

mod provider;
mod reference;

pub use provider::{MapProvider, Provider};

pub(crate) use reference::collect_references;

use crate::errors::Result;
use crate::node::Node;

/// The variable context consumed by apply.
pub struct Vars {
    providers: Vec<Box<dyn Provider>>,
    default_provider: String,
    best_effort: bool,
}

impl Vars {
    /// Build a context from an ordered provider list and a default provider
    /// name. When two providers share a name, the first registered wins.
    pub fn new(providers: Vec<Box<dyn Provider>>, default_provider: impl Into<String>) -> Self {
        let mut seen: Vec<String> = Vec::new();
        let mut unique: Vec<Box<dyn Provider>> = Vec::new();
        for provider in providers {
            let name = provider.name().to_string();
            if seen.contains(&name) {
                tracing::debug!(provider = %name, "ignoring duplicate provider registration");
                continue;
            }
            seen.push(name);
            unique.push(provider);
        }
        Self {
            providers: unique,
            default_provider: default_provider.into(),
            best_effort: false,
        }
    }

    /// An empty context: no providers, no default.
    pub fn empty() -> Self {
        Self::new(Vec::new(), "")
    }

    /// Switch to best-effort substitution: a missing variable leaves the
    /// containing string untouched instead of failing.
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub(crate) fn is_best_effort(&self) -> bool {
        self.best_effort
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    fn provider(&self, name: &str) -> Option<&dyn Provider> {
        if name.is_empty() {
            return None;
        }
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// Scan a string for variable references and substitute them.
    ///
    /// A string that consists of exactly one reference resolving to a
    /// non-string node yields that node verbatim, processors included;
    /// otherwise resolutions are stringified and spliced into the
    /// surrounding text.
    pub fn replace(&self, input: &str) -> Result<Node> {
        reference::replace(self, input)
    }

    /// Resolve a dotted path through the registered providers, attaching the
    /// supplying provider's processors to the fetched node.
    pub(crate) fn resolve_path(&self, path: &str) -> Option<Node> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (path, ""),
        };
        if let Some(provider) = self.provider(head) {
            return fetch_with_processors(provider, rest);
        }
        let provider = self.provider(&self.default_provider)?;
        fetch_with_processors(provider, path)
    }
}

fn fetch_with_processors(provider: &dyn Provider, path: &str) -> Option<Node> {
    let mut node = provider.fetch(path)?;
    let processors = provider.processors();
    if !processors.is_empty() && node.processors().is_empty() {
        node.set_processors(processors);
    }
    tracing::trace!(provider = provider.name(), path, "resolved variable path");
    Some(node)
}

impl trellis_expr::VarStore for Vars {
    fn lookup(&self, name: &str) -> Option<trellis_expr::Value> {
        let node = self.resolve_path(name)?;
        Some(scalar_value(&node))
    }
}

/// Condition evaluation sees scalars; container hits surface as null.
fn scalar_value(node: &Node) -> trellis_expr::Value {
    match node {
        Node::Str(s) => trellis_expr::Value::Str(s.value().to_string()),
        Node::Int(i) => trellis_expr::Value::Int(i.value()),
        Node::UInt(u) => i64::try_from(u.value())
            .map(trellis_expr::Value::Int)
            .unwrap_or(trellis_expr::Value::Float(u.value() as f64)),
        Node::Float(f) => trellis_expr::Value::Float(f.value()),
        Node::Bool(b) => trellis_expr::Value::Bool(b.value()),
        Node::Key(k) => k
            .value()
            .map(scalar_value)
            .unwrap_or(trellis_expr::Value::Null),
        Node::Dict(_) | Node::List(_) => trellis_expr::Value::Null,
    }
}
