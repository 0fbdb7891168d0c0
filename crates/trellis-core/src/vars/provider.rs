//! Provider interface and the canonical mapping-backed provider.

use crate::errors::Result;
use crate::node::{Node, Processors};
use crate::tree::Tree;

/// A named source of variable bindings.
pub trait Provider {
    /// The provider's registration name; path prefixes route to it.
    fn name(&self) -> &str;

    /// Fetch the node at `path` within this provider. An empty path
    /// addresses the provider root. `None` means not found.
    fn fetch(&self, path: &str) -> Option<Node>;

    /// Processors to attach to fetched nodes, for downstream pipelines.
    fn processors(&self) -> Processors {
        Vec::new()
    }
}

/// A provider backed by a native mapping, loaded once into a tree.
pub struct MapProvider {
    name: String,
    tree: Tree,
    processors: Processors,
}

impl MapProvider {
    /// Build a provider from a native mapping.
    pub fn new(name: impl Into<String>, map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            tree: Tree::from_map(map)?,
            processors: Vec::new(),
        })
    }

    /// Same, with processors to attach to every fetched node.
    pub fn with_processors(
        name: impl Into<String>,
        map: &serde_json::Map<String, serde_json::Value>,
        processors: Processors,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            tree: Tree::from_map(map)?,
            processors,
        })
    }
}

impl Provider for MapProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, path: &str) -> Option<Node> {
        let node = self.tree.lookup_node(path)?;
        match node {
            // a keyed entry resolves to its value; an absent value is a miss
            Node::Key(k) => k.value().cloned(),
            other => Some(other.clone()),
        }
    }

    fn processors(&self) -> Processors {
        self.processors.clone()
    }
}
