//! Trellis Core - typed, ordered, in-memory configuration tree
//!
//! This crate provides the configuration AST an agent supervisor uses to
//! normalize user-authored documents, together with the operators over it:
//! - a value model of mappings, sequences, keyed entries, and scalars, with
//!   attached processor lists
//! - deterministic fingerprints: a strong SHA-256 digest and a fast
//!   xxhash-64 used for equality
//! - a loader from native mappings with dotted-key explosion and canonical
//!   key ordering, and a visitor that materializes trees back
//! - a variable engine resolving `${...}` references through named
//!   providers, with condition keys that prune sub-trees
//! - a rule engine of composable declarative transforms (copy, rename,
//!   filter, and friends)
//!
//! Trees are values: single-writer, no internal locking, cloned for
//! handoff between threads.

pub mod errors;
pub mod logging;
pub mod node;
pub mod rules;
pub mod tree;
pub mod vars;
pub mod visitor;

mod loader;

// Re-export commonly used types
pub use errors::{ErrorKind, Result, TrellisError};
pub use node::{
    BoolVal, Dict, FloatVal, IntVal, Key, List, Node, Processors, StrVal, UIntVal, CONDITION_KEY,
};
pub use rules::{Rule, RuleList};
pub use tree::{Selector, Tree};
pub use vars::{MapProvider, Provider, Vars};
pub use visitor::{accept, DictVisitor, ListVisitor, MapDictVisitor, MapListVisitor, MapVisitor, Visitor};
