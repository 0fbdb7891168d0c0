//! Declarative tree transforms.
//!
//! A [`Rule`] is one deterministic rewrite addressed by selectors; a
//! [`RuleList`] applies rules in order and aborts on the first failure.
//! Rules addressing an absent path are no-ops; rules meeting the wrong
//! variant at the addressed path fail with a `RuleFailed` error.

use std::collections::BTreeMap;

use regex::Regex;

use crate::errors::{Result, TrellisError};
use crate::node::{Dict, Key, List, Node};
use crate::tree::{split_path, Selector, Tree};

/// One declarative transform over a tree.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Deep-clone the sub-tree at `from` and insert it at `to`.
    Copy { from: Selector, to: Selector },
    /// Re-key the entry addressed by `from` to `new_name`.
    Rename { from: Selector, new_name: String },
    /// Replace a string value at `path` through a lookup table.
    Translate {
        path: Selector,
        table: BTreeMap<String, Node>,
    },
    /// Regex-substitute within a string value at `path`.
    TranslateWithRegex {
        path: Selector,
        pattern: Regex,
        replacement: String,
    },
    /// Apply sub-rules to every element of the sequence at `path`, each
    /// element viewed as its own tree root.
    Map { path: Selector, rules: RuleList },
    /// Retain only the named top-level keys of the root mapping.
    Filter { keys: Vec<String> },
    /// On the sequence at `path`, keep elements whose `key` child is a
    /// string equal to one of `values`.
    FilterValues {
        path: Selector,
        key: String,
        values: Vec<String>,
    },
    /// Merge name/value pairs into the `headers` sub-mapping of the mapping
    /// at `path`.
    InjectHeaders {
        path: Selector,
        headers: Vec<(String, String)>,
    },
    /// Collect the `key` child of every element of the sequence at `path`
    /// into a new sequence inserted at `to`.
    ExtractListItem {
        path: Selector,
        key: String,
        to: Selector,
    },
    /// Insert each default entry absent from the mapping at `path`.
    InsertDefaults {
        path: Selector,
        defaults: BTreeMap<String, Node>,
    },
    /// Wrap a clone of the node at `path` in a one-element sequence
    /// inserted at `to`.
    MakeArray { path: Selector, to: Selector },
    /// Delete the entry addressed by `path`.
    Remove { path: Selector },
}

impl Rule {
    pub fn copy(from: impl Into<String>, to: impl Into<String>) -> Rule {
        Rule::Copy {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn rename(from: impl Into<String>, new_name: impl Into<String>) -> Rule {
        Rule::Rename {
            from: from.into(),
            new_name: new_name.into(),
        }
    }

    pub fn translate(path: impl Into<String>, table: BTreeMap<String, Node>) -> Rule {
        Rule::Translate {
            path: path.into(),
            table,
        }
    }

    /// # Errors
    /// `RuleFailed` when the pattern is not a valid regex.
    pub fn translate_with_regex(
        path: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Rule> {
        let pattern = Regex::new(pattern).map_err(|e| TrellisError::RuleFailed {
            rule: "translate_with_regex",
            reason: e.to_string(),
        })?;
        Ok(Rule::TranslateWithRegex {
            path: path.into(),
            pattern,
            replacement: replacement.into(),
        })
    }

    pub fn map(path: impl Into<String>, rules: RuleList) -> Rule {
        Rule::Map {
            path: path.into(),
            rules,
        }
    }

    pub fn filter<I, S>(keys: I) -> Rule
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::Filter {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn filter_values<I, S>(path: impl Into<String>, key: impl Into<String>, values: I) -> Rule
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::FilterValues {
            path: path.into(),
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn inject_headers(path: impl Into<String>, headers: &[(&str, &str)]) -> Rule {
        Rule::InjectHeaders {
            path: path.into(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn extract_list_item(
        path: impl Into<String>,
        key: impl Into<String>,
        to: impl Into<String>,
    ) -> Rule {
        Rule::ExtractListItem {
            path: path.into(),
            key: key.into(),
            to: to.into(),
        }
    }

    pub fn insert_defaults(path: impl Into<String>, defaults: BTreeMap<String, Node>) -> Rule {
        Rule::InsertDefaults {
            path: path.into(),
            defaults,
        }
    }

    pub fn make_array(path: impl Into<String>, to: impl Into<String>) -> Rule {
        Rule::MakeArray {
            path: path.into(),
            to: to.into(),
        }
    }

    pub fn remove(path: impl Into<String>) -> Rule {
        Rule::Remove { path: path.into() }
    }

    /// The rule's name, used in logs and failure messages.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Copy { .. } => "copy",
            Rule::Rename { .. } => "rename",
            Rule::Translate { .. } => "translate",
            Rule::TranslateWithRegex { .. } => "translate_with_regex",
            Rule::Map { .. } => "map",
            Rule::Filter { .. } => "filter",
            Rule::FilterValues { .. } => "filter_values",
            Rule::InjectHeaders { .. } => "inject_headers",
            Rule::ExtractListItem { .. } => "extract_list_item",
            Rule::InsertDefaults { .. } => "insert_defaults",
            Rule::MakeArray { .. } => "make_array",
            Rule::Remove { .. } => "remove",
        }
    }

    /// Apply the rule in place.
    pub fn apply(&self, tree: &mut Tree) -> Result<()> {
        tracing::debug!(rule = self.name(), "applying rule");
        match self {
            Rule::Copy { from, to } => {
                let Some(node) = tree.lookup_node(from) else {
                    return Ok(());
                };
                let payload = match node {
                    Node::Key(k) => match k.value() {
                        Some(value) => value.clone(),
                        None => return Ok(()),
                    },
                    other => other.clone(),
                };
                tree.insert(payload, to)
            }

            Rule::Rename { from, new_name } => {
                let parts = split_path(from);
                let Some((leaf, ancestors)) = parts.split_last() else {
                    return Ok(());
                };
                let parent = ancestors.join(".");
                let Some(dict) = dict_at_mut(tree, &parent, "rename")? else {
                    return Ok(());
                };
                let Some(mut key) = dict.remove_key(leaf) else {
                    return Ok(());
                };
                key.set_name(new_name.clone());
                dict.insert_key(key);
                Ok(())
            }

            Rule::Translate { path, table } => {
                let Some(target) = value_at_mut(tree, path) else {
                    return Ok(());
                };
                let replacement = match &*target {
                    Node::Str(s) => table.get(s.value()).cloned(),
                    _ => None,
                };
                if let Some(node) = replacement {
                    *target = node;
                }
                Ok(())
            }

            Rule::TranslateWithRegex {
                path,
                pattern,
                replacement,
            } => {
                let Some(target) = value_at_mut(tree, path) else {
                    return Ok(());
                };
                let substituted = match &*target {
                    Node::Str(s) => {
                        let replaced = pattern.replace_all(s.value(), replacement.as_str());
                        if replaced != s.value() {
                            Some(replaced.into_owned())
                        } else {
                            None
                        }
                    }
                    _ => None,
                };
                if let Some(value) = substituted {
                    *target = Node::str(value);
                }
                Ok(())
            }

            Rule::Map { path, rules } => {
                let Some(list) = list_at_mut(tree, path, "map")? else {
                    return Ok(());
                };
                for element in list.nodes_mut().iter_mut() {
                    let node = std::mem::replace(element, Node::Dict(Dict::default()));
                    let mut sub = Tree::new(node);
                    rules.apply(&mut sub)?;
                    *element = sub.into_root();
                }
                Ok(())
            }

            Rule::Filter { keys } => {
                let Node::Dict(root) = tree.root_mut() else {
                    return Err(TrellisError::RuleFailed {
                        rule: "filter",
                        reason: "root is not a mapping".to_string(),
                    });
                };
                root.retain_keys(|name| keys.iter().any(|k| k == name));
                Ok(())
            }

            Rule::FilterValues { path, key, values } => {
                let Some(list) = list_at_mut(tree, path, "filter_values")? else {
                    return Ok(());
                };
                list.nodes_mut().retain(|element| match element.find(key) {
                    Some(Node::Key(k)) => matches!(
                        k.value(),
                        Some(Node::Str(s)) if values.iter().any(|v| v == s.value())),
                    _ => false,
                });
                Ok(())
            }

            Rule::InjectHeaders { path, headers } => {
                let Some(dict) = dict_at_mut(tree, path, "inject_headers")? else {
                    return Ok(());
                };
                let target = dict.ensure_child_dict("headers");
                for (name, value) in headers {
                    target.insert_key(Key::new(name.clone(), Some(Node::str(value.clone()))));
                }
                Ok(())
            }

            Rule::ExtractListItem { path, key, to } => {
                let Some(node) = tree.lookup_node(path) else {
                    return Ok(());
                };
                let list = list_view(node, path, "extract_list_item")?;
                let mut values = Vec::new();
                for element in list.nodes() {
                    if let Some(Node::Key(k)) = element.find(key) {
                        if let Some(value) = k.value() {
                            values.push(value.clone());
                        }
                    }
                }
                tree.insert(Node::list(values), to)
            }

            Rule::InsertDefaults { path, defaults } => {
                if tree.lookup_node(path).is_none() {
                    let nodes = defaults
                        .iter()
                        .map(|(name, value)| Node::key(name.clone(), Some(value.clone())))
                        .collect();
                    return tree.insert(Node::Dict(Dict::new(nodes)), path);
                }
                let Some(dict) = dict_at_mut(tree, path, "insert_defaults")? else {
                    return Ok(());
                };
                for (name, value) in defaults {
                    if dict.find(name).is_none() {
                        dict.insert_key(Key::new(name.clone(), Some(value.clone())));
                    }
                }
                Ok(())
            }

            Rule::MakeArray { path, to } => {
                let Some(node) = tree.lookup_node(path) else {
                    return Ok(());
                };
                let value = match node {
                    Node::Key(k) => match k.value() {
                        Some(value) => value.clone(),
                        None => return Ok(()),
                    },
                    other => other.clone(),
                };
                tree.insert(Node::list(vec![value]), to)
            }

            Rule::Remove { path } => {
                let parts = split_path(path);
                let Some((leaf, ancestors)) = parts.split_last() else {
                    return Ok(());
                };
                let parent = ancestors.join(".");
                let Some(dict) = dict_at_mut(tree, &parent, "remove")? else {
                    return Ok(());
                };
                dict.remove_key(leaf);
                Ok(())
            }
        }
    }
}

/// An ordered sequence of rules; the first failure aborts the list.
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn apply(&self, tree: &mut Tree) -> Result<()> {
        for rule in &self.rules {
            rule.apply(tree)?;
        }
        Ok(())
    }
}

/// The mapping at `path`: the root for an empty path, otherwise the entry's
/// mapping value. Absent is `None`; a non-mapping is a rule failure.
fn dict_at_mut<'a>(
    tree: &'a mut Tree,
    path: &str,
    rule: &'static str,
) -> Result<Option<&'a mut Dict>> {
    let node = if path.is_empty() {
        tree.root_mut()
    } else {
        match tree.lookup_node_mut(path) {
            Some(node) => node,
            None => return Ok(None),
        }
    };
    match node {
        Node::Dict(d) => Ok(Some(d)),
        Node::Key(k) => match k.value_mut() {
            Some(Node::Dict(d)) => Ok(Some(d)),
            other => Err(TrellisError::RuleFailed {
                rule,
                reason: format!(
                    "expected a mapping at '{path}', found {}",
                    other.map_or("nothing", |n| n.variant_name())
                ),
            }),
        },
        other => Err(TrellisError::RuleFailed {
            rule,
            reason: format!("expected a mapping at '{path}', found {}", other.variant_name()),
        }),
    }
}

/// The sequence at `path`. Absent is `None`; a non-sequence is a rule failure.
fn list_at_mut<'a>(
    tree: &'a mut Tree,
    path: &str,
    rule: &'static str,
) -> Result<Option<&'a mut List>> {
    let Some(node) = tree.lookup_node_mut(path) else {
        return Ok(None);
    };
    match node {
        Node::List(l) => Ok(Some(l)),
        Node::Key(k) => match k.value_mut() {
            Some(Node::List(l)) => Ok(Some(l)),
            other => Err(TrellisError::RuleFailed {
                rule,
                reason: format!(
                    "expected a sequence at '{path}', found {}",
                    other.map_or("nothing", |n| n.variant_name())
                ),
            }),
        },
        other => Err(TrellisError::RuleFailed {
            rule,
            reason: format!(
                "expected a sequence at '{path}', found {}",
                other.variant_name()
            ),
        }),
    }
}

fn list_view<'a>(node: &'a Node, path: &str, rule: &'static str) -> Result<&'a List> {
    match node {
        Node::List(l) => Ok(l),
        Node::Key(k) => match k.value() {
            Some(Node::List(l)) => Ok(l),
            other => Err(TrellisError::RuleFailed {
                rule,
                reason: format!(
                    "expected a sequence at '{path}', found {}",
                    other.map_or("nothing", |n| n.variant_name())
                ),
            }),
        },
        other => Err(TrellisError::RuleFailed {
            rule,
            reason: format!(
                "expected a sequence at '{path}', found {}",
                other.variant_name()
            ),
        }),
    }
}

/// The value node addressed by `path` (a keyed entry resolves to its value).
fn value_at_mut<'a>(tree: &'a mut Tree, path: &str) -> Option<&'a mut Node> {
    match tree.lookup_node_mut(path)? {
        Node::Key(k) => k.value_mut(),
        other => Some(other),
    }
}
