//! Scanning and substitution of `${...}` variable references.

use crate::errors::{Result, TrellisError};
use crate::node::Node;
use crate::vars::Vars;

/// One piece of a scanned string: literal text or a reference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Text(String),
    Reference(Reference),
}

/// A delimited reference: one or more alternatives tried left to right.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reference {
    pub(crate) alternatives: Vec<Alternative>,
    /// The raw `${...}` text, kept for error messages.
    pub(crate) text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Alternative {
    /// A dotted provider path.
    Path(String),
    /// A quoted literal; always resolves.
    Literal(String),
}

/// Scan a string into text and reference segments. `$$` escapes `$`.
pub(crate) fn parse_segments(input: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            text.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                text.push('$');
            }
            Some('{') => {
                chars.next();
                let mut body = String::new();
                let mut quote: Option<char> = None;
                let mut closed = false;
                for c2 in chars.by_ref() {
                    match quote {
                        Some(q) if c2 == q => {
                            quote = None;
                            body.push(c2);
                        }
                        Some(_) => body.push(c2),
                        None if c2 == '\'' || c2 == '"' => {
                            quote = Some(c2);
                            body.push(c2);
                        }
                        None if c2 == '}' => {
                            closed = true;
                            break;
                        }
                        None => body.push(c2),
                    }
                }
                if !closed {
                    return Err(TrellisError::BadReference {
                        value: input.to_string(),
                        reason: "unterminated variable reference".to_string(),
                    });
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Reference(parse_reference(&body, input)?));
            }
            _ => text.push('$'),
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn parse_reference(body: &str, input: &str) -> Result<Reference> {
    let bad = |reason: &str| TrellisError::BadReference {
        value: input.to_string(),
        reason: reason.to_string(),
    };

    // split on '|' outside quotes
    let mut raw_alternatives = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in body.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == '|' => raw_alternatives.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }
    raw_alternatives.push(current);
    if quote.is_some() {
        return Err(bad("unterminated string literal"));
    }

    let mut alternatives = Vec::with_capacity(raw_alternatives.len());
    for raw in &raw_alternatives {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(bad("empty alternative"));
        }
        let first = trimmed.chars().next();
        if let Some(q @ ('\'' | '"')) = first {
            let inner = &trimmed[1..];
            let Some(literal) = inner.strip_suffix(q) else {
                return Err(bad("unterminated string literal"));
            };
            if literal.contains(q) {
                return Err(bad("text after string literal"));
            }
            alternatives.push(Alternative::Literal(literal.to_string()));
            continue;
        }
        if trimmed.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
            return Err(bad("invalid variable path"));
        }
        alternatives.push(Alternative::Path(trimmed.to_string()));
    }

    Ok(Reference {
        alternatives,
        text: format!("${{{body}}}"),
    })
}

/// Substitute every reference in `input` against the context.
pub(crate) fn replace(vars: &Vars, input: &str) -> Result<Node> {
    let segments = parse_segments(input)?;

    // a whole-string reference yields the resolved node verbatim
    if let [Segment::Reference(reference)] = segments.as_slice() {
        return match resolve_reference(vars, reference) {
            Some(node) => Ok(node),
            None => unresolved(vars, input, reference),
        };
    }

    let mut out = String::new();
    for segment in &segments {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Reference(reference) => match resolve_reference(vars, reference) {
                Some(node) => out.push_str(&node.to_string()),
                None => return unresolved(vars, input, reference),
            },
        }
    }
    Ok(Node::str(out))
}

fn resolve_reference(vars: &Vars, reference: &Reference) -> Option<Node> {
    for alternative in &reference.alternatives {
        match alternative {
            Alternative::Literal(s) => return Some(Node::str(s.clone())),
            Alternative::Path(path) => {
                if let Some(node) = vars.resolve_path(path) {
                    return Some(node);
                }
            }
        }
    }
    None
}

fn unresolved(vars: &Vars, input: &str, reference: &Reference) -> Result<Node> {
    if vars.is_best_effort() {
        tracing::debug!(reference = %reference.text, "unresolved reference kept as-is");
        return Ok(Node::str(input));
    }
    Err(TrellisError::MissingVariable {
        reference: reference.text.clone(),
    })
}

/// Collect the path alternatives of every reference in `input` without
/// resolving anything. Scan errors are ignored here; they resurface when the
/// string is actually substituted. Single-component paths are prefixed with
/// the default provider when one is set.
pub(crate) fn collect_references(input: &str, acc: &mut Vec<String>, default_provider: &str) {
    let Ok(segments) = parse_segments(input) else {
        return;
    };
    for segment in segments {
        if let Segment::Reference(reference) = segment {
            for alternative in reference.alternatives {
                if let Alternative::Path(path) = alternative {
                    if !path.contains('.') && !default_provider.is_empty() {
                        acc.push(format!("{default_provider}.{path}"));
                    } else {
                        acc.push(path);
                    }
                }
            }
        }
    }
}
