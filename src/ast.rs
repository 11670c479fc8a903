//! Parsed WDL syntax tree model and tree navigation.
//!
//! The WDL parser is an external collaborator: it hands the translator a
//! finished syntax tree, serialized as the parser's JSON AST dump. A tree is
//! polymorphic over terminals (token kind + source text) and nonterminals
//! (kind name + ordered attribute map, where an attribute holds a child node,
//! a sequence of child nodes, or nothing). The translator only ever reads the
//! tree; all navigation here is side-effect free.

use crate::error::{ConvertError, Result};
use indexmap::IndexMap;
use serde::Deserialize;

/// One node of the parsed syntax tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SyntaxNode {
    Terminal(Terminal),
    NonTerminal(NonTerminal),
}

/// A lexer token: the token kind (e.g. `identifier`, `string`, `cmd_part`)
/// and the raw source text it covers.
#[derive(Debug, Clone, Deserialize)]
pub struct Terminal {
    #[serde(rename = "str")]
    pub kind: String,
    pub source_string: String,
}

/// A grammar production: the production's kind name (e.g. `Task`, `Call`)
/// and its attributes in grammar order.
#[derive(Debug, Clone, Deserialize)]
pub struct NonTerminal {
    pub name: String,
    pub attributes: IndexMap<String, AttrValue>,
}

/// The value of one nonterminal attribute.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    One(SyntaxNode),
    Many(Vec<SyntaxNode>),
    Missing,
}

impl SyntaxNode {
    /// Deserialize a tree from the external parser's JSON dump.
    pub fn from_json(text: &str) -> Result<SyntaxNode> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn as_terminal(&self) -> Option<&Terminal> {
        match self {
            SyntaxNode::Terminal(t) => Some(t),
            SyntaxNode::NonTerminal(_) => None,
        }
    }

    pub fn as_non_terminal(&self) -> Option<&NonTerminal> {
        match self {
            SyntaxNode::Terminal(_) => None,
            SyntaxNode::NonTerminal(n) => Some(n),
        }
    }

    /// The source text of a terminal node; an error for nonterminals.
    pub fn terminal_text(&self) -> Result<&str> {
        match self {
            SyntaxNode::Terminal(t) => Ok(&t.source_string),
            SyntaxNode::NonTerminal(n) => Err(ConvertError::unsupported(format!(
                "expected a terminal, found '{}'",
                n.name
            ))),
        }
    }

    /// Build a terminal node (used by tests and tree fixtures).
    pub fn terminal(kind: &str, source_string: &str) -> SyntaxNode {
        SyntaxNode::Terminal(Terminal {
            kind: kind.to_string(),
            source_string: source_string.to_string(),
        })
    }

    /// Build a nonterminal node (used by tests and tree fixtures).
    pub fn node(name: &str, attributes: Vec<(&str, AttrValue)>) -> SyntaxNode {
        SyntaxNode::NonTerminal(NonTerminal {
            name: name.to_string(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
    }
}

impl NonTerminal {
    /// Look up an attribute by name. A present-but-null attribute reads the
    /// same as an absent one.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        match self.attributes.get(name) {
            Some(AttrValue::Missing) | None => None,
            Some(other) => Some(other),
        }
    }

    /// Look up an attribute expected to hold a single child node.
    pub fn attr_node(&self, name: &str) -> Result<&SyntaxNode> {
        match self.attr(name) {
            Some(AttrValue::One(node)) => Ok(node),
            _ => Err(ConvertError::missing_attribute(&self.name, &[name])),
        }
    }

    /// Look up an attribute expected to hold a sequence of child nodes.
    pub fn attr_list(&self, name: &str) -> Result<&[SyntaxNode]> {
        match self.attr(name) {
            Some(value) => Ok(value.children()),
            None => Err(ConvertError::missing_attribute(&self.name, &[name])),
        }
    }
}

impl AttrValue {
    /// View an attribute value uniformly as a slice of child nodes.
    pub fn children(&self) -> &[SyntaxNode] {
        match self {
            AttrValue::One(node) => std::slice::from_ref(node),
            AttrValue::Many(nodes) => nodes,
            AttrValue::Missing => &[],
        }
    }

    pub fn as_node(&self) -> Option<&SyntaxNode> {
        match self {
            AttrValue::One(node) => Some(node),
            _ => None,
        }
    }
}

/// Recursively collect every nonterminal of the given kind, depth-first,
/// preserving source order.
pub fn find<'a>(root: &'a SyntaxNode, kind: &str) -> Vec<&'a NonTerminal> {
    let mut found = Vec::new();
    collect(root, kind, &mut found);
    found
}

fn collect<'a>(node: &'a SyntaxNode, kind: &str, found: &mut Vec<&'a NonTerminal>) {
    if let SyntaxNode::NonTerminal(nt) = node {
        if nt.name == kind {
            found.push(nt);
        }
        for value in nt.attributes.values() {
            for child in value.children() {
                collect(child, kind, found);
            }
        }
    }
}

/// Pick the first present attribute among version-specific alternatives.
///
/// Minor WDL grammar versions rename some attributes; conversion code that
/// must work across versions goes through here instead of [`NonTerminal::attr`].
pub fn pick<'a>(node: &'a NonTerminal, candidates: &[&str]) -> Result<&'a AttrValue> {
    for name in candidates {
        if let Some(value) = node.attr(name) {
            return Ok(value);
        }
    }
    Err(ConvertError::missing_attribute(&node.name, candidates))
}
