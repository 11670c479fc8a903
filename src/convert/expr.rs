//! WDL expression translation.
//!
//! A WDL expression subtree is translated into a [`JsExpr`], a structured
//! intermediate for the CWL JavaScript expression sublanguage. Rendering to
//! text happens only at the document boundary, so rewrites such as
//! scatter-variable substitution are structural rather than textual.
//!
//! Side effects an expression imposes on its surroundings (stdout capture,
//! file-content loading) are returned through an explicit [`Effects`] record
//! instead of being written into ambient state. `glob()` and `read_tsv()`
//! are not inline expressions: they are recognized here but only legal in the
//! positions where the task and workflow converters intercept them, and
//! translating them in any other position is an error.

use crate::ast::{NonTerminal, SyntaxNode, Terminal};
use crate::convert::NodeKind;
use crate::error::{ConvertError, Result};
use serde_json::Value;
use std::collections::HashSet;

/// Lexical context for expression translation.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Identifiers declared with WDL type `File` so far, in declaration
    /// order. Membership decides whether a reference needs a `.path` suffix.
    pub file_vars: &'a HashSet<String>,
    /// When set, identifiers resolve to `inputs.<name>` references; when
    /// clear, identifiers render as bare names (e.g. for qualified-reference
    /// keys).
    pub in_expression: bool,
    /// The enclosing scatter variable, if any; references to it become
    /// `self`.
    pub scatter_var: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn new(file_vars: &'a HashSet<String>, in_expression: bool) -> Self {
        Scope {
            file_vars,
            in_expression,
            scatter_var: None,
        }
    }

    fn raw(&self) -> Scope<'a> {
        Scope {
            in_expression: false,
            ..*self
        }
    }
}

/// Side effects collected while translating one expression.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    /// `stdout()` was called: the owning tool captures standard output.
    pub capture_stdout: bool,
    /// `read_int()`/`read_string()` was called: the owning output port needs
    /// file contents loaded.
    pub load_contents: bool,
}

/// Structured CWL expression intermediate.
#[derive(Debug, Clone, PartialEq)]
pub enum JsExpr {
    /// A bare identifier, outside of expression position.
    Ident(String),
    /// A reference to an input port, optionally through the file-path
    /// accessor.
    Input { name: String, path: bool },
    /// `self`
    SelfRef,
    /// `self[0]`, the captured-stdout reference.
    StdoutRef,
    Str(String),
    Int(String),
    Add(Box<JsExpr>, Box<JsExpr>),
    Mul(Box<JsExpr>, Box<JsExpr>),
    Index(Box<JsExpr>, Box<JsExpr>),
    /// Slash-delimited qualified reference (`lhs/rhs`).
    Member(Box<JsExpr>, Box<JsExpr>),
    Array(Vec<JsExpr>),
    Replace {
        value: Box<JsExpr>,
        pattern: Box<JsExpr>,
        replacement: Box<JsExpr>,
    },
    ParseInt(Box<JsExpr>),
    Contents(Box<JsExpr>),
}

impl JsExpr {
    /// Binding strength for infix rendering; operands weaker than their
    /// parent are parenthesized so the rendered JS keeps the tree's grouping.
    fn precedence(&self) -> u8 {
        match self {
            JsExpr::Add(..) => 1,
            JsExpr::Mul(..) => 2,
            _ => 3,
        }
    }

    fn render_operand(&self, min_precedence: u8) -> String {
        if self.precedence() < min_precedence {
            format!("({})", self.render())
        } else {
            self.render()
        }
    }

    pub fn render(&self) -> String {
        match self {
            JsExpr::Ident(name) => name.clone(),
            JsExpr::Input { name, path: false } => format!("inputs.{}", name),
            JsExpr::Input { name, path: true } => format!("inputs.{}.path", name),
            JsExpr::SelfRef => "self".to_string(),
            JsExpr::StdoutRef => "self[0]".to_string(),
            JsExpr::Str(text) => {
                format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
            }
            JsExpr::Int(text) => text.clone(),
            JsExpr::Add(lhs, rhs) => format!("{} + {}", lhs.render(), rhs.render()),
            JsExpr::Mul(lhs, rhs) => format!(
                "{} * {}",
                lhs.render_operand(2),
                rhs.render_operand(2)
            ),
            JsExpr::Index(base, index) => {
                format!("{}[{}]", base.render_operand(3), index.render())
            }
            JsExpr::Member(lhs, rhs) => format!("{}/{}", lhs.render(), rhs.render()),
            JsExpr::Array(items) => {
                let rendered: Vec<String> = items.iter().map(JsExpr::render).collect();
                format!("[{}]", rendered.join(", "))
            }
            JsExpr::Replace {
                value,
                pattern,
                replacement,
            } => format!(
                "{}.replace({}, {})",
                value.render(),
                pattern.render(),
                replacement.render()
            ),
            JsExpr::ParseInt(inner) => format!("parseInt({})", inner.render()),
            JsExpr::Contents(inner) => format!("{}.contents", inner.render()),
        }
    }

    /// Render wrapped as a CWL parameter reference / expression.
    pub fn render_scripted(&self) -> String {
        format!("$({})", self.render())
    }

    /// Whether any `self` reference occurs in the tree.
    pub fn contains_self(&self) -> bool {
        match self {
            JsExpr::SelfRef | JsExpr::StdoutRef => true,
            JsExpr::Ident(_) | JsExpr::Input { .. } | JsExpr::Str(_) | JsExpr::Int(_) => false,
            JsExpr::Add(lhs, rhs) | JsExpr::Mul(lhs, rhs) | JsExpr::Index(lhs, rhs)
            | JsExpr::Member(lhs, rhs) => lhs.contains_self() || rhs.contains_self(),
            JsExpr::Array(items) => items.iter().any(JsExpr::contains_self),
            JsExpr::Replace {
                value,
                pattern,
                replacement,
            } => {
                value.contains_self() || pattern.contains_self() || replacement.contains_self()
            }
            JsExpr::ParseInt(inner) | JsExpr::Contents(inner) => inner.contains_self(),
        }
    }

    /// A structural JSON value for literal expressions, if this is one.
    pub fn as_literal(&self) -> Option<Value> {
        match self {
            JsExpr::Str(text) => Some(Value::String(text.clone())),
            JsExpr::Int(text) => text.parse::<i64>().ok().map(Value::from),
            _ => None,
        }
    }
}

/// Translate one WDL expression subtree.
pub fn translate(node: &SyntaxNode, scope: &Scope, effects: &mut Effects) -> Result<JsExpr> {
    match node {
        SyntaxNode::Terminal(terminal) => translate_terminal(terminal, scope),
        SyntaxNode::NonTerminal(nt) => translate_non_terminal(nt, scope, effects),
    }
}

fn translate_terminal(terminal: &Terminal, scope: &Scope) -> Result<JsExpr> {
    let text = terminal.source_string.clone();
    match terminal.kind.as_str() {
        "string" => Ok(JsExpr::Str(text)),
        "integer" => Ok(JsExpr::Int(text)),
        "identifier" => {
            if scope.scatter_var == Some(text.as_str()) {
                Ok(JsExpr::SelfRef)
            } else if scope.in_expression {
                Ok(JsExpr::Input {
                    path: scope.file_vars.contains(&text),
                    name: text,
                })
            } else {
                Ok(JsExpr::Ident(text))
            }
        }
        other => Err(ConvertError::unsupported(format!(
            "terminal '{}' in expression position",
            other
        ))),
    }
}

fn translate_non_terminal(
    nt: &NonTerminal,
    scope: &Scope,
    effects: &mut Effects,
) -> Result<JsExpr> {
    match NodeKind::of(nt)? {
        NodeKind::Add => Ok(JsExpr::Add(
            Box::new(translate(nt.attr_node("lhs")?, scope, effects)?),
            Box::new(translate(nt.attr_node("rhs")?, scope, effects)?),
        )),
        NodeKind::Multiply => Ok(JsExpr::Mul(
            Box::new(translate(nt.attr_node("lhs")?, scope, effects)?),
            Box::new(translate(nt.attr_node("rhs")?, scope, effects)?),
        )),
        NodeKind::ArrayOrMapLookup => Ok(JsExpr::Index(
            Box::new(translate(nt.attr_node("lhs")?, scope, effects)?),
            Box::new(translate(nt.attr_node("rhs")?, scope, effects)?),
        )),
        NodeKind::MemberAccess => Ok(JsExpr::Member(
            Box::new(translate(nt.attr_node("lhs")?, scope, effects)?),
            // member names are port ids, never input references
            Box::new(translate(nt.attr_node("rhs")?, &scope.raw(), effects)?),
        )),
        NodeKind::ArrayLiteral => {
            let mut items = Vec::new();
            for item in nt.attr_list("values")? {
                items.push(translate(item, scope, effects)?);
            }
            Ok(JsExpr::Array(items))
        }
        NodeKind::FunctionCall => translate_function_call(nt, scope, effects),
        other => Err(ConvertError::unsupported(format!(
            "node kind {:?} in expression position",
            other
        ))),
    }
}

fn translate_function_call(
    nt: &NonTerminal,
    scope: &Scope,
    effects: &mut Effects,
) -> Result<JsExpr> {
    let name = nt.attr_node("name")?.terminal_text()?;
    let params = nt.attr_list("params").unwrap_or(&[]);

    match name {
        "stdout" => {
            effects.capture_stdout = true;
            Ok(JsExpr::StdoutRef)
        }
        "read_int" => {
            effects.load_contents = true;
            let arg = single_param(nt, params, name)?;
            let inner = translate(arg, scope, effects)?;
            Ok(JsExpr::ParseInt(Box::new(JsExpr::Contents(Box::new(inner)))))
        }
        "read_string" => {
            effects.load_contents = true;
            let arg = single_param(nt, params, name)?;
            let inner = translate(arg, scope, effects)?;
            Ok(JsExpr::Contents(Box::new(inner)))
        }
        "sub" => {
            if params.len() != 3 {
                return Err(ConvertError::unsupported(format!(
                    "sub() expects 3 arguments, got {}",
                    params.len()
                )));
            }
            let in_expr = Scope {
                in_expression: true,
                ..*scope
            };
            Ok(JsExpr::Replace {
                value: Box::new(translate(&params[0], &in_expr, effects)?),
                pattern: Box::new(translate(&params[1], &scope.raw(), effects)?),
                replacement: Box::new(translate(&params[2], &scope.raw(), effects)?),
            })
        }
        "glob" => Err(ConvertError::unsupported(
            "glob() is only supported as a whole task output expression",
        )),
        "read_tsv" => Err(ConvertError::unsupported(
            "read_tsv() is only supported as a workflow declaration initializer",
        )),
        other => Err(ConvertError::unsupported(format!(
            "unknown function '{}'",
            other
        ))),
    }
}

fn single_param<'a>(
    nt: &NonTerminal,
    params: &'a [SyntaxNode],
    name: &str,
) -> Result<&'a SyntaxNode> {
    params.first().ok_or_else(|| {
        ConvertError::unsupported(format!("{}() in '{}' expects one argument", name, nt.name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AttrValue;

    fn ident(name: &str) -> SyntaxNode {
        SyntaxNode::terminal("identifier", name)
    }

    fn binary(kind: &str, lhs: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
        SyntaxNode::node(
            kind,
            vec![("lhs", AttrValue::One(lhs)), ("rhs", AttrValue::One(rhs))],
        )
    }

    fn call(name: &str, params: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::node(
            "FunctionCall",
            vec![
                ("name", AttrValue::One(ident(name))),
                ("params", AttrValue::Many(params)),
            ],
        )
    }

    fn translate_str(node: &SyntaxNode, file_vars: &HashSet<String>) -> String {
        let scope = Scope::new(file_vars, true);
        let mut effects = Effects::default();
        translate(node, &scope, &mut effects).unwrap().render()
    }

    #[test]
    fn test_identifier_resolution_respects_file_vars() {
        let mut file_vars = HashSet::new();
        assert_eq!(translate_str(&ident("x"), &file_vars), "inputs.x");
        file_vars.insert("x".to_string());
        assert_eq!(translate_str(&ident("x"), &file_vars), "inputs.x.path");
        // outside expression position the identifier stays bare
        let scope = Scope::new(&file_vars, false);
        let mut effects = Effects::default();
        let expr = translate(&ident("x"), &scope, &mut effects).unwrap();
        assert_eq!(expr.render(), "x");
    }

    #[test]
    fn test_literals_and_operators() {
        let file_vars = HashSet::new();
        let sum = binary(
            "Add",
            SyntaxNode::terminal("integer", "1"),
            binary("Multiply", ident("n"), SyntaxNode::terminal("integer", "2")),
        );
        assert_eq!(translate_str(&sum, &file_vars), "1 + inputs.n * 2");
        let quoted = SyntaxNode::terminal("string", "out.txt");
        assert_eq!(translate_str(&quoted, &file_vars), "\"out.txt\"");
    }

    #[test]
    fn test_indexing_member_access_and_array_literal() {
        let file_vars = HashSet::new();
        let lookup = binary("ArrayOrMapLookup", ident("xs"), SyntaxNode::terminal("integer", "0"));
        assert_eq!(translate_str(&lookup, &file_vars), "inputs.xs[0]");

        let member = binary("MemberAccess", ident("step"), ident("out"));
        let scope = Scope::new(&file_vars, false);
        let mut effects = Effects::default();
        let expr = translate(&member, &scope, &mut effects).unwrap();
        assert_eq!(expr.render(), "step/out");

        let arr = SyntaxNode::node(
            "ArrayLiteral",
            vec![(
                "values",
                AttrValue::Many(vec![
                    SyntaxNode::terminal("integer", "1"),
                    SyntaxNode::terminal("integer", "2"),
                ]),
            )],
        );
        assert_eq!(translate_str(&arr, &file_vars), "[1, 2]");
    }

    #[test]
    fn test_stdout_and_read_functions_record_effects() {
        let file_vars = HashSet::new();
        let scope = Scope::new(&file_vars, true);

        let mut effects = Effects::default();
        let expr = translate(&call("stdout", vec![]), &scope, &mut effects).unwrap();
        assert_eq!(expr, JsExpr::StdoutRef);
        assert!(effects.capture_stdout);
        assert!(!effects.load_contents);

        let mut effects = Effects::default();
        let expr = translate(
            &call("read_int", vec![call("stdout", vec![])]),
            &scope,
            &mut effects,
        )
        .unwrap();
        assert_eq!(expr.render(), "parseInt(self[0].contents)");
        assert!(effects.capture_stdout);
        assert!(effects.load_contents);
    }

    #[test]
    fn test_sub_renders_string_replace() {
        let file_vars = HashSet::new();
        let expr = call(
            "sub",
            vec![
                ident("name"),
                SyntaxNode::terminal("string", "\\.txt$"),
                SyntaxNode::terminal("string", ".out"),
            ],
        );
        assert_eq!(
            translate_str(&expr, &file_vars),
            "inputs.name.replace(\"\\\\.txt$\", \".out\")"
        );
    }

    #[test]
    fn test_weaker_operands_are_parenthesized() {
        let file_vars = HashSet::new();
        let shifted = binary("Add", ident("k"), SyntaxNode::terminal("integer", "1"));
        let product = binary("Multiply", ident("n"), shifted.clone());
        assert_eq!(
            translate_str(&product, &file_vars),
            "inputs.n * (inputs.k + 1)"
        );

        let indexed = binary("ArrayOrMapLookup", shifted, SyntaxNode::terminal("integer", "0"));
        assert_eq!(translate_str(&indexed, &file_vars), "(inputs.k + 1)[0]");

        // a product operand of a sum needs no parentheses
        let sum = binary(
            "Add",
            binary("Multiply", ident("a"), ident("b")),
            ident("c"),
        );
        assert_eq!(
            translate_str(&sum, &file_vars),
            "inputs.a * inputs.b + inputs.c"
        );
    }

    #[test]
    fn test_string_literals_escape_quotes_and_backslashes() {
        let file_vars = HashSet::new();
        let quoted = SyntaxNode::terminal("string", "a\"b\\c");
        assert_eq!(translate_str(&quoted, &file_vars), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_scatter_variable_becomes_self() {
        let file_vars = HashSet::new();
        let scope = Scope {
            file_vars: &file_vars,
            in_expression: true,
            scatter_var: Some("i"),
        };
        let mut effects = Effects::default();
        let sum = binary("Add", ident("i"), SyntaxNode::terminal("integer", "1"));
        let expr = translate(&sum, &scope, &mut effects).unwrap();
        assert_eq!(expr.render(), "self + 1");
        assert!(expr.contains_self());
    }

    #[test]
    fn test_unknown_function_is_fatal() {
        let file_vars = HashSet::new();
        let scope = Scope::new(&file_vars, true);
        let mut effects = Effects::default();
        let err = translate(&call("range", vec![]), &scope, &mut effects).unwrap_err();
        assert!(err.to_string().contains("range"));
        // read_tsv is recognized but illegal in expression position
        let err = translate(&call("read_tsv", vec![ident("f")]), &scope, &mut effects)
            .unwrap_err();
        assert!(err.to_string().contains("read_tsv"));
    }
}
