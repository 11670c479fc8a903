//! WDL command section rendering.
//!
//! The command section interleaves literal shell text with interpolated
//! expressions. A plain interpolation becomes an inline `$(...)` parameter
//! reference. A separator-joined array parameter (`${sep=german " " files}`)
//! cannot be expressed inline: it emits a preamble statement that joins the
//! array in JavaScript, and the whole command is then rebuilt as one
//! `${ ... return ... }` expression concatenating quoted literal fragments,
//! preamble variables, and the remaining parameter references. Either way the
//! result is a single shell-literal argument (shellQuote disabled).

use crate::ast::SyntaxNode;
use crate::convert::expr::{translate, Effects, Scope};
use crate::convert::NodeKind;
use crate::error::{ConvertError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\n\s*").unwrap());

enum Fragment {
    /// Verbatim shell text.
    Literal(String),
    /// Rendered JavaScript for one interpolated expression (without `$()`).
    Substituted(String),
    /// A separator-joined array parameter: the joining preamble statement and
    /// the variable it declares.
    Separated { preamble: String, var: String },
}

/// Render the ordered command parts into a single command template string.
pub fn render_command(parts: &[SyntaxNode], file_vars: &HashSet<String>) -> Result<String> {
    let mut fragments = Vec::new();
    for part in parts {
        fragments.push(render_part(part, file_vars)?);
    }

    let has_preamble = fragments
        .iter()
        .any(|f| matches!(f, Fragment::Separated { .. }));

    let rendered = if has_preamble {
        render_as_expression(&fragments)
    } else {
        render_inline(&fragments)
    };
    Ok(normalize(&rendered))
}

fn render_part(part: &SyntaxNode, file_vars: &HashSet<String>) -> Result<Fragment> {
    match part {
        SyntaxNode::Terminal(terminal) if terminal.kind == "cmd_part" => {
            Ok(Fragment::Literal(terminal.source_string.clone()))
        }
        SyntaxNode::Terminal(terminal) => Err(ConvertError::unsupported(format!(
            "terminal '{}' in command section",
            terminal.kind
        ))),
        SyntaxNode::NonTerminal(nt) => {
            if NodeKind::of(nt)? != NodeKind::CommandParameter {
                return Err(ConvertError::unsupported(format!(
                    "node kind '{}' in command section",
                    nt.name
                )));
            }
            if let Some(separator) = separator_option(nt)? {
                return separated_fragment(nt, &separator);
            }
            let scope = Scope::new(file_vars, true);
            let mut effects = Effects::default();
            let expr = translate(nt.attr_node("expr")?, &scope, &mut effects)?;
            Ok(Fragment::Substituted(expr.render()))
        }
    }
}

/// The `sep` option of a command parameter, if present.
fn separator_option(nt: &crate::ast::NonTerminal) -> Result<Option<String>> {
    let options = match nt.attr("attributes") {
        Some(value) => value.children(),
        None => return Ok(None),
    };
    for option in options {
        let option = option
            .as_non_terminal()
            .ok_or_else(|| ConvertError::unsupported("malformed command parameter option"))?;
        let key = option.attr_node("key")?.terminal_text()?;
        if key == "sep" {
            return Ok(Some(option.attr_node("value")?.terminal_text()?.to_string()));
        }
    }
    Ok(None)
}

fn separated_fragment(nt: &crate::ast::NonTerminal, separator: &str) -> Result<Fragment> {
    let parameter = nt.attr_node("expr")?.terminal_text()?.to_string();
    let var = format!("{}_separated", parameter);
    let preamble = format!(
        "var {var} = ''; \
         for (var i=0; i<inputs.{parameter}.length; i++){{ \
         {var} = {var} + inputs.{parameter}[i].path + '{separator}'; }} \
         {var} = {var}.replace(/{separator}$/, ''); "
    );
    Ok(Fragment::Separated { preamble, var })
}

/// Literal-plus-substitution concatenation, usable verbatim as a shell line.
fn render_inline(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        match fragment {
            Fragment::Literal(text) => out.push_str(text),
            Fragment::Substituted(js) => {
                out.push_str("$(");
                out.push_str(js);
                out.push(')');
            }
            Fragment::Separated { .. } => unreachable!("handled by render_as_expression"),
        }
    }
    out
}

/// One JavaScript function body: declare every preamble, then return the
/// concatenation of quoted literals, preamble variables, and parameter
/// references.
fn render_as_expression(fragments: &[Fragment]) -> String {
    let mut body = String::new();
    let mut tokens = Vec::new();
    for fragment in fragments {
        match fragment {
            Fragment::Literal(text) => {
                if !text.is_empty() {
                    tokens.push(format!("\"{}\"", text));
                }
            }
            Fragment::Substituted(js) => tokens.push(js.clone()),
            Fragment::Separated { preamble, var } => {
                body.push_str(preamble);
                tokens.push(var.clone());
            }
        }
    }
    format!("${{{}return {}}}", body, tokens.join(" + "))
}

/// Strip continuation-line backslashes and embedded newlines, trim ends.
fn normalize(command: &str) -> String {
    let stripped = CONTINUATION.replace_all(command, "");
    stripped.trim().replace('\n', "")
}
