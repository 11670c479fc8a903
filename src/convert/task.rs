//! WDL task conversion.
//!
//! A task becomes a CommandLineTool: declarations without an initializer
//! become input ports (File-typed ones join the file-variable set, in
//! declaration order), initialized declarations become defaulted inputs, the
//! runtime section maps onto Docker/Resource requirements, and each output
//! entry becomes an output port with a glob or eval binding derived from its
//! expression.

use crate::ast::{pick, NonTerminal, SyntaxNode};
use crate::convert::command::render_command;
use crate::convert::expr::{translate, Effects, JsExpr, Scope};
use crate::convert::types::map_type;
use crate::convert::NodeKind;
use crate::cwl::{
    add_requirement, CommandArgument, OutputBinding, Parameter, Requirement, ToolDocument,
    ToolOutput, STDOUT_SENTINEL,
};
use crate::error::{ConvertError, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Convert one WDL task subtree into a complete tool descriptor.
pub fn convert_task(task: &NonTerminal) -> Result<ToolDocument> {
    let id = task.attr_node("name")?.terminal_text()?;
    let mut tool = ToolDocument::new(id);
    let mut file_vars: HashSet<String> = HashSet::new();

    for declaration in pick(task, &["declarations", "inputs"])?.children() {
        let declaration = expect_declaration(declaration)?;
        if let Some(input) = convert_declaration(declaration, &mut file_vars)? {
            tool.inputs.push(input);
        }
    }

    for section in task.attr_list("sections")?.iter() {
        let section = section
            .as_non_terminal()
            .ok_or_else(|| ConvertError::unsupported("terminal task section"))?;
        match NodeKind::of(section)? {
            NodeKind::RawCommand => {
                let command = render_command(section.attr_list("parts")?, &file_vars)?;
                tool.arguments = vec![CommandArgument {
                    value_from: command,
                    shell_quote: false,
                }];
            }
            NodeKind::Outputs => convert_outputs(section, &mut tool, &file_vars)?,
            NodeKind::Runtime => convert_runtime(section, &mut tool)?,
            NodeKind::ParameterMeta => apply_parameter_meta(section, &mut tool)?,
            other => {
                return Err(ConvertError::unsupported(format!(
                    "task section {:?}",
                    other
                )))
            }
        }
    }

    Ok(tool)
}

fn expect_declaration(node: &SyntaxNode) -> Result<&NonTerminal> {
    let nt = node
        .as_non_terminal()
        .ok_or_else(|| ConvertError::unsupported("terminal in declaration list"))?;
    if NodeKind::of(nt)? != NodeKind::Declaration {
        return Err(ConvertError::unsupported(format!(
            "expected a declaration, found '{}'",
            nt.name
        )));
    }
    Ok(nt)
}

/// Convert one declaration into an input port.
///
/// Uninitialized declarations are plain inputs; a File-typed one is recorded
/// in `file_vars` so that later expressions referencing it pick up the
/// `.path` accessor. Initialized declarations carry a default: a structural
/// array for array literals of literals, otherwise a `$()`-wrapped scripted
/// expression.
pub fn convert_declaration(
    declaration: &NonTerminal,
    file_vars: &mut HashSet<String>,
) -> Result<Option<Parameter>> {
    let id = declaration.attr_node("name")?.terminal_text()?;
    let ty = map_type(declaration.attr_node("type")?)?;

    let expression = match declaration.attr("expression").and_then(|v| v.as_node()) {
        None => {
            if ty.is_file() {
                file_vars.insert(id.to_string());
            }
            return Ok(Some(Parameter::new(id, ty)));
        }
        Some(node) => node,
    };

    let scope = Scope::new(file_vars, true);
    let mut effects = Effects::default();
    let expr = translate(expression, &scope, &mut effects)?;
    let default = match structural_array(&expr) {
        Some(array) => array,
        None => Value::String(expr.render_scripted()),
    };

    let mut input = Parameter::new(id, ty);
    input.default = Some(default);
    Ok(Some(input))
}

/// An array literal whose elements are all literals, evaluated structurally.
fn structural_array(expr: &JsExpr) -> Option<Value> {
    match expr {
        JsExpr::Array(items) => items
            .iter()
            .map(JsExpr::as_literal)
            .collect::<Option<Vec<Value>>>()
            .map(Value::Array),
        _ => None,
    }
}

fn convert_outputs(section: &NonTerminal, tool: &mut ToolDocument, file_vars: &HashSet<String>) -> Result<()> {
    for entry in section.attr_list("attributes")?.iter() {
        let entry = entry
            .as_non_terminal()
            .ok_or_else(|| ConvertError::unsupported("terminal in output list"))?;
        let id = entry.attr_node("name")?.terminal_text()?;
        let ty = map_type(entry.attr_node("type")?)?;
        let expression = entry.attr_node("expression")?;

        let mut binding = OutputBinding::default();
        if let Some(patterns) = glob_call(expression)? {
            binding.glob = Some(glob_patterns(&patterns, file_vars)?);
        } else {
            let scope = Scope::new(file_vars, true);
            let mut effects = Effects::default();
            let expr = translate(expression, &scope, &mut effects)?;
            if effects.capture_stdout {
                tool.stdout = Some(STDOUT_SENTINEL.to_string());
                binding.glob = Some(Value::String(STDOUT_SENTINEL.to_string()));
            }
            if effects.load_contents {
                binding.load_contents = Some(true);
            }
            match &expr {
                // output is the whole captured result, no glob of its own
                JsExpr::SelfRef | JsExpr::StdoutRef => {}
                JsExpr::Str(text) => binding.glob = Some(Value::String(text.clone())),
                other if other.contains_self() => {
                    binding.output_eval = Some(expr.render_scripted());
                }
                _ => binding.glob = Some(Value::String(expr.render_scripted())),
            }
        }

        tool.outputs.push(ToolOutput {
            id: id.to_string(),
            ty,
            output_binding: binding,
        });
    }
    Ok(())
}

/// If the output expression is a whole `glob(...)` call, its argument nodes.
fn glob_call(expression: &SyntaxNode) -> Result<Option<Vec<SyntaxNode>>> {
    let nt = match expression.as_non_terminal() {
        Some(nt) if NodeKind::of(nt)? == NodeKind::FunctionCall => nt,
        _ => return Ok(None),
    };
    if nt.attr_node("name")?.terminal_text()? != "glob" {
        return Ok(None);
    }
    Ok(Some(nt.attr_list("params")?.to_vec()))
}

/// Translated, quote-stripped glob patterns, consumed directly by the
/// output binding.
fn glob_patterns(params: &[SyntaxNode], file_vars: &HashSet<String>) -> Result<Value> {
    let mut patterns = Vec::new();
    for param in params {
        let scope = Scope::new(file_vars, true);
        let mut effects = Effects::default();
        let pattern = match translate(param, &scope, &mut effects)? {
            JsExpr::Str(text) => text,
            other => other.render_scripted(),
        };
        patterns.push(Value::String(pattern));
    }
    Ok(Value::Array(patterns))
}

/// Map runtime-section entries onto requirements. `docker` and `memory` are
/// understood; anything else is ignored with a warning.
fn convert_runtime(section: &NonTerminal, tool: &mut ToolDocument) -> Result<()> {
    for entry in pick(section, &["map", "attributes"])?.children() {
        let entry = entry
            .as_non_terminal()
            .ok_or_else(|| ConvertError::unsupported("terminal in runtime section"))?;
        let key = entry.attr_node("key")?.terminal_text()?;
        match key {
            "docker" => {
                let image = runtime_value(entry.attr_node("value")?)?;
                add_requirement(
                    &mut tool.requirements,
                    Requirement::DockerRequirement { docker_pull: image },
                );
            }
            "memory" => {
                let memory = runtime_value(entry.attr_node("value")?)?;
                add_requirement(
                    &mut tool.requirements,
                    Requirement::ResourceRequirement { ram_min: memory },
                );
            }
            other => warn!(task = %tool.id, "runtime attribute '{}' is ignored", other),
        }
    }
    Ok(())
}

/// The literal text of a runtime value. A list of Docker images collapses to
/// its first entry, since a CWL DockerRequirement names a single image.
fn runtime_value(value: &SyntaxNode) -> Result<String> {
    match value {
        SyntaxNode::Terminal(terminal) => {
            Ok(terminal.source_string.trim_matches(['\'', '"']).to_string())
        }
        SyntaxNode::NonTerminal(nt) if NodeKind::of(nt)? == NodeKind::ArrayLiteral => {
            let first = nt
                .attr_list("values")?
                .first()
                .ok_or_else(|| ConvertError::unsupported("empty runtime value list"))?;
            runtime_value(first)
        }
        SyntaxNode::NonTerminal(nt) => Err(ConvertError::unsupported(format!(
            "runtime value of kind '{}'",
            nt.name
        ))),
    }
}

/// Copy parameter_meta entries onto matching inputs as `doc` strings.
fn apply_parameter_meta(section: &NonTerminal, tool: &mut ToolDocument) -> Result<()> {
    for entry in pick(section, &["map", "attributes"])?.children() {
        let entry = entry
            .as_non_terminal()
            .ok_or_else(|| ConvertError::unsupported("terminal in parameter_meta section"))?;
        let key = entry.attr_node("key")?.terminal_text()?;
        let value = entry.attr_node("value")?.terminal_text()?;
        if let Some(input) = tool.inputs.iter_mut().find(|input| input.id == key) {
            input.doc = Some(value.trim_matches(['\'', '"']).to_string());
        }
    }
    Ok(())
}
