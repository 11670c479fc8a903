//! WDL workflow conversion.
//!
//! A workflow body is processed in source order: declarations populate the
//! workflow's input ports and file-variable set, calls become steps wired
//! against already-converted tool signatures, scatter blocks become fanned-out
//! steps, and the output section (or its absence) determines the workflow's
//! output ports. Cross-step references resolve through the name resolution
//! table, which maps `stepId.portId` to the fully qualified source reference.

use crate::ast::{pick, NonTerminal, SyntaxNode};
use crate::convert::expr::{translate, Effects, JsExpr, Scope};
use crate::convert::types::map_type;
use crate::convert::NodeKind;
use crate::cwl::{
    add_requirement, ExpressionToolArtifact, Parameter, Requirement, ScatterMethod, Step,
    StepInput, StepOutput, ToolSignature, TypeDescriptor, WorkflowDocument, WorkflowOutput,
};
use crate::error::{ConvertError, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

/// The scatter block a call appears inside: the scatter variable and the
/// already-resolved source reference of the scattered collection.
#[derive(Debug, Clone)]
struct ScatterContext {
    var: String,
    collection_source: String,
}

struct WorkflowConverter<'a> {
    signatures: &'a IndexMap<String, ToolSignature>,
    doc: WorkflowDocument,
    /// NameResolutionTable: `stepId.portId` to `#workflowId/stepId/portId`.
    table: IndexMap<String, String>,
    file_vars: HashSet<String>,
    expression_tools: Vec<ExpressionToolArtifact>,
}

/// Convert one WDL workflow subtree into a workflow descriptor plus any
/// auxiliary expression-tool artifacts its lowerings required.
pub fn convert_workflow(
    workflow: &NonTerminal,
    signatures: &IndexMap<String, ToolSignature>,
) -> Result<(WorkflowDocument, Vec<ExpressionToolArtifact>)> {
    let id = workflow.attr_node("name")?.terminal_text()?;
    let mut converter = WorkflowConverter {
        signatures,
        doc: WorkflowDocument::new(id),
        table: IndexMap::new(),
        file_vars: HashSet::new(),
        expression_tools: Vec::new(),
    };

    for statement in pick(workflow, &["body", "statements"])?.children() {
        let statement = statement
            .as_non_terminal()
            .ok_or_else(|| ConvertError::unsupported("terminal workflow statement"))?;
        match NodeKind::of(statement)? {
            NodeKind::Call => {
                let step = converter.convert_call(statement, None)?;
                converter.doc.steps.push(step);
            }
            NodeKind::Declaration => converter.convert_declaration(statement)?,
            NodeKind::WorkflowOutputs => {
                converter.doc.outputs = converter.convert_outputs(statement)?;
            }
            NodeKind::Scatter => converter.convert_scatter(statement)?,
            other => {
                return Err(ConvertError::unsupported(format!(
                    "workflow statement {:?}",
                    other
                )))
            }
        }
    }

    // An empty output list is almost always an authoring omission: default to
    // propagating every step's outputs.
    if converter.doc.outputs.is_empty() {
        let expanded: Vec<WorkflowOutput> = converter
            .doc
            .steps
            .iter()
            .flat_map(|step| converter.expanded_outputs(step))
            .collect();
        converter.doc.outputs = expanded;
    }

    Ok((converter.doc, converter.expression_tools))
}

impl<'a> WorkflowConverter<'a> {
    /// Convert a call statement into a step. Task outputs are registered in
    /// the name resolution table, explicit input bindings are wired, and
    /// every unbound non-defaulted task input surfaces as a new workflow
    /// input named `stepId_portId`.
    fn convert_call(
        &mut self,
        call: &NonTerminal,
        scatter: Option<&ScatterContext>,
    ) -> Result<Step> {
        let signatures = self.signatures;
        let task_name = pick(call, &["task"])?
            .as_node()
            .ok_or_else(|| ConvertError::missing_attribute(&call.name, &["task"]))?
            .terminal_text()?
            .trim_start_matches('#');
        let step_id = match call.attr("alias").and_then(|v| v.as_node()) {
            Some(alias) => alias.terminal_text()?,
            None => task_name,
        };
        let signature = signatures
            .get(task_name)
            .ok_or_else(|| ConvertError::NoSuchTask {
                name: task_name.to_string(),
            })?;

        let mut step = Step::new(step_id, &format!("{}.cwl", task_name));
        for output in &signature.outputs {
            step.out.push(StepOutput {
                id: output.id.clone(),
            });
            let qualified = format!("{}.{}", step_id, output.id);
            self.table.insert(
                qualified.clone(),
                format!("#{}/{}/{}", self.doc.id, step_id, output.id),
            );
            if output.ty.is_file() {
                self.file_vars.insert(qualified);
            }
        }

        let mut scattered: Vec<String> = Vec::new();
        if let Some(body) = call.attr("body").and_then(|v| v.as_node()) {
            let body = body
                .as_non_terminal()
                .ok_or_else(|| ConvertError::unsupported("terminal call body"))?;
            for io in body.attr_list("io")?.iter() {
                let io = io
                    .as_non_terminal()
                    .ok_or_else(|| ConvertError::unsupported("terminal call input block"))?;
                for mapping in pick(io, &["map", "attributes"])?.children() {
                    let mapping = mapping
                        .as_non_terminal()
                        .ok_or_else(|| ConvertError::unsupported("terminal input mapping"))?;
                    self.convert_io_mapping(mapping, &mut step, scatter, &mut scattered)?;
                }
            }
        }

        for input in &signature.inputs {
            let bound = step.inputs.iter().any(|binding| binding.id == input.id);
            if bound || input.default.is_some() {
                continue;
            }
            let new_input = format!("{}_{}", step_id, input.id);
            self.doc
                .inputs
                .push(Parameter::new(&new_input, input.ty.clone()));
            step.inputs.push(StepInput {
                id: input.id.clone(),
                source: Some(new_input),
                value_from: None,
            });
        }

        if scatter.is_some() {
            step.scatter_method = (scattered.len() > 1).then_some(ScatterMethod::DotProduct);
            step.scatter = Some(scattered);
        }
        Ok(step)
    }

    /// Convert one explicit input binding of a call body.
    fn convert_io_mapping(
        &mut self,
        mapping: &NonTerminal,
        step: &mut Step,
        scatter: Option<&ScatterContext>,
        scattered: &mut Vec<String>,
    ) -> Result<()> {
        let target = mapping.attr_node("key")?.terminal_text()?;
        let value = mapping.attr_node("value")?;

        if let Some(context) = scatter {
            let scope = Scope {
                file_vars: &self.file_vars,
                in_expression: true,
                scatter_var: Some(&context.var),
            };
            let mut effects = Effects::default();
            let expr = translate(value, &scope, &mut effects)?;
            if expr.contains_self() {
                scattered.push(target.to_string());
                let value_from = match expr {
                    JsExpr::SelfRef => None,
                    other => Some(other.render_scripted()),
                };
                step.inputs.push(StepInput {
                    id: target.to_string(),
                    source: Some(context.collection_source.clone()),
                    value_from,
                });
                return Ok(());
            }
        }

        let binding = match value {
            SyntaxNode::Terminal(terminal)
                if terminal.kind == "string" || terminal.kind == "integer" =>
            {
                let scope = Scope::new(&self.file_vars, false);
                let mut effects = Effects::default();
                let literal = translate(value, &scope, &mut effects)?;
                StepInput {
                    id: target.to_string(),
                    source: None,
                    value_from: Some(literal.render_scripted()),
                }
            }
            SyntaxNode::Terminal(terminal) if terminal.kind == "identifier" => StepInput {
                id: target.to_string(),
                source: Some(self.resolve_name(&terminal.source_string)),
                value_from: None,
            },
            SyntaxNode::NonTerminal(nt) if NodeKind::of(nt)? == NodeKind::MemberAccess => {
                StepInput {
                    id: target.to_string(),
                    source: Some(self.resolve_member(nt)?),
                    value_from: None,
                }
            }
            other => {
                let scope = Scope::new(&self.file_vars, false);
                let mut effects = Effects::default();
                let expr = translate(other, &scope, &mut effects)?;
                StepInput {
                    id: target.to_string(),
                    source: None,
                    value_from: Some(expr.render_scripted()),
                }
            }
        };
        step.inputs.push(binding);
        Ok(())
    }

    /// Convert a workflow declaration: an input port, or (when initialized
    /// with `read_tsv`) an auxiliary expression-tool step.
    fn convert_declaration(&mut self, declaration: &NonTerminal) -> Result<()> {
        if NodeKind::of(declaration)? != NodeKind::Declaration {
            return Err(ConvertError::unsupported(format!(
                "expected a declaration, found '{}'",
                declaration.name
            )));
        }
        let id = declaration.attr_node("name")?.terminal_text()?;
        let ty = map_type(declaration.attr_node("type")?)?;

        let expression = match declaration.attr("expression").and_then(|v| v.as_node()) {
            None => {
                if ty.is_file() {
                    self.file_vars.insert(id.to_string());
                }
                self.doc.inputs.push(Parameter::new(id, ty));
                return Ok(());
            }
            Some(node) => node,
        };

        if let Some(params) = read_tsv_call(expression)? {
            return self.lower_read_tsv(id, &params);
        }

        let scope = Scope::new(&self.file_vars, true);
        let mut effects = Effects::default();
        let expr = translate(expression, &scope, &mut effects)?;
        let default = match &expr {
            JsExpr::Array(items) => items
                .iter()
                .map(JsExpr::as_literal)
                .collect::<Option<Vec<Value>>>()
                .map(Value::Array)
                .unwrap_or_else(|| Value::String(expr.render_scripted())),
            other => Value::String(other.render_scripted()),
        };
        let mut input = Parameter::new(id, ty);
        input.default = Some(default);
        self.doc.inputs.push(input);
        Ok(())
    }

    /// Lower `read_tsv(path)` into a step invoking the fixed tabular-reading
    /// expression tool, inserted at the front of the step list. Malformed
    /// calls are hard errors, not silent omissions.
    fn lower_read_tsv(&mut self, output_name: &str, params: &[SyntaxNode]) -> Result<()> {
        if params.len() != 1 {
            return Err(ConvertError::unsupported(format!(
                "read_tsv() expects exactly one argument, got {}",
                params.len()
            )));
        }
        let infile = self.resolve_reference(&params[0])?;

        let existing = self
            .doc
            .steps
            .iter()
            .filter(|step| step.id.starts_with("read_tsv"))
            .count();
        let step_id = format!("read_tsv_{}", existing + 1);

        let mut step = Step::new(&step_id, "read_tsv.cwl");
        step.inputs.push(StepInput {
            id: "infile".to_string(),
            source: Some(infile),
            value_from: None,
        });
        step.out.push(StepOutput {
            id: output_name.to_string(),
        });
        self.table.insert(
            output_name.to_string(),
            format!("#{}/{}/{}", self.doc.id, step_id, output_name),
        );
        self.doc.steps.insert(0, step);

        let mut substitutions = IndexMap::new();
        substitutions.insert("outputArray".to_string(), output_name.to_string());
        self.expression_tools.push(ExpressionToolArtifact {
            template: "read_tsv.cwl".to_string(),
            substitutions,
        });
        Ok(())
    }

    /// Convert a scatter block: every call inside becomes a scattered step,
    /// every declaration a workflow input.
    fn convert_scatter(&mut self, scatter: &NonTerminal) -> Result<()> {
        add_requirement(
            &mut self.doc.requirements,
            Requirement::ScatterFeatureRequirement,
        );
        add_requirement(
            &mut self.doc.requirements,
            Requirement::StepInputExpressionRequirement,
        );

        let var = pick(scatter, &["item", "var"])?
            .as_node()
            .ok_or_else(|| ConvertError::missing_attribute(&scatter.name, &["item"]))?
            .terminal_text()?
            .to_string();
        let collection = pick(scatter, &["collection", "expression"])?
            .as_node()
            .ok_or_else(|| ConvertError::missing_attribute(&scatter.name, &["collection"]))?;
        let context = ScatterContext {
            var,
            collection_source: self.resolve_reference(collection)?,
        };

        for statement in pick(scatter, &["body", "statements"])?.children() {
            let statement = statement
                .as_non_terminal()
                .ok_or_else(|| ConvertError::unsupported("terminal scatter statement"))?;
            match NodeKind::of(statement)? {
                NodeKind::Declaration => self.convert_declaration(statement)?,
                NodeKind::Call => {
                    let step = self.convert_call(statement, Some(&context))?;
                    self.doc.steps.push(step);
                }
                other => {
                    return Err(ConvertError::unsupported(format!(
                        "scatter statement {:?}",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    /// Convert the workflow output section.
    fn convert_outputs(&self, section: &NonTerminal) -> Result<Vec<WorkflowOutput>> {
        let mut outputs = Vec::new();
        for entry in section.attr_list("outputs")?.iter() {
            let entry = entry
                .as_non_terminal()
                .ok_or_else(|| ConvertError::unsupported("terminal workflow output"))?;
            match NodeKind::of(entry)? {
                NodeKind::WorkflowOutputDeclaration => {
                    let id = entry.attr_node("name")?.terminal_text()?;
                    let ty = map_type(entry.attr_node("type")?)?;
                    let source = self.resolve_reference(entry.attr_node("expression")?)?;
                    outputs.push(WorkflowOutput {
                        id: id.to_string(),
                        ty: Some(ty),
                        output_source: Some(source),
                    });
                }
                NodeKind::WorkflowOutputWildcard => {
                    let fqn = pick(entry, &["fqn"])?
                        .as_node()
                        .ok_or_else(|| ConvertError::missing_attribute(&entry.name, &["fqn"]))?
                        .terminal_text()?
                        .trim_start_matches('#');
                    if entry.attr("wildcard").is_some() {
                        // propagate every output of the referenced step
                        let step = self
                            .doc
                            .steps
                            .iter()
                            .find(|step| step.id == fqn)
                            .ok_or_else(|| {
                                ConvertError::unsupported(format!(
                                    "no step '{}' to propagate outputs from",
                                    fqn
                                ))
                            })?;
                        outputs.extend(self.expanded_outputs(step));
                    } else if let Some((step_id, port)) = fqn.split_once('.') {
                        let key = format!("{}.{}", step_id, port);
                        let source = self
                            .table
                            .get(&key)
                            .cloned()
                            .unwrap_or_else(|| format!("#{}/{}", step_id, port));
                        outputs.push(WorkflowOutput {
                            id: port.to_string(),
                            ty: None,
                            output_source: Some(source),
                        });
                    } else {
                        return Err(ConvertError::unsupported(format!(
                            "workflow output reference '{}'",
                            fqn
                        )));
                    }
                }
                other => {
                    return Err(ConvertError::unsupported(format!(
                        "workflow output entry {:?}",
                        other
                    )))
                }
            }
        }
        Ok(outputs)
    }

    /// One workflow output per step output, named `stepId_portId`. Types come
    /// from the tool signature (array-wrapped under scatter) and fall back to
    /// `Any` for steps not backed by a converted task.
    fn expanded_outputs(&self, step: &Step) -> Vec<WorkflowOutput> {
        let tool_name = step.run.trim_end_matches(".cwl");
        step.out
            .iter()
            .map(|output| {
                let ty = self
                    .signatures
                    .get(tool_name)
                    .and_then(|sig| sig.outputs.iter().find(|port| port.id == output.id))
                    .map(|port| port.ty.clone())
                    .unwrap_or_else(TypeDescriptor::any);
                let ty = if step.scatter.is_some() {
                    TypeDescriptor::array(ty)
                } else {
                    ty
                };
                WorkflowOutput {
                    id: format!("{}_{}", step.id, output.id),
                    ty: Some(ty),
                    output_source: Some(format!("#{}/{}", step.id, output.id)),
                }
            })
            .collect()
    }

    /// Resolve a bare name: a registered step output, otherwise a workflow
    /// input reference.
    fn resolve_name(&self, name: &str) -> String {
        self.table
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Resolve a reference node (identifier or qualified `step.port` member
    /// access) to a source reference string.
    fn resolve_reference(&self, node: &SyntaxNode) -> Result<String> {
        match node {
            SyntaxNode::Terminal(terminal)
                if terminal.kind == "identifier" || terminal.kind == "fqn" =>
            {
                let text = terminal.source_string.trim_start_matches('#');
                match text.split_once('.') {
                    Some((step_id, port)) => Ok(self.resolved_qualified(step_id, port)),
                    None => Ok(self.resolve_name(text)),
                }
            }
            SyntaxNode::NonTerminal(nt) if NodeKind::of(nt)? == NodeKind::MemberAccess => {
                self.resolve_member(nt)
            }
            SyntaxNode::Terminal(terminal) => Err(ConvertError::unsupported(format!(
                "terminal '{}' is not a reference",
                terminal.kind
            ))),
            SyntaxNode::NonTerminal(nt) => Err(ConvertError::unsupported(format!(
                "node kind '{}' is not a reference",
                nt.name
            ))),
        }
    }

    fn resolve_member(&self, nt: &NonTerminal) -> Result<String> {
        let file_vars = HashSet::new();
        let scope = Scope::new(&file_vars, false);
        let mut effects = Effects::default();
        let rendered = translate(&SyntaxNode::NonTerminal(nt.clone()), &scope, &mut effects)?
            .render();
        let key = rendered.replace('/', ".");
        Ok(self
            .table
            .get(&key)
            .cloned()
            .unwrap_or_else(|| format!("#{}", rendered)))
    }

    fn resolved_qualified(&self, step_id: &str, port: &str) -> String {
        let key = format!("{}.{}", step_id, port);
        self.table
            .get(&key)
            .cloned()
            .unwrap_or_else(|| format!("#{}/{}", step_id, port))
    }
}

/// If the expression is a whole `read_tsv(...)` call, its argument nodes.
fn read_tsv_call(expression: &SyntaxNode) -> Result<Option<Vec<SyntaxNode>>> {
    let nt = match expression.as_non_terminal() {
        Some(nt) if NodeKind::of(nt)? == NodeKind::FunctionCall => nt,
        _ => return Ok(None),
    };
    if nt.attr_node("name")?.terminal_text()? != "read_tsv" {
        return Ok(None);
    }
    Ok(Some(nt.attr_list("params")?.to_vec()))
}
