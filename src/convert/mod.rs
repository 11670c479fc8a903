//! WDL-to-CWL conversion.
//!
//! The document driver walks a parsed source tree and converts every task
//! first, accumulating a name-to-signature table, then every workflow, which
//! consults that table to wire its calls. Conversion of one construct is a
//! pure function of its subtree plus the signature table; no I/O happens
//! here.

pub mod command;
pub mod expr;
pub mod task;
pub mod types;
pub mod workflow;

use crate::ast::{find, NonTerminal, SyntaxNode};
use crate::cwl::{CwlDocument, ExpressionToolArtifact, ToolSignature};
use crate::error::{ConvertError, Result};
use indexmap::IndexMap;
use tracing::warn;

/// Supported WDL grammar versions.
///
/// `draft-2` is the primary dialect. `1.0` is partially supported: the
/// draft-2 conversion rules are applied and [`crate::ast::pick`] absorbs the
/// attribute renames between the grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WdlVersion {
    Draft2,
    V1,
}

impl std::str::FromStr for WdlVersion {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft-2" => Ok(WdlVersion::Draft2),
            "1.0" => Ok(WdlVersion::V1),
            other => Err(ConvertError::unsupported(format!(
                "unknown WDL version '{}' (expected 'draft-2' or '1.0')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for WdlVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WdlVersion::Draft2 => write!(f, "draft-2"),
            WdlVersion::V1 => write!(f, "1.0"),
        }
    }
}

/// The closed set of WDL nonterminal kinds the translator understands.
///
/// Dispatch on node kinds goes through this enum so that adding a kind is a
/// compile-checked match-arm addition rather than a runtime lookup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Import,
    Task,
    Workflow,
    RawCommand,
    CommandParameter,
    Runtime,
    Outputs,
    Output,
    Type,
    OptionalType,
    Declaration,
    Call,
    CallBody,
    Inputs,
    IoMapping,
    Scatter,
    WorkflowOutputs,
    WorkflowOutputDeclaration,
    WorkflowOutputWildcard,
    ParameterMeta,
    FunctionCall,
    ArrayLiteral,
    Add,
    Multiply,
    ArrayOrMapLookup,
    MemberAccess,
}

impl NodeKind {
    pub fn from_name(name: &str) -> Result<NodeKind> {
        match name {
            "Document" => Ok(NodeKind::Document),
            "Import" => Ok(NodeKind::Import),
            "Task" => Ok(NodeKind::Task),
            "Workflow" => Ok(NodeKind::Workflow),
            "RawCommand" => Ok(NodeKind::RawCommand),
            "CommandParameter" => Ok(NodeKind::CommandParameter),
            "Runtime" => Ok(NodeKind::Runtime),
            "Outputs" => Ok(NodeKind::Outputs),
            "Output" => Ok(NodeKind::Output),
            "Type" => Ok(NodeKind::Type),
            "OptionalType" => Ok(NodeKind::OptionalType),
            "Declaration" => Ok(NodeKind::Declaration),
            "Call" => Ok(NodeKind::Call),
            "CallBody" => Ok(NodeKind::CallBody),
            "Inputs" => Ok(NodeKind::Inputs),
            "IOMapping" => Ok(NodeKind::IoMapping),
            "Scatter" => Ok(NodeKind::Scatter),
            "WorkflowOutputs" => Ok(NodeKind::WorkflowOutputs),
            "WorkflowOutputDeclaration" => Ok(NodeKind::WorkflowOutputDeclaration),
            "WorkflowOutputWildcard" => Ok(NodeKind::WorkflowOutputWildcard),
            "ParameterMeta" => Ok(NodeKind::ParameterMeta),
            "FunctionCall" => Ok(NodeKind::FunctionCall),
            "ArrayLiteral" => Ok(NodeKind::ArrayLiteral),
            "Add" => Ok(NodeKind::Add),
            "Multiply" => Ok(NodeKind::Multiply),
            "ArrayOrMapLookup" => Ok(NodeKind::ArrayOrMapLookup),
            "MemberAccess" => Ok(NodeKind::MemberAccess),
            other => Err(ConvertError::unsupported(format!(
                "unknown node kind '{}'",
                other
            ))),
        }
    }

    pub fn of(node: &NonTerminal) -> Result<NodeKind> {
        NodeKind::from_name(&node.name)
    }
}

/// Everything produced from one source file: one document per top-level WDL
/// construct, plus any auxiliary expression-tool artifacts they required.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub documents: Vec<CwlDocument>,
    pub expression_tools: Vec<ExpressionToolArtifact>,
}

/// Convert one parsed WDL document: tasks before workflows, since workflows
/// reference already-converted task signatures. Import statements fail the
/// whole document rather than being silently dropped.
pub fn convert_document(root: &SyntaxNode, version: WdlVersion) -> Result<ConvertedDocument> {
    if version == WdlVersion::V1 {
        warn!("WDL 1.0 support is partial; draft-2 conversion rules are applied");
    }

    if !find(root, "Import").is_empty() {
        return Err(ConvertError::unsupported(
            "import statements are not supported",
        ));
    }

    let mut documents = Vec::new();
    let mut expression_tools = Vec::new();
    let mut signatures: IndexMap<String, ToolSignature> = IndexMap::new();

    for task_node in find(root, "Task") {
        let tool = task::convert_task(task_node)?;
        signatures.insert(tool.id.clone(), tool.signature());
        documents.push(CwlDocument::Tool(tool));
    }

    for workflow_node in find(root, "Workflow") {
        let (workflow, artifacts) = workflow::convert_workflow(workflow_node, &signatures)?;
        documents.push(CwlDocument::Workflow(workflow));
        expression_tools.extend(artifacts);
    }

    Ok(ConvertedDocument {
        documents,
        expression_tools,
    })
}
