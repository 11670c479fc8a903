//! CWL v1.0 document model.
//!
//! In-memory descriptors produced by the converters and handed to the
//! serializer. Each document is built during exactly one conversion pass over
//! one WDL task or workflow and is immutable afterward. Serialization relies
//! on `serde`; field declaration order is the emission order.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// CWL version stamped on every generated document.
pub const CWL_VERSION: &str = "v1.0";

/// Sentinel filename used when a tool captures its standard output.
pub const STDOUT_SENTINEL: &str = "__stdout";

/// A CWL type descriptor.
///
/// Invariants: an `Array` item is never itself wrapped in a redundant array
/// marker (the shorthand `item[]` form and the structured
/// `{type: array, items}` form are semantically equivalent and chosen at
/// rendering time), and `Optional` never wraps another `Optional`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Primitive(String),
    Array(Box<TypeDescriptor>),
    Optional(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn primitive(name: &str) -> Self {
        TypeDescriptor::Primitive(name.to_string())
    }

    /// The `Any` type, used where no more precise type is known.
    pub fn any() -> Self {
        TypeDescriptor::Primitive("Any".to_string())
    }

    pub fn array(item: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(item))
    }

    /// Wrap in an optional marker, collapsing `Optional(Optional(_))`.
    pub fn optional(inner: TypeDescriptor) -> Self {
        match inner {
            TypeDescriptor::Optional(_) => inner,
            other => TypeDescriptor::Optional(Box::new(other)),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, TypeDescriptor::Primitive(name) if name == "File")
    }

    /// Render to the JSON form embedded in CWL documents.
    ///
    /// Optionals are a lossy approximation of WDL's `?` semantics: an
    /// optional primitive widens to the `name?` union-with-null shorthand,
    /// and an optional array marks the item type nullable (`item[]?`) since
    /// the shorthand array form has no nullable-array spelling.
    pub fn to_cwl(&self) -> Value {
        match self {
            TypeDescriptor::Primitive(name) => Value::String(name.clone()),
            TypeDescriptor::Array(item) => match item.as_ref() {
                TypeDescriptor::Primitive(name) => Value::String(format!("{}[]", name)),
                other => serde_json::json!({"type": "array", "items": other.to_cwl()}),
            },
            TypeDescriptor::Optional(inner) => match inner.as_ref() {
                TypeDescriptor::Primitive(name) => Value::String(format!("{}?", name)),
                TypeDescriptor::Array(item) => match item.as_ref() {
                    TypeDescriptor::Primitive(name) => Value::String(format!("{}[]?", name)),
                    other => serde_json::json!({
                        "type": ["array", "null"],
                        "items": other.to_cwl()
                    }),
                },
                TypeDescriptor::Optional(_) => unreachable!("optional never wraps optional"),
            },
        }
    }
}

impl Serialize for TypeDescriptor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_cwl().serialize(serializer)
    }
}

/// A CWL process requirement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "class")]
pub enum Requirement {
    ShellCommandRequirement,
    InlineJavascriptRequirement,
    DockerRequirement {
        #[serde(rename = "dockerPull")]
        docker_pull: String,
    },
    ResourceRequirement {
        #[serde(rename = "ramMin")]
        ram_min: String,
    },
    ScatterFeatureRequirement,
    StepInputExpressionRequirement,
}

/// Append a requirement unless an equal one is already present.
pub fn add_requirement(requirements: &mut Vec<Requirement>, requirement: Requirement) {
    if !requirements.contains(&requirement) {
        requirements.push(requirement);
    }
}

/// An input port of a tool or workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Parameter {
    pub fn new(id: &str, ty: TypeDescriptor) -> Self {
        Parameter {
            id: id.to_string(),
            ty,
            default: None,
            doc: None,
        }
    }
}

/// How a tool output is collected after the command runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glob: Option<Value>,
    #[serde(rename = "loadContents", skip_serializing_if = "Option::is_none")]
    pub load_contents: Option<bool>,
    #[serde(rename = "outputEval", skip_serializing_if = "Option::is_none")]
    pub output_eval: Option<String>,
}

impl OutputBinding {
    pub fn is_empty(&self) -> bool {
        self.glob.is_none() && self.load_contents.is_none() && self.output_eval.is_none()
    }
}

/// An output port of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(
        rename = "outputBinding",
        skip_serializing_if = "OutputBinding::is_empty"
    )]
    pub output_binding: OutputBinding,
}

/// The tool's command line, rendered as a single shell-literal argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandArgument {
    #[serde(rename = "valueFrom")]
    pub value_from: String,
    #[serde(rename = "shellQuote")]
    pub shell_quote: bool,
}

/// A complete CommandLineTool descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDocument {
    pub id: String,
    pub class: String,
    #[serde(rename = "cwlVersion")]
    pub cwl_version: String,
    #[serde(rename = "baseCommand")]
    pub base_command: Vec<String>,
    pub requirements: Vec<Requirement>,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<ToolOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<CommandArgument>,
}

impl ToolDocument {
    pub fn new(id: &str) -> Self {
        ToolDocument {
            id: id.to_string(),
            class: "CommandLineTool".to_string(),
            cwl_version: CWL_VERSION.to_string(),
            base_command: Vec::new(),
            requirements: vec![
                Requirement::ShellCommandRequirement,
                Requirement::InlineJavascriptRequirement,
            ],
            inputs: Vec::new(),
            outputs: Vec::new(),
            stdout: None,
            arguments: Vec::new(),
        }
    }

    /// The read-only signature shared with every workflow conversion that
    /// calls this tool.
    pub fn signature(&self) -> ToolSignature {
        ToolSignature {
            id: self.id.clone(),
            inputs: self.inputs.clone(),
            outputs: self
                .outputs
                .iter()
                .map(|out| Parameter::new(&out.id, out.ty.clone()))
                .collect(),
        }
    }
}

/// The callable surface of a converted task: its id and ordered ports.
#[derive(Debug, Clone)]
pub struct ToolSignature {
    pub id: String,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<Parameter>,
}

/// One in-binding of a workflow step: the target port plus either a source
/// reference or a literal/expression value (or, for scattered inputs, both).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "valueFrom", skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutput {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ScatterMethod {
    #[serde(rename = "dotproduct")]
    DotProduct,
}

/// One node of a workflow's step graph.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub id: String,
    pub run: String,
    #[serde(rename = "in")]
    pub inputs: Vec<StepInput>,
    pub out: Vec<StepOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatter: Option<Vec<String>>,
    #[serde(rename = "scatterMethod", skip_serializing_if = "Option::is_none")]
    pub scatter_method: Option<ScatterMethod>,
}

impl Step {
    pub fn new(id: &str, run: &str) -> Self {
        Step {
            id: id.to_string(),
            run: run.to_string(),
            inputs: Vec::new(),
            out: Vec::new(),
            scatter: None,
            scatter_method: None,
        }
    }
}

/// An output port of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutput {
    pub id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeDescriptor>,
    #[serde(rename = "outputSource", skip_serializing_if = "Option::is_none")]
    pub output_source: Option<String>,
}

/// A complete Workflow descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDocument {
    pub id: String,
    pub class: String,
    #[serde(rename = "cwlVersion")]
    pub cwl_version: String,
    pub requirements: Vec<Requirement>,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<WorkflowOutput>,
    pub steps: Vec<Step>,
}

impl WorkflowDocument {
    pub fn new(id: &str) -> Self {
        WorkflowDocument {
            id: id.to_string(),
            class: "Workflow".to_string(),
            cwl_version: CWL_VERSION.to_string(),
            requirements: vec![Requirement::InlineJavascriptRequirement],
            inputs: Vec::new(),
            outputs: Vec::new(),
            steps: Vec::new(),
        }
    }
}

/// One top-level document produced from a WDL source file.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CwlDocument {
    Tool(ToolDocument),
    Workflow(WorkflowDocument),
}

impl CwlDocument {
    /// Document id, used downstream as the output filename stem.
    pub fn id(&self) -> &str {
        match self {
            CwlDocument::Tool(tool) => &tool.id,
            CwlDocument::Workflow(workflow) => &workflow.id,
        }
    }
}

/// A pre-authored expression-tool template the serializer must copy with
/// textual substitutions, keyed by output-port name.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionToolArtifact {
    /// Template filename, e.g. `read_tsv.cwl`.
    pub template: String,
    /// Term in the template text mapped to its replacement.
    pub substitutions: IndexMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitive_and_array_rendering() {
        assert_eq!(TypeDescriptor::primitive("int").to_cwl(), json!("int"));
        let ints = TypeDescriptor::array(TypeDescriptor::primitive("int"));
        assert_eq!(ints.to_cwl(), json!("int[]"));
        let nested = TypeDescriptor::array(TypeDescriptor::array(TypeDescriptor::primitive(
            "string",
        )));
        assert_eq!(
            nested.to_cwl(),
            json!({"type": "array", "items": "string[]"})
        );
    }

    #[test]
    fn test_optional_rendering_is_lossy_but_stable() {
        let opt_int = TypeDescriptor::optional(TypeDescriptor::primitive("int"));
        assert_eq!(opt_int.to_cwl(), json!("int?"));
        let opt_array =
            TypeDescriptor::optional(TypeDescriptor::array(TypeDescriptor::primitive("File")));
        assert_eq!(opt_array.to_cwl(), json!("File[]?"));
    }

    #[test]
    fn test_optional_never_wraps_optional() {
        let once = TypeDescriptor::optional(TypeDescriptor::primitive("string"));
        let twice = TypeDescriptor::optional(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_requirement_serialization_carries_class_tag() {
        let req = Requirement::DockerRequirement {
            docker_pull: "ubuntu:latest".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"class": "DockerRequirement", "dockerPull": "ubuntu:latest"})
        );
        assert_eq!(
            serde_json::to_value(Requirement::ShellCommandRequirement).unwrap(),
            json!({"class": "ShellCommandRequirement"})
        );
    }

    #[test]
    fn test_add_requirement_deduplicates() {
        let mut reqs = vec![Requirement::InlineJavascriptRequirement];
        add_requirement(&mut reqs, Requirement::ScatterFeatureRequirement);
        add_requirement(&mut reqs, Requirement::ScatterFeatureRequirement);
        assert_eq!(reqs.len(), 2);
    }

    #[test]
    fn test_tool_document_skips_empty_fields() {
        let tool = ToolDocument::new("echo");
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["class"], "CommandLineTool");
        assert_eq!(value["cwlVersion"], "v1.0");
        assert!(value.get("stdout").is_none());
        assert!(value.get("arguments").is_none());
    }
}
