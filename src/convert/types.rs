//! WDL type mapping.
//!
//! Converts WDL type subtrees into CWL [`TypeDescriptor`]s through a fixed
//! primitive table. Array types use the shorthand `item[]` encoding when the
//! item is itself primitive, and the structured form otherwise; the two are
//! interchangeable for the renderer.

use crate::ast::{pick, NonTerminal, SyntaxNode, Terminal};
use crate::convert::NodeKind;
use crate::cwl::TypeDescriptor;
use crate::error::{ConvertError, Result};

/// Fixed WDL-to-CWL primitive name table.
fn primitive(wdl_name: &str) -> Result<TypeDescriptor> {
    let cwl_name = match wdl_name {
        "Int" => "int",
        "Float" => "float",
        "Boolean" => "boolean",
        "String" => "string",
        "File" => "File",
        other => {
            return Err(ConvertError::unsupported(format!(
                "no CWL mapping for WDL type '{}'",
                other
            )))
        }
    };
    Ok(TypeDescriptor::primitive(cwl_name))
}

/// Map a WDL type node (terminal primitive, parameterized `Type`, or
/// `OptionalType`) to a CWL type descriptor.
pub fn map_type(node: &SyntaxNode) -> Result<TypeDescriptor> {
    match node {
        SyntaxNode::Terminal(terminal) => map_terminal(terminal),
        SyntaxNode::NonTerminal(nt) => match NodeKind::of(nt)? {
            NodeKind::Type => map_parameterized(nt),
            NodeKind::OptionalType => {
                let inner = pick(nt, &["innerType", "inner_type"])?
                    .as_node()
                    .ok_or_else(|| ConvertError::missing_attribute(&nt.name, &["innerType"]))?;
                Ok(TypeDescriptor::optional(map_type(inner)?))
            }
            other => Err(ConvertError::unsupported(format!(
                "node kind {:?} is not a type",
                other
            ))),
        },
    }
}

fn map_terminal(terminal: &Terminal) -> Result<TypeDescriptor> {
    if terminal.kind != "type" {
        return Err(ConvertError::unsupported(format!(
            "terminal '{}' is not a type",
            terminal.kind
        )));
    }
    primitive(&terminal.source_string)
}

fn map_parameterized(nt: &NonTerminal) -> Result<TypeDescriptor> {
    let name = nt.attr_node("name")?.terminal_text()?;
    if name != "Array" {
        return Err(ConvertError::unsupported(format!(
            "parameterized WDL type '{}'",
            name
        )));
    }
    let subtypes = nt.attr_list("subtype")?;
    let item = subtypes.first().ok_or_else(|| {
        ConvertError::unsupported("Array type with no item type".to_string())
    })?;
    Ok(TypeDescriptor::array(map_type(item)?))
}
