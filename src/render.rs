//! Rendering converted documents to `.cwl` files.
//!
//! This is the serializer side of the translator's boundary: each document
//! model becomes a YAML file named by its id, and each expression-tool
//! artifact becomes a copy of its pre-authored template with the requested
//! textual substitutions applied.

use crate::convert::ConvertedDocument;
use crate::cwl::{CwlDocument, ExpressionToolArtifact};
use crate::error::{ConvertError, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// The fixed tabular-file-reading expression tool, referenced by the
/// `read_tsv` lowering.
const READ_TSV_TEMPLATE: &str = include_str!("../templates/read_tsv.cwl");

const HEADER: &str = "#!/usr/bin/env cwl-runner";

/// Render one document as a cwl-runner-executable YAML file.
pub fn render_document(document: &CwlDocument) -> Result<String> {
    let yaml = serde_yaml::to_string(document)?;
    Ok(format!(
        "{}\n# Generated by wdl2cwl {}\n{}",
        HEADER,
        env!("CARGO_PKG_VERSION"),
        yaml
    ))
}

/// The named template with every substitution term replaced.
pub fn render_expression_tool(artifact: &ExpressionToolArtifact) -> Result<String> {
    let template = match artifact.template.as_str() {
        "read_tsv.cwl" => READ_TSV_TEMPLATE,
        other => {
            return Err(ConvertError::unsupported(format!(
                "unknown expression-tool template '{}'",
                other
            )))
        }
    };
    let mut text = template.to_string();
    for (term, replacement) in &artifact.substitutions {
        text = text.replace(term.as_str(), replacement);
    }
    Ok(text)
}

/// Write every generated document and auxiliary artifact into the output
/// directory. Unless `quiet`, each document is also printed to stdout.
pub fn export(converted: &ConvertedDocument, directory: &Path, quiet: bool) -> Result<()> {
    fs::create_dir_all(directory)?;

    for document in &converted.documents {
        let rendered = render_document(document)?;
        if !quiet {
            println!("{}", rendered);
        }
        let path = directory.join(format!("{}.cwl", document.id()));
        fs::write(&path, rendered)?;
        info!("generated file {}", path.display());
    }

    for artifact in &converted.expression_tools {
        let rendered = render_expression_tool(artifact)?;
        let path = directory.join(&artifact.template);
        fs::write(&path, rendered)?;
        info!("generated file {}", path.display());
    }

    Ok(())
}
