//! # wdl2cwl
//!
//! Rust port of wdl2cwl - translates Workflow Description Language (WDL)
//! workflows into CWL v1.0 documents.
//!
//! This crate provides the AST-to-AST translator: it walks a parsed WDL
//! syntax tree (produced by the external parser and consumed through its
//! JSON AST dump) and builds in-memory CWL tool and workflow descriptors,
//! ready for serialization.

pub mod ast;
pub mod convert;
pub mod cwl;
pub mod error;
pub mod render;

pub use ast::{find, pick, AttrValue, NonTerminal, SyntaxNode, Terminal};
pub use convert::{convert_document, ConvertedDocument, NodeKind, WdlVersion};
pub use cwl::{
    CwlDocument, ExpressionToolArtifact, Parameter, Requirement, Step, ToolDocument,
    ToolSignature, TypeDescriptor, WorkflowDocument,
};
pub use error::ConvertError;
