//! Error taxonomy for implementation selection and kernel generation.
//!
//! Selection failures are recoverable in the sense that the caller can report
//! which candidates were tried; generation failures are contract violations
//! inside a chosen implementation and abort compilation of the node.

use thiserror::Error;

use crate::graph::OpKind;

/// Failure to choose an implementation for a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error(
        "no implementation for {op_kind} node '{node_id}'; candidates tried: [{}]",
        candidates.join(", ")
    )]
    NoImplementation {
        op_kind: OpKind,
        node_id: String,
        candidates: Vec<String>,
    },
}

pub type SelectionResult<T> = Result<T, SelectionError>;

/// Failure inside kernel generation for an already-selected implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("kernel template '{template}' not found")]
    TemplateNotFound { template: String },

    #[error(
        "kernel '{kernel}' declares {parameters} parameters but binds {arguments} arguments"
    )]
    ArgumentParity {
        kernel: String,
        arguments: usize,
        parameters: usize,
    },

    #[error("kernel '{kernel}' cannot fuse operation #{op_index} ({kind})")]
    UnsupportedFusedOp {
        kernel: String,
        op_index: usize,
        kind: String,
    },

    #[error("jit constant '{name}' defined twice")]
    DuplicateJitConstant { name: String },

    #[error("kernel '{kernel}' is missing attribute: {what}")]
    MissingAttribute { kernel: String, what: String },

    #[error("kernel '{kernel}' requires static shapes: {what}")]
    DynamicShape { kernel: String, what: String },

    #[error("kernel template '{template}' is malformed")]
    MalformedTemplate { template: String },
}

pub type GenerationResult<T> = Result<T, GenerationError>;
