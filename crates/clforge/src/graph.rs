use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hashing;
use crate::layout::Layout;

/// Operator kind of a finalized graph node. The registry partitions its
/// candidate lists by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    GroupNormalization,
    Softmax,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::GroupNormalization => "group_normalization",
            OpKind::Softmax => "softmax",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EltwiseMode {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationFunc {
    Relu,
    Gelu,
    Tanh,
    Sigmoid,
    Clamp,
}

/// Kind of an operation folded into the primary kernel by the graph optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FusedOpKind {
    Eltwise(EltwiseMode),
    Activation(ActivationFunc),
    Quantize,
}

impl FusedOpKind {
    pub fn describe(self) -> String {
        match self {
            FusedOpKind::Eltwise(mode) => format!("eltwise:{mode:?}").to_ascii_lowercase(),
            FusedOpKind::Activation(func) => format!("activation:{func:?}").to_ascii_lowercase(),
            FusedOpKind::Quantize => "quantize".to_string(),
        }
    }
}

/// One operation fused into the primary kernel.
///
/// `extra_inputs` are the auxiliary runtime buffers the fused operation needs
/// bound (empty for pure activations). `params` carries scalar coefficients
/// such as clamp bounds; unused entries stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedOp {
    pub kind: FusedOpKind,
    pub extra_inputs: Vec<Layout>,
    pub params: Vec<f32>,
}

impl FusedOp {
    pub fn new(kind: FusedOpKind) -> Self {
        Self {
            kind,
            extra_inputs: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn with_extra_input(mut self, layout: Layout) -> Self {
        self.extra_inputs.push(layout);
        self
    }

    pub fn with_params(mut self, params: impl Into<Vec<f32>>) -> Self {
        self.params = params.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupNormAttrs {
    pub num_groups: u32,
    pub epsilon: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoftmaxAttrs {
    pub axis: i64,
}

/// Per-operator attribute payload carried on a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OpAttributes {
    GroupNorm(GroupNormAttrs),
    Softmax(SoftmaxAttrs),
}

/// A finalized node as handed over by the graph optimizer: layouts, fusion
/// state, and operator attributes are all settled before selection runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramNode {
    pub id: String,
    pub op_kind: OpKind,
    pub inputs: Vec<Layout>,
    pub outputs: Vec<Layout>,
    pub fused_ops: Vec<FusedOp>,
    pub attributes: OpAttributes,
}

impl ProgramNode {
    /// A node is dynamic when any input or output extent is unresolved.
    pub fn is_dynamic(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|layout| layout.is_dynamic())
    }
}

/// Immutable per-invocation snapshot of everything kernel generation reads.
///
/// Constructed once per compilation pass and treated as read-only afterwards;
/// identical snapshots must yield byte-identical kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeParams {
    pub node_id: String,
    pub op_kind: OpKind,
    pub inputs: Vec<Layout>,
    pub outputs: Vec<Layout>,
    pub fused_ops: Vec<FusedOp>,
    pub attributes: OpAttributes,
}

impl RuntimeParams {
    pub fn from_node(node: &ProgramNode) -> Self {
        Self {
            node_id: node.id.clone(),
            op_kind: node.op_kind,
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            fused_ops: node.fused_ops.clone(),
            attributes: node.attributes,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|layout| layout.is_dynamic())
    }

    /// Stable 64-bit digest of the snapshot, used for entry-point naming and
    /// external source caching.
    pub fn digest(&self) -> u64 {
        let bytes = bincode::serialize(self).unwrap_or_default();
        hashing::fnv1a_hash(&bytes)
    }
}
