//! Node fixtures shared by the backend integration tests.
#![allow(dead_code)]

use clforge::graph::{FusedOp, GroupNormAttrs, OpAttributes, OpKind, ProgramNode, SoftmaxAttrs};
use clforge::layout::{DataType, Dimension, Format, Layout, Shape};

pub fn tensor(format: Format, data_type: DataType, dims: &[usize]) -> Layout {
    Layout::new(format, data_type, Shape::from_static(dims.iter().copied()))
}

/// Per-feature parameter tensor (scale or bias) shaped `1 x features x 1 x 1`.
pub fn per_feature(data_type: DataType, features: usize) -> Layout {
    tensor(Format::Bfyx, data_type, &[1, features, 1, 1])
}

pub fn group_norm_node(
    id: &str,
    data: Layout,
    num_groups: u32,
    fused_ops: Vec<FusedOp>,
) -> ProgramNode {
    let features = match data.shape.dims().get(1) {
        Some(Dimension::Static(f)) => *f,
        _ => 4,
    };
    ProgramNode {
        id: id.to_string(),
        op_kind: OpKind::GroupNormalization,
        inputs: vec![
            data.clone(),
            per_feature(DataType::F32, features),
            per_feature(DataType::F32, features),
        ],
        outputs: vec![data],
        fused_ops,
        attributes: OpAttributes::GroupNorm(GroupNormAttrs {
            num_groups,
            epsilon: 1e-5,
        }),
    }
}

/// Large enough that each (batch, group) slice fills a reduction work-group,
/// so selection picks the optimized variant.
pub fn static_group_norm_node() -> ProgramNode {
    group_norm_node(
        "gn0",
        tensor(Format::Bfyx, DataType::F32, &[2, 4, 8, 8]),
        2,
        Vec::new(),
    )
}

/// Slices far below one work-group; selection falls through to the
/// reference implementation.
pub fn small_group_norm_node() -> ProgramNode {
    group_norm_node(
        "gn_small",
        tensor(Format::Bfyx, DataType::F32, &[2, 4, 2, 2]),
        2,
        Vec::new(),
    )
}

pub fn dynamic_group_norm_node() -> ProgramNode {
    let data = Layout::new(
        Format::Bfyx,
        DataType::F32,
        Shape::new(vec![
            Dimension::Dynamic,
            Dimension::Static(4),
            Dimension::Static(16),
            Dimension::Static(16),
        ]),
    );
    group_norm_node("gn_dyn", data, 2, Vec::new())
}

/// The same node as [`dynamic_group_norm_node`] with the batch resolved,
/// as the runtime would present it when dispatching.
pub fn concretized_group_norm_node(batch: usize) -> ProgramNode {
    group_norm_node(
        "gn_dyn",
        tensor(Format::Bfyx, DataType::F32, &[batch, 4, 16, 16]),
        2,
        Vec::new(),
    )
}

pub fn softmax_node(id: &str, data: Layout, axis: i64, fused_ops: Vec<FusedOp>) -> ProgramNode {
    ProgramNode {
        id: id.to_string(),
        op_kind: OpKind::Softmax,
        inputs: vec![data.clone()],
        outputs: vec![data],
        fused_ops,
        attributes: OpAttributes::Softmax(SoftmaxAttrs { axis }),
    }
}

pub fn static_softmax_node() -> ProgramNode {
    softmax_node(
        "sm0",
        tensor(Format::Bfyx, DataType::F32, &[2, 16, 4, 4]),
        1,
        Vec::new(),
    )
}
