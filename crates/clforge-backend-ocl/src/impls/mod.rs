//! Implementation managers registered by this backend, plus the small
//! helpers their validate and dispatch paths share.

pub mod group_norm;
pub mod softmax;

use std::sync::Arc;

use clforge::error::{GenerationError, GenerationResult};
use clforge::graph::{FusedOpKind, OpKind, ProgramNode, RuntimeParams};
use clforge::implementation::{Implementation, ShapeSupport};
use clforge::kernel::{ArgumentDescriptor, Arguments};
use clforge::layout::{DataType, Format, Layout};
use clforge::registry;

pub use group_norm::{GroupNormBfyxOpt, GroupNormRef};
pub use softmax::SoftmaxRef;

use crate::OclImplementation;

/// Registration order doubles as priority: the optimized group normalization
/// variants come before the reference fallback.
pub(crate) fn register_all() {
    registry::register_implementation_with_hook(
        OpKind::GroupNormalization,
        Arc::new(GroupNormBfyxOpt::new(ShapeSupport::STATIC)),
        Some(group_norm::group_slice_large_enough),
    );
    registry::register_implementation(
        OpKind::GroupNormalization,
        Arc::new(GroupNormBfyxOpt::new(ShapeSupport::DYNAMIC)),
    );
    registry::register_implementation(OpKind::GroupNormalization, Arc::new(GroupNormRef::new()));
    registry::register_implementation(OpKind::Softmax, Arc::new(SoftmaxRef::new()));
}

/// Format and data-type capability table checked by validate paths.
pub(crate) struct LayoutSupport {
    formats: &'static [Format],
    data_types: &'static [DataType],
}

impl LayoutSupport {
    pub(crate) const fn new(formats: &'static [Format], data_types: &'static [DataType]) -> Self {
        Self {
            formats,
            data_types,
        }
    }

    pub(crate) fn allows(&self, layout: &Layout) -> bool {
        self.formats.contains(&layout.format) && self.data_types.contains(&layout.data_type)
    }
}

/// Common fusion capability of this backend's kernels: single-operand
/// eltwise and parameterless-or-clamp activations, no quantize.
pub(crate) fn supports_fused_ops(node: &ProgramNode) -> bool {
    node.fused_ops.iter().all(|op| match op.kind {
        FusedOpKind::Eltwise(_) => op.extra_inputs.len() == 1,
        FusedOpKind::Activation(_) => op.extra_inputs.is_empty(),
        FusedOpKind::Quantize => false,
    })
}

/// Runs the dispatch callback right away for static nodes; dynamic nodes
/// stay undispatched until the runtime supplies concrete extents.
pub(crate) fn finalize(
    mut built: OclImplementation,
    params: &RuntimeParams,
) -> Result<Box<dyn Implementation>, GenerationError> {
    if !params.is_dynamic() {
        built.update_dispatch(params)?;
    }
    Ok(Box::new(built))
}

pub(crate) fn first_input<'a>(
    params: &'a RuntimeParams,
    kernel: &str,
) -> GenerationResult<&'a Layout> {
    params
        .inputs
        .first()
        .ok_or_else(|| GenerationError::MissingAttribute {
            kernel: kernel.to_string(),
            what: "input tensor".to_string(),
        })
}

pub(crate) fn require_static_dims(
    layout: &Layout,
    kernel: &str,
    what: &str,
) -> GenerationResult<Vec<usize>> {
    layout
        .shape
        .static_dims()
        .ok_or_else(|| GenerationError::DynamicShape {
            kernel: kernel.to_string(),
            what: what.to_string(),
        })
}

pub(crate) fn shape_info_prefix(params: &RuntimeParams) -> Arguments {
    if params.is_dynamic() {
        vec![ArgumentDescriptor::ShapeInfo]
    } else {
        Vec::new()
    }
}

pub(crate) fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}
