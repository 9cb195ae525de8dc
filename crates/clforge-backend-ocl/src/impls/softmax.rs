//! Softmax reference implementation.

use std::ops::Range;

use clforge::error::{GenerationError, GenerationResult};
use clforge::graph::{OpAttributes, ProgramNode, RuntimeParams, SoftmaxAttrs};
use clforge::implementation::{Implementation, ImplementationManager, ShapeSupport};
use clforge::kernel::{JitConstants, JitValue, WorkGroups};
use clforge::layout::{DataType, Format};

use crate::generator::{GeneratorSpec, KernelGenerator};
use crate::impls::{self, LayoutSupport};
use crate::templates::{self, builtin_templates};
use crate::{DispatchData, OclImplementation};

pub const SOFTMAX_REF_KEY: &str = "ocl::softmax::ref";

const KERNEL_BASE: &str = "softmax_ref";

const SLICE_LOCAL_SIZE: u64 = 128;

const SUPPORTED_LAYOUTS: LayoutSupport =
    LayoutSupport::new(&[Format::Bfyx, Format::Bfzyx], &[DataType::F32, DataType::F16]);

fn params_attrs(params: &RuntimeParams, kernel: &str) -> GenerationResult<SoftmaxAttrs> {
    match params.attributes {
        OpAttributes::Softmax(attrs) => Ok(attrs),
        _ => Err(GenerationError::MissingAttribute {
            kernel: kernel.to_string(),
            what: "softmax attributes".to_string(),
        }),
    }
}

/// Negative axes count from the back, matching the usual framework
/// convention. Out of range yields `None`.
fn resolved_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = rank as i64;
    let resolved = if axis < 0 { axis + rank } else { axis };
    (0..rank).contains(&resolved).then_some(resolved as usize)
}

fn dim_product_expr(range: Range<usize>) -> String {
    if range.is_empty() {
        return "(1)".to_string();
    }
    let product = range
        .map(|d| format!("INPUT0_DIM{d}"))
        .collect::<Vec<_>>()
        .join("*");
    format!("({product})")
}

/// Slice-per-work-item softmax over any axis of a plain layout.
#[derive(Debug, Clone, Default)]
pub struct SoftmaxRef;

impl SoftmaxRef {
    pub fn new() -> Self {
        Self
    }
}

impl ImplementationManager for SoftmaxRef {
    fn key(&self) -> &'static str {
        SOFTMAX_REF_KEY
    }

    fn shape_support(&self) -> ShapeSupport {
        ShapeSupport::ANY
    }

    fn validate(&self, node: &ProgramNode) -> bool {
        let axis_ok = match (node.attributes, node.inputs.first()) {
            (OpAttributes::Softmax(attrs), Some(input)) => {
                resolved_axis(attrs.axis, input.shape.rank()).is_some()
            }
            _ => false,
        };
        axis_ok
            && node.inputs.len() == 1
            && node.outputs.len() == 1
            && node
                .inputs
                .iter()
                .chain(node.outputs.iter())
                .all(|layout| SUPPORTED_LAYOUTS.allows(layout))
            && impls::supports_fused_ops(node)
    }

    fn create(
        &self,
        _node: &ProgramNode,
        params: &RuntimeParams,
    ) -> Result<Box<dyn Implementation>, GenerationError> {
        let kernel = KernelGenerator::new(KERNEL_BASE, templates::SOFTMAX_REF, builtin_templates())
            .get_kernel_data(&SoftmaxSpec, params)?;
        impls::finalize(
            OclImplementation::new(SOFTMAX_REF_KEY, vec![kernel], softmax_dispatch),
            params,
        )
    }
}

struct SoftmaxSpec;

impl GeneratorSpec for SoftmaxSpec {
    fn specialized_jit_constants(&self, params: &RuntimeParams) -> GenerationResult<JitConstants> {
        let attrs = params_attrs(params, KERNEL_BASE)?;
        let input = impls::first_input(params, KERNEL_BASE)?;
        let rank = input.shape.rank();
        let axis = resolved_axis(attrs.axis, rank).ok_or_else(|| {
            GenerationError::MissingAttribute {
                kernel: KERNEL_BASE.to_string(),
                what: format!("softmax axis {} valid for rank {rank}", attrs.axis),
            }
        })?;
        let mut jit = JitConstants::new();
        jit.add("SOFTMAX_AXIS", JitValue::Int(axis as i64))?;
        jit.add("OUTER_COUNT", JitValue::Text(dim_product_expr(0..axis)))?;
        jit.add("AXIS_LEN", JitValue::Text(format!("(INPUT0_DIM{axis})")))?;
        jit.add(
            "INNER_COUNT",
            JitValue::Text(dim_product_expr(axis + 1..rank)),
        )?;
        Ok(jit)
    }
}

fn softmax_dispatch(params: &RuntimeParams) -> Result<DispatchData, GenerationError> {
    let attrs = params_attrs(params, KERNEL_BASE)?;
    let input = impls::first_input(params, KERNEL_BASE)?;
    let dims = impls::require_static_dims(input, KERNEL_BASE, "dispatch extents")?;
    let axis = resolved_axis(attrs.axis, dims.len()).ok_or_else(|| {
        GenerationError::MissingAttribute {
            kernel: KERNEL_BASE.to_string(),
            what: format!("softmax axis {} valid for rank {}", attrs.axis, dims.len()),
        }
    })?;
    let total: usize = dims.iter().product();
    let slices = total / dims[axis].max(1);
    Ok(DispatchData {
        work_groups: vec![WorkGroups {
            global: [
                impls::round_up(slices, SLICE_LOCAL_SIZE as usize) as u64,
                1,
                1,
            ],
            local: [SLICE_LOCAL_SIZE, 1, 1],
        }],
        intermediate_buffers: Vec::new(),
    })
}
