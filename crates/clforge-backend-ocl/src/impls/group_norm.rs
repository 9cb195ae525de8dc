//! Group normalization implementations.
//!
//! `GroupNormBfyxOpt` runs three kernels: a work-group reduction per
//! (batch, group) pair for the mean, another for the variance, then an
//! elementwise normalization stage that also carries the fused ops. It is
//! registered twice, once per shape class. `GroupNormRef` is the naive
//! single-kernel fallback.

use clforge::error::{GenerationError, GenerationResult};
use clforge::graph::{GroupNormAttrs, OpAttributes, ProgramNode, RuntimeParams};
use clforge::implementation::{Implementation, ImplementationManager, ShapeSupport};
use clforge::kernel::{ArgumentDescriptor, Arguments, JitConstants, JitValue, WorkGroups};
use clforge::layout::{DataType, Dimension, Format};

use crate::generator::{default_arguments, GeneratorSpec, KernelGenerator};
use crate::impls::{self, LayoutSupport};
use crate::templates::{self, builtin_templates};
use crate::{DispatchData, OclImplementation};

pub const GROUP_NORM_BFYX_OPT_KEY: &str = "ocl::group_norm::bfyx_opt";
pub const GROUP_NORM_REF_KEY: &str = "ocl::group_norm::ref";

const KERNEL_BASE_OPT: &str = "group_norm_bfyx_opt";
const KERNEL_BASE_REF: &str = "group_norm_ref";

const STAGE_CALC_MEAN: &str = "calc_mean";
const STAGE_CALC_VAR: &str = "calc_var";

const REDUCE_LOCAL_SIZE: u64 = 128;
const ELEMENTWISE_LOCAL_SIZE: u64 = 256;

const SUPPORTED_LAYOUTS: LayoutSupport = LayoutSupport::new(
    &[Format::Bfyx, Format::Bfzyx],
    &[DataType::F32, DataType::F16, DataType::U8, DataType::I8],
);

fn node_attrs(node: &ProgramNode) -> Option<GroupNormAttrs> {
    match node.attributes {
        OpAttributes::GroupNorm(attrs) => Some(attrs),
        _ => None,
    }
}

fn params_attrs(params: &RuntimeParams, kernel: &str) -> GenerationResult<GroupNormAttrs> {
    match params.attributes {
        OpAttributes::GroupNorm(attrs) => Ok(attrs),
        _ => Err(GenerationError::MissingAttribute {
            kernel: kernel.to_string(),
            what: "group normalization attributes".to_string(),
        }),
    }
}

/// The kernels index each group as one contiguous slice, which requires the
/// feature dimension to split evenly. A dynamic feature extent passes here
/// and is re-checked once dispatch sees concrete shapes.
fn groups_divide_features(node: &ProgramNode) -> bool {
    let Some(attrs) = node_attrs(node) else {
        return false;
    };
    if attrs.num_groups == 0 {
        return false;
    }
    let Some(input) = node.inputs.first() else {
        return false;
    };
    match input.shape.dims().get(1) {
        Some(Dimension::Static(features)) => features % attrs.num_groups as usize == 0,
        Some(Dimension::Dynamic) => true,
        None => false,
    }
}

/// Registration hook for the static optimized variant: the work-group
/// reduction only pays off once a (batch, group) slice fills a work-group.
/// Smaller nodes fall through to the reference implementation.
pub fn group_slice_large_enough(node: &ProgramNode) -> bool {
    let Some(attrs) = node_attrs(node) else {
        return false;
    };
    if attrs.num_groups == 0 {
        return false;
    }
    let Some(input) = node.inputs.first() else {
        return false;
    };
    let Some(dims) = input.shape.static_dims() else {
        return false;
    };
    if dims.len() < 2 {
        return false;
    }
    let spatial: usize = dims[2..].iter().product();
    dims[1] / attrs.num_groups as usize * spatial >= REDUCE_LOCAL_SIZE as usize
}

fn validate_group_norm(node: &ProgramNode) -> bool {
    node.inputs.len() == 3
        && node.outputs.len() == 1
        && node
            .inputs
            .iter()
            .chain(node.outputs.iter())
            .all(|layout| SUPPORTED_LAYOUTS.allows(layout))
        && groups_divide_features(node)
        && impls::supports_fused_ops(node)
}

/// Three-stage work-group reduction variant.
#[derive(Debug, Clone)]
pub struct GroupNormBfyxOpt {
    shape_support: ShapeSupport,
}

impl GroupNormBfyxOpt {
    pub fn new(shape_support: ShapeSupport) -> Self {
        Self { shape_support }
    }
}

impl ImplementationManager for GroupNormBfyxOpt {
    fn key(&self) -> &'static str {
        GROUP_NORM_BFYX_OPT_KEY
    }

    fn shape_support(&self) -> ShapeSupport {
        self.shape_support
    }

    fn validate(&self, node: &ProgramNode) -> bool {
        validate_group_norm(node)
    }

    fn create(
        &self,
        _node: &ProgramNode,
        params: &RuntimeParams,
    ) -> Result<Box<dyn Implementation>, GenerationError> {
        if params.is_dynamic() && !self.shape_support.dynamic_shapes {
            return Err(GenerationError::DynamicShape {
                kernel: KERNEL_BASE_OPT.to_string(),
                what: "statically shaped variant created for a dynamic node".to_string(),
            });
        }
        let store = builtin_templates();
        let mean_kernel = KernelGenerator::new(KERNEL_BASE_OPT, templates::GROUP_NORM_BFYX_MEAN, store)
            .with_stage(STAGE_CALC_MEAN)
            .with_fused_ops(false)
            .get_kernel_data(&MeanStage, params)?;
        let var_kernel = KernelGenerator::new(KERNEL_BASE_OPT, templates::GROUP_NORM_BFYX_VAR, store)
            .with_stage(STAGE_CALC_VAR)
            .with_fused_ops(false)
            .get_kernel_data(&VarianceStage, params)?;
        let final_kernel =
            KernelGenerator::new(KERNEL_BASE_OPT, templates::GROUP_NORM_BFYX_FINAL, store)
                .get_kernel_data(&FinalStage, params)?;
        impls::finalize(
            OclImplementation::new(
                GROUP_NORM_BFYX_OPT_KEY,
                vec![mean_kernel, var_kernel, final_kernel],
                bfyx_opt_dispatch,
            ),
            params,
        )
    }
}

fn reduce_stage_jit(params: &RuntimeParams) -> GenerationResult<JitConstants> {
    let attrs = params_attrs(params, KERNEL_BASE_OPT)?;
    let mut jit = JitConstants::new();
    jit.add("NUM_GROUPS", JitValue::Int(i64::from(attrs.num_groups)))?;
    jit.add("LOCAL_SIZE", JitValue::Int(REDUCE_LOCAL_SIZE as i64))?;
    Ok(jit)
}

fn normalize_stage_jit(params: &RuntimeParams, kernel: &str) -> GenerationResult<JitConstants> {
    let attrs = params_attrs(params, kernel)?;
    let mut jit = JitConstants::new();
    jit.add("NUM_GROUPS", JitValue::Int(i64::from(attrs.num_groups)))?;
    jit.add("EPSILON", JitValue::Float(attrs.epsilon))?;
    Ok(jit)
}

struct MeanStage;

impl GeneratorSpec for MeanStage {
    fn specialized_jit_constants(&self, params: &RuntimeParams) -> GenerationResult<JitConstants> {
        reduce_stage_jit(params)
    }

    fn arguments(&self, params: &RuntimeParams) -> GenerationResult<Arguments> {
        let mut arguments = impls::shape_info_prefix(params);
        arguments.push(ArgumentDescriptor::Input(0));
        arguments.push(ArgumentDescriptor::Intermediate(0));
        Ok(arguments)
    }
}

struct VarianceStage;

impl GeneratorSpec for VarianceStage {
    fn specialized_jit_constants(&self, params: &RuntimeParams) -> GenerationResult<JitConstants> {
        reduce_stage_jit(params)
    }

    fn arguments(&self, params: &RuntimeParams) -> GenerationResult<Arguments> {
        let mut arguments = impls::shape_info_prefix(params);
        arguments.push(ArgumentDescriptor::Input(0));
        arguments.push(ArgumentDescriptor::Intermediate(0));
        arguments.push(ArgumentDescriptor::Intermediate(1));
        Ok(arguments)
    }
}

struct FinalStage;

impl GeneratorSpec for FinalStage {
    fn specialized_jit_constants(&self, params: &RuntimeParams) -> GenerationResult<JitConstants> {
        normalize_stage_jit(params, KERNEL_BASE_OPT)
    }

    fn arguments(&self, params: &RuntimeParams) -> GenerationResult<Arguments> {
        let mut arguments = default_arguments(params);
        arguments.push(ArgumentDescriptor::Intermediate(0));
        arguments.push(ArgumentDescriptor::Intermediate(1));
        Ok(arguments)
    }
}

fn bfyx_opt_dispatch(params: &RuntimeParams) -> Result<DispatchData, GenerationError> {
    let attrs = params_attrs(params, KERNEL_BASE_OPT)?;
    let input = impls::first_input(params, KERNEL_BASE_OPT)?;
    let dims = impls::require_static_dims(input, KERNEL_BASE_OPT, "dispatch extents")?;
    if dims.len() < 2 {
        return Err(GenerationError::MissingAttribute {
            kernel: KERNEL_BASE_OPT.to_string(),
            what: "batch and feature dimensions".to_string(),
        });
    }
    let groups = attrs.num_groups as usize;
    if groups == 0 || dims[1] % groups != 0 {
        return Err(GenerationError::MissingAttribute {
            kernel: KERNEL_BASE_OPT.to_string(),
            what: "feature count divisible by num_groups".to_string(),
        });
    }
    let total: usize = dims.iter().product();
    let stat_count = dims[0] * groups;
    let reduce = WorkGroups {
        global: [stat_count as u64 * REDUCE_LOCAL_SIZE, 1, 1],
        local: [REDUCE_LOCAL_SIZE, 1, 1],
    };
    let elementwise = WorkGroups {
        global: [
            impls::round_up(total, ELEMENTWISE_LOCAL_SIZE as usize) as u64,
            1,
            1,
        ],
        local: [ELEMENTWISE_LOCAL_SIZE, 1, 1],
    };
    let stat_bytes = stat_count * DataType::F32.size_in_bytes();
    Ok(DispatchData {
        work_groups: vec![reduce, reduce, elementwise],
        intermediate_buffers: vec![stat_bytes, stat_bytes],
    })
}

/// Single-kernel fallback covering both shape classes.
#[derive(Debug, Clone, Default)]
pub struct GroupNormRef;

impl GroupNormRef {
    pub fn new() -> Self {
        Self
    }
}

impl ImplementationManager for GroupNormRef {
    fn key(&self) -> &'static str {
        GROUP_NORM_REF_KEY
    }

    fn shape_support(&self) -> ShapeSupport {
        ShapeSupport::ANY
    }

    fn validate(&self, node: &ProgramNode) -> bool {
        validate_group_norm(node)
    }

    fn create(
        &self,
        _node: &ProgramNode,
        params: &RuntimeParams,
    ) -> Result<Box<dyn Implementation>, GenerationError> {
        let kernel = KernelGenerator::new(KERNEL_BASE_REF, templates::GROUP_NORM_REF, builtin_templates())
            .get_kernel_data(&RefSpec, params)?;
        impls::finalize(
            OclImplementation::new(GROUP_NORM_REF_KEY, vec![kernel], ref_dispatch),
            params,
        )
    }
}

struct RefSpec;

impl GeneratorSpec for RefSpec {
    fn specialized_jit_constants(&self, params: &RuntimeParams) -> GenerationResult<JitConstants> {
        normalize_stage_jit(params, KERNEL_BASE_REF)
    }
}

fn ref_dispatch(params: &RuntimeParams) -> Result<DispatchData, GenerationError> {
    let input = impls::first_input(params, KERNEL_BASE_REF)?;
    let dims = impls::require_static_dims(input, KERNEL_BASE_REF, "dispatch extents")?;
    let total: usize = dims.iter().product();
    Ok(DispatchData {
        work_groups: vec![WorkGroups {
            global: [
                impls::round_up(total, ELEMENTWISE_LOCAL_SIZE as usize) as u64,
                1,
                1,
            ],
            local: [ELEMENTWISE_LOCAL_SIZE, 1, 1],
        }],
        intermediate_buffers: Vec::new(),
    })
}
