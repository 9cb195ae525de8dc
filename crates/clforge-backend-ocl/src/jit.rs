//! Jit constant families shared by every kernel in this backend.
//!
//! Three layers feed the generator: base constants describing the node,
//! per-tensor constants (type, layout, dims, pitches), and the fused-op
//! expansion that turns `FUSED_OPS(result, idx)` into inlined arithmetic.
//! Dynamic extents render as `shape_info` loads; the buffer holds the dims
//! of every input then every output, rank entries each, so offsets are
//! stable no matter which individual extents are dynamic.

use clforge::error::{GenerationError, GenerationResult};
use clforge::graph::{ActivationFunc, EltwiseMode, FusedOpKind, RuntimeParams};
use clforge::kernel::{JitConstants, JitValue};
use clforge::layout::{DataType, Dimension, Layout};

pub(crate) const SHAPE_INFO_DECL: &str = "__global const int* shape_info,";

pub(crate) fn base_jit_constants(
    kernel_name: &str,
    params: &RuntimeParams,
) -> GenerationResult<JitConstants> {
    let mut jit = JitConstants::new();
    jit.add("KERNEL_ID", JitValue::Text(format!("\"{kernel_name}\"")))?;
    let any_fp16 = params
        .inputs
        .iter()
        .chain(params.outputs.iter())
        .any(|layout| layout.data_type == DataType::F16);
    jit.add("ENABLE_FP16", JitValue::Bool(any_fp16))?;
    jit.add("INPUT_COUNT", JitValue::Int(params.inputs.len() as i64))?;
    jit.add("OUTPUT_COUNT", JitValue::Int(params.outputs.len() as i64))?;
    let dynamic = params.is_dynamic();
    jit.add("IS_DYNAMIC", JitValue::Bool(dynamic))?;
    jit.add(
        "OPTIONAL_SHAPE_INFO_ARG",
        JitValue::Text(if dynamic {
            SHAPE_INFO_DECL.to_string()
        } else {
            String::new()
        }),
    )?;
    Ok(jit)
}

pub(crate) fn tensor_jit_constants(params: &RuntimeParams) -> GenerationResult<JitConstants> {
    let mut jit = JitConstants::new();
    let mut shape_info_offset = 0usize;
    for (index, layout) in params.inputs.iter().enumerate() {
        add_tensor_constants(&mut jit, &format!("INPUT{index}"), layout, shape_info_offset)?;
        shape_info_offset += layout.shape.rank();
    }
    for (index, layout) in params.outputs.iter().enumerate() {
        add_tensor_constants(&mut jit, &format!("OUTPUT{index}"), layout, shape_info_offset)?;
        shape_info_offset += layout.shape.rank();
    }
    Ok(jit)
}

fn add_tensor_constants(
    jit: &mut JitConstants,
    prefix: &str,
    layout: &Layout,
    shape_info_offset: usize,
) -> GenerationResult<()> {
    jit.add(
        format!("{prefix}_TYPE"),
        JitValue::Text(layout.data_type.to_cl_type().to_string()),
    )?;
    jit.add(
        format!(
            "{prefix}_LAYOUT_{}",
            layout.format.as_str().to_ascii_uppercase()
        ),
        JitValue::Int(1),
    )?;
    let rank = layout.shape.rank();
    jit.add(format!("{prefix}_RANK"), JitValue::Int(rank as i64))?;
    for (dim_index, dim) in layout.shape.dims().iter().enumerate() {
        let name = format!("{prefix}_DIM{dim_index}");
        match dim {
            Dimension::Static(extent) => jit.add(name, JitValue::Int(*extent as i64))?,
            Dimension::Dynamic => jit.add(
                name,
                JitValue::Text(format!("(shape_info[{}])", shape_info_offset + dim_index)),
            )?,
        }
    }
    let total = (0..rank)
        .map(|d| format!("{prefix}_DIM{d}"))
        .collect::<Vec<_>>()
        .join("*");
    jit.add(format!("{prefix}_TOTAL"), JitValue::Text(format!("({total})")))?;
    if !layout.format.is_blocked() {
        // Dense row-major pitches, expressed through the DIM macros so they
        // stay valid for dynamic extents.
        for d in 0..rank {
            let pitch = if d + 1 == rank {
                "(1)".to_string()
            } else {
                let product = (d + 1..rank)
                    .map(|inner| format!("{prefix}_DIM{inner}"))
                    .collect::<Vec<_>>()
                    .join("*");
                format!("({product})")
            };
            jit.add(format!("{prefix}_PITCH{d}"), JitValue::Text(pitch))?;
        }
    }
    jit.add(
        format!("{prefix}_TO_FLOAT(v)"),
        JitValue::Text(load_conversion(layout.data_type).to_string()),
    )?;
    jit.add(
        format!("{prefix}_FROM_FLOAT(v)"),
        JitValue::Text(store_conversion(layout.data_type).to_string()),
    )?;
    Ok(())
}

fn load_conversion(data_type: DataType) -> &'static str {
    match data_type {
        DataType::F32 => "(v)",
        _ => "convert_float(v)",
    }
}

fn store_conversion(data_type: DataType) -> &'static str {
    match data_type {
        DataType::F32 => "(v)",
        DataType::F16 => "convert_half(v)",
        DataType::U8 => "convert_uchar_sat_rte(v)",
        DataType::I8 => "convert_char_sat_rte(v)",
        DataType::I32 => "convert_int_rte(v)",
        DataType::I64 => "convert_long_rte(v)",
    }
}

/// Expands the fusion hooks. With fusion inactive (or nothing fused) both
/// macros expand to nothing, so templates reference them unconditionally.
pub(crate) fn fused_ops_jit_constants(
    kernel_name: &str,
    params: &RuntimeParams,
    fusion_active: bool,
) -> GenerationResult<JitConstants> {
    let mut jit = JitConstants::new();
    if !fusion_active || params.fused_ops.is_empty() {
        jit.add("FUSED_OPS_ARGS", JitValue::Text(String::new()))?;
        jit.add("FUSED_OPS(result, idx)", JitValue::Text(String::new()))?;
        return Ok(jit);
    }

    let mut arg_decls = String::new();
    let mut statements = Vec::new();
    for (op_index, op) in params.fused_ops.iter().enumerate() {
        let unsupported = || GenerationError::UnsupportedFusedOp {
            kernel: kernel_name.to_string(),
            op_index,
            kind: op.kind.describe(),
        };
        match op.kind {
            FusedOpKind::Eltwise(mode) => {
                if op.extra_inputs.len() != 1 {
                    return Err(unsupported());
                }
                let type_name = format!("FUSED_OP_{op_index}_INPUT0_TYPE");
                jit.add(
                    type_name.clone(),
                    JitValue::Text(op.extra_inputs[0].data_type.to_cl_type().to_string()),
                )?;
                arg_decls.push_str(&format!(
                    ", __global const {type_name}* restrict fused_op_{op_index}_input0"
                ));
                let operand = format!("convert_float(fused_op_{op_index}_input0[idx])");
                statements.push(match mode {
                    EltwiseMode::Add => format!("result = result + {operand};"),
                    EltwiseMode::Sub => format!("result = result - {operand};"),
                    EltwiseMode::Mul => format!("result = result * {operand};"),
                    EltwiseMode::Div => format!("result = result / {operand};"),
                    EltwiseMode::Max => format!("result = fmax(result, {operand});"),
                    EltwiseMode::Min => format!("result = fmin(result, {operand});"),
                });
            }
            FusedOpKind::Activation(func) => {
                if !op.extra_inputs.is_empty() {
                    return Err(unsupported());
                }
                statements.push(match func {
                    ActivationFunc::Relu => "result = fmax(result, 0.0f);".to_string(),
                    ActivationFunc::Gelu => {
                        "result = result * 0.5f * (1.0f + erf(result * 0.70710678f));".to_string()
                    }
                    ActivationFunc::Tanh => "result = tanh(result);".to_string(),
                    ActivationFunc::Sigmoid => {
                        "result = 1.0f / (1.0f + exp(-result));".to_string()
                    }
                    ActivationFunc::Clamp => {
                        if op.params.len() < 2 {
                            return Err(GenerationError::MissingAttribute {
                                kernel: kernel_name.to_string(),
                                what: format!("clamp bounds for fused op #{op_index}"),
                            });
                        }
                        jit.add(
                            format!("FUSED_OP_{op_index}_CLAMP_LO"),
                            JitValue::Float(op.params[0]),
                        )?;
                        jit.add(
                            format!("FUSED_OP_{op_index}_CLAMP_HI"),
                            JitValue::Float(op.params[1]),
                        )?;
                        format!(
                            "result = clamp(result, FUSED_OP_{op_index}_CLAMP_LO, FUSED_OP_{op_index}_CLAMP_HI);"
                        )
                    }
                });
            }
            FusedOpKind::Quantize => return Err(unsupported()),
        }
    }
    jit.add("FUSED_OPS_ARGS", JitValue::Text(arg_decls))?;
    jit.add(
        "FUSED_OPS(result, idx)",
        JitValue::Text(statements.join(" ")),
    )?;
    Ok(jit)
}

/// Number of kernel parameters the fused-op expansion contributes.
pub(crate) fn fused_argument_count(params: &RuntimeParams, fusion_active: bool) -> usize {
    if !fusion_active {
        return 0;
    }
    params
        .fused_ops
        .iter()
        .map(|op| op.extra_inputs.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use clforge::graph::{FusedOp, OpAttributes, OpKind, SoftmaxAttrs};
    use clforge::layout::{Format, Shape};

    use super::*;

    fn layout(data_type: DataType, shape: Shape) -> Layout {
        Layout::new(Format::Bfyx, data_type, shape)
    }

    fn params_with(inputs: Vec<Layout>, outputs: Vec<Layout>, fused: Vec<FusedOp>) -> RuntimeParams {
        RuntimeParams {
            node_id: "n0".to_string(),
            op_kind: OpKind::Softmax,
            inputs,
            outputs,
            fused_ops: fused,
            attributes: OpAttributes::Softmax(SoftmaxAttrs { axis: 1 }),
        }
    }

    fn static_f32() -> RuntimeParams {
        let l = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        params_with(vec![l.clone()], vec![l], Vec::new())
    }

    #[test]
    fn shape_info_arg_is_empty_for_static_nodes() {
        let jit = base_jit_constants("k", &static_f32()).unwrap();
        assert_eq!(
            jit.get("OPTIONAL_SHAPE_INFO_ARG"),
            Some(&JitValue::Text(String::new()))
        );
        assert_eq!(jit.get("IS_DYNAMIC"), Some(&JitValue::Bool(false)));
    }

    #[test]
    fn shape_info_arg_is_declared_for_dynamic_nodes() {
        let l = layout(
            DataType::F32,
            Shape::new(vec![
                Dimension::Dynamic,
                Dimension::Static(4),
                Dimension::Static(8),
                Dimension::Static(8),
            ]),
        );
        let params = params_with(vec![l.clone()], vec![l], Vec::new());
        let jit = base_jit_constants("k", &params).unwrap();
        assert_eq!(
            jit.get("OPTIONAL_SHAPE_INFO_ARG"),
            Some(&JitValue::Text(SHAPE_INFO_DECL.to_string()))
        );
    }

    #[test]
    fn static_dims_are_literals() {
        let jit = tensor_jit_constants(&static_f32()).unwrap();
        assert_eq!(jit.get("INPUT0_DIM0"), Some(&JitValue::Int(2)));
        assert_eq!(jit.get("INPUT0_DIM3"), Some(&JitValue::Int(8)));
        assert_eq!(jit.get("OUTPUT0_RANK"), Some(&JitValue::Int(4)));
        assert_eq!(
            jit.get("INPUT0_TOTAL"),
            Some(&JitValue::Text(
                "(INPUT0_DIM0*INPUT0_DIM1*INPUT0_DIM2*INPUT0_DIM3)".to_string()
            ))
        );
        assert_eq!(
            jit.get("INPUT0_PITCH0"),
            Some(&JitValue::Text(
                "(INPUT0_DIM1*INPUT0_DIM2*INPUT0_DIM3)".to_string()
            ))
        );
        assert_eq!(
            jit.get("INPUT0_PITCH3"),
            Some(&JitValue::Text("(1)".to_string()))
        );
    }

    #[test]
    fn dynamic_dims_read_shape_info_with_per_tensor_offsets() {
        let dynamic = layout(
            DataType::F16,
            Shape::new(vec![
                Dimension::Dynamic,
                Dimension::Static(4),
                Dimension::Dynamic,
                Dimension::Static(8),
            ]),
        );
        let params = params_with(vec![dynamic.clone()], vec![dynamic], Vec::new());
        let jit = tensor_jit_constants(&params).unwrap();
        assert_eq!(
            jit.get("INPUT0_DIM0"),
            Some(&JitValue::Text("(shape_info[0])".to_string()))
        );
        assert_eq!(jit.get("INPUT0_DIM1"), Some(&JitValue::Int(4)));
        assert_eq!(
            jit.get("INPUT0_DIM2"),
            Some(&JitValue::Text("(shape_info[2])".to_string()))
        );
        // The output tensor starts after the input's four entries.
        assert_eq!(
            jit.get("OUTPUT0_DIM0"),
            Some(&JitValue::Text("(shape_info[4])".to_string()))
        );
        assert_eq!(
            jit.get("OUTPUT0_DIM2"),
            Some(&JitValue::Text("(shape_info[6])".to_string()))
        );
    }

    #[test]
    fn conversion_macros_match_data_types() {
        let l_in = layout(DataType::U8, Shape::from_static([2, 4, 8, 8]));
        let l_out = layout(DataType::F16, Shape::from_static([2, 4, 8, 8]));
        let params = params_with(vec![l_in], vec![l_out], Vec::new());
        let jit = tensor_jit_constants(&params).unwrap();
        assert_eq!(
            jit.get("INPUT0_TO_FLOAT(v)"),
            Some(&JitValue::Text("convert_float(v)".to_string()))
        );
        assert_eq!(
            jit.get("OUTPUT0_FROM_FLOAT(v)"),
            Some(&JitValue::Text("convert_half(v)".to_string()))
        );
    }

    #[test]
    fn fused_statements_keep_node_order() {
        let extra = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        let l = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        let fused = vec![
            FusedOp::new(FusedOpKind::Eltwise(EltwiseMode::Add)).with_extra_input(extra),
            FusedOp::new(FusedOpKind::Activation(ActivationFunc::Relu)),
        ];
        let params = params_with(vec![l.clone()], vec![l], fused);
        let jit = fused_ops_jit_constants("k", &params, true).unwrap();
        let Some(JitValue::Text(body)) = jit.get("FUSED_OPS(result, idx)") else {
            panic!("fused hook must be a text macro");
        };
        let add_at = body.find("result + convert_float").expect("eltwise add inlined");
        let relu_at = body.find("fmax(result, 0.0f)").expect("relu inlined");
        assert!(add_at < relu_at, "fused code must follow node order");
        let Some(JitValue::Text(args)) = jit.get("FUSED_OPS_ARGS") else {
            panic!("fused args must be a text macro");
        };
        assert!(args.contains("fused_op_0_input0"));
        assert_eq!(fused_argument_count(&params, true), 1);
        assert_eq!(fused_argument_count(&params, false), 0);
    }

    #[test]
    fn inactive_fusion_renders_empty_hooks() {
        let extra = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        let l = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        let fused = vec![FusedOp::new(FusedOpKind::Eltwise(EltwiseMode::Mul)).with_extra_input(extra)];
        let params = params_with(vec![l.clone()], vec![l], fused);
        let jit = fused_ops_jit_constants("k", &params, false).unwrap();
        assert_eq!(
            jit.get("FUSED_OPS(result, idx)"),
            Some(&JitValue::Text(String::new()))
        );
        assert_eq!(jit.get("FUSED_OPS_ARGS"), Some(&JitValue::Text(String::new())));
    }

    #[test]
    fn eltwise_without_extra_input_is_rejected() {
        let l = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        let fused = vec![FusedOp::new(FusedOpKind::Eltwise(EltwiseMode::Add))];
        let params = params_with(vec![l.clone()], vec![l], fused);
        let err = fused_ops_jit_constants("k", &params, true).unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedFusedOp { op_index: 0, .. }));
    }

    #[test]
    fn quantize_is_rejected() {
        let l = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        let params = params_with(
            vec![l.clone()],
            vec![l],
            vec![FusedOp::new(FusedOpKind::Quantize)],
        );
        let err = fused_ops_jit_constants("k", &params, true).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::UnsupportedFusedOp { ref kind, .. } if kind == "quantize"
        ));
    }

    #[test]
    fn clamp_without_bounds_is_rejected() {
        let l = layout(DataType::F32, Shape::from_static([2, 4, 8, 8]));
        let params = params_with(
            vec![l.clone()],
            vec![l],
            vec![FusedOp::new(FusedOpKind::Activation(ActivationFunc::Clamp))],
        );
        let err = fused_ops_jit_constants("k", &params, true).unwrap_err();
        assert!(matches!(err, GenerationError::MissingAttribute { .. }));

        let with_bounds = params_with(
            vec![layout(DataType::F32, Shape::from_static([2, 4, 8, 8]))],
            vec![layout(DataType::F32, Shape::from_static([2, 4, 8, 8]))],
            vec![
                FusedOp::new(FusedOpKind::Activation(ActivationFunc::Clamp))
                    .with_params([-1.0, 1.0]),
            ],
        );
        let jit = fused_ops_jit_constants("k", &with_bounds, true).unwrap();
        assert_eq!(jit.get("FUSED_OP_0_CLAMP_LO"), Some(&JitValue::Float(-1.0)));
        assert_eq!(jit.get("FUSED_OP_0_CLAMP_HI"), Some(&JitValue::Float(1.0)));
    }
}
