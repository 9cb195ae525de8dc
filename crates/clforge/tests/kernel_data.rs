//! Artifact-side contracts: jit constant ordering and duplicate rejection,
//! layout signatures, runtime parameter digests, and JSON dumps.

use clforge::graph::{GroupNormAttrs, OpAttributes, OpKind, ProgramNode, RuntimeParams};
use clforge::kernel::{ArgumentDescriptor, JitConstants, JitValue, KernelData};
use clforge::layout::{DataType, Dimension, Format, Layout, Shape};
use clforge::GenerationError;

fn node_with_shape(dims: &[usize]) -> ProgramNode {
    let layout = Layout::new(
        Format::Bfyx,
        DataType::F32,
        Shape::from_static(dims.iter().copied()),
    );
    ProgramNode {
        id: "n0".to_string(),
        op_kind: OpKind::GroupNormalization,
        inputs: vec![layout.clone()],
        outputs: vec![layout],
        fused_ops: Vec::new(),
        attributes: OpAttributes::GroupNorm(GroupNormAttrs {
            num_groups: 2,
            epsilon: 1e-5,
        }),
    }
}

#[test]
fn jit_constants_render_in_insertion_order() {
    let mut jit = JitConstants::new();
    jit.add("LOCAL_SIZE", JitValue::Int(128)).unwrap();
    jit.add("EPSILON", JitValue::Float(0.5)).unwrap();
    jit.add("ENABLE_FP16", JitValue::Bool(true)).unwrap();
    jit.add("SUFFIX", JitValue::Text("(x + 1)".to_string()))
        .unwrap();

    assert_eq!(
        jit.render_defines(),
        "#define LOCAL_SIZE 128\n\
         #define EPSILON 0.5f\n\
         #define ENABLE_FP16 1\n\
         #define SUFFIX (x + 1)\n"
    );
    let names: Vec<&str> = jit.iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["LOCAL_SIZE", "EPSILON", "ENABLE_FP16", "SUFFIX"]);
}

#[test]
fn duplicate_jit_constant_is_rejected() {
    let mut jit = JitConstants::new();
    jit.add("NUM_GROUPS", JitValue::Int(4)).unwrap();
    let err = jit
        .add("NUM_GROUPS", JitValue::Int(8))
        .expect_err("second definition of the same name must fail");
    assert!(matches!(
        err,
        GenerationError::DuplicateJitConstant { ref name } if name == "NUM_GROUPS"
    ));
    // The failed add must not clobber the original value.
    assert_eq!(jit.get("NUM_GROUPS"), Some(&JitValue::Int(4)));
    assert_eq!(jit.len(), 1);

    let mut other = JitConstants::new();
    other.add("EPSILON", JitValue::Float(1e-5)).unwrap();
    other.add("NUM_GROUPS", JitValue::Int(8)).unwrap();
    let err = jit
        .extend(other)
        .expect_err("extend hits the same collision");
    assert!(matches!(
        err,
        GenerationError::DuplicateJitConstant { ref name } if name == "NUM_GROUPS"
    ));
}

#[test]
fn kernel_data_json_round_trip() {
    let mut jit = JitConstants::new();
    jit.add("AXIS_LEN", JitValue::Int(16)).unwrap();
    let data = KernelData {
        source: "__kernel void k() {}".to_string(),
        entry_point: "k__0123456789abcdef".to_string(),
        build_options: "-cl-mad-enable".to_string(),
        jit_constants: jit,
        arguments: vec![
            ArgumentDescriptor::Input(0),
            ArgumentDescriptor::Output(0),
            ArgumentDescriptor::FusedOpInput {
                op_index: 0,
                input_index: 0,
            },
            ArgumentDescriptor::Intermediate(1),
        ],
    };

    let json = data.to_json().expect("kernel data serializes");
    let parsed: KernelData = serde_json::from_str(&json).expect("dump parses back");
    assert_eq!(parsed, data);
}

#[test]
fn layout_signatures() {
    let layout = Layout::new(
        Format::Bfyx,
        DataType::F32,
        Shape::from_static([2, 4, 8, 8]),
    );
    assert_eq!(layout.signature(), "f32_bfyx_2x4x8x8");

    let dynamic = Layout::new(
        Format::Bfzyx,
        DataType::F16,
        Shape::new(vec![
            Dimension::Dynamic,
            Dimension::Static(32),
            Dimension::Static(4),
            Dimension::Static(8),
            Dimension::Static(8),
        ]),
    );
    assert_eq!(dynamic.signature(), "f16_bfzyx_?x32x4x8x8");
    assert!(dynamic.is_dynamic());

    let blocked = Layout::new(
        Format::BFsYxFsv16,
        DataType::I8,
        Shape::from_static([1, 32, 7, 7]),
    );
    assert_eq!(blocked.signature(), "i8_b_fs_yx_fsv16_1x32x7x7");
}

#[test]
fn shape_helpers() {
    let shape = Shape::from_static([2, 4, 8, 8]);
    assert_eq!(shape.rank(), 4);
    assert_eq!(shape.static_dims(), Some(vec![2, 4, 8, 8]));
    assert_eq!(shape.element_count(), Some(512));
    assert!(!shape.is_dynamic());

    let dynamic = Shape::new(vec![Dimension::Static(2), Dimension::Dynamic]);
    assert!(dynamic.is_dynamic());
    assert_eq!(dynamic.static_dims(), None);
    assert_eq!(dynamic.element_count(), None);
}

#[test]
fn data_type_properties() {
    assert_eq!(DataType::F32.size_in_bytes(), 4);
    assert_eq!(DataType::F16.size_in_bytes(), 2);
    assert_eq!(DataType::I64.size_in_bytes(), 8);
    assert!(DataType::F16.is_float());
    assert!(!DataType::I32.is_float());
    assert_eq!(DataType::U8.to_cl_type(), "uchar");
    assert_eq!(DataType::F16.to_cl_type(), "half");
}

#[test]
fn digest_is_stable_and_input_sensitive() {
    let node = node_with_shape(&[2, 4, 8, 8]);
    let a = RuntimeParams::from_node(&node).digest();
    let b = RuntimeParams::from_node(&node).digest();
    assert_eq!(a, b, "identical snapshots digest identically");

    let resized = node_with_shape(&[2, 4, 8, 16]);
    assert_ne!(
        a,
        RuntimeParams::from_node(&resized).digest(),
        "shape changes must change the digest"
    );

    let mut retuned = node_with_shape(&[2, 4, 8, 8]);
    retuned.attributes = OpAttributes::GroupNorm(GroupNormAttrs {
        num_groups: 2,
        epsilon: 1e-3,
    });
    assert_ne!(
        a,
        RuntimeParams::from_node(&retuned).digest(),
        "attribute changes must change the digest"
    );
}
