//! Selection through the process-wide registry with this backend's
//! implementations registered.

mod common;

use clforge::error::SelectionError;
use clforge::graph::{OpKind, RuntimeParams};
use clforge::implementation::{Implementation, ImplementationManager};
use clforge::layout::{DataType, Format};
use clforge::registry;
use clforge_backend_ocl::impls::group_norm::{GROUP_NORM_BFYX_OPT_KEY, GROUP_NORM_REF_KEY};
use clforge_backend_ocl::impls::softmax::SOFTMAX_REF_KEY;
use clforge_backend_ocl::register_ocl_impls;

fn setup() {
    register_ocl_impls();
}

#[test]
fn bfyx_f32_group_norm_selects_the_optimized_variant() {
    setup();
    let node = common::static_group_norm_node();
    let selected = registry::select_implementation(&node).expect("selection succeeds");
    assert_eq!(selected.key(), GROUP_NORM_BFYX_OPT_KEY);

    let built = selected
        .create(&node, &RuntimeParams::from_node(&node))
        .expect("create succeeds");
    assert_eq!(built.kernels().len(), 3);
    assert_eq!(built.kernels()[2].arguments.len(), 6);
}

#[test]
fn small_group_slices_fall_through_to_the_reference() {
    setup();
    let node = common::small_group_norm_node();
    let selected = registry::select_implementation(&node).expect("selection succeeds");
    assert_eq!(selected.key(), GROUP_NORM_REF_KEY);
}

#[test]
fn unsupported_format_reports_every_candidate_tried() {
    setup();
    let node = common::group_norm_node(
        "gn_w",
        common::tensor(Format::Bfwzyx, DataType::F32, &[2, 4, 3, 8, 8, 8]),
        2,
        Vec::new(),
    );
    let err = registry::select_implementation(&node).err().expect("no candidate accepts bfwzyx");
    let SelectionError::NoImplementation { candidates, .. } = &err;
    assert_eq!(
        candidates,
        &vec![GROUP_NORM_BFYX_OPT_KEY, GROUP_NORM_REF_KEY],
        "the dynamic-only candidate is shape-filtered, everything else is tried"
    );
    let message = err.to_string();
    assert!(message.contains("gn_w"));
    assert!(message.contains("ocl::group_norm::bfyx_opt, ocl::group_norm::ref"));
}

#[test]
fn dynamic_nodes_select_the_dynamic_variant() {
    setup();
    let node = common::dynamic_group_norm_node();
    let selected = registry::select_implementation(&node).expect("selection succeeds");
    assert_eq!(selected.key(), GROUP_NORM_BFYX_OPT_KEY);
    assert!(selected.shape_support().dynamic_shapes);
    assert!(!selected.shape_support().static_shapes);

    let built = selected
        .create(&node, &RuntimeParams::from_node(&node))
        .expect("create succeeds");
    assert!(built.work_groups().is_empty());
}

#[test]
fn softmax_selects_the_reference() {
    setup();
    let node = common::static_softmax_node();
    let selected = registry::select_implementation(&node).expect("selection succeeds");
    assert_eq!(selected.key(), SOFTMAX_REF_KEY);
}

#[test]
fn forcing_a_key_still_runs_validation() {
    setup();
    let node = common::static_group_norm_node();

    let forced = registry::select_forced_implementation(&node, GROUP_NORM_REF_KEY)
        .expect("the reference validates the node even when it would not win");
    assert_eq!(forced.key(), GROUP_NORM_REF_KEY);

    let err = registry::select_forced_implementation(&node, "ocl::group_norm::nope")
        .err().expect("unknown key");
    let SelectionError::NoImplementation { candidates, .. } = &err;
    assert!(candidates.is_empty());

    let softmax = common::static_softmax_node();
    let err = registry::select_forced_implementation(&softmax, GROUP_NORM_BFYX_OPT_KEY)
        .err().expect("a group norm key never matches a softmax node");
    let SelectionError::NoImplementation { candidates, .. } = &err;
    assert!(candidates.is_empty());
}

#[test]
fn registration_order_is_priority_order() {
    setup();
    assert_eq!(
        registry::candidate_keys(OpKind::GroupNormalization),
        vec![
            GROUP_NORM_BFYX_OPT_KEY,
            GROUP_NORM_BFYX_OPT_KEY,
            GROUP_NORM_REF_KEY,
        ]
    );
    assert_eq!(
        registry::candidate_keys(OpKind::Softmax),
        vec![SOFTMAX_REF_KEY]
    );
}
