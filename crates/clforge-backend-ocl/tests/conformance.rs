//! Conformance battery instantiated for every manager this backend ships.

mod common;

use clforge::graph::{EltwiseMode, FusedOp, FusedOpKind};
use clforge::implementation::ShapeSupport;
use clforge::layout::{DataType, Format};
use clforge_backend_ocl::impls::{GroupNormBfyxOpt, GroupNormRef, SoftmaxRef};
use clforge_impl_tests::define_impl_conformance_tests;

define_impl_conformance_tests!(
    group_norm_bfyx_opt_static,
    GroupNormBfyxOpt::new(ShapeSupport::STATIC),
    common::static_group_norm_node()
);

define_impl_conformance_tests!(
    group_norm_bfyx_opt_dynamic,
    GroupNormBfyxOpt::new(ShapeSupport::DYNAMIC),
    common::dynamic_group_norm_node()
);

define_impl_conformance_tests!(
    group_norm_ref,
    GroupNormRef::new(),
    common::small_group_norm_node()
);

define_impl_conformance_tests!(softmax_ref, SoftmaxRef::new(), common::static_softmax_node());

define_impl_conformance_tests!(
    softmax_ref_fused,
    SoftmaxRef::new(),
    common::softmax_node(
        "sm_fused",
        common::tensor(Format::Bfyx, DataType::F32, &[2, 16, 4, 4]),
        -3,
        vec![FusedOp::new(FusedOpKind::Eltwise(EltwiseMode::Mul))
            .with_extra_input(common::tensor(Format::Bfyx, DataType::F32, &[2, 16, 4, 4]))],
    )
);
