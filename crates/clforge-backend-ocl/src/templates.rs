//! Kernel templates bundled with the backend.
//!
//! Templates are plain OpenCL with two conventions: the kernel header is
//! written as `KERNEL(name)(...)` so the generator controls the real entry
//! point, and the `OPTIONAL_SHAPE_INFO_ARG` / `FUSED_OPS_ARGS` /
//! `FUSED_OPS(result, idx)` hooks expand per node. The [`TemplateStore`]
//! indirection lets tests substitute their own sources.

pub const GROUP_NORM_BFYX_MEAN: &str = "group_norm_bfyx_mean";
pub const GROUP_NORM_BFYX_VAR: &str = "group_norm_bfyx_var";
pub const GROUP_NORM_BFYX_FINAL: &str = "group_norm_bfyx_final";
pub const GROUP_NORM_REF: &str = "group_norm_ref";
pub const SOFTMAX_REF: &str = "softmax_ref";

const GROUP_NORM_BFYX_MEAN_SOURCE: &str = include_str!("templates/group_norm_bfyx_mean.cl");
const GROUP_NORM_BFYX_VAR_SOURCE: &str = include_str!("templates/group_norm_bfyx_var.cl");
const GROUP_NORM_BFYX_FINAL_SOURCE: &str = include_str!("templates/group_norm_bfyx_final.cl");
const GROUP_NORM_REF_SOURCE: &str = include_str!("templates/group_norm_ref.cl");
const SOFTMAX_REF_SOURCE: &str = include_str!("templates/softmax_ref.cl");

/// Source of kernel templates, looked up by name.
pub trait TemplateStore: Send + Sync {
    fn lookup(&self, name: &str) -> Option<&str>;
}

/// The compiled-in template set.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateStore for BuiltinTemplates {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            GROUP_NORM_BFYX_MEAN => Some(GROUP_NORM_BFYX_MEAN_SOURCE),
            GROUP_NORM_BFYX_VAR => Some(GROUP_NORM_BFYX_VAR_SOURCE),
            GROUP_NORM_BFYX_FINAL => Some(GROUP_NORM_BFYX_FINAL_SOURCE),
            GROUP_NORM_REF => Some(GROUP_NORM_REF_SOURCE),
            SOFTMAX_REF => Some(SOFTMAX_REF_SOURCE),
            _ => None,
        }
    }
}

pub fn builtin_templates() -> &'static BuiltinTemplates {
    static STORE: BuiltinTemplates = BuiltinTemplates;
    &STORE
}

pub fn builtin_template_names() -> &'static [&'static str] {
    &[
        GROUP_NORM_BFYX_MEAN,
        GROUP_NORM_BFYX_VAR,
        GROUP_NORM_BFYX_FINAL,
        GROUP_NORM_REF,
        SOFTMAX_REF,
    ]
}
