//! Single-use kernel generator.
//!
//! A [`KernelGenerator`] assembles one [`KernelData`] from a template plus the
//! node's runtime parameters: jit constants first, then arguments and build
//! options, then the entry point, then the stitched source, and finally an
//! argument parity check against the parameter list the template declares.
//! `get_kernel_data` consumes the generator so a half-configured one can
//! never be reused for a second kernel.

use clforge::env;
use clforge::error::{GenerationError, GenerationResult};
use clforge::graph::RuntimeParams;
use clforge::hashing;
use clforge::kernel::{ArgumentDescriptor, Arguments, JitConstants, KernelData};
use clforge::profiling;

use crate::jit;
use crate::templates::TemplateStore;

/// Per-implementation customization points. Every hook has a default, so a
/// plain elementwise kernel needs an empty impl and nothing else.
pub trait GeneratorSpec {
    /// Jit constants specific to this implementation, appended after the
    /// base and tensor constants.
    fn specialized_jit_constants(&self, _params: &RuntimeParams) -> GenerationResult<JitConstants> {
        Ok(JitConstants::new())
    }

    /// Argument descriptors in kernel parameter order.
    fn arguments(&self, params: &RuntimeParams) -> GenerationResult<Arguments> {
        Ok(default_arguments(params))
    }

    fn build_options(&self, params: &RuntimeParams) -> String {
        default_build_options(params)
    }
}

/// Builds exactly one kernel, then is gone.
pub struct KernelGenerator<'a> {
    base_name: &'static str,
    stage_suffix: Option<&'static str>,
    template: &'static str,
    store: &'a dyn TemplateStore,
    emit_fused_ops: bool,
}

impl<'a> KernelGenerator<'a> {
    pub fn new(
        base_name: &'static str,
        template: &'static str,
        store: &'a dyn TemplateStore,
    ) -> Self {
        Self {
            base_name,
            stage_suffix: None,
            template,
            store,
            emit_fused_ops: true,
        }
    }

    /// Appends a stage suffix to the kernel name. Multi-kernel
    /// implementations use this to keep per-stage entry points distinct.
    pub fn with_stage(mut self, suffix: &'static str) -> Self {
        self.stage_suffix = Some(suffix);
        self
    }

    /// Controls whether fused operations are inlined. Intermediate stages of
    /// multi-kernel implementations turn this off so fusion only applies to
    /// the stage that writes the final output.
    pub fn with_fused_ops(mut self, emit: bool) -> Self {
        self.emit_fused_ops = emit;
        self
    }

    pub fn kernel_name(&self) -> String {
        match self.stage_suffix {
            Some(suffix) => format!("{}_{}", self.base_name, suffix),
            None => self.base_name.to_string(),
        }
    }

    /// Runs the full generation pipeline and hands back the finished
    /// artifact. Identical inputs produce byte-identical output.
    pub fn get_kernel_data(
        self,
        spec: &dyn GeneratorSpec,
        params: &RuntimeParams,
    ) -> GenerationResult<KernelData> {
        let _scope = profiling::generate_scope(self.base_name);
        let kernel_name = self.kernel_name();
        let fusion_active = self.emit_fused_ops && !env::fusion_disabled();

        let mut jit_constants = jit::base_jit_constants(&kernel_name, params)?;
        jit_constants.extend(jit::tensor_jit_constants(params)?)?;
        jit_constants.extend(spec.specialized_jit_constants(params)?)?;
        jit_constants.extend(jit::fused_ops_jit_constants(&kernel_name, params, fusion_active)?)?;

        let arguments = spec.arguments(params)?;
        let build_options = spec.build_options(params);
        let entry_point = entry_point(&kernel_name, params, &build_options);

        let template =
            self.store
                .lookup(self.template)
                .ok_or_else(|| GenerationError::TemplateNotFound {
                    template: self.template.to_string(),
                })?;

        let mut source = jit_constants.render_defines();
        source.push_str("#define KERNEL(name) __kernel void ");
        source.push_str(&entry_point);
        source.push('\n');
        source.push('\n');
        source.push_str(template);

        let parameters = declared_parameter_count(template, self.template, params, fusion_active)?;
        if parameters != arguments.len() {
            return Err(GenerationError::ArgumentParity {
                kernel: kernel_name,
                arguments: arguments.len(),
                parameters,
            });
        }

        profiling::cache_event("kernel_generated");
        Ok(KernelData {
            source,
            entry_point,
            build_options,
            jit_constants,
            arguments,
        })
    }
}

/// Canonical argument order: shape info first when dynamic, then inputs,
/// outputs, and one slot per fused-operation extra input.
pub fn default_arguments(params: &RuntimeParams) -> Arguments {
    let mut arguments = Vec::new();
    if params.is_dynamic() {
        arguments.push(ArgumentDescriptor::ShapeInfo);
    }
    for index in 0..params.inputs.len() {
        arguments.push(ArgumentDescriptor::Input(index as u32));
    }
    for index in 0..params.outputs.len() {
        arguments.push(ArgumentDescriptor::Output(index as u32));
    }
    if !env::fusion_disabled() {
        for (op_index, op) in params.fused_ops.iter().enumerate() {
            for input_index in 0..op.extra_inputs.len() {
                arguments.push(ArgumentDescriptor::FusedOpInput {
                    op_index: op_index as u32,
                    input_index: input_index as u32,
                });
            }
        }
    }
    arguments
}

/// `-cl-fast-relaxed-math` is only safe when every bound tensor is floating
/// point; integer kernels keep strict semantics.
pub fn default_build_options(params: &RuntimeParams) -> String {
    let mut options = String::from("-cl-mad-enable");
    let all_float = params
        .inputs
        .iter()
        .chain(params.outputs.iter())
        .all(|layout| layout.data_type.is_float());
    if all_float {
        options.push_str(" -cl-fast-relaxed-math");
    }
    options
}

/// Rewrites a kernel name into a valid C identifier.
pub fn sanitize_symbol(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        return "entry".to_string();
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn entry_point(kernel_name: &str, params: &RuntimeParams, build_options: &str) -> String {
    let mut hash = hashing::fnv1a_init();
    hash = hashing::fnv1a_u64(hash, params.digest());
    hash = hashing::fnv1a_bytes(hash, build_options.as_bytes());
    format!("{}__{hash:016x}", sanitize_symbol(kernel_name))
}

/// Counts the parameters the template's `KERNEL(name)(...)` header declares,
/// expanding the two macros that change arity: `OPTIONAL_SHAPE_INFO_ARG`
/// (one parameter on dynamic shapes, zero otherwise) and `FUSED_OPS_ARGS`
/// (one parameter per fused-operation extra input while fusion is active).
fn declared_parameter_count(
    template_source: &str,
    template_name: &str,
    params: &RuntimeParams,
    fusion_active: bool,
) -> GenerationResult<usize> {
    let malformed = || GenerationError::MalformedTemplate {
        template: template_name.to_string(),
    };

    let start = template_source.find("KERNEL(").ok_or_else(malformed)?;
    let after_macro = &template_source[start + "KERNEL(".len()..];
    let name_end = after_macro.find(')').ok_or_else(malformed)?;
    let rest = after_macro[name_end + 1..].trim_start();
    let rest = rest.strip_prefix('(').ok_or_else(malformed)?;

    let mut depth = 0usize;
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut closed = false;
    for ch in rest.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                if depth == 0 {
                    closed = true;
                    break;
                }
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => pieces.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !closed {
        return Err(malformed());
    }
    pieces.push(current);

    let fused_count = jit::fused_argument_count(params, fusion_active);
    let mut count = 0usize;
    for piece in &pieces {
        let mut rest = piece.trim();
        if let Some(stripped) = rest.strip_prefix("OPTIONAL_SHAPE_INFO_ARG") {
            if params.is_dynamic() {
                count += 1;
            }
            rest = stripped.trim();
        }
        if let Some(found) = rest.find("FUSED_OPS_ARGS") {
            count += fused_count;
            let before = rest[..found].trim();
            let after = rest[found + "FUSED_OPS_ARGS".len()..].trim();
            if !before.is_empty() || !after.is_empty() {
                count += 1;
            }
        } else if !rest.is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
