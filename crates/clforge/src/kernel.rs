//! Kernel generation artifacts: jit constants, argument descriptors, and the
//! finished [`KernelData`] handed to the runtime for compilation and binding.

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};

/// Value of a single preprocessor definition injected into kernel source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JitValue {
    Int(i64),
    Float(f32),
    Text(String),
    Bool(bool),
}

impl JitValue {
    /// Renders the value as it appears after `#define NAME `.
    pub fn render(&self) -> String {
        match self {
            JitValue::Int(v) => v.to_string(),
            JitValue::Float(v) => format!("{v:?}f"),
            JitValue::Text(v) => v.clone(),
            JitValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
        }
    }
}

/// Ordered set of preprocessor definitions.
///
/// Insertion order is preserved verbatim in the rendered header, and adding a
/// name twice is an error rather than a silent overwrite: a collision means
/// two generation stages disagree about a value, which must surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JitConstants {
    entries: Vec<(String, JitValue)>,
}

impl JitConstants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: JitValue) -> GenerationResult<()> {
        let name = name.into();
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            return Err(GenerationError::DuplicateJitConstant { name });
        }
        self.entries.push((name, value));
        Ok(())
    }

    pub fn extend(&mut self, other: JitConstants) -> GenerationResult<()> {
        for (name, value) in other.entries {
            self.add(name, value)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&JitValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JitValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Renders the full `#define` block, one definition per line, in
    /// insertion order.
    pub fn render_defines(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.entries {
            out.push_str("#define ");
            out.push_str(name);
            out.push(' ');
            out.push_str(&value.render());
            out.push('\n');
        }
        out
    }
}

/// Positional binding slot for one kernel parameter.
///
/// The runtime binds buffers by walking this list in order; the i-th
/// descriptor corresponds to the i-th parameter of the generated kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentDescriptor {
    /// Runtime shape buffer, present only for dynamic-shape kernels.
    ShapeInfo,
    Input(u32),
    Output(u32),
    FusedOpInput { op_index: u32, input_index: u32 },
    Intermediate(u32),
    Scalar(u32),
}

pub type Arguments = Vec<ArgumentDescriptor>;

/// Global and local work sizes for one kernel dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkGroups {
    pub global: [u64; 3],
    pub local: [u64; 3],
}

/// Complete description of one compiled-kernel-to-be: everything the runtime
/// needs to compile, bind, and launch, with no callbacks into the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelData {
    pub source: String,
    pub entry_point: String,
    pub build_options: String,
    pub jit_constants: JitConstants,
    pub arguments: Arguments,
}

impl KernelData {
    /// Pretty-printed JSON dump for debugging and artifact inspection.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
