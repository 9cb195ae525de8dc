use std::fmt;

use serde::{Deserialize, Serialize};

/// Enumerates the memory layout tags the OCL implementations understand.
///
/// `Bfyx` is the canonical dense activation layout (batch, feature, then
/// spatial axes innermost-last); `Bfzyx` and `Bfwzyx` extend it with one and
/// two extra spatial axes. `BFsYxFsv16` is a feature-blocked layout used by
/// vectorized kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    Bfyx,
    Bfzyx,
    Bfwzyx,
    BFsYxFsv16,
}

impl Format {
    /// Logical rank of a tensor stored in this layout (batch + feature + spatial axes).
    pub fn rank(self) -> usize {
        match self {
            Format::Bfyx | Format::BFsYxFsv16 => 4,
            Format::Bfzyx => 5,
            Format::Bfwzyx => 6,
        }
    }

    /// Returns `true` when the layout blocks the feature axis rather than
    /// storing it as a plain dense stride.
    pub fn is_blocked(self) -> bool {
        matches!(self, Format::BFsYxFsv16)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Bfyx => "bfyx",
            Format::Bfzyx => "bfzyx",
            Format::Bfwzyx => "bfwzyx",
            Format::BFsYxFsv16 => "b_fs_yx_fsv16",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar element types supported by the generated kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    F32,
    F16,
    U8,
    I8,
    I32,
    I64,
}

impl DataType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::F16 => 2,
            DataType::F32 | DataType::I32 => 4,
            DataType::I64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F16)
    }

    /// OpenCL C spelling of the scalar type, used by jit constants.
    pub fn to_cl_type(self) -> &'static str {
        match self {
            DataType::F32 => "float",
            DataType::F16 => "half",
            DataType::U8 => "uchar",
            DataType::I8 => "char",
            DataType::I32 => "int",
            DataType::I64 => "long",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F16 => "f16",
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tensor extent: either known at generation time or resolved at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Static(usize),
    Dynamic,
}

impl Dimension {
    pub fn is_dynamic(self) -> bool {
        matches!(self, Dimension::Dynamic)
    }

    pub fn as_static(self) -> Option<usize> {
        match self {
            Dimension::Static(extent) => Some(extent),
            Dimension::Dynamic => None,
        }
    }
}

/// Ordered list of dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<Dimension>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<Dimension>>) -> Self {
        Self { dims: dims.into() }
    }

    /// Builds a fully static shape from concrete extents.
    pub fn from_static(dims: impl IntoIterator<Item = usize>) -> Self {
        Self {
            dims: dims.into_iter().map(Dimension::Static).collect(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn is_dynamic(&self) -> bool {
        self.dims.iter().any(|dim| dim.is_dynamic())
    }

    /// Concrete extents when every dimension is static.
    pub fn static_dims(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(|dim| dim.as_static()).collect()
    }

    /// Total element count when the shape is fully static.
    pub fn element_count(&self) -> Option<usize> {
        self.static_dims()
            .map(|dims| dims.into_iter().product::<usize>())
    }
}

/// Full memory description of one tensor as seen by kernel generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout {
    pub format: Format,
    pub data_type: DataType,
    pub shape: Shape,
}

impl Layout {
    pub fn new(format: Format, data_type: DataType, shape: Shape) -> Self {
        Self {
            format,
            data_type,
            shape,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.shape.is_dynamic()
    }

    /// Short stable string used in diagnostics and entry-point naming,
    /// e.g. `f32_bfyx_2x4x8x8`. Dynamic extents render as `?`.
    pub fn signature(&self) -> String {
        let mut out = String::new();
        out.push_str(self.data_type.as_str());
        out.push('_');
        out.push_str(self.format.as_str());
        for (index, dim) in self.shape.dims().iter().enumerate() {
            out.push(if index == 0 { '_' } else { 'x' });
            match dim {
                Dimension::Static(extent) => out.push_str(&extent.to_string()),
                Dimension::Dynamic => out.push('?'),
            }
        }
        out
    }
}
