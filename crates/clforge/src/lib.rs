extern crate self as clforge;

pub use linkme;

pub mod env;
pub mod error;
pub mod graph;
pub mod hashing;
pub mod implementation;
pub mod kernel;
pub mod layout;
pub mod profiling;
pub mod registry;

pub use error::{GenerationError, GenerationResult, SelectionError, SelectionResult};
pub use graph::{ProgramNode, RuntimeParams};
pub use implementation::{Implementation, ImplementationManager, ShapeKind, ShapeSupport};
pub use kernel::KernelData;
pub use layout::{DataType, Dimension, Format, Layout, Shape};
