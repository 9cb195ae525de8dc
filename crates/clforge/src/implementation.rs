//! The selection contract: an [`ImplementationManager`] advertises what it can
//! handle and builds [`Implementation`] instances for nodes that pass its
//! checks.

use crate::error::GenerationError;
use crate::graph::{ProgramNode, RuntimeParams};
use crate::kernel::{KernelData, WorkGroups};

/// Shape class of a node at selection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Static,
    Dynamic,
}

/// Which shape classes a registered candidate is willing to see.
///
/// Filtering on shape class happens before `validate` runs, so a manager's
/// validation logic never has to re-check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeSupport {
    pub static_shapes: bool,
    pub dynamic_shapes: bool,
}

impl ShapeSupport {
    pub const STATIC: Self = Self {
        static_shapes: true,
        dynamic_shapes: false,
    };

    pub const DYNAMIC: Self = Self {
        static_shapes: false,
        dynamic_shapes: true,
    };

    pub const ANY: Self = Self {
        static_shapes: true,
        dynamic_shapes: true,
    };

    pub fn supports(self, kind: ShapeKind) -> bool {
        match kind {
            ShapeKind::Static => self.static_shapes,
            ShapeKind::Dynamic => self.dynamic_shapes,
        }
    }
}

/// Extra per-registration predicate ANDed with the manager's own `validate`.
pub type ValidateFn = fn(&ProgramNode) -> bool;

/// A device-specific strategy for one operator kind.
///
/// Managers are stateless and shared; one instance serves every node that
/// selects it. `validate` is pure and must not mutate anything or fail with
/// an error: unsupported simply means "next candidate".
pub trait ImplementationManager: Send + Sync {
    /// Stable identity, e.g. `ocl::group_norm::bfyx_opt`. Used in logs, forced
    /// selection, and selection failure reports.
    fn key(&self) -> &'static str;

    fn shape_support(&self) -> ShapeSupport;

    /// Whether this manager can handle the node. Returning `false` is normal
    /// control flow, not an error.
    fn validate(&self, node: &ProgramNode) -> bool;

    /// Builds the executable implementation. Only called after `validate`
    /// accepted the node, so failures here are contract violations.
    fn create(
        &self,
        node: &ProgramNode,
        params: &RuntimeParams,
    ) -> Result<Box<dyn Implementation>, GenerationError>;
}

/// An executable strategy instance bound to one node.
pub trait Implementation: Send + Sync {
    /// Key of the manager that created this instance.
    fn key(&self) -> &'static str;

    /// Generated kernels in execution order.
    fn kernels(&self) -> &[KernelData];

    /// Dispatch sizes, one entry per kernel. Empty until the first
    /// `update_dispatch` on dynamic-shape instances.
    fn work_groups(&self) -> &[WorkGroups];

    /// Byte sizes of scratch buffers the kernels require, in binding order.
    fn intermediate_buffers(&self) -> &[usize] {
        &[]
    }

    /// Recomputes work sizes and intermediate buffer sizes for concrete
    /// shapes. Static instances compute these at creation; dynamic instances
    /// call this once real extents are known.
    fn update_dispatch(&mut self, params: &RuntimeParams) -> Result<(), GenerationError>;
}
