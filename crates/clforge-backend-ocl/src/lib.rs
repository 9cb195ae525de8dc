//! OpenCL backend: template-driven kernel generation plus the registered
//! implementations for each supported operator.
//!
//! The backend contributes its managers to the core registry through the
//! linked registrar below; embedding crates only need to depend on this crate
//! for its implementations to become selectable.

pub mod generator;
pub mod impls;
mod jit;
pub mod templates;

use std::sync::Once;

use serde::Serialize;

use clforge::error::GenerationError;
use clforge::graph::RuntimeParams;
use clforge::implementation::Implementation;
use clforge::kernel::{KernelData, WorkGroups};

/// Computes dispatch geometry for concrete shapes. Kept as a plain function
/// pointer so implementations stay `Send + Sync` without extra bounds.
pub type DispatchFn = fn(&RuntimeParams) -> Result<DispatchData, GenerationError>;

/// Work sizes and scratch buffer sizes produced by a [`DispatchFn`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchData {
    pub work_groups: Vec<WorkGroups>,
    pub intermediate_buffers: Vec<usize>,
}

/// Executable implementation shared by every manager in this backend: a
/// fixed kernel list plus a dispatch callback that concretizes work sizes.
///
/// For static nodes the dispatch callback runs at creation. For dynamic nodes
/// `work_groups` and `intermediate_buffers` stay empty until the runtime
/// calls `update_dispatch` with concrete extents.
pub struct OclImplementation {
    key: &'static str,
    kernels: Vec<KernelData>,
    work_groups: Vec<WorkGroups>,
    intermediate_buffers: Vec<usize>,
    dispatch: DispatchFn,
}

impl OclImplementation {
    pub fn new(key: &'static str, kernels: Vec<KernelData>, dispatch: DispatchFn) -> Self {
        Self {
            key,
            kernels,
            work_groups: Vec::new(),
            intermediate_buffers: Vec::new(),
            dispatch,
        }
    }

    /// Pretty JSON dump of everything the runtime would receive, for
    /// debugging and offline inspection.
    pub fn artifact_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Artifact<'a> {
            key: &'a str,
            kernels: &'a [KernelData],
            work_groups: &'a [WorkGroups],
            intermediate_buffers: &'a [usize],
        }
        serde_json::to_string_pretty(&Artifact {
            key: self.key,
            kernels: &self.kernels,
            work_groups: &self.work_groups,
            intermediate_buffers: &self.intermediate_buffers,
        })
    }
}

impl Implementation for OclImplementation {
    fn key(&self) -> &'static str {
        self.key
    }

    fn kernels(&self) -> &[KernelData] {
        &self.kernels
    }

    fn work_groups(&self) -> &[WorkGroups] {
        &self.work_groups
    }

    fn intermediate_buffers(&self) -> &[usize] {
        &self.intermediate_buffers
    }

    fn update_dispatch(&mut self, params: &RuntimeParams) -> Result<(), GenerationError> {
        let dispatch = (self.dispatch)(params)?;
        self.work_groups = dispatch.work_groups;
        self.intermediate_buffers = dispatch.intermediate_buffers;
        Ok(())
    }
}

/// Registers every implementation this backend provides. Runs at most once
/// no matter how often it is called, so tests may call it directly while the
/// linked registrar remains in place.
pub fn register_ocl_impls() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(impls::register_all);
}

#[clforge::linkme::distributed_slice(clforge::registry::IMPL_REGISTRARS)]
static REGISTER_OCL_IMPLS: fn() = register_ocl_impls;
