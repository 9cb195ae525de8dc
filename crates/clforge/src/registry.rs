//! Global implementation registry.
//!
//! Backends contribute candidates through [`IMPL_REGISTRARS`]; selection walks
//! the candidates for a node's operator kind in registration order and picks
//! the first one whose shape support and validation accept the node.
//! Registration order therefore doubles as priority order.

use std::collections::HashMap;
use std::sync::{Arc, Once, OnceLock, RwLock};

use crate::error::{SelectionError, SelectionResult};
use crate::graph::{OpKind, ProgramNode};
use crate::implementation::{ImplementationManager, ShapeKind, ValidateFn};
use crate::profiling;

/// Registration hooks contributed by backend crates. Each hook registers its
/// managers into the global registry exactly once.
#[linkme::distributed_slice]
pub static IMPL_REGISTRARS: [fn()] = [..];

pub type SelectedImpl = Arc<dyn ImplementationManager>;

struct RegisteredImpl {
    manager: Arc<dyn ImplementationManager>,
    extra_validate: Option<ValidateFn>,
}

impl RegisteredImpl {
    fn validate(&self, node: &ProgramNode) -> bool {
        if let Some(hook) = self.extra_validate {
            if !hook(node) {
                return false;
            }
        }
        self.manager.validate(node)
    }
}

/// Candidate lists keyed by operator kind. Usually accessed through the
/// process-wide instance via the free functions below; tests build their own.
pub struct ImplementationRegistry {
    candidates: RwLock<HashMap<OpKind, Vec<RegisteredImpl>>>,
}

impl ImplementationRegistry {
    pub fn new() -> Self {
        Self {
            candidates: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, op_kind: OpKind, manager: Arc<dyn ImplementationManager>) {
        self.register_with_hook(op_kind, manager, None);
    }

    /// Registers a candidate with an extra predicate ANDed with the manager's
    /// own `validate`. Lets one manager be registered several times with
    /// different gating.
    pub fn register_with_hook(
        &self,
        op_kind: OpKind,
        manager: Arc<dyn ImplementationManager>,
        extra_validate: Option<ValidateFn>,
    ) {
        let mut candidates = self
            .candidates
            .write()
            .expect("implementation registry poisoned");
        candidates.entry(op_kind).or_default().push(RegisteredImpl {
            manager,
            extra_validate,
        });
    }

    /// Keys of every candidate registered for `op_kind`, in registration
    /// order, without any filtering.
    pub fn candidate_keys(&self, op_kind: OpKind) -> Vec<String> {
        let candidates = self
            .candidates
            .read()
            .expect("implementation registry poisoned");
        candidates
            .get(&op_kind)
            .map(|list| list.iter().map(|c| c.manager.key().to_string()).collect())
            .unwrap_or_default()
    }

    /// First registered candidate that accepts the node.
    pub fn select(&self, node: &ProgramNode) -> SelectionResult<SelectedImpl> {
        self.select_with(node, None)
    }

    /// Like `select`, but only candidates whose key equals `key` are
    /// considered. Shape support and validation still apply: forcing an
    /// implementation never bypasses its checks.
    pub fn select_forced(&self, node: &ProgramNode, key: &str) -> SelectionResult<SelectedImpl> {
        self.select_with(node, Some(key))
    }

    fn select_with(&self, node: &ProgramNode, forced: Option<&str>) -> SelectionResult<SelectedImpl> {
        let _scope = profiling::select_scope(node.op_kind.as_str());
        let shape_kind = if node.is_dynamic() {
            ShapeKind::Dynamic
        } else {
            ShapeKind::Static
        };
        let candidates = self
            .candidates
            .read()
            .expect("implementation registry poisoned");
        let mut tried = Vec::new();
        if let Some(list) = candidates.get(&node.op_kind) {
            for candidate in list {
                if let Some(key) = forced {
                    if candidate.manager.key() != key {
                        continue;
                    }
                }
                if !candidate.manager.shape_support().supports(shape_kind) {
                    continue;
                }
                tried.push(candidate.manager.key().to_string());
                if candidate.validate(node) {
                    return Ok(candidate.manager.clone());
                }
            }
        }
        Err(SelectionError::NoImplementation {
            op_kind: node.op_kind,
            node_id: node.id.clone(),
            candidates: tried,
        })
    }
}

impl Default for ImplementationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<ImplementationRegistry> = OnceLock::new();
static INIT: Once = Once::new();

fn global() -> &'static ImplementationRegistry {
    GLOBAL_REGISTRY.get_or_init(ImplementationRegistry::new)
}

/// Runs every linked registrar exactly once. Selection calls this on its own;
/// call it explicitly when enumerating candidates before any selection ran.
pub fn ensure_initialized() {
    INIT.call_once(|| {
        for registrar in IMPL_REGISTRARS {
            registrar();
        }
    });
}

pub fn register_implementation(op_kind: OpKind, manager: Arc<dyn ImplementationManager>) {
    global().register(op_kind, manager);
}

pub fn register_implementation_with_hook(
    op_kind: OpKind,
    manager: Arc<dyn ImplementationManager>,
    extra_validate: Option<ValidateFn>,
) {
    global().register_with_hook(op_kind, manager, extra_validate);
}

pub fn candidate_keys(op_kind: OpKind) -> Vec<String> {
    ensure_initialized();
    global().candidate_keys(op_kind)
}

/// Selects an implementation for the node from the process-wide registry,
/// honoring `CLFORGE_FORCE_IMPL` when set.
pub fn select_implementation(node: &ProgramNode) -> SelectionResult<SelectedImpl> {
    ensure_initialized();
    match crate::env::forced_impl() {
        Some(key) => global().select_forced(node, key),
        None => global().select(node),
    }
}

/// Selects only among candidates with the given key, ignoring the
/// environment override.
pub fn select_forced_implementation(
    node: &ProgramNode,
    key: &str,
) -> SelectionResult<SelectedImpl> {
    ensure_initialized();
    global().select_forced(node, key)
}
