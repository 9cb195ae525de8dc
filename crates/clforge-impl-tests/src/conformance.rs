//! The individual conformance checks. Each takes the manager and a node the
//! manager is expected to accept; panics describe which contract broke.

use std::collections::HashSet;

use clforge::graph::{ProgramNode, RuntimeParams};
use clforge::implementation::ImplementationManager;

pub fn validate_accepts(manager: &dyn ImplementationManager, node: &ProgramNode) {
    assert!(
        manager.validate(node),
        "manager '{}' must accept its conformance node",
        manager.key()
    );
}

pub fn create_succeeds(manager: &dyn ImplementationManager, node: &ProgramNode) {
    let params = RuntimeParams::from_node(node);
    let built = manager
        .create(node, &params)
        .unwrap_or_else(|err| panic!("manager '{}' failed to create: {err}", manager.key()));
    assert_eq!(built.key(), manager.key());
    assert!(
        !built.kernels().is_empty(),
        "manager '{}' produced no kernels",
        manager.key()
    );
    if params.is_dynamic() {
        assert!(
            built.work_groups().is_empty(),
            "dynamic implementations must not have work sizes before dispatch"
        );
    } else {
        assert_eq!(
            built.kernels().len(),
            built.work_groups().len(),
            "static implementations need one work size per kernel"
        );
    }
}

pub fn generation_is_deterministic(manager: &dyn ImplementationManager, node: &ProgramNode) {
    let params = RuntimeParams::from_node(node);
    let first = manager.create(node, &params).expect("first create succeeds");
    let second = manager
        .create(node, &params)
        .expect("second create succeeds");
    assert_eq!(
        first.kernels(),
        second.kernels(),
        "identical parameters must generate identical kernels"
    );
}

pub fn arguments_match_parameters(manager: &dyn ImplementationManager, node: &ProgramNode) {
    let params = RuntimeParams::from_node(node);
    let built = manager.create(node, &params).expect("create succeeds");
    for kernel in built.kernels() {
        let declared = declared_parameters(&kernel.source);
        assert_eq!(
            declared,
            kernel.arguments.len(),
            "kernel '{}' declares {declared} parameters but binds {} arguments",
            kernel.entry_point,
            kernel.arguments.len()
        );
    }
}

pub fn entry_points_are_unique(manager: &dyn ImplementationManager, node: &ProgramNode) {
    let params = RuntimeParams::from_node(node);
    let built = manager.create(node, &params).expect("create succeeds");
    let mut seen = HashSet::new();
    for kernel in built.kernels() {
        assert!(
            seen.insert(kernel.entry_point.clone()),
            "duplicate entry point '{}'",
            kernel.entry_point
        );
        assert!(
            kernel.source.contains(&kernel.entry_point),
            "source of '{}' must define its own entry point",
            kernel.entry_point
        );
    }
}

/// Independent parameter count: expands `OPTIONAL_SHAPE_INFO_ARG` and
/// `FUSED_OPS_ARGS` with the values the source itself defines, then counts
/// the non-empty comma-separated pieces of the kernel header.
fn declared_parameters(source: &str) -> usize {
    let shape_info = define_value(source, "OPTIONAL_SHAPE_INFO_ARG");
    let fused_args = define_value(source, "FUSED_OPS_ARGS");

    // The `#define KERNEL(name)` line also contains "KERNEL(", so anchor the
    // search to a line start.
    let header_at = source
        .find("\nKERNEL(")
        .map(|at| at + 1)
        .expect("generated source declares a KERNEL header");
    let after = &source[header_at + "KERNEL(".len()..];
    let name_end = after.find(')').expect("kernel name closes");
    let rest = after[name_end + 1..].trim_start();
    let rest = rest.strip_prefix('(').expect("parameter list opens");

    let mut list = String::new();
    let mut depth = 0usize;
    for ch in rest.chars() {
        match ch {
            '(' => {
                depth += 1;
                list.push(ch);
            }
            ')' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                list.push(ch);
            }
            _ => list.push(ch),
        }
    }

    let expanded = list
        .replace("OPTIONAL_SHAPE_INFO_ARG", shape_info)
        .replace("FUSED_OPS_ARGS", fused_args);

    let mut depth = 0usize;
    let mut count = 0usize;
    let mut piece_blank = true;
    for ch in expanded.chars() {
        match ch {
            '(' => {
                depth += 1;
                piece_blank = false;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                piece_blank = false;
            }
            ',' if depth == 0 => {
                if !piece_blank {
                    count += 1;
                }
                piece_blank = true;
            }
            c if c.is_whitespace() => {}
            _ => piece_blank = false,
        }
    }
    if !piece_blank {
        count += 1;
    }
    count
}

fn define_value<'a>(source: &'a str, name: &str) -> &'a str {
    let prefix = format!("#define {name} ");
    source
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .unwrap_or("")
}
