//! Conformance harness for implementation managers.
//!
//! Backends instantiate [`define_impl_conformance_tests!`] once per manager
//! and node fixture to get the shared battery of checks: validation, kernel
//! creation, generation determinism, argument parity, and entry point
//! uniqueness.

pub mod conformance;

/// Expands to a test module running every conformance check against one
/// manager and one node fixture. Both arguments are expressions, evaluated
/// fresh inside each test.
#[macro_export]
macro_rules! define_impl_conformance_tests {
    ($module:ident, $manager:expr, $node:expr) => {
        mod $module {
            use super::*;

            #[test]
            fn validate_accepts() {
                $crate::conformance::validate_accepts(&$manager, &$node);
            }

            #[test]
            fn create_succeeds() {
                $crate::conformance::create_succeeds(&$manager, &$node);
            }

            #[test]
            fn generation_is_deterministic() {
                $crate::conformance::generation_is_deterministic(&$manager, &$node);
            }

            #[test]
            fn arguments_match_parameters() {
                $crate::conformance::arguments_match_parameters(&$manager, &$node);
            }

            #[test]
            fn entry_points_are_unique() {
                $crate::conformance::entry_points_are_unique(&$manager, &$node);
            }
        }
    };
}
