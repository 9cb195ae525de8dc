//! Environment variable switches.
//!
//! Each variable is read once and cached for the lifetime of the process, so
//! flipping one mid-run has no effect.

use std::sync::OnceLock;

static CLFORGE_FORCE_IMPL: OnceLock<Option<String>> = OnceLock::new();
static CLFORGE_DISABLE_FUSION: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `CLFORGE_FORCE_IMPL`: restrict selection to the named implementation key.
/// The forced candidate still has to pass shape support and validation.
pub fn forced_impl() -> Option<&'static str> {
    CLFORGE_FORCE_IMPL
        .get_or_init(|| {
            std::env::var("CLFORGE_FORCE_IMPL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .as_deref()
}

/// `CLFORGE_DISABLE_FUSION`: generate kernels as if nodes carried no fused
/// operations. Fused-op argument slots disappear along with the inlined code.
pub fn fusion_disabled() -> bool {
    *CLFORGE_DISABLE_FUSION.get_or_init(|| {
        std::env::var("CLFORGE_DISABLE_FUSION")
            .map(|v| parse_bool(&v))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for value in ["1", "true", "TRUE", " yes ", "on", "On"] {
            assert!(parse_bool(value), "{value:?} should parse as true");
        }
        for value in ["0", "false", "off", "", "2", "enabled"] {
            assert!(!parse_bool(value), "{value:?} should parse as false");
        }
    }
}
