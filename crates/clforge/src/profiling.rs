//! Optional instrumentation of selection and generation.
//!
//! Everything here compiles to no-ops unless the `profiler` feature is
//! enabled, so call sites never need their own cfg guards. With the feature
//! on, scopes aggregate call counts and wall time per key into a process-wide
//! table that `take_report` drains.

#[cfg(feature = "profiler")]
use std::collections::HashMap;
#[cfg(feature = "profiler")]
use std::sync::{Mutex, OnceLock};
#[cfg(feature = "profiler")]
use std::time::Instant;

#[cfg(feature = "profiler")]
use serde::Serialize;

/// Aggregation key for one profiled site.
#[cfg(feature = "profiler")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfilerKey {
    Select { op: &'static str },
    Generate { kernel: &'static str },
    Event { name: &'static str },
}

#[cfg(feature = "profiler")]
impl ProfilerKey {
    pub fn label(&self) -> String {
        match self {
            ProfilerKey::Select { op } => format!("select:{op}"),
            ProfilerKey::Generate { kernel } => format!("generate:{kernel}"),
            ProfilerKey::Event { name } => format!("event:{name}"),
        }
    }
}

#[cfg(feature = "profiler")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub calls: u64,
    pub elapsed_ns: u64,
}

#[cfg(feature = "profiler")]
struct Profiler {
    stats: Mutex<HashMap<ProfilerKey, Stat>>,
}

#[cfg(feature = "profiler")]
impl Profiler {
    fn instance() -> &'static Profiler {
        static INSTANCE: OnceLock<Profiler> = OnceLock::new();
        INSTANCE.get_or_init(|| Profiler {
            stats: Mutex::new(HashMap::new()),
        })
    }

    fn record(key: ProfilerKey, elapsed_ns: u64) {
        let mut stats = Self::instance()
            .stats
            .lock()
            .expect("profiler mutex poisoned");
        let stat = stats.entry(key).or_default();
        stat.calls += 1;
        stat.elapsed_ns = stat.elapsed_ns.saturating_add(elapsed_ns);
    }

    fn bump(key: ProfilerKey) {
        Self::record(key, 0);
    }
}

/// Records elapsed time for its key when dropped.
#[cfg(feature = "profiler")]
pub struct ScopeGuard {
    key: ProfilerKey,
    started: Instant,
}

#[cfg(feature = "profiler")]
impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let elapsed = u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Profiler::record(self.key, elapsed);
    }
}

/// Zero-cost stand-in when the `profiler` feature is off.
#[cfg(not(feature = "profiler"))]
pub struct ScopeGuard {
    _private: (),
}

#[must_use]
#[inline(always)]
pub fn select_scope(op: &'static str) -> ScopeGuard {
    #[cfg(feature = "profiler")]
    {
        ScopeGuard {
            key: ProfilerKey::Select { op },
            started: Instant::now(),
        }
    }
    #[cfg(not(feature = "profiler"))]
    {
        let _ = op;
        ScopeGuard { _private: () }
    }
}

#[must_use]
#[inline(always)]
pub fn generate_scope(kernel: &'static str) -> ScopeGuard {
    #[cfg(feature = "profiler")]
    {
        ScopeGuard {
            key: ProfilerKey::Generate { kernel },
            started: Instant::now(),
        }
    }
    #[cfg(not(feature = "profiler"))]
    {
        let _ = kernel;
        ScopeGuard { _private: () }
    }
}

/// Counts a named occurrence without timing, e.g. a digest cache hit.
#[inline(always)]
pub fn cache_event(name: &'static str) {
    #[cfg(feature = "profiler")]
    Profiler::bump(ProfilerKey::Event { name });
    #[cfg(not(feature = "profiler"))]
    let _ = name;
}

/// Drains the aggregated statistics, sorted by key label.
#[cfg(feature = "profiler")]
pub fn take_report() -> Vec<(ProfilerKey, Stat)> {
    let mut stats = Profiler::instance()
        .stats
        .lock()
        .expect("profiler mutex poisoned");
    let mut report: Vec<_> = stats.drain().collect();
    report.sort_by(|a, b| a.0.label().cmp(&b.0.label()));
    report
}

/// JSON rendering of `take_report`; `[]` when the feature is off.
pub fn take_report_json() -> String {
    #[cfg(feature = "profiler")]
    {
        #[derive(Serialize)]
        struct Entry {
            key: String,
            calls: u64,
            elapsed_ns: u64,
        }
        let entries: Vec<Entry> = take_report()
            .into_iter()
            .map(|(key, stat)| Entry {
                key: key.label(),
                calls: stat.calls,
                elapsed_ns: stat.elapsed_ns,
            })
            .collect();
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }
    #[cfg(not(feature = "profiler"))]
    {
        "[]".to_string()
    }
}
