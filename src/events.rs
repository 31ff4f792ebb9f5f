//! Event name registry.
//!
//! Counter groups are selected by name, either programmatically or through
//! the [`EVENTS_ENV`] environment variable (a `|`-delimited list, e.g.
//! `PERFSPAN_EVENTS="cycles|cache-misses"`). Names follow the spellings used
//! by the Linux `perf` tool.

use std::collections::HashMap;
use std::env;

use crate::error::{Error, Result};

/// Environment variable holding the `|`-delimited list of event names.
pub const EVENTS_ENV: &str = "PERFSPAN_EVENTS";

const EVENT_DELIMITER: char = '|';

/// Backend-independent identifier for a hardware event.
///
/// The Linux backend maps these onto `perf_event_open(2)` type/config pairs;
/// other backends are free to interpret them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventId {
    /// A generalised hardware event (cycles, instructions, ...).
    Hardware(HardwareEvent),
    /// A hardware cache event, qualified by level, operation and result.
    Cache {
        cache: CacheLevel,
        op: CacheOp,
        result: CacheResult,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HardwareEvent {
    Cycles,
    Instructions,
    CacheReferences,
    CacheMisses,
    BranchInstructions,
    BranchMisses,
    BusCycles,
    StalledCyclesFrontend,
    StalledCyclesBackend,
    RefCycles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CacheLevel {
    L1d,
    L1i,
    LastLevel,
    Dtlb,
    Itlb,
    Bpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CacheOp {
    Read,
    Write,
    Prefetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CacheResult {
    Access,
    Miss,
}

const fn cache(cache: CacheLevel, op: CacheOp, result: CacheResult) -> EventId {
    EventId::Cache { cache, op, result }
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, EventId> = {
        use CacheLevel::*;
        use CacheOp::*;
        use CacheResult::*;
        use EventId::Hardware;
        use HardwareEvent::*;

        let mut m = HashMap::new();
        m.insert("cycles", Hardware(Cycles));
        m.insert("instructions", Hardware(Instructions));
        m.insert("cache-references", Hardware(CacheReferences));
        m.insert("cache-misses", Hardware(CacheMisses));
        m.insert("branches", Hardware(BranchInstructions));
        m.insert("branch-misses", Hardware(BranchMisses));
        m.insert("bus-cycles", Hardware(BusCycles));
        m.insert("stalled-cycles-frontend", Hardware(StalledCyclesFrontend));
        m.insert("stalled-cycles-backend", Hardware(StalledCyclesBackend));
        m.insert("ref-cycles", Hardware(RefCycles));

        m.insert("L1-dcache-loads", cache(L1d, Read, Access));
        m.insert("L1-dcache-load-misses", cache(L1d, Read, Miss));
        m.insert("L1-dcache-stores", cache(L1d, Write, Access));
        m.insert("L1-dcache-store-misses", cache(L1d, Write, Miss));
        m.insert("L1-dcache-prefetches", cache(L1d, Prefetch, Access));
        m.insert("L1-icache-loads", cache(L1i, Read, Access));
        m.insert("L1-icache-load-misses", cache(L1i, Read, Miss));
        m.insert("LLC-loads", cache(LastLevel, Read, Access));
        m.insert("LLC-load-misses", cache(LastLevel, Read, Miss));
        m.insert("LLC-stores", cache(LastLevel, Write, Access));
        m.insert("LLC-store-misses", cache(LastLevel, Write, Miss));
        m.insert("dTLB-loads", cache(Dtlb, Read, Access));
        m.insert("dTLB-load-misses", cache(Dtlb, Read, Miss));
        m.insert("iTLB-loads", cache(Itlb, Read, Access));
        m.insert("iTLB-load-misses", cache(Itlb, Read, Miss));
        m.insert("branch-loads", cache(Bpu, Read, Access));
        m.insert("branch-load-misses", cache(Bpu, Read, Miss));
        m
    };
}

/// Resolve a single event name against the registry.
pub fn lookup(name: &str) -> Result<EventId> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| Error::UnknownEvent(name.to_string()))
}

/// Split a `|`-delimited event specification into names.
///
/// Surrounding whitespace is trimmed and empty segments are dropped, so
/// `"cycles | cache-misses|"` yields two names.
pub(crate) fn split_spec(spec: &str) -> Vec<String> {
    spec.split(EVENT_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read the event specification from [`EVENTS_ENV`].
///
/// An unset or empty variable yields no events, which puts the recorder in
/// time-only mode rather than failing.
pub(crate) fn names_from_env() -> Vec<String> {
    match env::var(EVENTS_ENV) {
        Ok(spec) => split_spec(&spec),
        Err(_) => Vec::new(),
    }
}

/// An ordered, resolved set of events to count together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSet {
    names: Vec<String>,
    ids: Vec<EventId>,
}

impl EventSet {
    /// Resolve `names` against the registry, preserving order.
    pub fn resolve<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = EventSet {
            names: Vec::new(),
            ids: Vec::new(),
        };
        for name in names {
            let name = name.as_ref();
            set.ids.push(lookup(name)?);
            set.names.push(name.to_string());
        }
        Ok(set)
    }

    /// Number of events in the set.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `true` when no events are configured (time-only recording).
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Event names, in configuration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolved identifiers, in the same order as [`EventSet::names`].
    pub fn ids(&self) -> &[EventId] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(
            lookup("cycles").unwrap(),
            EventId::Hardware(HardwareEvent::Cycles)
        );
        assert_eq!(
            lookup("L1-dcache-load-misses").unwrap(),
            cache(CacheLevel::L1d, CacheOp::Read, CacheResult::Miss)
        );
    }

    #[test]
    fn test_lookup_unknown_name() {
        let err = lookup("PAPI_L1_DCM").unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(name) if name == "PAPI_L1_DCM"));
    }

    #[test]
    fn test_split_spec() {
        assert_eq!(
            split_spec("cycles|cache-misses"),
            vec!["cycles", "cache-misses"]
        );
        assert_eq!(
            split_spec(" cycles | cache-misses |"),
            vec!["cycles", "cache-misses"]
        );
        assert!(split_spec("").is_empty());
        assert!(split_spec("||").is_empty());
    }

    #[test]
    fn test_resolve_preserves_order() {
        let set = EventSet::resolve(["cache-misses", "cycles"]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), ["cache-misses", "cycles"]);
        assert_eq!(set.ids()[1], EventId::Hardware(HardwareEvent::Cycles));
    }

    #[test]
    fn test_resolve_rejects_unknown() {
        let err = EventSet::resolve(["cycles", "wat"]).unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(name) if name == "wat"));
    }

    #[test]
    #[serial]
    fn test_names_from_env() {
        std::env::set_var(EVENTS_ENV, "cycles|instructions");
        assert_eq!(names_from_env(), vec!["cycles", "instructions"]);

        std::env::set_var(EVENTS_ENV, "");
        assert!(names_from_env().is_empty());

        std::env::remove_var(EVENTS_ENV);
        assert!(names_from_env().is_empty());
    }
}
