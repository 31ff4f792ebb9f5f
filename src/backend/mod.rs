//! The seam between the recorder and the counting hardware.
//!
//! [`CounterBackend`] is the only thing the recorder knows about counters.
//! On Linux the default implementation drives `perf_event_open(2)`; the
//! [`mock`] backend serves the test suite and dry runs on machines without
//! counter access.

use crate::error::Result;
use crate::events::EventSet;

pub mod mock;

#[cfg(target_os = "linux")]
mod perf;
#[cfg(target_os = "linux")]
pub use perf::PerfBackend;

/// Per-thread counter sets, programmed once and enabled per interval.
///
/// The recorder drives the backend through a fixed call sequence: one
/// [`attach`], then alternating [`start`] / [`stop`] pairs. Sequencing is
/// enforced by the recorder, not the backend.
///
/// [`attach`]: CounterBackend::attach
/// [`start`]: CounterBackend::start
/// [`stop`]: CounterBackend::stop
pub trait CounterBackend {
    /// Maximum number of events this backend can count at once.
    fn capacity(&self) -> usize;

    /// Program one counter set per worker thread for the given events.
    fn attach(&mut self, events: &EventSet, threads: usize) -> Result<()>;

    /// Zero and enable every attached counter.
    fn start(&mut self) -> Result<()>;

    /// Disable the counters and return their deltas, indexed `[thread][event]`.
    fn stop(&mut self) -> Result<Vec<Vec<u64>>>;
}

/// The default backend for the host platform.
#[cfg(target_os = "linux")]
pub fn default_backend() -> Result<Box<dyn CounterBackend>> {
    Ok(Box::new(PerfBackend::new()))
}

/// The default backend for the host platform.
///
/// Only Linux has one; everywhere else this reports
/// [`Unavailable`](crate::Error::Unavailable) so callers can fall back to
/// the [`mock`] backend or skip counting.
#[cfg(not(target_os = "linux"))]
pub fn default_backend() -> Result<Box<dyn CounterBackend>> {
    Err(crate::error::Error::Unavailable)
}
