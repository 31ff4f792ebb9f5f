#![warn(missing_docs)]

//! `perfspan` records named intervals of hardware performance-counter events
//! across the worker threads of a compute-bound program.
//!
//! Hardware counters are CPU registers tracking micro-architectural events
//! (cycles, retired instructions, cache accesses and misses, ...). Wrapping a
//! hot region in a recording interval shows how the region behaves per worker
//! thread, and repeating the region under the same key yields averaged
//! multi-run figures that smooth out scheduling noise.
//!
//! The event set is configured by name - programmatically or through the
//! `PERFSPAN_EVENTS` environment variable (`|`-delimited, e.g.
//! `PERFSPAN_EVENTS="cycles|L1-dcache-load-misses"`). Worker threads are the
//! threads of the global [rayon] pool; one counter set is programmed per
//! thread. On Linux counting is done through `perf_event_open(2)`; on other
//! platforms building a [`Recorder`] over the default backend reports
//! [`Error::Unavailable`].
//!
//! ```no_run
//! use perfspan::{report, Config, Recorder};
//!
//! let mut recorder = Recorder::new(Config::from_env())?;
//!
//! for _ in 0..10 {
//!     recorder.start("triad")?;
//!     // ... the measured kernel ...
//!     recorder.stop()?;
//! }
//!
//! report::render_summaries(recorder.log(), &mut std::io::stdout())?;
//! #
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Misuse is reported, never fatal: starting an interval twice, stopping
//! without starting, asking for more events than the hardware has counters,
//! or naming an unknown event all surface as [`Error`] values.
//!
//! [rayon]: https://docs.rs/rayon

#[macro_use]
extern crate lazy_static;

pub mod backend;
pub mod error;
pub mod events;
pub mod report;

mod record;
mod recorder;

pub use crate::error::{Error, Result};
pub use crate::events::{EventId, EventSet};
pub use crate::record::{RecordLog, Snapshot, Summary};
pub use crate::recorder::{Config, Recorder};
