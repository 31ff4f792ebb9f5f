//! Deterministic in-process backend.
//!
//! Used by the test suite, and handy for dry-running instrumented code on
//! machines where hardware counters are unavailable or forbidden.

use std::collections::VecDeque;
use std::io;

use crate::backend::CounterBackend;
use crate::error::{Error, Result};
use crate::events::EventSet;

#[derive(Debug, Clone)]
enum Scripted {
    Counts(Vec<Vec<u64>>),
    Fail(io::ErrorKind),
}

/// A [`CounterBackend`] that fabricates readings instead of counting.
///
/// Readings can be scripted with [`MockBackend::with_reading`], and failures
/// with [`MockBackend::with_error`]; once the script runs out, synthesized
/// values are returned instead. The synthesized value for thread `t`, event
/// `e` on the `n`-th stop (1-based) is `n * 1000 + t * 100 + e`, so tests
/// can distinguish every cell.
#[derive(Debug, Clone)]
pub struct MockBackend {
    capacity: usize,
    threads: usize,
    events: usize,
    stops: u64,
    scripted: VecDeque<Scripted>,
}

impl MockBackend {
    /// A mock that claims `capacity` hardware counter slots.
    pub fn new(capacity: usize) -> Self {
        MockBackend {
            capacity,
            threads: 0,
            events: 0,
            stops: 0,
            scripted: VecDeque::new(),
        }
    }

    /// Queue an exact reading to return from the next unscripted `stop`.
    ///
    /// The matrix must be shaped `[threads][events]` as attached; this is
    /// not checked until the reading is handed out.
    pub fn with_reading(mut self, counts: Vec<Vec<u64>>) -> Self {
        self.scripted.push_back(Scripted::Counts(counts));
        self
    }

    /// Queue an I/O failure to return from the next unscripted `stop`.
    pub fn with_error(mut self, kind: io::ErrorKind) -> Self {
        self.scripted.push_back(Scripted::Fail(kind));
        self
    }

    /// Number of `stop` calls served so far.
    pub fn stops(&self) -> u64 {
        self.stops
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        MockBackend::new(8)
    }
}

impl CounterBackend for MockBackend {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn attach(&mut self, events: &EventSet, threads: usize) -> Result<()> {
        self.events = events.len();
        self.threads = threads;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<Vec<u64>>> {
        self.stops += 1;
        match self.scripted.pop_front() {
            Some(Scripted::Counts(counts)) => return Ok(counts),
            Some(Scripted::Fail(kind)) => return Err(Error::Backend(io::Error::from(kind))),
            None => {}
        }

        let run = self.stops;
        let counts = (0..self.threads)
            .map(|t| {
                (0..self.events)
                    .map(|e| run * 1_000 + (t as u64) * 100 + e as u64)
                    .collect()
            })
            .collect();
        Ok(counts)
    }
}
