use std::time::Instant;

use tracing::debug;

use crate::backend::{self, CounterBackend};
use crate::error::{Error, Result};
use crate::events::{self, EventSet};
use crate::record::{RecordLog, Snapshot, Summary};

/// Recorder configuration: which events to count.
///
/// ```no_run
/// use perfspan::{Config, Recorder};
///
/// // From the PERFSPAN_EVENTS environment variable...
/// let recorder = Recorder::new(Config::from_env())?;
///
/// // ...or spelled out.
/// let recorder = Recorder::new(Config::with_events(["cycles", "cache-misses"]))?;
/// #
/// # Ok::<(), perfspan::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    events: Vec<String>,
}

impl Config {
    /// Take the event list from the [`EVENTS_ENV`] environment variable.
    ///
    /// An unset or empty variable yields an empty event set: the recorder
    /// then records wall time only.
    ///
    /// [`EVENTS_ENV`]: crate::events::EVENTS_ENV
    pub fn from_env() -> Self {
        Config {
            events: events::names_from_env(),
        }
    }

    /// Count the given events, in order.
    pub fn with_events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Config {
            events: events.into_iter().map(Into::into).collect(),
        }
    }

    /// Configured event names.
    pub fn events(&self) -> &[String] {
        &self.events
    }
}

/// Records named intervals of hardware counter deltas and wall time.
///
/// One counter set is programmed per worker thread of the rayon pool at
/// construction time; [`start`] / [`stop`] then delimit recording intervals.
/// The two must alternate strictly - a second `start` or a stray `stop` is
/// an error and leaves the recorder unchanged.
///
/// Every `stop` appends an immutable [`Snapshot`] to the [`RecordLog`],
/// which aggregates repeated runs sharing a key into per-key means.
///
/// ```no_run
/// use perfspan::{Config, Recorder};
///
/// let mut recorder = Recorder::new(Config::with_events(["cache-misses"]))?;
///
/// for _ in 0..10 {
///     recorder.start("triad")?;
///     // ... the measured kernel ...
///     recorder.stop()?;
/// }
///
/// let summary = recorder.log().summarize("triad").unwrap();
/// println!("{} runs, mean misses {:.0}", summary.runs, summary.mean_counts[0]);
/// #
/// # Ok::<(), perfspan::Error>(())
/// ```
///
/// [`start`]: Recorder::start
/// [`stop`]: Recorder::stop
pub struct Recorder {
    events: EventSet,
    threads: usize,
    backend: Box<dyn CounterBackend>,
    log: RecordLog,
    active: Option<Active>,
}

struct Active {
    key: String,
    started: Vec<Instant>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("events", &self.events)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Build a recorder over the platform's default counting backend.
    ///
    /// Fails with [`Error::Unavailable`] on platforms without one, with
    /// [`Error::UnknownEvent`] for unrecognised names, and with
    /// [`Error::CapacityExceeded`] when more events are configured than the
    /// hardware can count at once.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_backend(config, backend::default_backend()?)
    }

    /// Build a recorder over an explicit backend.
    pub fn with_backend(config: Config, mut backend: Box<dyn CounterBackend>) -> Result<Self> {
        let events = EventSet::resolve(config.events())?;

        let available = backend.capacity();
        if events.len() > available {
            return Err(Error::CapacityExceeded {
                requested: events.len(),
                available,
            });
        }

        let threads = rayon::current_num_threads();
        backend.attach(&events, threads)?;

        debug!(
            threads,
            capacity = available,
            events = ?events.names(),
            "recorder initialised"
        );

        Ok(Recorder {
            log: RecordLog::new(events.names().to_vec()),
            events,
            threads,
            backend,
            active: None,
        })
    }

    /// Number of worker threads each snapshot covers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The events being counted, in configuration order.
    pub fn events(&self) -> &[String] {
        self.events.names()
    }

    /// The snapshots recorded so far.
    pub fn log(&self) -> &RecordLog {
        &self.log
    }

    /// Begin recording an interval under `key`.
    ///
    /// Per-thread wall clocks are sampled before the counters are enabled,
    /// mirroring where the measured region begins for each worker.
    pub fn start(&mut self, key: impl Into<String>) -> Result<()> {
        if let Some(active) = &self.active {
            return Err(Error::AlreadyRecording(active.key.clone()));
        }
        let key = key.into();

        let started = rayon::broadcast(|_| Instant::now());
        self.backend.start()?;

        debug!(key = %key, "recording started");
        self.active = Some(Active { key, started });
        Ok(())
    }

    /// Stop the current interval and append its [`Snapshot`] to the log.
    ///
    /// A backend failure discards the in-flight interval, so the recorder
    /// can be started again afterwards.
    pub fn stop(&mut self) -> Result<Snapshot> {
        let Active { key, started } = self.active.take().ok_or(Error::NotRecording)?;

        let counts = self.backend.stop()?;
        // Both broadcasts run on the same fixed global pool, so every worker
        // finds its own start sample.
        debug_assert_eq!(started.len(), self.threads);
        let elapsed = rayon::broadcast(|ctx| {
            started
                .get(ctx.index())
                .map_or(0.0, |t| t.elapsed().as_secs_f64())
        });

        debug!(key = %key, threads = elapsed.len(), "recording stopped");
        let snapshot = Snapshot::new(key, counts, elapsed);
        self.log.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Shorthand for [`RecordLog::summarize`] on this recorder's log.
    pub fn summarize(&self, key: &str) -> Option<Summary> {
        self.log.summarize(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    fn mock_recorder(events: &[&str], mock: MockBackend) -> Result<Recorder> {
        Recorder::with_backend(
            Config::with_events(events.iter().copied()),
            Box::new(mock),
        )
    }

    #[test]
    fn test_snapshot_shape() {
        let mut recorder = mock_recorder(&["cycles", "cache-misses"], MockBackend::new(4)).unwrap();

        recorder.start("copy").unwrap();
        let snapshot = recorder.stop().unwrap();

        assert_eq!(snapshot.key(), "copy");
        assert_eq!(snapshot.threads(), recorder.threads());
        assert_eq!(snapshot.elapsed().len(), recorder.threads());
        assert!(snapshot.counts().iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_start_twice_is_an_error() {
        let mut recorder = mock_recorder(&["cycles"], MockBackend::new(4)).unwrap();

        recorder.start("a").unwrap();
        let err = recorder.start("b").unwrap_err();
        assert!(matches!(err, Error::AlreadyRecording(key) if key == "a"));

        // The original interval is still recordable.
        let snapshot = recorder.stop().unwrap();
        assert_eq!(snapshot.key(), "a");
    }

    #[test]
    fn test_stop_without_start_is_an_error() {
        let mut recorder = mock_recorder(&["cycles"], MockBackend::new(4)).unwrap();
        assert!(matches!(recorder.stop(), Err(Error::NotRecording)));

        recorder.start("a").unwrap();
        recorder.stop().unwrap();
        assert!(matches!(recorder.stop(), Err(Error::NotRecording)));
    }

    #[test]
    fn test_backend_failure_clears_interval() {
        use std::io;

        let threads = rayon::current_num_threads();
        let mock = MockBackend::new(4)
            .with_error(io::ErrorKind::BrokenPipe)
            .with_reading(vec![vec![5]; threads]);
        let mut recorder = mock_recorder(&["cycles"], mock).unwrap();

        recorder.start("copy").unwrap();
        let err = recorder.stop().unwrap_err();
        assert!(matches!(err, Error::Backend(e) if e.kind() == io::ErrorKind::BrokenPipe));

        // The failed interval is gone and nothing was logged...
        assert!(matches!(recorder.stop(), Err(Error::NotRecording)));
        assert!(recorder.log().is_empty());

        // ...and the recorder is usable again.
        recorder.start("copy").unwrap();
        let snapshot = recorder.stop().unwrap();
        assert_eq!(snapshot.total(0), 5 * threads as u64);
        assert_eq!(recorder.log().len(), 1);
    }

    #[test]
    fn test_capacity_exceeded() {
        let err = mock_recorder(&["cycles", "instructions", "cache-misses"], MockBackend::new(2))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                requested: 3,
                available: 2,
            }
        ));
    }

    #[test]
    fn test_unknown_event_rejected_at_build() {
        let err = mock_recorder(&["cycles", "PAPI_TOT_CYC"], MockBackend::new(4)).unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(name) if name == "PAPI_TOT_CYC"));
    }

    #[test]
    fn test_zero_events_records_time_only() {
        let mut recorder = mock_recorder(&[], MockBackend::new(4)).unwrap();

        recorder.start("idle").unwrap();
        let snapshot = recorder.stop().unwrap();

        assert!(snapshot.counts().iter().all(|row| row.is_empty()));
        assert_eq!(snapshot.elapsed().len(), recorder.threads());
        assert!(snapshot.region_time() >= 0.0);
    }

    #[test]
    fn test_multi_run_aggregation() {
        let threads = rayon::current_num_threads();
        let flat = |v: u64| vec![vec![v]; threads];

        let mock = MockBackend::new(4)
            .with_reading(flat(10))
            .with_reading(flat(30));
        let mut recorder = mock_recorder(&["cycles"], mock).unwrap();

        for _ in 0..2 {
            recorder.start("triad").unwrap();
            recorder.stop().unwrap();
        }

        let summary = recorder.summarize("triad").unwrap();
        assert_eq!(summary.runs, 2);
        // Per-run totals are 10 and 30 per thread, summed across threads.
        assert_eq!(summary.mean_counts, vec![20.0 * threads as f64]);
        assert!(summary.mean_elapsed >= 0.0);
        assert!(recorder.summarize("copy").is_none());
    }

    #[test]
    fn test_log_is_append_only_across_keys() {
        let mut recorder = mock_recorder(&["cycles"], MockBackend::new(4)).unwrap();

        for key in ["copy", "scale", "copy"] {
            recorder.start(key).unwrap();
            recorder.stop().unwrap();
        }

        assert_eq!(recorder.log().len(), 3);
        assert_eq!(recorder.log().keys(), vec!["copy", "scale"]);
        assert_eq!(recorder.log().by_key("copy").count(), 2);
    }
}
