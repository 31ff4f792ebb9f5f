use std::io;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while configuring counters or recording intervals.
///
/// Misuse of the recording API (starting twice, stopping without a start) is
/// reported through [`Error::AlreadyRecording`] / [`Error::NotRecording`]
/// rather than aborting the process - the recorder stays usable afterwards.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No counting backend exists for this platform.
    #[error("hardware counter backend is not available on this platform")]
    Unavailable,

    /// An event name in the configuration did not resolve against the
    /// registry of known counter groups.
    #[error("unknown event name: {0:?}")]
    UnknownEvent(String),

    /// More events were requested than the backend can program at once.
    #[error("{requested} events requested but only {available} hardware counters available")]
    CapacityExceeded {
        requested: usize,
        available: usize,
    },

    /// The event resolved, but the kernel or CPU rejected it.
    #[error("event {0:?} is not supported by this CPU")]
    UnsupportedEvent(String),

    /// Opening the counters was denied.
    ///
    /// On Linux this usually means `kernel.perf_event_paranoid` is set too
    /// high for unprivileged counter access.
    #[error("insufficient permissions to open hardware counters")]
    Forbidden,

    /// `start` was called while an interval was already being recorded.
    #[error("recording already in progress for key {0:?}")]
    AlreadyRecording(String),

    /// `stop` was called with no interval in progress.
    #[error("no recording in progress")]
    NotRecording,

    /// The backend failed while programming or reading the counters.
    #[error("counter backend error")]
    Backend(#[from] io::Error),

    /// The record log could not be serialized.
    #[error("failed to encode record log")]
    Encode(#[from] serde_json::Error),
}
