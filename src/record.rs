//! Snapshot records and the append-only log.

use std::fmt;

use serde::Serialize;

/// An immutable record of one completed recording interval.
///
/// The count matrix always has one row per worker thread and one column per
/// configured event, in the order the events were configured. A recorder
/// with no configured events produces snapshots with empty rows but still
/// carries per-thread wall times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    key: String,
    /// Counter deltas, indexed `[thread][event]`.
    counts: Vec<Vec<u64>>,
    /// Wall time per thread, in seconds.
    elapsed: Vec<f64>,
}

impl Snapshot {
    pub(crate) fn new(key: String, counts: Vec<Vec<u64>>, elapsed: Vec<f64>) -> Self {
        debug_assert_eq!(counts.len(), elapsed.len());
        Snapshot {
            key,
            counts,
            elapsed,
        }
    }

    /// The key this interval was recorded under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of worker threads covered by this snapshot.
    pub fn threads(&self) -> usize {
        self.elapsed.len()
    }

    /// Counter deltas, indexed `[thread][event]`.
    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    /// A single counter delta, or `None` if either index is out of range.
    pub fn count(&self, thread: usize, event: usize) -> Option<u64> {
        self.counts.get(thread)?.get(event).copied()
    }

    /// Wall time per thread, in seconds.
    pub fn elapsed(&self) -> &[f64] {
        &self.elapsed
    }

    /// Sum of one event's deltas across all threads.
    pub fn total(&self, event: usize) -> u64 {
        self.counts
            .iter()
            .filter_map(|row| row.get(event))
            .sum()
    }

    /// Wall time of the interval: the slowest thread bounds the region.
    pub fn region_time(&self) -> f64 {
        self.elapsed.iter().copied().fold(0.0, f64::max)
    }
}

/// Mean counter values and elapsed time over repeated runs sharing a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Key shared by the aggregated runs.
    pub key: String,
    /// Number of runs aggregated.
    pub runs: usize,
    /// Event names, in configuration order.
    pub event_names: Vec<String>,
    /// Per-event mean of the across-thread totals, matching `event_names`.
    pub mean_counts: Vec<f64>,
    /// Mean region wall time, in seconds.
    pub mean_elapsed: f64,
}

impl Summary {
    fn events_with_means(&self) -> impl Iterator<Item = (&str, f64)> {
        self.mean_counts
            .iter()
            .copied()
            .enumerate()
            .map(move |(i, mean)| {
                let name = self
                    .event_names
                    .get(i)
                    .map(String::as_str)
                    .unwrap_or("event");
                (name, mean)
            })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} runs, mean time {:.6} s",
            self.key, self.runs, self.mean_elapsed
        )?;
        for (name, mean) in self.events_with_means() {
            writeln!(f, "  {:<24} mean {:>16.1}", name, mean)?;
        }
        Ok(())
    }
}

/// Append-only log of snapshots, queryable by key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordLog {
    events: Vec<String>,
    snapshots: Vec<Snapshot>,
}

impl RecordLog {
    pub(crate) fn new(events: Vec<String>) -> Self {
        RecordLog {
            events,
            snapshots: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    /// Event names shared by every snapshot in the log.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Number of snapshots recorded so far.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// All snapshots, oldest first.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Snapshots recorded under `key`, oldest first.
    pub fn by_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Snapshot> {
        self.snapshots.iter().filter(move |s| s.key() == key)
    }

    /// Distinct keys in first-recorded order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for s in &self.snapshots {
            if !keys.contains(&s.key()) {
                keys.push(s.key());
            }
        }
        keys
    }

    /// Aggregate all runs recorded under `key`.
    ///
    /// Each run contributes its across-thread total per event and its region
    /// wall time; the summary holds the mean of those values. Returns `None`
    /// when no run was recorded under `key`.
    pub fn summarize(&self, key: &str) -> Option<Summary> {
        let mut runs = 0usize;
        let mut sums = vec![0.0f64; self.events.len()];
        let mut elapsed = 0.0f64;

        for snapshot in self.by_key(key) {
            runs += 1;
            for (event, sum) in sums.iter_mut().enumerate() {
                *sum += snapshot.total(event) as f64;
            }
            elapsed += snapshot.region_time();
        }

        if runs == 0 {
            return None;
        }

        Some(Summary {
            key: key.to_string(),
            runs,
            event_names: self.events.clone(),
            mean_counts: sums.iter().map(|s| s / runs as f64).collect(),
            mean_elapsed: elapsed / runs as f64,
        })
    }

    /// Summaries for every key, in first-recorded order.
    pub fn summarize_all(&self) -> Vec<Summary> {
        self.keys()
            .into_iter()
            .filter_map(|k| self.summarize(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(key: &str, counts: Vec<Vec<u64>>, elapsed: Vec<f64>) -> Snapshot {
        Snapshot::new(key.to_string(), counts, elapsed)
    }

    #[test]
    fn test_snapshot_accessors() {
        let s = snap(
            "copy",
            vec![vec![10, 1], vec![20, 2]],
            vec![0.5, 0.25],
        );

        assert_eq!(s.key(), "copy");
        assert_eq!(s.threads(), 2);
        assert_eq!(s.count(0, 1), Some(1));
        assert_eq!(s.count(2, 0), None);
        assert_eq!(s.count(0, 5), None);
        assert_eq!(s.total(0), 30);
        assert_eq!(s.total(1), 3);
        assert_eq!(s.region_time(), 0.5);
    }

    #[test]
    fn test_region_time_of_empty_snapshot() {
        let s = snap("empty", vec![], vec![]);
        assert_eq!(s.region_time(), 0.0);
    }

    #[test]
    fn test_log_query_by_key() {
        let mut log = RecordLog::new(vec!["cycles".to_string()]);
        log.push(snap("a", vec![vec![1]], vec![0.1]));
        log.push(snap("b", vec![vec![2]], vec![0.1]));
        log.push(snap("a", vec![vec![3]], vec![0.1]));

        assert_eq!(log.len(), 3);
        assert_eq!(log.by_key("a").count(), 2);
        assert_eq!(log.by_key("missing").count(), 0);
        assert_eq!(log.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_summarize_means_over_runs() {
        let mut log = RecordLog::new(vec!["cycles".to_string(), "cache-misses".to_string()]);
        // Run 1: totals 30 and 3, region time 0.4.
        log.push(snap(
            "triad",
            vec![vec![10, 1], vec![20, 2]],
            vec![0.4, 0.2],
        ));
        // Run 2: totals 50 and 7, region time 0.6.
        log.push(snap(
            "triad",
            vec![vec![30, 3], vec![20, 4]],
            vec![0.3, 0.6],
        ));

        let summary = log.summarize("triad").unwrap();
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.mean_counts, vec![40.0, 5.0]);
        assert!((summary.mean_elapsed - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_unknown_key() {
        let log = RecordLog::new(vec!["cycles".to_string()]);
        assert!(log.summarize("nope").is_none());
    }

    #[test]
    fn test_summary_display() {
        let mut log = RecordLog::new(vec!["cycles".to_string()]);
        log.push(snap("copy", vec![vec![100], vec![200]], vec![0.5, 0.25]));

        let text = log.summarize("copy").unwrap().to_string();
        assert!(text.contains("copy: 1 runs, mean time 0.500000 s"));
        assert!(text.contains("cycles"));
        assert!(text.contains("300.0"));
    }

    #[test]
    fn test_summarize_all_order() {
        let mut log = RecordLog::new(vec![]);
        log.push(snap("scale", vec![vec![]], vec![0.2]));
        log.push(snap("copy", vec![vec![]], vec![0.1]));
        log.push(snap("scale", vec![vec![]], vec![0.4]));

        let all = log.summarize_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].key, "scale");
        assert_eq!(all[0].runs, 2);
        assert!((all[0].mean_elapsed - 0.3).abs() < 1e-12);
        assert_eq!(all[1].key, "copy");
        assert!(all[1].mean_counts.is_empty());
    }
}
