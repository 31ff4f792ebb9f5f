//! Text and JSON rendering of the record log.
//!
//! The text tables follow the shape of the classic counter-wrapper reports:
//! per-event rows of per-thread counts with an across-thread total, and a
//! per-key multi-run averaging table.

use std::io::{self, Write};

use crate::error::Result;
use crate::record::{RecordLog, Snapshot};

/// Render one snapshot as a per-thread table.
pub fn render_snapshot<W: Write>(events: &[String], snapshot: &Snapshot, w: &mut W) -> io::Result<()> {
    writeln!(w, "=== {} ===", snapshot.key())?;

    for (event, name) in events.iter().enumerate() {
        writeln!(w, "{}", name)?;
        for thread in 0..snapshot.threads() {
            let count = snapshot.count(thread, event).unwrap_or(0);
            writeln!(w, "  thread {:>4}: {:>16}", thread, count)?;
        }
        if snapshot.threads() > 1 {
            writeln!(w, "  total      : {:>16}", snapshot.total(event))?;
        }
    }

    for (thread, secs) in snapshot.elapsed().iter().enumerate() {
        writeln!(w, "  time {:>6}: {:>16.6} s", thread, secs)?;
    }
    Ok(())
}

/// Render every snapshot in the log, oldest first.
pub fn render_log<W: Write>(log: &RecordLog, w: &mut W) -> io::Result<()> {
    if log.is_empty() {
        return writeln!(w, "no recordings");
    }
    for snapshot in log.snapshots() {
        render_snapshot(log.events(), snapshot, w)?;
    }
    Ok(())
}

/// Render the per-key multi-run averages for the whole log.
pub fn render_summaries<W: Write>(log: &RecordLog, w: &mut W) -> io::Result<()> {
    if log.is_empty() {
        return writeln!(w, "no recordings");
    }
    for summary in log.summarize_all() {
        write!(w, "{}", summary)?;
    }
    Ok(())
}

/// Serialize the whole log (event names and snapshots) as JSON.
pub fn log_to_json(log: &RecordLog) -> Result<String> {
    Ok(serde_json::to_string_pretty(log)?)
}
