//! Linux backend over `perf_event_open(2)`.
//!
//! One counter file descriptor is opened per (worker thread, event) pair,
//! attached to the thread's tid and counting userspace only. Intervals are
//! delimited with `PERF_EVENT_IOC_RESET` / `_ENABLE` / `_DISABLE`, so a
//! `stop` reads each counter's delta since the matching `start`.

use std::fs::File;
use std::io::{self, Read};
use std::mem;
use std::os::unix::io::{AsRawFd, FromRawFd};

use perf_event_open_sys as sys;
use sys::bindings::{
    perf_event_attr, PERF_COUNT_HW_BRANCH_INSTRUCTIONS, PERF_COUNT_HW_BRANCH_MISSES,
    PERF_COUNT_HW_BUS_CYCLES, PERF_COUNT_HW_CACHE_BPU, PERF_COUNT_HW_CACHE_DTLB,
    PERF_COUNT_HW_CACHE_ITLB, PERF_COUNT_HW_CACHE_L1D, PERF_COUNT_HW_CACHE_L1I,
    PERF_COUNT_HW_CACHE_LL, PERF_COUNT_HW_CACHE_MISSES, PERF_COUNT_HW_CACHE_OP_PREFETCH,
    PERF_COUNT_HW_CACHE_OP_READ, PERF_COUNT_HW_CACHE_OP_WRITE, PERF_COUNT_HW_CACHE_REFERENCES,
    PERF_COUNT_HW_CACHE_RESULT_ACCESS, PERF_COUNT_HW_CACHE_RESULT_MISS, PERF_COUNT_HW_CPU_CYCLES,
    PERF_COUNT_HW_INSTRUCTIONS, PERF_COUNT_HW_REF_CPU_CYCLES,
    PERF_COUNT_HW_STALLED_CYCLES_BACKEND, PERF_COUNT_HW_STALLED_CYCLES_FRONTEND,
    PERF_FLAG_FD_CLOEXEC, PERF_TYPE_HARDWARE, PERF_TYPE_HW_CACHE,
};

use crate::backend::CounterBackend;
use crate::error::{Error, Result};
use crate::events::{CacheLevel, CacheOp, CacheResult, EventId, EventSet, HardwareEvent};

/// Generic x86 PMUs expose at most this many programmable counters per
/// thread; asking for more would force the kernel to multiplex and the
/// deltas would no longer be directly comparable between events.
const HW_COUNTER_SLOTS: usize = 8;

/// [`CounterBackend`] over `perf_event_open(2)`.
#[derive(Debug, Default)]
pub struct PerfBackend {
    /// Counter fds, indexed `[thread][event]`.
    fds: Vec<Vec<File>>,
}

impl PerfBackend {
    /// A backend with no counters attached yet.
    pub fn new() -> Self {
        PerfBackend::default()
    }
}

impl CounterBackend for PerfBackend {
    fn capacity(&self) -> usize {
        HW_COUNTER_SLOTS
    }

    fn attach(&mut self, events: &EventSet, threads: usize) -> Result<()> {
        // Worker tids in pool-index order. perf counters attached to a tid
        // can be read from any thread, so only the open call needs the tid.
        let tids: Vec<libc::pid_t> = rayon::broadcast(|_| unsafe { libc::gettid() });
        debug_assert_eq!(tids.len(), threads);

        let mut fds = Vec::with_capacity(tids.len());
        for &tid in &tids {
            let mut row = Vec::with_capacity(events.len());
            for (id, name) in events.ids().iter().zip(events.names()) {
                row.push(open_counter(*id, name, tid)?);
            }
            fds.push(row);
        }

        self.fds = fds;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        for fd in self.fds.iter().flatten() {
            check(unsafe { sys::ioctls::RESET(fd.as_raw_fd(), 0) })?;
            check(unsafe { sys::ioctls::ENABLE(fd.as_raw_fd(), 0) })?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<Vec<u64>>> {
        for fd in self.fds.iter().flatten() {
            check(unsafe { sys::ioctls::DISABLE(fd.as_raw_fd(), 0) })?;
        }

        let mut counts = Vec::with_capacity(self.fds.len());
        for row in &mut self.fds {
            let mut values = Vec::with_capacity(row.len());
            for fd in row {
                let mut buf = [0u8; 8];
                fd.read_exact(&mut buf).map_err(Error::Backend)?;
                values.push(u64::from_ne_bytes(buf));
            }
            counts.push(values);
        }
        Ok(counts)
    }
}

fn check(ret: libc::c_int) -> Result<()> {
    if ret < 0 {
        return Err(Error::Backend(io::Error::last_os_error()));
    }
    Ok(())
}

fn open_counter(id: EventId, name: &str, tid: libc::pid_t) -> Result<File> {
    let (type_, config) = type_and_config(id);

    let mut attrs = perf_event_attr {
        size: mem::size_of::<perf_event_attr>() as u32,
        type_,
        config,
        ..perf_event_attr::default()
    };
    // Counters stay dormant until the first interval starts, and count
    // userspace only (no kernel/hypervisor), matching `perf stat -e ev:u`.
    attrs.set_disabled(1);
    attrs.set_exclude_kernel(1);
    attrs.set_exclude_hv(1);

    let fd = unsafe { sys::perf_event_open(&mut attrs, tid, -1, -1, PERF_FLAG_FD_CLOEXEC.into()) };
    if fd < 0 {
        let err = io::Error::last_os_error();
        return Err(match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => Error::Forbidden,
            Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::EOPNOTSUPP) => {
                Error::UnsupportedEvent(name.to_string())
            }
            _ => Error::Backend(err),
        });
    }

    Ok(unsafe { File::from_raw_fd(fd) })
}

fn type_and_config(id: EventId) -> (u32, u64) {
    match id {
        EventId::Hardware(ev) => {
            let config = match ev {
                HardwareEvent::Cycles => PERF_COUNT_HW_CPU_CYCLES,
                HardwareEvent::Instructions => PERF_COUNT_HW_INSTRUCTIONS,
                HardwareEvent::CacheReferences => PERF_COUNT_HW_CACHE_REFERENCES,
                HardwareEvent::CacheMisses => PERF_COUNT_HW_CACHE_MISSES,
                HardwareEvent::BranchInstructions => PERF_COUNT_HW_BRANCH_INSTRUCTIONS,
                HardwareEvent::BranchMisses => PERF_COUNT_HW_BRANCH_MISSES,
                HardwareEvent::BusCycles => PERF_COUNT_HW_BUS_CYCLES,
                HardwareEvent::StalledCyclesFrontend => PERF_COUNT_HW_STALLED_CYCLES_FRONTEND,
                HardwareEvent::StalledCyclesBackend => PERF_COUNT_HW_STALLED_CYCLES_BACKEND,
                HardwareEvent::RefCycles => PERF_COUNT_HW_REF_CPU_CYCLES,
            };
            (PERF_TYPE_HARDWARE, config as u64)
        }
        EventId::Cache { cache, op, result } => {
            let cache_id = match cache {
                CacheLevel::L1d => PERF_COUNT_HW_CACHE_L1D,
                CacheLevel::L1i => PERF_COUNT_HW_CACHE_L1I,
                CacheLevel::LastLevel => PERF_COUNT_HW_CACHE_LL,
                CacheLevel::Dtlb => PERF_COUNT_HW_CACHE_DTLB,
                CacheLevel::Itlb => PERF_COUNT_HW_CACHE_ITLB,
                CacheLevel::Bpu => PERF_COUNT_HW_CACHE_BPU,
            };
            let op_id = match op {
                CacheOp::Read => PERF_COUNT_HW_CACHE_OP_READ,
                CacheOp::Write => PERF_COUNT_HW_CACHE_OP_WRITE,
                CacheOp::Prefetch => PERF_COUNT_HW_CACHE_OP_PREFETCH,
            };
            let result_id = match result {
                CacheResult::Access => PERF_COUNT_HW_CACHE_RESULT_ACCESS,
                CacheResult::Miss => PERF_COUNT_HW_CACHE_RESULT_MISS,
            };
            // perf_event_open(2): config = id | (op << 8) | (result << 16).
            let config = cache_id as u64 | (op_id as u64) << 8 | (result_id as u64) << 16;
            (PERF_TYPE_HW_CACHE, config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_encoding() {
        let (type_, config) = type_and_config(EventId::Cache {
            cache: CacheLevel::L1d,
            op: CacheOp::Read,
            result: CacheResult::Miss,
        });
        assert_eq!(type_, PERF_TYPE_HW_CACHE);
        assert_eq!(
            config,
            PERF_COUNT_HW_CACHE_L1D as u64
                | (PERF_COUNT_HW_CACHE_OP_READ as u64) << 8
                | (PERF_COUNT_HW_CACHE_RESULT_MISS as u64) << 16
        );
    }

    #[test]
    fn test_hardware_config_mapping() {
        let (type_, config) = type_and_config(EventId::Hardware(HardwareEvent::Instructions));
        assert_eq!(type_, PERF_TYPE_HARDWARE);
        assert_eq!(config, PERF_COUNT_HW_INSTRUCTIONS as u64);
    }
}
