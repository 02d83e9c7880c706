//! Progress watchdog
//!
//! A background thread that wakes up at a fixed interval, takes the number of
//! bytes processed since its last tick, and logs the throughput. A tick with no
//! progress is logged as a warning, which makes a stuck worker or a stalled
//! disk visible during long scans.
//!
//! The scheduler feeds the counter on each job completion through
//! [`Watchdog::record`]; the counter is an atomic, so the hot path never locks.

use anyhow::Context;
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the watchdog observed over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogReport {
    /// Intervals that elapsed
    pub ticks: u64,
    /// Intervals with no progress
    pub stalled_ticks: u64,
}

/// Handle to a running watchdog thread
#[derive(Debug)]
pub struct Watchdog {
    counter: Arc<AtomicU64>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<WatchdogReport>>,
}

impl Watchdog {
    /// Spawn the watchdog thread
    pub fn start(interval: Duration) -> crate::Result<Self> {
        let counter = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let thread_counter = counter.clone();
        let handle = std::thread::Builder::new()
            .name("distscan-watchdog".to_string())
            .spawn(move || {
                debug!("watchdog running, interval {} ms", interval.as_millis());
                let mut report = WatchdogReport::default();
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Stop requested or handle dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    report.ticks += 1;
                    let bytes = thread_counter.swap(0, Ordering::Relaxed);
                    if bytes == 0 {
                        report.stalled_ticks += 1;
                        warn!("no progress in the last {} ms", interval.as_millis());
                        continue;
                    }

                    let kib = bytes / 1024;
                    let mib_per_sec = bytes as f64 / (1024.0 * 1024.0) / interval.as_secs_f64();
                    info!("processed {} KiB since last update ({:.1} MiB/s)", kib, mib_per_sec);
                }
                report
            })
            .context("Failed to spawn watchdog thread")?;

        Ok(Self {
            counter,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Add processed bytes to the current interval
    #[inline]
    pub fn record(&self, bytes: u64) {
        self.counter.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) -> WatchdogReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> WatchdogReport {
        // Dropping the sender wakes the thread immediately
        self.stop_tx.take();
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => WatchdogReport::default(),
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}
