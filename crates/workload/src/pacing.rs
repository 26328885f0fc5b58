//! Wall-clock pacing with cooperative cancellation
//!
//! The link event scheduler suspends between events so that updates line up
//! with real-time observation of the emulated network. The wait is expressed
//! as "until this deadline or until stopped", which keeps the scheduler loop
//! a plain state machine and lets tests swap in a virtual clock.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a pause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Elapsed,
    Cancelled,
}

/// Suspends the scheduling thread between events
pub trait Pacer {
    fn pause(&mut self, delay: Duration) -> Pace;
}

#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Shared, cloneable stop flag that wakes any pending wait
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopState>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let mut stopped = self.inner.stopped.lock();
        *stopped = true;
        self.inner.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Block until `deadline` or until stopped; true if stopped
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.inner.stopped.lock();
        while !*stopped {
            if self.inner.wake.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    pub fn wait(&self, delay: Duration) -> bool {
        match Instant::now().checked_add(delay) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                // Effectively forever
                let mut stopped = self.inner.stopped.lock();
                while !*stopped {
                    self.inner.wake.wait(&mut stopped);
                }
                true
            }
        }
    }
}

/// Sleeps for real, waking early when the stop signal fires
#[derive(Debug, Clone, Default)]
pub struct RealTimePacer {
    stop: StopSignal,
}

impl RealTimePacer {
    pub fn new(stop: StopSignal) -> Self {
        Self { stop }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}

impl Pacer for RealTimePacer {
    fn pause(&mut self, delay: Duration) -> Pace {
        if self.stop.wait(delay) {
            Pace::Cancelled
        } else {
            Pace::Elapsed
        }
    }
}

/// Advances a virtual clock without sleeping
///
/// Used for dry runs and tests. An optional stop signal is honoured at each
/// pause so cancellation paths can be exercised without real delays.
#[derive(Debug, Clone, Default)]
pub struct InstantPacer {
    elapsed: Duration,
    pauses: usize,
    stop: Option<StopSignal>,
}

impl InstantPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Total virtual time spent paused
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn pauses(&self) -> usize {
        self.pauses
    }
}

impl Pacer for InstantPacer {
    fn pause(&mut self, delay: Duration) -> Pace {
        if self.stop.as_ref().is_some_and(StopSignal::is_stopped) {
            return Pace::Cancelled;
        }
        self.elapsed += delay;
        self.pauses += 1;
        Pace::Elapsed
    }
}
