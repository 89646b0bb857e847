//! Playback clock mapping wall time onto presentation time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use textreel_core::{Error, Result};
use tracing::debug;

/// Source of wall-clock microseconds.
pub trait TimeSource: Send + Sync {
    fn now_us(&self) -> i64;
}

/// Monotonic wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now_us(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_micros()).unwrap_or(i64::MAX)
    }
}

/// Hand-driven time for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualTime {
    now: AtomicI64,
}

impl ManualTime {
    pub fn new(now_us: i64) -> Self {
        Self {
            now: AtomicI64::new(now_us),
        }
    }

    pub fn set(&self, now_us: i64) {
        self.now.store(now_us, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_us: i64) {
        self.now.fetch_add(delta_us, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_us(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
struct ClockState {
    /// Wall time at which presentation time was zero.
    start_reference_us: i64,
    /// Presentation time frozen by a pause.
    paused_at_us: Option<i64>,
}

impl ClockState {
    fn position(&self, now: i64) -> i64 {
        self.paused_at_us
            .unwrap_or_else(|| now - self.start_reference_us)
    }
}

/// Process-wide presentation clock: `position = now - start_reference`.
pub struct PlaybackClock {
    time: Arc<dyn TimeSource>,
    state: Mutex<ClockState>,
}

impl PlaybackClock {
    /// Create a clock whose presentation time starts at zero now.
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        let start_reference_us = time.now_us();
        Self {
            time,
            state: Mutex::new(ClockState {
                start_reference_us,
                paused_at_us: None,
            }),
        }
    }

    pub fn wall_now_us(&self) -> i64 {
        self.time.now_us()
    }

    pub fn start_reference_us(&self) -> i64 {
        self.state.lock().start_reference_us
    }

    /// Current presentation time in microseconds.
    pub fn position_us(&self) -> i64 {
        let now = self.time.now_us();
        self.state.lock().position(now)
    }

    /// Make `pts` the current presentation time.
    pub fn start_at(&self, pts: i64) {
        let now = self.time.now_us();
        let mut state = self.state.lock();
        state.start_reference_us = now - pts;
        if state.paused_at_us.is_some() {
            state.paused_at_us = Some(pts);
        }
    }

    /// Freeze presentation time. Returns `false` if already paused.
    pub fn pause(&self) -> bool {
        let now = self.time.now_us();
        let mut state = self.state.lock();
        if state.paused_at_us.is_some() {
            return false;
        }
        state.paused_at_us = Some(now - state.start_reference_us);
        true
    }

    /// Continue from the frozen presentation time. Returns `false` if not paused.
    pub fn resume(&self) -> bool {
        let now = self.time.now_us();
        let mut state = self.state.lock();
        let Some(paused_at) = state.paused_at_us.take() else {
            return false;
        };
        state.start_reference_us = now - paused_at;
        true
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused_at_us.is_some()
    }

    /// Move presentation time by `delta_us` (positive seeks forward).
    pub fn shift(&self, delta_us: i64) {
        let mut state = self.state.lock();
        state.start_reference_us -= delta_us;
        if let Some(paused_at) = state.paused_at_us.as_mut() {
            *paused_at += delta_us;
        }
    }

    /// Microseconds until `pts` is due; negative when overdue.
    pub fn until_due_us(&self, pts: i64) -> i64 {
        pts - self.position_us()
    }

    /// `now - start_reference - pts`.
    pub fn drift_us(&self, pts: i64) -> i64 {
        self.position_us() - pts
    }

    /// Drift of `pts`, or [`Error::ClockDriftExceeded`] when beyond `threshold_us`.
    pub fn check_drift(&self, pts: i64, threshold_us: i64) -> Result<i64> {
        let drift_us = self.drift_us(pts);
        if drift_us.abs() > threshold_us {
            return Err(Error::ClockDriftExceeded { drift_us });
        }
        Ok(drift_us)
    }

    /// Compare `pts` against the clock and start a new epoch at `pts` if the
    /// drift exceeds `threshold_us`. Returns the drift observed before any reset.
    pub fn correct_drift(&self, pts: i64, threshold_us: i64) -> i64 {
        let now = self.time.now_us();
        let mut state = self.state.lock();
        let drift_us = now - state.start_reference_us - pts;
        if drift_us.abs() > threshold_us {
            state.start_reference_us = now - pts;
            debug!("Clock resynchronized: drift {}us at pts {}", drift_us, pts);
        }
        drift_us
    }
}
