//! Time measure and clocks

use std::ops::{Add, AddAssign};
use std::time::{Duration, Instant};

/// Source of timestamps, expressed as time since the clock's own origin.
pub trait Clock {
    /// Current reading.
    fn now(&self) -> Duration;
}

/// Monotonic wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    /// Clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    #[inline]
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// CPU time consumed by the calling thread.
///
/// Sleeping, blocking and waiting for the scheduler do not advance it.
/// Reads zero where the platform has no per-thread CPU clock or the
/// clock cannot be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadCpuClock;

impl Clock for ThreadCpuClock {
    #[inline]
    fn now(&self) -> Duration {
        thread_cpu_time().unwrap_or_default()
    }
}

#[cfg(unix)]
fn thread_cpu_time() -> Option<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return None;
    }
    Some(Duration::new(
        u64::try_from(ts.tv_sec).ok()?,
        u32::try_from(ts.tv_nsec).ok()?,
    ))
}

#[cfg(not(unix))]
fn thread_cpu_time() -> Option<Duration> {
    None
}

/// Time attributed to a scope.
///
/// `duration` accumulates; `start` is the clock reading at which the scope
/// last became the innermost one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeValue {
    duration: Duration,
    start: Duration,
}

impl TimeValue {
    /// Zero duration, started at `clock`'s current reading. Use it for the
    /// root so time before the first scope is attributed to the root.
    pub fn started<C: Clock + ?Sized>(clock: &C) -> Self {
        Self {
            duration: Duration::ZERO,
            start: clock.now(),
        }
    }

    /// Accumulated duration.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Add the time since the last stamp.
    #[inline]
    pub fn charge(&mut self, now: Duration) {
        self.duration += now.saturating_sub(self.start);
    }

    /// Mark the scope as innermost from `now` on.
    #[inline]
    pub fn stamp(&mut self, now: Duration) {
        self.start = now;
    }

    /// Whole microseconds, as flame-graph tools expect integer samples.
    pub fn as_micros(&self) -> u128 {
        self.duration.as_micros()
    }
}

impl From<Duration> for TimeValue {
    fn from(duration: Duration) -> Self {
        Self {
            duration,
            start: Duration::ZERO,
        }
    }
}

/// Durations add; the left operand keeps its `start`.
impl Add for TimeValue {
    type Output = TimeValue;

    fn add(self, other: TimeValue) -> TimeValue {
        TimeValue {
            duration: self.duration + other.duration,
            start: self.start,
        }
    }
}

impl AddAssign for TimeValue {
    fn add_assign(&mut self, other: TimeValue) {
        self.duration += other.duration;
    }
}
