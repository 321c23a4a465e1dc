use crate::{SystemClock, TimeSource};
use core::time::Duration;
use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

/// Shared ticker thread that updates every millisecond.
#[derive(Debug)]
struct SharedTickerInner {
    current: AtomicU64,
    _handle: OnceLock<JoinHandle<()>>,
}

/// A wall-clock time source that never moves backwards.
///
/// The wall clock is sampled once at construction. From then on, time
/// advances only by the elapsed [`Instant`] time, counted by a background
/// thread once per millisecond. NTP steps and manual clock changes after
/// construction are not observed, so generators driven by this clock never
/// return [`Error::ClockRegression`].
///
/// The price is drift: over a long-running process the reported time may
/// wander from the system clock. Restarting the process re-anchors it, and a
/// restart can still observe an earlier wall-clock time than the previous
/// process used.
///
/// Clones share one ticker thread, which exits once the last clone is
/// dropped.
///
/// [`Error::ClockRegression`]: crate::Error::ClockRegression
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    inner: Arc<SharedTickerInner>,
    anchor_millis: u64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Anchors a new clock at the current wall-clock time and starts its
    /// ticker thread.
    ///
    /// # Example
    ///
    /// ```
    /// use flakeid::{MonotonicClock, SystemClock, TimeSource};
    ///
    /// let clock = MonotonicClock::new();
    /// let first = clock.current_millis();
    /// std::thread::sleep(std::time::Duration::from_millis(5));
    ///
    /// // Timer alignment can leave the counter a tick behind; it never goes
    /// // backwards.
    /// assert!(clock.current_millis() >= first);
    /// assert!(first <= SystemClock.current_millis() + 1);
    /// ```
    pub fn new() -> Self {
        let start = Instant::now();
        let anchor_millis = SystemClock.current_millis();

        let inner = Arc::new(SharedTickerInner {
            current: AtomicU64::new(0),
            _handle: OnceLock::new(),
        });

        let weak_inner = Arc::downgrade(&inner);
        let handle = thread::spawn(move || {
            let mut tick = 0;

            loop {
                let Some(inner_ref) = weak_inner.upgrade() else {
                    break;
                };

                let target = start + Duration::from_millis(tick);
                let now = Instant::now();
                if now < target {
                    thread::sleep(target - now);
                }

                // Recompute after waking; sleeps overshoot.
                let now_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                inner_ref.current.store(now_ms, Ordering::Relaxed);

                tick = now_ms + 1;
            }
        });

        // Freshly created, so the cell is always empty here.
        let _ = inner._handle.set(handle);

        Self {
            inner,
            anchor_millis,
        }
    }
}

impl TimeSource for MonotonicClock {
    fn current_millis(&self) -> u64 {
        self.anchor_millis + self.inner.current.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let mut last = clock.current_millis();
        for _ in 0..10_000 {
            let now = clock.current_millis();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let first = clock.current_millis();
        thread::sleep(Duration::from_millis(20));
        assert!(clock.current_millis() > first);
    }

    #[test]
    fn clones_share_one_counter() {
        let clock = MonotonicClock::new();
        let clone = clock.clone();
        thread::sleep(Duration::from_millis(3));
        let a = clock.current_millis();
        let b = clone.current_millis();
        assert!(a.abs_diff(b) <= 1);
    }
}
