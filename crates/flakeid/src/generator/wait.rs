use crate::TimeSource;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Busy-spins before falling back to yielding the thread.
const SPINS_BEFORE_YIELD: u32 = 64;

/// Blocks until `clock` reports a millisecond strictly after `last` and
/// returns that reading.
#[cold]
#[inline(never)]
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip(clock)))]
pub(crate) fn wait_past<T>(clock: &T, last: u64) -> u64
where
    T: TimeSource + ?Sized,
{
    let mut spins = 0;
    loop {
        let now = clock.current_millis();
        if now > last {
            return now;
        }
        if spins < SPINS_BEFORE_YIELD {
            spins += 1;
            core::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}
