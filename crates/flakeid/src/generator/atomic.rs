use portable_atomic::{AtomicU128, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, GeneratorConfig, Result, SnowflakeGenerator, SystemClock, TimeSource,
    generator::wait::wait_past,
};

/// `(timestamp delta, sequence)` packed into one word for compare-and-swap.
///
/// The delta occupies the high 64 bits and the sequence the low 64, so
/// neither is truncated whatever the layout's widths are. The delta is kept
/// unmasked even when the id's timestamp field has rolled over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PackedState(u128);

impl PackedState {
    /// No id emitted yet. Its sequence half is wider than any layout allows.
    const UNSET: Self = Self(u128::MAX);

    const fn new(delta: u64, sequence: u64) -> Self {
        Self(((delta as u128) << 64) | sequence as u128)
    }

    const fn delta(self) -> u64 {
        (self.0 >> 64) as u64
    }

    const fn sequence(self) -> u64 {
        self.0 as u64
    }
}

/// A lock-free Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// The last `(timestamp, sequence)` pair lives in a single [`AtomicU128`].
/// Each call reads the clock, computes its successor, and publishes it with a
/// compare-and-swap; a caller that loses the race starts over with a fresh
/// clock read. When a millisecond's sequence space runs out, the caller
/// waits for the next millisecond without holding anything and then retries.
///
/// ## Recommended When
/// - Throughput under contention matters more than fairness
///
/// ## See Also
/// - [`IdGenerator`]
///
/// [`IdGenerator`]: crate::IdGenerator
pub struct AtomicIdGenerator<T = SystemClock>
where
    T: TimeSource,
{
    config: GeneratorConfig,
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<AtomicU128>,
    #[cfg(not(feature = "cache-padded"))]
    state: AtomicU128,
    clock: T,
}

impl AtomicIdGenerator<SystemClock> {
    /// Creates a generator on the system clock with the default epoch and
    /// layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `partition_id` or `node_id` is negative
    /// or does not fit in 5 bits.
    ///
    /// # Example
    /// ```
    /// use flakeid::{AtomicIdGenerator, SnowflakeGenerator};
    ///
    /// let generator = AtomicIdGenerator::new(31, 31)?;
    /// let id = generator.generate_next()?;
    /// assert_eq!(generator.decode(id).partition_id, 31);
    /// # Ok::<(), flakeid::Error>(())
    /// ```
    pub fn new(partition_id: i64, node_id: i64) -> Result<Self> {
        Self::with_config(GeneratorConfig::new(partition_id, node_id)?)
    }

    /// Creates a generator on the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the system clock is before the epoch.
    pub fn with_config(config: GeneratorConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<T> AtomicIdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `clock` has not reached the configured
    /// epoch.
    pub fn with_clock(config: GeneratorConfig, clock: T) -> Result<Self> {
        config.check_epoch(clock.current_millis())?;
        let state = AtomicU128::new(PackedState::UNSET.0);
        Ok(Self {
            config,
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(state),
            #[cfg(not(feature = "cache-padded"))]
            state,
            clock,
        })
    }

    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generates the next id.
    ///
    /// See [`SnowflakeGenerator::generate_next`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockRegression`] if the clock is behind the last
    /// timestamp used, or behind the epoch on the first call.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn generate_next(&self) -> Result<u64> {
        let epoch = self.config.epoch_millis();
        let max_sequence = self.config.layout().max_sequence();

        loop {
            let current = PackedState(self.state.load(Ordering::Acquire));
            let now = self.clock.current_millis();

            let last = (current != PackedState::UNSET)
                .then(|| (epoch + current.delta(), current.sequence()));

            let floor = last.map_or(epoch, |(last_ts, _)| last_ts);
            if now < floor {
                return Err(Self::cold_clock_behind(floor, now));
            }

            let sequence = match last {
                Some((last_ts, sequence)) if now == last_ts => {
                    if sequence == max_sequence {
                        self.cold_sequence_exhausted(now);
                        continue;
                    }
                    sequence + 1
                }
                _ => 0,
            };

            let next = PackedState::new(now - epoch, sequence);
            if self
                .state
                .compare_exchange_weak(current.0, next.0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(self.config.encode(now, sequence));
            }

            // Another thread won the race; retry from a fresh clock read.
            core::hint::spin_loop();
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(last_ms: u64, now_ms: u64) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!(last_ms, now_ms, "clock moved backwards");
        Error::ClockRegression { last_ms, now_ms }
    }

    #[cold]
    #[inline(never)]
    fn cold_sequence_exhausted(&self, now: u64) {
        #[cfg(feature = "tracing")]
        tracing::trace!(now, "sequence exhausted, waiting for next millisecond");
        wait_past(&self.clock, now);
    }
}

impl<T> SnowflakeGenerator for AtomicIdGenerator<T>
where
    T: TimeSource,
{
    fn config(&self) -> &GeneratorConfig {
        self.config()
    }

    fn generate_next(&self) -> Result<u64> {
        self.generate_next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_state_splits_delta_and_sequence() {
        let state = PackedState::new(123_456, 4095);
        assert_eq!(state.delta(), 123_456);
        assert_eq!(state.sequence(), 4095);
        assert_ne!(state, PackedState::UNSET);
    }

    #[test]
    fn packed_state_keeps_delta_past_timestamp_field() {
        let delta = 1 << 45;
        let state = PackedState::new(delta, 0);
        assert_eq!(state.delta(), delta);
    }

    #[test]
    fn packed_state_holds_full_delta_with_wide_sequence() {
        // 2^38 ms since the epoch next to a 62-bit sequence.
        let delta = 1 << 38;
        let sequence = (1 << 62) - 1;
        let state = PackedState::new(delta, sequence);
        assert_eq!(state.delta(), delta);
        assert_eq!(state.sequence(), sequence);
        assert_ne!(state, PackedState::UNSET);
    }
}
