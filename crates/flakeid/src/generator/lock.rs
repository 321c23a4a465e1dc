use core::cmp::Ordering;

use parking_lot::Mutex;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, GeneratorConfig, Result, SnowflakeGenerator, SystemClock, TimeSource,
    generator::wait::wait_past,
};

/// Mutable state behind the generator's lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct GeneratorState {
    /// Last millisecond (since 1970) used to emit an id. `None` until the
    /// first id.
    last_timestamp: Option<u64>,
    /// Sequence of the last id emitted in `last_timestamp`.
    sequence: u64,
}

/// A lock-based Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// One [`Mutex`] guards the clock read, the sequence update, and the
/// timestamp write, so every caller sees them as a single step. When a
/// millisecond's sequence space runs out, the caller that hit the wrap waits
/// for the next millisecond while still holding the lock; other callers queue
/// behind it.
///
/// ## Recommended When
/// - Fair access across threads is important
/// - Contention is moderate
///
/// ## See Also
/// - [`AtomicIdGenerator`]
///
/// [`AtomicIdGenerator`]: crate::AtomicIdGenerator
pub struct IdGenerator<T = SystemClock>
where
    T: TimeSource,
{
    config: GeneratorConfig,
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<GeneratorState>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<GeneratorState>,
    clock: T,
}

impl IdGenerator<SystemClock> {
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
    /// use flakeid::{IdGenerator, SnowflakeGenerator};
    ///
    /// let generator = IdGenerator::new(2, 3)?;
    /// let first = generator.generate_next()?;
    /// let second = generator.generate_next()?;
    /// assert!(second > first);
    ///
    /// assert!(IdGenerator::new(-1, 0).is_err());
    /// assert!(IdGenerator::new(0, 32).is_err());
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

impl<T> IdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] wrapping [`ConfigError::EpochInFuture`] if
    /// `clock` has not reached the configured epoch.
    ///
    /// [`ConfigError::EpochInFuture`]: crate::ConfigError::EpochInFuture
    pub fn with_clock(config: GeneratorConfig, clock: T) -> Result<Self> {
        config.check_epoch(clock.current_millis())?;
        let state = Mutex::new(GeneratorState::default());
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
        let mut state = self.state.lock();
        let now = self.clock.current_millis();

        let floor = state.last_timestamp.unwrap_or(self.config.epoch_millis());
        if now < floor {
            return Err(Self::cold_clock_behind(floor, now));
        }

        let (timestamp, sequence) = match state.last_timestamp.map(|last| now.cmp(&last)) {
            Some(Ordering::Equal) => {
                let sequence = (state.sequence + 1) & self.config.layout().max_sequence();
                if sequence == 0 {
                    (self.cold_sequence_exhausted(now), 0)
                } else {
                    (now, sequence)
                }
            }
            // Less was rejected above.
            _ => (now, 0),
        };

        *state = GeneratorState {
            last_timestamp: Some(timestamp),
            sequence,
        };
        Ok(self.config.encode(timestamp, sequence))
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
    fn cold_sequence_exhausted(&self, now: u64) -> u64 {
        #[cfg(feature = "tracing")]
        tracing::trace!(now, "sequence exhausted, waiting for next millisecond");
        wait_past(&self.clock, now)
    }
}

impl<T> SnowflakeGenerator for IdGenerator<T>
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
