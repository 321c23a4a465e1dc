use crate::{GeneratorConfig, Result, SnowflakeId};

/// A minimal interface for generating Snowflake-style IDs.
///
/// Implementations may be shared between threads; concurrent callers never
/// observe the same `(timestamp, sequence)` pair.
pub trait SnowflakeGenerator {
    /// The identity and layout this generator stamps into every id.
    fn config(&self) -> &GeneratorConfig;

    /// Generates the next id.
    ///
    /// When the sequence space of the current millisecond is exhausted, this
    /// blocks until the clock reaches the next millisecond and returns
    /// sequence `0` of that millisecond.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockRegression`] if the clock reports a time before
    /// the last timestamp this generator used. No id is emitted and the
    /// generator state is unchanged.
    ///
    /// [`Error::ClockRegression`]: crate::Error::ClockRegression
    fn generate_next(&self) -> Result<u64>;

    /// Splits an id produced by this generator into its fields.
    fn decode(&self, id: u64) -> SnowflakeId {
        self.config().layout().decode(id)
    }

    /// Converts the timestamp field of `id` back to milliseconds since
    /// 1970-01-01 UTC.
    fn unix_millis(&self, id: u64) -> u64 {
        self.config().epoch_millis() + self.decode(id).timestamp
    }
}
