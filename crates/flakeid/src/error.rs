/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Rejected generator configuration.
///
/// Returned while building a [`Layout`] or a [`GeneratorConfig`], and when a
/// generator is attached to a clock that has not yet reached the configured
/// epoch. The caller has to fix its inputs; retrying with the same values
/// fails the same way.
///
/// [`Layout`]: crate::Layout
/// [`GeneratorConfig`]: crate::GeneratorConfig
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The partition id is negative or does not fit in the partition field.
    #[error("partition id {value} is out of range (0..={max})")]
    PartitionIdOutOfRange { value: i64, max: u64 },

    /// The node id is negative or does not fit in the node field.
    #[error("node id {value} is out of range (0..={max})")]
    NodeIdOutOfRange { value: i64, max: u64 },

    /// The four field widths do not add up to 63 bits.
    #[error("field widths sum to {total} bits, expected 63")]
    LayoutWidth { total: u32 },

    /// A field that must carry information was given zero bits.
    #[error("the {field} field must be at least one bit wide")]
    ZeroWidth { field: &'static str },

    /// The epoch lies after the time reported by the generator's clock.
    #[error("epoch {epoch_ms} ms is later than the current time {now_ms} ms")]
    EpochInFuture { epoch_ms: u64, now_ms: u64 },
}

/// All errors that `flakeid` can emit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The generator could not be constructed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The clock reported a time before the last timestamp used to emit an
    /// id.
    ///
    /// Nothing was emitted and the generator state is untouched. The
    /// generator never waits out or clamps a backward jump, however small;
    /// whether to retry, alert or abort is up to the caller.
    #[error("clock moved backwards from {last_ms} ms to {now_ms} ms; refusing to generate id")]
    ClockRegression { last_ms: u64, now_ms: u64 },
}

impl Error {
    /// Returns `true` for [`Error::ClockRegression`].
    pub const fn is_clock_regression(&self) -> bool {
        matches!(self, Self::ClockRegression { .. })
    }
}
