use core::time::Duration;

use crate::{ConfigError, DEFAULT_EPOCH, Layout, SnowflakeId};

/// Identity and layout of one generator instance.
///
/// Immutable once built. Two generators running at the same time must not
/// share a `(partition_id, node_id)` pair; nothing in this crate checks that.
///
/// # Example
///
/// ```
/// use flakeid::{GeneratorConfig, Layout, TWITTER_EPOCH};
///
/// let config = GeneratorConfig::builder()
///     .epoch(TWITTER_EPOCH)
///     .layout(Layout::new(41, 3, 7, 12)?)
///     .partition_id(1)
///     .node_id(100)
///     .build()?;
///
/// assert_eq!(config.layout().max_node_id(), 127);
/// # Ok::<(), flakeid::ConfigError>(())
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "GeneratorConfigBuilder", into = "GeneratorConfigBuilder")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeneratorConfig {
    epoch_millis: u64,
    partition_id: u64,
    node_id: u64,
    layout: Layout,
}

impl GeneratorConfig {
    /// Creates a config with the default epoch and layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PartitionIdOutOfRange`] or
    /// [`ConfigError::NodeIdOutOfRange`] if either value is negative or
    /// exceeds its 5-bit field.
    pub fn new(partition_id: i64, node_id: i64) -> Result<Self, ConfigError> {
        Self::builder()
            .partition_id(partition_id)
            .node_id(node_id)
            .build()
    }

    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    /// The epoch as milliseconds since 1970-01-01 UTC.
    pub const fn epoch_millis(&self) -> u64 {
        self.epoch_millis
    }

    pub const fn epoch(&self) -> Duration {
        Duration::from_millis(self.epoch_millis)
    }

    pub const fn partition_id(&self) -> u64 {
        self.partition_id
    }

    pub const fn node_id(&self) -> u64 {
        self.node_id
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Packs an absolute timestamp and a sequence number together with this
    /// instance's identity.
    ///
    /// `now_millis` must not be before the epoch.
    pub(crate) const fn encode(&self, now_millis: u64, sequence: u64) -> u64 {
        self.layout.encode(SnowflakeId {
            timestamp: now_millis - self.epoch_millis,
            partition_id: self.partition_id,
            node_id: self.node_id,
            sequence,
        })
    }

    /// Fails if the clock has not reached the epoch yet.
    pub(crate) const fn check_epoch(&self, now_millis: u64) -> Result<(), ConfigError> {
        if now_millis < self.epoch_millis {
            return Err(ConfigError::EpochInFuture {
                epoch_ms: self.epoch_millis,
                now_ms: now_millis,
            });
        }
        Ok(())
    }
}

/// Builder for [`GeneratorConfig`].
///
/// Identity values are taken as signed integers so that negative values
/// read from configuration sources are rejected rather than wrapped.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorConfigBuilder {
    epoch_millis: u64,
    partition_id: i64,
    node_id: i64,
    layout: Layout,
}

impl Default for GeneratorConfigBuilder {
    fn default() -> Self {
        Self {
            epoch_millis: duration_millis(DEFAULT_EPOCH),
            partition_id: 0,
            node_id: 0,
            layout: Layout::DEFAULT,
        }
    }
}

impl GeneratorConfigBuilder {
    /// Sets the epoch, as a duration since 1970-01-01 UTC. Sub-millisecond
    /// precision is truncated.
    pub fn epoch(mut self, epoch: Duration) -> Self {
        self.epoch_millis = duration_millis(epoch);
        self
    }

    pub fn partition_id(mut self, partition_id: i64) -> Self {
        self.partition_id = partition_id;
        self
    }

    pub fn node_id(mut self, node_id: i64) -> Self {
        self.node_id = node_id;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Validates the identity values against the layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PartitionIdOutOfRange`] or
    /// [`ConfigError::NodeIdOutOfRange`] if a value is negative or larger
    /// than `2^width - 1`.
    pub fn build(self) -> Result<GeneratorConfig, ConfigError> {
        let max_partition = self.layout.max_partition_id();
        let partition_id = u64::try_from(self.partition_id)
            .ok()
            .filter(|id| *id <= max_partition)
            .ok_or(ConfigError::PartitionIdOutOfRange {
                value: self.partition_id,
                max: max_partition,
            })?;

        let max_node = self.layout.max_node_id();
        let node_id = u64::try_from(self.node_id)
            .ok()
            .filter(|id| *id <= max_node)
            .ok_or(ConfigError::NodeIdOutOfRange {
                value: self.node_id,
                max: max_node,
            })?;

        Ok(GeneratorConfig {
            epoch_millis: self.epoch_millis,
            partition_id,
            node_id,
            layout: self.layout,
        })
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl TryFrom<GeneratorConfigBuilder> for GeneratorConfig {
    type Error = ConfigError;

    fn try_from(builder: GeneratorConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl From<GeneratorConfig> for GeneratorConfigBuilder {
    fn from(config: GeneratorConfig) -> Self {
        // Validated ids fit in 63 bits, so the fallback is never taken.
        Self {
            epoch_millis: config.epoch_millis,
            partition_id: i64::try_from(config.partition_id).unwrap_or(i64::MAX),
            node_id: i64::try_from(config.node_id).unwrap_or(i64::MAX),
            layout: config.layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identity_bounds() {
        assert!(GeneratorConfig::new(0, 0).is_ok());
        let config = GeneratorConfig::new(31, 31).unwrap();
        assert_eq!(config.partition_id(), 31);
        assert_eq!(config.node_id(), 31);
        assert_eq!(config.epoch(), DEFAULT_EPOCH);
        assert_eq!(config.layout(), Layout::DEFAULT);
    }

    #[test]
    fn rejects_negative_identity() {
        assert_eq!(
            GeneratorConfig::new(-1, 0),
            Err(ConfigError::PartitionIdOutOfRange { value: -1, max: 31 })
        );
        assert_eq!(
            GeneratorConfig::new(0, -1),
            Err(ConfigError::NodeIdOutOfRange { value: -1, max: 31 })
        );
    }

    #[test]
    fn rejects_identity_wider_than_field() {
        assert_eq!(
            GeneratorConfig::new(32, 0),
            Err(ConfigError::PartitionIdOutOfRange { value: 32, max: 31 })
        );
        assert_eq!(
            GeneratorConfig::new(0, 32),
            Err(ConfigError::NodeIdOutOfRange { value: 32, max: 31 })
        );
    }

    #[test]
    fn identity_limits_follow_custom_layout() {
        let layout = Layout::new(40, 2, 9, 12).unwrap();
        let config = GeneratorConfig::builder()
            .layout(layout)
            .partition_id(3)
            .node_id(511)
            .build()
            .unwrap();
        assert_eq!(config.node_id(), 511);

        let err = GeneratorConfig::builder()
            .layout(layout)
            .partition_id(4)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::PartitionIdOutOfRange { value: 4, max: 3 });
    }

    #[test]
    fn encode_subtracts_epoch() {
        let config = GeneratorConfig::builder()
            .epoch(Duration::from_millis(1_000))
            .partition_id(2)
            .node_id(3)
            .build()
            .unwrap();
        assert_eq!(config.encode(1_500, 7), (500 << 22) | (2 << 17) | (3 << 12) | 7);
    }

    #[test]
    fn epoch_check_rejects_future_epoch() {
        let config = GeneratorConfig::builder()
            .epoch(Duration::from_millis(1_000))
            .build()
            .unwrap();
        assert!(config.check_epoch(1_000).is_ok());
        assert_eq!(
            config.check_epoch(999),
            Err(ConfigError::EpochInFuture {
                epoch_ms: 1_000,
                now_ms: 999
            })
        );
    }

    #[test]
    fn builder_round_trips_config() {
        assert_eq!(
            GeneratorConfig::builder().build().unwrap().epoch_millis(),
            1_527_753_682_640
        );

        let layout = Layout::new(21, 5, 5, 32).unwrap();
        let config = GeneratorConfig::builder()
            .epoch(Duration::from_micros(1_500_999))
            .layout(layout)
            .partition_id(31)
            .node_id(17)
            .build()
            .unwrap();
        assert_eq!(config.epoch_millis(), 1_500);
        assert_eq!(GeneratorConfig::try_from(GeneratorConfigBuilder::from(config)), Ok(config));
    }

    #[test]
    fn epoch_saturates_past_u64_millis() {
        let config = GeneratorConfig::builder()
            .epoch(Duration::MAX)
            .build()
            .unwrap();
        assert_eq!(config.epoch_millis(), u64::MAX);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializing_validates_identity() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{"epoch_millis":0,"partition_id":2,"node_id":3}"#).unwrap();
        assert_eq!(config.partition_id(), 2);
        assert_eq!(config.layout(), Layout::DEFAULT);

        let json = serde_json::to_string(&config).unwrap();
        let back: GeneratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        assert!(serde_json::from_str::<GeneratorConfig>(r#"{"node_id":-4}"#).is_err());
    }
}
