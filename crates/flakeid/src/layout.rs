use crate::ConfigError;

/// Number of bits available to the four fields. The top bit of every id is
/// reserved and always zero.
pub const PAYLOAD_BITS: u32 = 63;

/// Returns a mask with the low `bits` bits set.
const fn low_mask(bits: u8) -> u64 {
    if bits == 0 {
        0
    } else {
        u64::MAX >> (64 - bits as u32)
    }
}

/// The fields of an id, as packed by a [`Layout`].
///
/// `timestamp` is the delta in milliseconds from the generator's epoch, not
/// an absolute time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnowflakeId {
    pub timestamp: u64,
    pub partition_id: u64,
    pub node_id: u64,
    pub sequence: u64,
}

/// Bit widths of the fields packed into a 64-bit id.
///
/// Fields are packed from the most significant bit down:
///
/// ```text
///  Bit Index:  63           63 62                                                    0
///              +--------------+---------------+---------------+----------+----------+
///  Field:      | reserved (1) | timestamp (T) | partition (P) | node (N) | seq (S)  |
///              +--------------+---------------+---------------+----------+----------+
///              |<----------- MSB ------------- 64 bits ------------- LSB ---------->|
/// ```
///
/// `T + P + N + S` is always 63. The default layout is `41/5/5/12`.
///
/// # Example
///
/// ```
/// use flakeid::{Layout, SnowflakeId};
///
/// let layout = Layout::default();
/// let id = layout.encode(SnowflakeId {
///     timestamp: 1000,
///     partition_id: 2,
///     node_id: 3,
///     sequence: 0,
/// });
/// assert_eq!(id, (1000 << 22) | (2 << 17) | (3 << 12));
/// assert_eq!(layout.decode(id).node_id, 3);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawLayout"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    timestamp_bits: u8,
    partition_bits: u8,
    node_bits: u8,
    sequence_bits: u8,
}

impl Layout {
    /// 41 bits of timestamp, 5 of partition, 5 of node, 12 of sequence.
    pub const DEFAULT: Self = Self {
        timestamp_bits: 41,
        partition_bits: 5,
        node_bits: 5,
        sequence_bits: 12,
    };

    /// Creates a layout from explicit widths.
    ///
    /// Partition and node may be zero bits wide, in which case their only
    /// valid value is `0`. Timestamp and sequence need at least one bit.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::LayoutWidth`] if the widths do not sum to
    ///   [`PAYLOAD_BITS`]
    /// - [`ConfigError::ZeroWidth`] if the timestamp or sequence width is zero
    pub fn new(
        timestamp_bits: u8,
        partition_bits: u8,
        node_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self, ConfigError> {
        let total = u32::from(timestamp_bits)
            + u32::from(partition_bits)
            + u32::from(node_bits)
            + u32::from(sequence_bits);
        if total != PAYLOAD_BITS {
            return Err(ConfigError::LayoutWidth { total });
        }
        if timestamp_bits == 0 {
            return Err(ConfigError::ZeroWidth { field: "timestamp" });
        }
        if sequence_bits == 0 {
            return Err(ConfigError::ZeroWidth { field: "sequence" });
        }
        Ok(Self {
            timestamp_bits,
            partition_bits,
            node_bits,
            sequence_bits,
        })
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn partition_bits(&self) -> u8 {
        self.partition_bits
    }

    pub const fn node_bits(&self) -> u8 {
        self.node_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    /// Largest timestamp delta before the field rolls over.
    pub const fn max_timestamp(&self) -> u64 {
        low_mask(self.timestamp_bits)
    }

    pub const fn max_partition_id(&self) -> u64 {
        low_mask(self.partition_bits)
    }

    pub const fn max_node_id(&self) -> u64 {
        low_mask(self.node_bits)
    }

    /// Largest sequence value; `max_sequence() + 1` ids fit in one
    /// millisecond.
    pub const fn max_sequence(&self) -> u64 {
        low_mask(self.sequence_bits)
    }

    pub const fn timestamp_shift(&self) -> u32 {
        self.partition_bits as u32 + self.node_bits as u32 + self.sequence_bits as u32
    }

    pub const fn partition_shift(&self) -> u32 {
        self.node_bits as u32 + self.sequence_bits as u32
    }

    pub const fn node_shift(&self) -> u32 {
        self.sequence_bits as u32
    }

    /// Packs the fields into an id. Each field is masked to its width, so an
    /// oversized timestamp delta rolls over instead of spilling into the
    /// reserved bit.
    pub const fn encode(&self, id: SnowflakeId) -> u64 {
        ((id.timestamp & self.max_timestamp()) << self.timestamp_shift())
            | ((id.partition_id & self.max_partition_id()) << self.partition_shift())
            | ((id.node_id & self.max_node_id()) << self.node_shift())
            | (id.sequence & self.max_sequence())
    }

    /// Splits an id into its fields. The reserved bit is ignored.
    pub const fn decode(&self, raw: u64) -> SnowflakeId {
        SnowflakeId {
            timestamp: (raw >> self.timestamp_shift()) & self.max_timestamp(),
            partition_id: (raw >> self.partition_shift()) & self.max_partition_id(),
            node_id: (raw >> self.node_shift()) & self.max_node_id(),
            sequence: raw & self.max_sequence(),
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawLayout {
    timestamp_bits: u8,
    partition_bits: u8,
    node_bits: u8,
    sequence_bits: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<RawLayout> for Layout {
    type Error = ConfigError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        Self::new(
            raw.timestamp_bits,
            raw.partition_bits,
            raw.node_bits,
            raw.sequence_bits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_shifts_and_masks() {
        let layout = Layout::default();
        assert_eq!(layout.timestamp_shift(), 22);
        assert_eq!(layout.partition_shift(), 17);
        assert_eq!(layout.node_shift(), 12);
        assert_eq!(layout.max_timestamp(), (1 << 41) - 1);
        assert_eq!(layout.max_partition_id(), 31);
        assert_eq!(layout.max_node_id(), 31);
        assert_eq!(layout.max_sequence(), 4095);
    }

    #[test]
    fn encodes_fields_most_significant_first() {
        let layout = Layout::default();
        let t = 123_456_789;
        let id = layout.encode(SnowflakeId {
            timestamp: t,
            partition_id: 2,
            node_id: 3,
            sequence: 0,
        });
        assert_eq!(id, (t << 22) | (2 << 17) | (3 << 12));
    }

    #[test]
    fn reserved_bit_stays_clear_at_field_maximums() {
        let layout = Layout::default();
        let id = layout.encode(SnowflakeId {
            timestamp: layout.max_timestamp(),
            partition_id: layout.max_partition_id(),
            node_id: layout.max_node_id(),
            sequence: layout.max_sequence(),
        });
        assert_eq!(id, i64::MAX as u64);
        assert!(i64::try_from(id).is_ok());
    }

    #[test]
    fn decode_reverses_encode() {
        let layout = Layout::new(45, 3, 4, 11).unwrap();
        let parts = SnowflakeId {
            timestamp: 0x1_2345_6789,
            partition_id: 5,
            node_id: 9,
            sequence: 2047,
        };
        let id = layout.encode(parts);
        assert_eq!(layout.decode(id), parts);
        assert_eq!(layout.encode(layout.decode(id)), id);
    }

    #[test]
    fn timestamp_rolls_over_instead_of_touching_reserved_bit() {
        let layout = Layout::default();
        let id = layout.encode(SnowflakeId {
            timestamp: layout.max_timestamp() + 2,
            ..SnowflakeId::default()
        });
        assert_eq!(layout.decode(id).timestamp, 1);
        assert_eq!(id >> 63, 0);
    }

    #[test]
    fn zero_width_identity_fields_are_allowed() {
        let layout = Layout::new(51, 0, 0, 12).unwrap();
        assert_eq!(layout.max_partition_id(), 0);
        assert_eq!(layout.max_node_id(), 0);
        assert_eq!(layout.partition_shift(), 12);
        let id = layout.encode(SnowflakeId {
            timestamp: 7,
            partition_id: 1,
            node_id: 1,
            sequence: 3,
        });
        assert_eq!(id, (7 << 12) | 3);
    }

    #[test]
    fn rejects_widths_not_summing_to_63() {
        assert_eq!(
            Layout::new(41, 5, 5, 13),
            Err(ConfigError::LayoutWidth { total: 64 })
        );
        assert_eq!(
            Layout::new(255, 255, 255, 255),
            Err(ConfigError::LayoutWidth { total: 1020 })
        );
    }

    #[test]
    fn rejects_zero_timestamp_or_sequence() {
        assert_eq!(
            Layout::new(0, 20, 20, 23),
            Err(ConfigError::ZeroWidth { field: "timestamp" })
        );
        assert_eq!(
            Layout::new(43, 10, 10, 0),
            Err(ConfigError::ZeroWidth { field: "sequence" })
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializing_validates_widths() {
        let layout: Layout = serde_json::from_str(
            r#"{"timestamp_bits":41,"partition_bits":5,"node_bits":5,"sequence_bits":12}"#,
        )
        .unwrap();
        assert_eq!(layout, Layout::DEFAULT);

        let err = serde_json::from_str::<Layout>(
            r#"{"timestamp_bits":41,"partition_bits":5,"node_bits":5,"sequence_bits":13}"#,
        );
        assert!(err.is_err());
    }
}
