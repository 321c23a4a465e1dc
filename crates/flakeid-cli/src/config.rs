use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use core::time::Duration;
use flakeid::{DEFAULT_EPOCH, GeneratorConfig, Layout};

/// Which generator implementation to drive.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// One mutex around the clock read and sequence update.
    Lock,
    /// Compare-and-swap on a packed `(timestamp, sequence)` word.
    Atomic,
}

/// Command-line configuration for the `flakeid` binary.
///
/// Every flag falls back to an environment variable, which may also come
/// from a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flakeid",
    version,
    about = "Generate a batch of Snowflake-style ids and report the elapsed time"
)]
pub struct CliArgs {
    /// Partition (data-center) id stamped into every id.
    ///
    /// Environment variable: `FLAKEID_PARTITION_ID`
    #[arg(long, env = "FLAKEID_PARTITION_ID", default_value_t = 2, allow_negative_numbers = true)]
    pub partition_id: i64,

    /// Node (machine) id stamped into every id.
    ///
    /// Environment variable: `FLAKEID_NODE_ID`
    #[arg(long, env = "FLAKEID_NODE_ID", default_value_t = 3, allow_negative_numbers = true)]
    pub node_id: i64,

    /// Number of ids to generate.
    ///
    /// Environment variable: `FLAKEID_COUNT`
    #[arg(short = 'n', long, env = "FLAKEID_COUNT", default_value_t = 1 << 16)]
    pub count: usize,

    /// Epoch in milliseconds since 1970-01-01 UTC.
    ///
    /// Environment variable: `FLAKEID_EPOCH_MS`
    #[arg(long, env = "FLAKEID_EPOCH_MS", default_value_t = DEFAULT_EPOCH.as_millis() as u64)]
    pub epoch_ms: u64,

    /// Width of the timestamp field.
    ///
    /// Environment variable: `FLAKEID_TIMESTAMP_BITS`
    #[arg(long, env = "FLAKEID_TIMESTAMP_BITS", default_value_t = Layout::DEFAULT.timestamp_bits())]
    pub timestamp_bits: u8,

    /// Width of the partition field.
    ///
    /// Environment variable: `FLAKEID_PARTITION_BITS`
    #[arg(long, env = "FLAKEID_PARTITION_BITS", default_value_t = Layout::DEFAULT.partition_bits())]
    pub partition_bits: u8,

    /// Width of the node field.
    ///
    /// Environment variable: `FLAKEID_NODE_BITS`
    #[arg(long, env = "FLAKEID_NODE_BITS", default_value_t = Layout::DEFAULT.node_bits())]
    pub node_bits: u8,

    /// Width of the sequence field.
    ///
    /// Environment variable: `FLAKEID_SEQUENCE_BITS`
    #[arg(long, env = "FLAKEID_SEQUENCE_BITS", default_value_t = Layout::DEFAULT.sequence_bits())]
    pub sequence_bits: u8,

    /// Threads sharing one generator. `0` uses one thread per CPU.
    ///
    /// Environment variable: `FLAKEID_THREADS`
    #[arg(short, long, env = "FLAKEID_THREADS", default_value_t = 1)]
    pub threads: usize,

    /// Generator implementation.
    ///
    /// Environment variable: `FLAKEID_GENERATOR`
    #[arg(short, long, env = "FLAKEID_GENERATOR", value_enum, default_value_t = GeneratorKind::Lock)]
    pub generator: GeneratorKind,

    /// Print every id to stdout, one per line.
    #[arg(short, long, default_value_t = false)]
    pub print: bool,

    /// With `--print`, also print the decoded fields of each id.
    #[arg(short, long, default_value_t = false, requires = "print")]
    pub decode: bool,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub generator: GeneratorConfig,
    pub kind: GeneratorKind,
    pub count: usize,
    pub threads: usize,
    pub print: bool,
    pub decode: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.count == 0 {
            bail!("FLAKEID_COUNT must be greater than 0");
        }

        let layout = Layout::new(
            args.timestamp_bits,
            args.partition_bits,
            args.node_bits,
            args.sequence_bits,
        )
        .context("invalid field widths")?;

        let generator = GeneratorConfig::builder()
            .epoch(Duration::from_millis(args.epoch_ms))
            .layout(layout)
            .partition_id(args.partition_id)
            .node_id(args.node_id)
            .build()
            .context("invalid generator identity")?;

        let threads = match args.threads {
            0 => num_cpus::get().max(1),
            n => n,
        };

        Ok(Self {
            generator,
            kind: args.generator,
            count: args.count,
            threads: threads.min(args.count),
            print: args.print,
            decode: args.decode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flakeid::ConfigError;

    fn parse(args: &[&str]) -> anyhow::Result<RunConfig> {
        let args = CliArgs::try_parse_from(core::iter::once("flakeid").chain(args.iter().copied()))?;
        RunConfig::try_from(args)
    }

    #[test]
    fn defaults_match_demo() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.count, 65_536);
        assert_eq!(config.threads, 1);
        assert_eq!(config.kind, GeneratorKind::Lock);
        assert_eq!(config.generator.partition_id(), 2);
        assert_eq!(config.generator.node_id(), 3);
        assert_eq!(config.generator.epoch(), DEFAULT_EPOCH);
        assert_eq!(config.generator.layout(), Layout::DEFAULT);
    }

    #[test]
    fn rejects_out_of_range_identity() {
        let err = parse(&["--partition-id", "-1"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::PartitionIdOutOfRange { value: -1, max: 31 })
        );

        let err = parse(&["--node-id", "32"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::NodeIdOutOfRange { value: 32, max: 31 })
        );
    }

    #[test]
    fn custom_layout_widens_node_range() {
        let config = parse(&[
            "--partition-bits",
            "0",
            "--node-bits",
            "10",
            "--node-id",
            "1000",
            "--partition-id",
            "0",
        ])
        .unwrap();
        assert_eq!(config.generator.node_id(), 1000);
    }

    #[test]
    fn rejects_bad_layout() {
        let err = parse(&["--sequence-bits", "13"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::LayoutWidth { total: 64 })
        );
    }

    #[test]
    fn rejects_zero_count() {
        assert!(parse(&["--count", "0"]).is_err());
    }

    #[test]
    fn threads_capped_by_count() {
        let config = parse(&["--count", "3", "--threads", "8"]).unwrap();
        assert_eq!(config.threads, 3);
        let config = parse(&["--threads", "0"]).unwrap();
        assert!(config.threads >= 1);
    }

    #[test]
    fn decode_requires_print() {
        assert!(parse(&["--decode"]).is_err());
        assert!(parse(&["--print", "--decode", "--generator", "atomic"]).is_ok());
    }
}
