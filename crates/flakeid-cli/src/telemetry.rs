//! Console logging for the `flakeid` binary.
//!
//! Events go to stderr so that `--print` output on stdout stays a clean list
//! of ids. The level is read from `RUST_LOG` and defaults to `info`; set
//! `RUST_LOG=flakeid=trace` to see every generation span from the library.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}
