#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use anyhow::{Context, bail};
use clap::Parser;
use config::{CliArgs, GeneratorKind, RunConfig};
use flakeid::{AtomicIdGenerator, IdGenerator, SnowflakeGenerator};
use std::{
    collections::HashSet,
    io::{BufWriter, Write},
    thread::scope,
    time::Instant,
};
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;

    match config.kind {
        GeneratorKind::Lock => run(&IdGenerator::with_config(config.generator)?, &config),
        GeneratorKind::Atomic => run(&AtomicIdGenerator::with_config(config.generator)?, &config),
    }
}

fn run<G>(generator: &G, config: &RunConfig) -> anyhow::Result<()>
where
    G: SnowflakeGenerator + Sync,
{
    tracing::info!(
        partition_id = config.generator.partition_id(),
        node_id = config.generator.node_id(),
        epoch_ms = config.generator.epoch_millis(),
        kind = ?config.kind,
        count = config.count,
        threads = config.threads,
        "generating ids"
    );

    let start = Instant::now();
    let ids = generate_batch(generator, config.count, config.threads)?;
    let elapsed = start.elapsed();

    if config.threads > 1 {
        let unique = ids.iter().collect::<HashSet<_>>().len();
        if unique != ids.len() {
            bail!("generated {} duplicate ids", ids.len() - unique);
        }
    }

    if config.print {
        print_ids(generator, &ids, config.decode)?;
    }

    let secs = elapsed.as_secs_f64();
    tracing::info!(
        count = ids.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        ids_per_sec = if secs > 0.0 { (ids.len() as f64 / secs) as u64 } else { 0 },
        "done"
    );
    Ok(())
}

/// Generates `count` ids split over `threads` threads sharing `generator`.
///
/// Any clock regression aborts the batch.
fn generate_batch<G>(generator: &G, count: usize, threads: usize) -> anyhow::Result<Vec<u64>>
where
    G: SnowflakeGenerator + Sync,
{
    if threads <= 1 {
        return generate_sequential(generator, count);
    }

    let per_thread = count / threads;
    let remainder = count % threads;

    scope(|s| {
        let handles = (0..threads)
            .map(|i| {
                let n = per_thread + usize::from(i < remainder);
                s.spawn(move || generate_sequential(generator, n))
            })
            .collect::<Vec<_>>();

        let mut ids = Vec::with_capacity(count);
        for handle in handles {
            let batch = match handle.join() {
                Ok(batch) => batch?,
                Err(_) => bail!("generator thread panicked"),
            };
            ids.extend(batch);
        }
        Ok(ids)
    })
}

fn generate_sequential<G>(generator: &G, count: usize) -> anyhow::Result<Vec<u64>>
where
    G: SnowflakeGenerator + ?Sized,
{
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let id = generator
            .generate_next()
            .context("refusing to continue the batch")?;
        ids.push(id);
    }
    Ok(ids)
}

fn print_ids<G>(generator: &G, ids: &[u64], decode: bool) -> anyhow::Result<()>
where
    G: SnowflakeGenerator,
{
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for &id in ids {
        if decode {
            let parts = generator.decode(id);
            writeln!(
                out,
                "{id}\tts={} partition={} node={} seq={}",
                generator.unix_millis(id),
                parts.partition_id,
                parts.node_id,
                parts.sequence
            )?;
        } else {
            writeln!(out, "{id}")?;
        }
    }
    out.flush()?;
    Ok(())
}
