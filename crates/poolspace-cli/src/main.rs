//! poolspace CLI: exercise a pool allocator from the command line.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use poolspace_alloc::{FairQueueAllocator, StreamReservation, Wait, WeakAllocator};
use poolspace_core::config::PoolConfig;
use poolspace_core::id::{StreamId, StreamIdGen};
use poolspace_core::listener::{ListenerError, SpaceRequestListener};
use poolspace_core::size::{format_size, parse_size};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "poolspace")]
#[command(about = "Fair, blocking space allocation for storage pools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream files concurrently through one allocator and report the outcome
    Simulate {
        /// Pool capacity, e.g. 1GiB (overrides config)
        #[arg(long)]
        total: Option<String>,

        /// Number of concurrent writer streams
        #[arg(long, default_value_t = 4)]
        streams: usize,

        /// Size of each written file
        #[arg(long, default_value = "100MiB")]
        file_size: String,

        /// Bytes written per packet
        #[arg(long, default_value = "1MiB")]
        chunk: String,

        /// Allocation wait in ms: 0 never blocks, negative waits forever (overrides config)
        #[arg(long, allow_hyphen_values = true)]
        wait_ms: Option<i64>,

        /// Minimum preallocation step (overrides config)
        #[arg(long)]
        min_prealloc: Option<String>,

        /// Keep finished files in the pool and evict the oldest under pressure
        #[arg(long)]
        evict: bool,
    },

    /// Print the byte value of a size such as 50MiB
    ParseSize {
        size: String,
    },

    /// Print the effective configuration (environment, optional JSON file)
    Config {
        /// JSON config file; environment is used when absent
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Simulate {
            total,
            streams,
            file_size,
            chunk,
            wait_ms,
            min_prealloc,
            evict,
        } => simulate(
            total,
            streams,
            &file_size,
            &chunk,
            wait_ms,
            min_prealloc,
            evict,
        ),
        Commands::ParseSize { size } => parse_size(&size).map_err(Into::into).map(|bytes| {
            println!("{} ({})", bytes, format_size(bytes));
        }),
        Commands::Config { file } => show_config(file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Frees the oldest finished files until the requested shortfall is covered.
struct OldestFirstEvictor {
    allocator: WeakAllocator<StreamId>,
    cached: Mutex<VecDeque<StreamId>>,
    evicted: AtomicUsize,
}

impl SpaceRequestListener for OldestFirstEvictor {
    fn space_needed(&self, shortfall: u64) -> Result<(), ListenerError> {
        let Some(allocator) = self.allocator.upgrade() else {
            return Ok(());
        };
        let mut freed = 0;
        while freed < shortfall {
            let Some(victim) = self.cached.lock().pop_front() else {
                break;
            };
            freed += allocator.used_space_of(&victim)?;
            allocator.free(&victim)?;
            self.evicted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%victim, shortfall, freed, "evicted cached file");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "oldest-first-evictor"
    }
}

fn simulate(
    total: Option<String>,
    streams: usize,
    file_size: &str,
    chunk: &str,
    wait_ms: Option<i64>,
    min_prealloc: Option<String>,
    evict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PoolConfig::from_env();
    if let Some(total) = total {
        config.total_bytes = parse_size(&total)?;
    }
    if let Some(ms) = wait_ms {
        config.default_wait_ms = ms;
    }
    if let Some(step) = min_prealloc {
        config.min_preallocation_bytes = parse_size(&step)?;
    }
    let file_size = parse_size(file_size)?;
    let chunk = parse_size(chunk)?.max(1);
    let wait = Wait::from_millis(config.default_wait_ms);
    check_progress(&config, streams, file_size, wait)?;

    tracing::info!(config = %config.describe(), streams, file_size, chunk, evict, "starting simulation");

    let allocator = FairQueueAllocator::<StreamId>::from_config(&config);
    let evictor = Arc::new(OldestFirstEvictor {
        allocator: allocator.downgrade(),
        cached: Mutex::new(VecDeque::new()),
        evicted: AtomicUsize::new(0),
    });
    if evict {
        allocator.add_space_request_listener(evictor.clone());
    }

    let ids = StreamIdGen::new();
    let completed = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let handles: Vec<_> = (0..streams)
        .map(|_| {
            let id = ids.next_id();
            let allocator = allocator.clone();
            let evictor = Arc::clone(&evictor);
            let completed = Arc::clone(&completed);
            let failed = Arc::clone(&failed);
            let min_step = config.min_preallocation_bytes;
            thread::spawn(move || {
                let mut stream = StreamReservation::new(allocator, id, min_step, wait);
                let mut position = 0;
                while position < file_size {
                    position = (position + chunk).min(file_size);
                    if let Err(e) = stream.preallocate(position) {
                        tracing::warn!(stream = %id, position, error = %e, "write aborted");
                        failed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                }
                let outcome = if evict {
                    stream.commit().map(|_| evictor.cached.lock().push_back(id))
                } else {
                    stream.release()
                };
                match outcome {
                    Ok(()) => {
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(stream = %id, error = %e, "finishing stream failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().map_err(|_| "writer thread panicked")?;
    }

    let report = serde_json::json!({
        "elapsed_ms": started.elapsed().as_millis() as u64,
        "completed": completed.load(Ordering::Relaxed),
        "failed": failed.load(Ordering::Relaxed),
        "evicted": evictor.evicted.load(Ordering::Relaxed),
        "stats": allocator.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Most bytes one stream holds while writing `file_size` bytes: every step
/// reserves at least `min_step`, so the last one overshoots by less than that.
fn stream_peak(file_size: u64, min_step: u64) -> u64 {
    if file_size == 0 {
        return 0;
    }
    file_size.saturating_add(min_step.saturating_sub(1))
}

/// Refuse runs that can only deadlock: with an unbounded wait, streams that
/// each hold part of a too-small pool would wait on each other forever.
fn check_progress(
    config: &PoolConfig,
    streams: usize,
    file_size: u64,
    wait: Wait,
) -> poolspace_core::Result<()> {
    if config.total_bytes == 0 {
        return Err(poolspace_core::Error::InvalidArgument(
            "pool capacity is 0; pass --total or set POOLSPACE_TOTAL".into(),
        ));
    }
    let needed = stream_peak(file_size, config.min_preallocation_bytes)
        .saturating_mul(streams as u64);
    if wait == Wait::Forever && needed > config.total_bytes {
        return Err(poolspace_core::Error::InvalidArgument(format!(
            "{} streams may hold up to {} while the pool has {}; \
             use a larger --total or a bounded --wait-ms",
            streams,
            format_size(needed),
            format_size(config.total_bytes),
        )));
    }
    Ok(())
}

fn show_config(file: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match file {
        Some(path) => PoolConfig::from_json_str(&fs::read_to_string(path)?)?,
        None => PoolConfig::from_env(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
