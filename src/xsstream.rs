//! Streams xorshift1024* output to stdout.
//!
//! ```text
//! xsstream -t 8 | RNG_test stdin64
//! xsstream -t 3 -b 2 -c 2 -d | xxd
//! ```

use std::io;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use xsstream::{Config, Coordinator, Mode};

/// Parallel xorshift1024* stream generator
#[derive(Parser, Debug)]
#[command(name = "xsstream")]
#[command(author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Number of worker threads (1 to 64)
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Words generated per thread per round, in hex (0x...)
    #[arg(short, long, value_parser = parse_hex, default_value = "0x20000")]
    bufsize: usize,

    /// Number of rounds; use 0 to generate forever
    #[arg(short, long, default_value_t = 0)]
    count: u64,

    /// Reseed every worker to its slot index each round and reverse the buckets
    #[arg(short, long)]
    deterministic: bool,

    /// Seed all generators from this value instead of the OS entropy source
    #[arg(short, long)]
    seed: Option<u64>,

    /// Enable debug logging on stderr
    #[arg(long)]
    verbose: bool,

    /// Print version
    #[arg(short = 'v', long)]
    version: bool,
}

fn parse_hex(value: &str) -> Result<usize, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    usize::from_str_radix(digits, 16).map_err(|e| format!("`{value}` is not a hex number: {e}"))
}

impl Cli {
    fn config(&self) -> Config {
        let mode = if self.deterministic {
            Mode::Deterministic
        } else {
            Mode::Random
        };
        Config {
            threads: self.threads,
            bufsize: self.bufsize,
            count: self.count,
            mode,
            seed: self.seed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Without arguments, show usage instead of streaming forever.
    if std::env::args_os().len() == 1 {
        Cli::command().print_help()?;
        return Ok(());
    }
    let cli = Cli::parse();
    if cli.version {
        println!("xsstream version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // stdout carries the data, so logs go to stderr.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = cli.config();
    debug!(?config, "parsed arguments");

    let mut coordinator = Coordinator::new(config).context("failed to start worker pool")?;
    let mut stdout = io::stdout().lock();
    match coordinator.run(&mut stdout) {
        Ok(rounds) => info!(rounds, "finished"),
        Err(e) if e.is_broken_pipe() => info!(rounds = coordinator.rounds(), "output closed"),
        Err(e) => return Err(e).context("stream aborted"),
    }
    Ok(())
}
