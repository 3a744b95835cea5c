//! Run configuration for the generator pool.

use crate::error::ConfigError;

/// Largest accepted worker count.
pub const MAX_THREADS: usize = 64;

/// Default bucket size: `0x20000` words, or 1 MiB per thread per round.
pub const DEFAULT_BUFSIZE: usize = 0x20000;

/// How the pool seeds its generators and assigns buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Generators are seeded once (from the OS or from [`Config::seed`]) and warmed up. Buckets
    /// are shuffled every round.
    #[default]
    Random,

    /// Every worker reseeds to its own slot index each round without warmup, and the bucket
    /// permutation is the reversed identity. The output repeats round after round, which makes
    /// small runs easy to check by eye.
    Deterministic,
}

/// Parameters of a run. Use [`Config::validate`] (or let [`Coordinator::new`] do it) before
/// relying on the values.
///
/// # Example
/// ```
/// # use xsstream::{Config, Mode};
/// let config = Config::new(4, 0x100, 10).with_mode(Mode::Deterministic);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.round_bytes(), 4 * 0x100 * 8);
/// ```
///
/// [`Coordinator::new`]: crate::Coordinator::new
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of worker threads, in `[1, MAX_THREADS]`.
    pub threads: usize,
    /// Words generated by each worker per round.
    pub bufsize: usize,
    /// Rounds to run; zero runs forever.
    pub count: u64,
    pub mode: Mode,
    /// Fixed seed for reproducible runs in [`Mode::Random`]. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Config {
    pub fn new(threads: usize, bufsize: usize, count: u64) -> Self {
        Self {
            threads,
            bufsize,
            count,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks the thread count and buffer geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(ConfigError::ThreadCount(self.threads));
        }
        if self.bufsize == 0 {
            return Err(ConfigError::BufferSize);
        }
        self.threads
            .checked_mul(self.bufsize)
            .and_then(|words| words.checked_mul(std::mem::size_of::<u64>()))
            .ok_or(ConfigError::SizeOverflow {
                threads: self.threads,
                bufsize: self.bufsize,
            })?;
        Ok(())
    }

    /// Total words in the master buffer.
    pub fn total_words(&self) -> usize {
        self.threads * self.bufsize
    }

    /// Bytes written to the sink per round.
    pub fn round_bytes(&self) -> usize {
        self.total_words() * std::mem::size_of::<u64>()
    }

    /// Returns `true` if the run never ends on its own.
    pub fn is_infinite(&self) -> bool {
        self.count == 0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 1,
            bufsize: DEFAULT_BUFSIZE,
            count: 0,
            mode: Mode::Random,
            seed: None,
        }
    }
}
