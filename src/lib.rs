//! A parallel xorshift1024* stream generator.
//!
//! A fixed pool of worker threads fills disjoint buckets of one shared buffer each round; the
//! [`Coordinator`] shuffles the bucket assignment, waits for every worker, and writes the whole
//! buffer to a sink in one go.

mod buffer;
mod config;
mod coordinator;
mod error;
#[cfg(any(feature = "rand", test))]
mod rand_support;
mod worker;
mod xorshift;

#[cfg(test)]
mod bench;

pub use buffer::{BucketPermutation, MasterBuffer, CANARY};
pub use config::{Config, Mode, DEFAULT_BUFSIZE, MAX_THREADS};
pub use coordinator::Coordinator;
pub use error::{ConfigError, Error, Result};
#[cfg(feature = "rand")]
pub use rand_support::Seed1024;
pub use xorshift::{Xorshift1024, STATE_WORDS, WARMUP_ROUNDS};
