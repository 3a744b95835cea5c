use std::io;

use thiserror::Error;

/// Errors found while validating a [`Config`](crate::Config). None of these can occur once the
/// coordinator has started.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("threads must be between 1 and 64, inclusive (got {0})")]
    ThreadCount(usize),

    #[error("buffer size per thread must be at least one word")]
    BufferSize,

    #[error("{threads} threads x {bufsize:#x} words does not fit in the address space")]
    SizeOverflow { threads: usize, bufsize: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(getrandom::Error),

    #[error("entropy source returned an all-zero seed")]
    DegenerateEntropy,

    #[error("memory exhausted allocating {words} words")]
    Allocation { words: usize },

    #[error("failed to spawn worker {slot}")]
    Spawn {
        slot: usize,
        #[source]
        source: io::Error,
    },

    #[error("round state lock poisoned by a panicking worker")]
    Poisoned,

    #[error("failed to write to output sink")]
    SinkWrite(#[source] io::Error),
}

impl Error {
    /// Returns `true` if the sink was closed by its reader, which ends a stream normally.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Error::SinkWrite(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
