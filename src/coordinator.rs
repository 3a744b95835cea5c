//! The coordinator and the round protocol.
//!
//! One round is: permute the buckets, raise every worker's flag, wait until the last worker
//! has cleared its flag, then flush the whole buffer to the sink in one write. Workers live
//! for as long as the coordinator and are joined when it is dropped.

use std::io::Write;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};

use crate::buffer::{BucketPermutation, MasterBuffer, CANARY};
use crate::config::{Config, Mode};
use crate::error::{Error, Result};
use crate::worker::Worker;
use crate::xorshift::Xorshift1024;

/// Round bookkeeping shared with the workers. Guarded by [`Shared::state`].
pub(crate) struct RoundState {
    /// One flag per slot; set means dispatched and not yet finished.
    pub(crate) dispatched: Vec<bool>,
    /// Workers still running in the current round.
    pub(crate) pending: usize,
    pub(crate) permutation: BucketPermutation,
    pub(crate) round: u64,
    pub(crate) shutdown: bool,
}

impl RoundState {
    fn new(threads: usize) -> Self {
        Self {
            dispatched: vec![false; threads],
            pending: 0,
            permutation: BucketPermutation::identity(threads),
            round: 0,
            shutdown: false,
        }
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<RoundState>,
    /// Signals workers that their flag was raised or that the pool is shutting down.
    pub(crate) wake: Condvar,
    /// Signals the coordinator that `pending` reached zero.
    pub(crate) done: Condvar,
    pub(crate) buffer: MasterBuffer,
}

/// Owns the worker pool, the master buffer and the round loop.
///
/// # Example
/// ```
/// # use xsstream::{Config, Coordinator, Mode};
/// let config = Config::new(3, 2, 2).with_mode(Mode::Deterministic);
/// let mut coordinator = Coordinator::new(config).unwrap();
/// let mut output = Vec::new();
/// let rounds = coordinator.run(&mut output).unwrap();
/// assert_eq!(rounds, 2);
/// assert_eq!(output.len(), 2 * 48);
/// ```
pub struct Coordinator {
    config: Config,
    shared: Arc<Shared>,
    /// Drives the bucket shuffle; unused in deterministic mode.
    rng: Xorshift1024,
    workers: Vec<JoinHandle<()>>,
    rounds: u64,
}

impl Coordinator {
    /// Validates `config`, allocates the master buffer, seeds the generators and starts the
    /// workers. Nothing is written anywhere until [`run`](Self::run) or [`round`](Self::round)
    /// is called.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let buffer = MasterBuffer::new(config.threads, config.bufsize)?;
        if config.mode == Mode::Deterministic {
            // Safety: no worker exists yet.
            unsafe { buffer.fill(CANARY) };
        }

        let rng = match (config.mode, config.seed) {
            (Mode::Deterministic, _) => Xorshift1024::deterministic(0),
            (Mode::Random, Some(seed)) => {
                let mut rng = Xorshift1024::deterministic(seed);
                rng.warmup();
                rng
            }
            (Mode::Random, None) => {
                let mut rng = Xorshift1024::from_entropy()?;
                rng.warmup();
                rng
            }
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(RoundState::new(config.threads)),
            wake: Condvar::new(),
            done: Condvar::new(),
            buffer,
        });

        // Workers spawned before a failure are joined by `Drop`.
        let mut coordinator = Self {
            workers: Vec::with_capacity(config.threads),
            config,
            shared,
            rng,
            rounds: 0,
        };
        for slot in 0..coordinator.config.threads {
            let worker = Worker::new(slot, &coordinator.config, Arc::clone(&coordinator.shared))?;
            let handle = thread::Builder::new()
                .name(format!("xsstream-worker-{slot}"))
                .spawn(move || worker.run())
                .map_err(|source| Error::Spawn { slot, source })?;
            coordinator.workers.push(handle);
        }

        info!(
            threads = coordinator.config.threads,
            bufsize = coordinator.config.bufsize,
            count = coordinator.config.count,
            mode = ?coordinator.config.mode,
            "worker pool started"
        );
        Ok(coordinator)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of rounds completed so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// The bucket permutation of the most recent round.
    pub fn permutation(&self) -> BucketPermutation {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .permutation
            .clone()
    }

    /// Runs rounds and flushes each one to `sink` until the configured count is reached.
    /// Returns the number of rounds written.
    ///
    /// A zero count never returns `Ok`; the loop only ends on an error such as the sink being
    /// closed.
    pub fn run<W: Write>(&mut self, sink: &mut W) -> Result<u64> {
        let mut flushed = 0;
        while self.config.is_infinite() || flushed < self.config.count {
            let bytes = self.round()?;
            sink.write_all(bytes)
                .and_then(|()| sink.flush())
                .map_err(Error::SinkWrite)?;
            flushed += 1;
            trace!(round = self.rounds, "round flushed");

            if self.config.mode == Mode::Deterministic {
                // Safety: all workers are idle until the next dispatch.
                unsafe { self.shared.buffer.fill(CANARY) };
            }
        }
        Ok(flushed)
    }

    /// Runs a single round and returns the completed buffer as native-endian bytes.
    pub fn round(&mut self) -> Result<&[u8]> {
        self.dispatch()?;
        self.wait_for_workers()?;
        self.rounds += 1;
        // Safety: every worker cleared its flag and is blocked until the next dispatch, which
        // needs `&mut self` and so cannot happen while the returned slice is borrowed.
        Ok(unsafe { self.shared.buffer.as_bytes() })
    }

    fn dispatch(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock().map_err(|_| Error::Poisoned)?;
        match self.config.mode {
            Mode::Random => state.permutation.shuffle(&mut self.rng),
            Mode::Deterministic => state.permutation.reverse(),
        }
        debug_assert!(state.permutation.is_bijection());
        debug!(
            round = self.rounds,
            buckets = ?state.permutation.as_slice(),
            "dispatching workers"
        );
        state.dispatched.fill(true);
        state.pending = self.config.threads;
        state.round = self.rounds;
        self.shared.wake.notify_all();
        Ok(())
    }

    fn wait_for_workers(&self) -> Result<()> {
        let state = self.shared.state.lock().map_err(|_| Error::Poisoned)?;
        let state = self
            .shared
            .done
            .wait_while(state, |state| state.pending > 0)
            .map_err(|_| Error::Poisoned)?;
        debug_assert!(state.dispatched.iter().all(|&flag| !flag));
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown = true;
        self.shared.wake.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        info!(rounds = self.rounds, "worker pool stopped");
    }
}
