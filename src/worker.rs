//! Worker threads.
//!
//! A worker is either waiting for a dispatch, running (filling its bucket for the current
//! round) or stopped. The coordinator moves it from waiting to running by raising the worker's
//! dispatch flag; the worker moves itself back by clearing that flag once its bucket is full.
//! The worker that finishes last wakes the coordinator.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::config::{Config, Mode};
use crate::coordinator::Shared;
use crate::error::{Error, Result};
use crate::xorshift::Xorshift1024;

pub(crate) struct Worker {
    slot: usize,
    mode: Mode,
    rng: Xorshift1024,
    shared: Arc<Shared>,
}

impl Worker {
    /// Seeds the worker's generator. Warmup is left to [`run`](Self::run), so it happens on the
    /// worker's own thread.
    pub(crate) fn new(slot: usize, config: &Config, shared: Arc<Shared>) -> Result<Self> {
        let rng = match (config.mode, config.seed) {
            (Mode::Deterministic, _) => Xorshift1024::deterministic(slot as u64),
            (Mode::Random, Some(seed)) => {
                Xorshift1024::deterministic(seed.wrapping_add(1).wrapping_add(slot as u64))
            }
            (Mode::Random, None) => Xorshift1024::from_entropy()?,
        };
        Ok(Self {
            slot,
            mode: config.mode,
            rng,
            shared,
        })
    }

    /// Serves rounds until the coordinator shuts the pool down.
    pub(crate) fn run(mut self) {
        if self.mode == Mode::Random {
            self.rng.warmup();
        }
        debug!(slot = self.slot, "worker waiting");

        loop {
            let bucket = match self.wait_for_dispatch() {
                Ok(Some(bucket)) => bucket,
                Ok(None) => break,
                Err(e) => {
                    error!(slot = self.slot, "{e}");
                    break;
                }
            };
            self.generate(bucket);
            if let Err(e) = self.complete() {
                error!(slot = self.slot, "{e}");
                break;
            }
        }

        debug!(slot = self.slot, "worker stopped");
    }

    /// Blocks until this worker's flag is raised and returns the bucket it owns for the round,
    /// or `None` on shutdown.
    fn wait_for_dispatch(&self) -> Result<Option<usize>> {
        let state = self.shared.state.lock().map_err(|_| Error::Poisoned)?;
        let state = self
            .shared
            .wake
            .wait_while(state, |state| {
                !state.dispatched[self.slot] && !state.shutdown
            })
            .map_err(|_| Error::Poisoned)?;
        if state.shutdown {
            return Ok(None);
        }
        let bucket = state.permutation.bucket_for(self.slot);
        trace!(slot = self.slot, round = state.round, bucket, "worker running");
        Ok(Some(bucket))
    }

    fn generate(&mut self, bucket: usize) {
        if self.mode == Mode::Deterministic {
            self.rng.seed_deterministic(self.slot as u64);
        }
        // Safety: the permutation is a bijection, so no other worker owns `bucket` this round,
        // and the coordinator does not read the buffer until our flag is cleared.
        let dest = unsafe { self.shared.buffer.bucket_mut(bucket) };
        self.rng.fill(dest);
    }

    fn complete(&self) -> Result<()> {
        let mut state = self.shared.state.lock().map_err(|_| Error::Poisoned)?;
        state.dispatched[self.slot] = false;
        state.pending -= 1;
        if state.pending == 0 {
            self.shared.done.notify_one();
        }
        Ok(())
    }
}
