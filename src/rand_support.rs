use rand::{RngCore, SeedableRng};

use crate::xorshift::{Xorshift1024, STATE_WORDS};

impl RngCore for Xorshift1024 {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as _
    }

    fn next_u64(&mut self) -> u64 {
        Xorshift1024::next_u64(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut chunks = dest.chunks_exact_mut(8);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&Xorshift1024::next_u64(self).to_le_bytes());
        }
        let rest = chunks.into_remainder();
        if !rest.is_empty() {
            let bytes = Xorshift1024::next_u64(self).to_le_bytes();
            rest.copy_from_slice(&bytes[..rest.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// The full 1024-bit state as little-endian bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seed1024(pub [u8; STATE_WORDS * 8]);

impl Default for Seed1024 {
    fn default() -> Self {
        Self([0; STATE_WORDS * 8])
    }
}

impl AsMut<[u8]> for Seed1024 {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl SeedableRng for Xorshift1024 {
    type Seed = Seed1024;

    /// An all-zero seed is not a valid state; it falls back to the deterministic seed `0`.
    fn from_seed(seed: Self::Seed) -> Self {
        let mut s = [0_u64; STATE_WORDS];
        for (word, chunk) in s.iter_mut().zip(seed.0.chunks_exact(8)) {
            let mut le = [0_u8; 8];
            le.copy_from_slice(chunk);
            *word = u64::from_le_bytes(le);
        }
        Xorshift1024::from_state(s).unwrap_or_else(|| Xorshift1024::deterministic(0))
    }
}
