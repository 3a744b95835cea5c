use crate::error::{Error, Result};

/// Number of 64-bit words of state.
pub const STATE_WORDS: usize = 16;

/// Outputs discarded by [`Xorshift1024::warmup`].
pub const WARMUP_ROUNDS: usize = 1000;

/// The scrambling multiplier of xorshift1024*.
const MULTIPLIER: u64 = 1181783497276652981;

#[derive(Clone, Debug, PartialEq, Eq)]
/// A xorshift1024* generator, from "An experimental exploration of Marsaglia's xorshift
/// generators, scrambled" by Sebastiano Vigna (2014). The period is 2^1024 - 1.
///
/// The state must never be all zero. The constructors guarantee this; the output right after
/// seeding is biased, so call [`warmup`](Self::warmup) before using a freshly seeded generator
/// for anything but reproducibility checks.
pub struct Xorshift1024 {
    s: [u64; STATE_WORDS],
    /// Index of the word that will be read as `s0` on the next step.
    p: usize,
}

impl Xorshift1024 {
    /// Returns a generator seeded from the operating system's entropy source. The generator is
    /// not warmed up.
    ///
    /// # Example
    /// ```
    /// # use xsstream::Xorshift1024;
    /// let mut rng = Xorshift1024::from_entropy().unwrap();
    /// rng.warmup();
    /// println!("{}", rng.next_u64());
    /// ```
    pub fn from_entropy() -> Result<Self> {
        let mut rng = Self::deterministic(0);
        rng.seed_from_entropy()?;
        Ok(rng)
    }

    /// Returns a generator with every state word set to `value + 1`.
    ///
    /// # Example
    /// ```
    /// # use xsstream::Xorshift1024;
    /// let mut rng = Xorshift1024::deterministic(0);
    /// assert_eq!(rng.next_u64(), 0xC791_485A_5B50_0000);
    /// ```
    pub fn deterministic(value: u64) -> Self {
        let mut rng = Self {
            s: [0; STATE_WORDS],
            p: 0,
        };
        rng.seed_deterministic(value);
        rng
    }

    /// Builds a generator from raw state words. Returns `None` if every word is zero.
    pub fn from_state(s: [u64; STATE_WORDS]) -> Option<Self> {
        if s.iter().all(|&word| word == 0) {
            None
        } else {
            Some(Self { s, p: 0 })
        }
    }

    /// Refills the whole state from the operating system's entropy source and resets the
    /// rotation index.
    pub fn seed_from_entropy(&mut self) -> Result<()> {
        let mut bytes = [0_u8; STATE_WORDS * 8];
        getrandom::getrandom(&mut bytes).map_err(Error::EntropyUnavailable)?;
        let mut s = [0_u64; STATE_WORDS];
        for (word, chunk) in s.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut le = [0_u8; 8];
            le.copy_from_slice(chunk);
            *word = u64::from_le_bytes(le);
        }
        *self = Self::from_state(s).ok_or(Error::DegenerateEntropy)?;
        Ok(())
    }

    /// Sets every state word to `value + 1` and resets the rotation index. This is meant for
    /// reproducible runs, never for production output.
    ///
    /// `u64::MAX` would wrap to the forbidden all-zero state, so it seeds the same state as `0`.
    pub fn seed_deterministic(&mut self, value: u64) {
        let word = value.wrapping_add(1).max(1);
        self.s = [word; STATE_WORDS];
        self.p = 0;
    }

    /// Discards the first [`WARMUP_ROUNDS`] outputs.
    pub fn warmup(&mut self) {
        for _ in 0..WARMUP_ROUNDS {
            self.next_u64();
        }
    }

    /// Returns the next `u64` value from the pseudorandom sequence.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.s[self.p];
        self.p = (self.p + 1) & (STATE_WORDS - 1);
        let mut s1 = self.s[self.p];
        s1 ^= s1 << 31;
        s1 ^= s1 >> 11;
        let s0 = s0 ^ (s0 >> 30);
        self.s[self.p] = s0 ^ s1;
        self.s[self.p].wrapping_mul(MULTIPLIER)
    }

    /// Returns a value in `[0, n)` by rejection sampling.
    ///
    /// Draws are rejected while they exceed `u64::MAX - n`. That cutoff is not a multiple of `n`,
    /// so values are very slightly biased towards the low end when `n` does not divide the
    /// accepted range evenly.
    ///
    /// The same cutoff makes large `n` slow: a draw is accepted with probability about
    /// `1 - n / 2^64`, so as `n` approaches `u64::MAX` the loop almost never returns. With
    /// `n == u64::MAX` only a draw of exactly `0` is accepted.
    ///
    /// # Panics
    /// Panics if `n <= 1`.
    ///
    /// # Example
    /// ```
    /// # use xsstream::Xorshift1024;
    /// let mut rng = Xorshift1024::deterministic(42);
    /// rng.warmup();
    /// let value = rng.sample_below(10);
    /// assert!(value < 10);
    /// ```
    pub fn sample_below(&mut self, n: u64) -> u64 {
        assert!(n > 1, "sample_below needs n > 1, got {n}");
        let limit = u64::MAX - n;
        loop {
            let x = self.next_u64();
            if x <= limit {
                return x % n;
            }
        }
    }

    /// Shuffles the elements of the slice `data` using the Fisher-Yates algorithm.
    ///
    /// # Example
    /// ```
    /// # use xsstream::Xorshift1024;
    /// let mut rng = Xorshift1024::deterministic(42);
    /// let mut data = [1, 2, 3, 4, 5];
    /// rng.shuffle(&mut data);
    /// data.sort();
    /// assert_eq!(data, [1, 2, 3, 4, 5]);
    /// ```
    pub fn shuffle<T>(&mut self, data: &mut [T]) {
        let len = data.len();
        if len <= 1 {
            return;
        }
        for i in 0..len - 1 {
            let j = i + self.sample_below((len - i) as u64) as usize;
            data.swap(i, j);
        }
    }

    /// Overwrites `dest` with successive outputs.
    #[inline]
    pub fn fill(&mut self, dest: &mut [u64]) {
        for word in dest.iter_mut() {
            *word = self.next_u64();
        }
    }
}
