//! The master buffer and the bucket permutation.
//!
//! The master buffer is one contiguous allocation of `threads * bufsize` words, split into
//! `threads` buckets of `bufsize` words each. Each round the coordinator publishes a
//! [`BucketPermutation`] that maps every worker slot to exactly one bucket, so the workers write
//! disjoint memory without locking the buffer itself.

use std::ptr::NonNull;

use crate::error::{Error, Result};
use crate::xorshift::Xorshift1024;

/// Word written over the buffer in deterministic mode so untouched regions stand out.
pub const CANARY: u64 = 0xF0F0_F0F0_F0F0_F0F0;

/// A fixed-size word buffer that many threads may write into at once, one bucket each.
///
/// The allocation is held as a raw base pointer taken once at construction. Every access
/// derives its slice from that pointer, so no call ever reborrows the whole buffer while a
/// worker is writing its bucket.
pub struct MasterBuffer {
    base: NonNull<u64>,
    buckets: usize,
    bucket_len: usize,
}

// Safety: the buffer owns its allocation and hands out slices only through `unsafe` methods
// whose contracts forbid overlapping access. All synchronization happens in the coordinator's
// round state.
unsafe impl Send for MasterBuffer {}
unsafe impl Sync for MasterBuffer {}

impl MasterBuffer {
    /// Allocates `buckets * bucket_len` zeroed words, reporting allocation failure instead of
    /// aborting.
    pub fn new(buckets: usize, bucket_len: usize) -> Result<Self> {
        let len = buckets
            .checked_mul(bucket_len)
            .ok_or(Error::Allocation { words: usize::MAX })?;
        let mut words = Vec::new();
        words
            .try_reserve_exact(len)
            .map_err(|_| Error::Allocation { words: len })?;
        words.resize(len, 0_u64);
        let raw = Box::into_raw(words.into_boxed_slice());
        // Safety: `Box::into_raw` never returns null.
        let base = unsafe { NonNull::new_unchecked(raw.cast::<u64>()) };
        Ok(Self {
            base,
            buckets,
            bucket_len,
        })
    }

    /// Total number of words.
    pub fn len(&self) -> usize {
        self.buckets * self.bucket_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// Words per bucket.
    pub fn bucket_len(&self) -> usize {
        self.bucket_len
    }

    /// Word offset of `bucket` from the start of the buffer.
    pub fn bucket_offset(&self, bucket: usize) -> usize {
        bucket * self.bucket_len
    }

    /// Returns the words of `bucket` for writing.
    ///
    /// # Panics
    /// Panics if `bucket` is out of range.
    ///
    /// # Safety
    /// The caller must be the only thread accessing this bucket until the returned slice is
    /// dropped, and nobody may hold a view of the whole buffer meanwhile. The coordinator
    /// guarantees this by giving each bucket to exactly one worker per round and reading the
    /// buffer only after every worker has reported completion.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bucket_mut(&self, bucket: usize) -> &mut [u64] {
        assert!(bucket < self.buckets, "bucket {bucket} out of range");
        let start = self.base.as_ptr().add(self.bucket_offset(bucket));
        std::slice::from_raw_parts_mut(start, self.bucket_len)
    }

    /// Returns every word of the buffer.
    ///
    /// # Safety
    /// No bucket may be borrowed through [`bucket_mut`](Self::bucket_mut) while the returned
    /// slice is alive.
    pub unsafe fn words(&self) -> &[u64] {
        std::slice::from_raw_parts(self.base.as_ptr(), self.len())
    }

    /// Returns the whole buffer as native-endian bytes.
    ///
    /// # Safety
    /// Same contract as [`words`](Self::words).
    pub unsafe fn as_bytes(&self) -> &[u8] {
        std::slice::from_raw_parts(
            self.base.as_ptr().cast::<u8>(),
            self.len() * std::mem::size_of::<u64>(),
        )
    }

    /// Overwrites every word with `word`.
    ///
    /// # Safety
    /// The caller must have exclusive access to the whole buffer.
    pub unsafe fn fill(&self, word: u64) {
        std::slice::from_raw_parts_mut(self.base.as_ptr(), self.len()).fill(word);
    }
}

impl Drop for MasterBuffer {
    fn drop(&mut self) {
        let raw = std::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.len());
        // Safety: `base` and `len` came from `Box::into_raw` in `new` and are freed only here.
        drop(unsafe { Box::from_raw(raw) });
    }
}

/// A mapping from worker slot to bucket index.
///
/// Every round the permutation must be a bijection on `[0, len)`, which is what makes the
/// concurrent bucket writes disjoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketPermutation {
    buckets: Vec<usize>,
}

impl BucketPermutation {
    /// The identity mapping: slot `i` writes bucket `i`.
    pub fn identity(len: usize) -> Self {
        Self {
            buckets: (0..len).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket assigned to `slot`.
    pub fn bucket_for(&self, slot: usize) -> usize {
        self.buckets[slot]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.buckets
    }

    /// Reorders the buckets uniformly at random.
    pub fn shuffle(&mut self, rng: &mut Xorshift1024) {
        rng.shuffle(&mut self.buckets);
    }

    /// Resets to the reversed identity, `[len - 1, ..., 1, 0]`. The result does not depend on
    /// the previous order, so every deterministic round gets the same layout.
    pub fn reverse(&mut self) {
        let len = self.buckets.len();
        for (slot, bucket) in self.buckets.iter_mut().enumerate() {
            *bucket = len - 1 - slot;
        }
    }

    /// Returns `true` if every bucket in `[0, len)` is assigned to exactly one slot.
    pub fn is_bijection(&self) -> bool {
        let mut seen = vec![false; self.buckets.len()];
        for &bucket in &self.buckets {
            match seen.get_mut(bucket) {
                Some(flag) if !*flag => *flag = true,
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn buffer_sizing() {
        let buffer = MasterBuffer::new(3, 2).unwrap();
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.buckets(), 3);
        assert_eq!(buffer.bucket_len(), 2);
        assert_eq!(buffer.bucket_offset(2), 4);
        assert_eq!(unsafe { buffer.as_bytes() }.len(), 48);
        assert!(unsafe { buffer.words() }.iter().all(|&word| word == 0));
    }

    #[test]
    fn oversized_buffer_fails_cleanly() {
        assert!(matches!(
            MasterBuffer::new(2, usize::MAX),
            Err(Error::Allocation { .. })
        ));
        assert!(matches!(
            MasterBuffer::new(1, usize::MAX / 8),
            Err(Error::Allocation { .. })
        ));
    }

    #[test]
    fn buckets_are_contiguous_segments() {
        let buffer = MasterBuffer::new(4, 3).unwrap();
        for bucket in 0..4 {
            unsafe { buffer.bucket_mut(bucket) }.fill(bucket as u64 + 1);
        }
        let words = unsafe { buffer.words() };
        assert_eq!(words, [1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    #[should_panic]
    fn bucket_out_of_range() {
        let buffer = MasterBuffer::new(2, 2).unwrap();
        unsafe { buffer.bucket_mut(2) };
    }

    #[test]
    fn concurrent_bucket_access() {
        // Two threads repeatedly borrow and write neighbouring buckets at the same time; each
        // borrow must cover its own bucket only.
        let buffer = MasterBuffer::new(2, 4).unwrap();
        std::thread::scope(|s| {
            for bucket in 0..2 {
                let buffer = &buffer;
                s.spawn(move || {
                    for i in 0..100 {
                        unsafe { buffer.bucket_mut(bucket) }.fill(i * 2 + bucket as u64);
                    }
                });
            }
        });
        let words = unsafe { buffer.words() };
        assert_eq!(words, [198, 198, 198, 198, 199, 199, 199, 199]);
    }

    #[test]
    fn empty_buffer_allocates_and_drops() {
        let buffer = MasterBuffer::new(0, 16).unwrap();
        assert!(buffer.is_empty());
        assert!(unsafe { buffer.as_bytes() }.is_empty());
    }

    #[test]
    fn reverse_is_stable_across_rounds() {
        let mut permutation = BucketPermutation::identity(3);
        permutation.reverse();
        assert_eq!(permutation.as_slice(), [2, 1, 0]);
        permutation.reverse();
        assert_eq!(permutation.as_slice(), [2, 1, 0]);
    }

    #[test]
    fn detects_non_bijections() {
        assert!(BucketPermutation::identity(0).is_bijection());
        assert!(BucketPermutation::identity(5).is_bijection());
        let repeated = BucketPermutation {
            buckets: vec![0, 1, 1],
        };
        assert!(!repeated.is_bijection());
        let out_of_range = BucketPermutation {
            buckets: vec![0, 3, 1],
        };
        assert!(!out_of_range.is_bijection());
    }

    #[test]
    fn disjoint_writes_from_threads() {
        // Eight threads write their own bucket of a canary-filled buffer; afterwards every
        // bucket must hold exactly its owner's tag and no canary may survive.
        const THREADS: usize = 8;
        const BUCKET_LEN: usize = 1024;

        let buffer = MasterBuffer::new(THREADS, BUCKET_LEN).unwrap();
        unsafe { buffer.fill(CANARY) };
        let mut permutation = BucketPermutation::identity(THREADS);
        permutation.shuffle(&mut Xorshift1024::deterministic(17));
        assert!(permutation.is_bijection());

        std::thread::scope(|s| {
            for slot in 0..THREADS {
                let bucket = permutation.bucket_for(slot);
                let buffer = &buffer;
                s.spawn(move || {
                    let words = unsafe { buffer.bucket_mut(bucket) };
                    assert!(words.iter().all(|&word| word == CANARY));
                    words.fill(slot as u64);
                });
            }
        });

        let words = unsafe { buffer.words() };
        for slot in 0..THREADS {
            let offset = buffer.bucket_offset(permutation.bucket_for(slot));
            assert!(words[offset..offset + BUCKET_LEN]
                .iter()
                .all(|&word| word == slot as u64));
        }
    }

    proptest! {
        #[test]
        fn shuffled_permutation_is_bijection(seed in any::<u64>(), len in 1_usize..=64, rounds in 1_usize..8) {
            let mut rng = Xorshift1024::deterministic(seed);
            let mut permutation = BucketPermutation::identity(len);
            for _ in 0..rounds {
                permutation.shuffle(&mut rng);
                prop_assert!(permutation.is_bijection());
                prop_assert_eq!(permutation.len(), len);
            }
        }
    }
}
