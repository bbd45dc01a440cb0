use std::collections::HashMap;

use crate::error::{HashError, Result};

pub const DEFAULT_BUCKET_BITS: u32 = 8;

/// Thresholds at or below this only look in the query's own bucket.
pub const NARROW_THRESHOLD: u32 = 8;

/// Coarse partition of a hash set by the top `bucket_bits` bits.
///
/// Buckets hold positions into the caller's hash list, in load order. The
/// index is rebuilt from scratch on every load, never patched.
#[derive(Debug, Clone, Default)]
pub struct BucketIndex {
    hash_bits: u32,
    bucket_bits: u32,
    buckets: HashMap<u64, Vec<usize>>,
}

impl BucketIndex {
    pub fn build(values: impl IntoIterator<Item = u64>, hash_bits: u32, bucket_bits: u32) -> Result<Self> {
        if bucket_bits == 0 || bucket_bits > hash_bits {
            return Err(HashError::Configuration(format!(
                "bucket_bits must be 1-{} for {}-bit hashes. Got {}.",
                hash_bits, hash_bits, bucket_bits
            )));
        }

        let mut index = Self { hash_bits, bucket_bits, buckets: HashMap::new() };
        for (pos, value) in values.into_iter().enumerate() {
            let key = index.key(value);
            index.buckets.entry(key).or_default().push(pos);
        }
        Ok(index)
    }

    #[inline]
    pub fn key(&self, value: u64) -> u64 {
        value >> (self.hash_bits - self.bucket_bits)
    }

    pub fn bucket_count(&self) -> usize {
        1usize << self.bucket_bits.min(usize::BITS - 1)
    }

    /// Keys to scan for a query: its own bucket, plus the numerically
    /// adjacent ones when `threshold` is above [`NARROW_THRESHOLD`].
    ///
    /// This is a recall/speed tradeoff, not an exact bound: a hash that
    /// differs in a high bit lands in a distant bucket and is never seen.
    pub fn candidate_keys(&self, value: u64, threshold: u32) -> Vec<u64> {
        let primary = self.key(value);
        let mut keys = vec![primary];
        if threshold <= NARROW_THRESHOLD {
            return keys;
        }

        if let Some(below) = primary.checked_sub(1) {
            keys.push(below);
        }
        let above = primary + 1;
        if self.bucket_bits >= 64 || above < (1u64 << self.bucket_bits) {
            keys.push(above);
        }
        keys
    }

    /// Positions in the candidate buckets, bucket by bucket.
    pub fn candidates(&self, value: u64, threshold: u32) -> Vec<usize> {
        self.candidate_keys(value, threshold)
            .iter()
            .filter_map(|k| self.buckets.get(k))
            .flatten()
            .copied()
            .collect()
    }

    pub fn non_empty_buckets(&self) -> usize {
        self.buckets.len()
    }
}
