use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::algorithm::HashAlgorithm;
use crate::codec::hash_to_hex;

/// Fingerprint of one image.
///
/// Equality and hashing look at `hash_value` only: two different sources
/// with the same fingerprint are the same `ImageHash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHash {
    pub source: String,
    pub hash_value: u64,
    pub hash_hex: String,
    pub algorithm: HashAlgorithm,
}

impl ImageHash {
    pub fn new(source: impl Into<String>, hash_value: u64, bits: u32, algorithm: HashAlgorithm) -> Self {
        Self {
            source: source.into(),
            hash_value,
            hash_hex: hash_to_hex(hash_value, bits),
            algorithm,
        }
    }

    /// Bit width implied by the hex representation.
    pub fn bits(&self) -> u32 {
        self.hash_hex.len() as u32 * 4
    }
}

impl PartialEq for ImageHash {
    fn eq(&self, other: &Self) -> bool {
        self.hash_value == other.hash_value
    }
}

impl Eq for ImageHash {}

impl Hash for ImageHash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_value.hash(state);
    }
}

/// A loaded hash that lies within the threshold of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub source: String,
    pub hash_hex: String,
    pub distance: u32,
    pub similarity: f64,
}

/// A cluster of at least two mutually reachable near-duplicates.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub images: Vec<ImageHash>,
    /// Hex of the first clustered member. Not a centroid.
    pub reference_hash: String,
    /// Largest pairwise distance between members. Members are linked through
    /// chains of close pairs, so this can exceed the clustering threshold.
    pub max_distance: u32,
    pub confidence: f64,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.images.iter().any(|h| h.source == source)
    }
}
