//! Near-duplicate lookup against a loaded corpus, and whole-corpus clustering.

use std::time::Instant;

use log::{debug, info, warn};

use crate::batch::BatchResult;
use crate::bucket::BucketIndex;
use crate::codec::{HashRef, hamming_distance, similarity_from_distance};
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::hasher::PerceptualHasher;
use crate::source::ImageSource;
use crate::types::{DuplicateGroup, DuplicateMatch, ImageHash};
use crate::unionfind::UnionFind;

/// Holds a corpus of known hashes and answers "is this a near duplicate".
///
/// `load_hashes` replaces the corpus wholesale and needs `&mut self`; every
/// query takes `&self`, so readers and the reloading writer never overlap.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    config: DetectorConfig,
    hasher: PerceptualHasher,
    loaded: Vec<ImageHash>,
    index: BucketIndex,
}

impl DuplicateDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let hasher = PerceptualHasher::from_config(&config)?;
        let index = BucketIndex::build(std::iter::empty(), config.bit_width(), config.effective_bucket_bits())?;
        Ok(Self { config, hasher, loaded: Vec::new(), index })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn hasher(&self) -> &PerceptualHasher {
        &self.hasher
    }

    pub fn threshold(&self) -> u32 {
        self.config.threshold
    }

    pub fn loaded(&self) -> &[ImageHash] {
        &self.loaded
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Replaces the corpus and rebuilds the bucket index.
    ///
    /// Every hash must have this detector's bit width; otherwise nothing is
    /// replaced and a configuration error is returned. Hashes tagged with a
    /// different algorithm are accepted with a warning.
    pub fn load_hashes(&mut self, hashes: impl IntoIterator<Item = ImageHash>) -> Result<()> {
        let hashes: Vec<ImageHash> = hashes.into_iter().collect();
        let bits = self.config.bit_width();

        let mut foreign = 0usize;
        for h in &hashes {
            HashRef::Image(h).normalize(bits)?;
            if h.algorithm != self.config.algorithm {
                foreign += 1;
            }
        }
        if foreign > 0 {
            warn!(
                "{} of {} loaded hashes were made with another algorithm than {}; their distances are meaningless",
                foreign,
                hashes.len(),
                self.config.algorithm
            );
        }

        let index = BucketIndex::build(hashes.iter().map(|h| h.hash_value), bits, self.config.effective_bucket_bits())?;
        self.loaded = hashes;
        self.index = index;
        info!(
            "Loaded {} hashes into detector ({} buckets in use)",
            self.loaded.len(),
            self.index.non_empty_buckets()
        );
        Ok(())
    }

    /// Loaded hashes within `threshold` (default: the configured one) of the
    /// query image, closest first.
    ///
    /// An empty corpus is not an error: it logs a warning and matches nothing.
    pub fn find_matches(&self, query: impl Into<ImageSource>, threshold: Option<u32>) -> Result<Vec<DuplicateMatch>> {
        if self.loaded.is_empty() {
            warn!("No hashes loaded. Call load_hashes() first.");
            return Ok(Vec::new());
        }
        let query = self.hasher.hash_image(query)?;
        self.find_matches_for_hash(&query, threshold)
    }

    /// Same as [`find_matches`](Self::find_matches) for an already computed hash.
    ///
    /// Above `bucket_min_corpus` loaded hashes only the query's bucket (and its
    /// neighbours, for configured thresholds above 8) is scanned, so a match
    /// whose top bits differ can be missed. The bucket choice follows the
    /// configured threshold; `threshold` here only moves the distance cut-off.
    pub fn find_matches_for_hash(&self, query: &ImageHash, threshold: Option<u32>) -> Result<Vec<DuplicateMatch>> {
        if self.loaded.is_empty() {
            warn!("No hashes loaded. Call load_hashes() first.");
            return Ok(Vec::new());
        }
        let value = HashRef::Image(query).normalize(self.config.bit_width())?;
        let cutoff = threshold.unwrap_or(self.config.threshold);

        if self.loaded.len() > self.config.bucket_min_corpus {
            let candidates = self.index.candidates(value, self.config.threshold);
            debug!(
                "Bucket pre-filter kept {} of {} candidates",
                candidates.len(),
                self.loaded.len()
            );
            Ok(self.matches_among(value, candidates, cutoff))
        } else {
            Ok(self.matches_among(value, 0..self.loaded.len(), cutoff))
        }
    }

    /// Exhaustive scan of the whole corpus, ignoring the bucket index.
    pub fn linear_matches(&self, query: &ImageHash, threshold: u32) -> Result<Vec<DuplicateMatch>> {
        let value = HashRef::Image(query).normalize(self.config.bit_width())?;
        Ok(self.matches_among(value, 0..self.loaded.len(), threshold))
    }

    fn matches_among(&self, value: u64, positions: impl IntoIterator<Item = usize>, cutoff: u32) -> Vec<DuplicateMatch> {
        let bits = self.config.bit_width();
        let mut matches: Vec<DuplicateMatch> = positions
            .into_iter()
            .filter_map(|pos| {
                let h = &self.loaded[pos];
                let distance = hamming_distance(value, h.hash_value);
                (distance <= cutoff).then(|| DuplicateMatch {
                    source: h.source.clone(),
                    hash_hex: h.hash_hex.clone(),
                    distance,
                    similarity: similarity_from_distance(distance, bits),
                })
            })
            .collect();
        // Stable: equal distances keep candidate order
        matches.sort_by_key(|m| m.distance);
        matches
    }

    pub fn is_duplicate(&self, query: impl Into<ImageSource>, threshold: Option<u32>) -> Result<bool> {
        Ok(!self.find_matches(query, threshold)?.is_empty())
    }

    /// Hashes every source and clusters the successes at the configured
    /// threshold. Sources that fail to decode are skipped.
    ///
    /// Tightest groups (smallest max distance) come first.
    pub fn find_duplicates<S>(
        &self,
        sources: impl IntoIterator<Item = S>,
        on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<Vec<DuplicateGroup>>
    where
        S: Into<ImageSource>,
    {
        let hashes = self.hash_all(sources, on_progress)?;
        Ok(self.cluster_hashes(&hashes, self.config.threshold))
    }

    /// [`find_duplicates`](Self::find_duplicates) with an optional one-off
    /// threshold, dropping groups smaller than `min_cluster_size`.
    pub fn cluster_similar<S>(
        &self,
        sources: impl IntoIterator<Item = S>,
        threshold: Option<u32>,
        min_cluster_size: usize,
    ) -> Result<Vec<DuplicateGroup>>
    where
        S: Into<ImageSource>,
    {
        let hashes = self.hash_all(sources, None)?;
        let mut groups = self.cluster_hashes(&hashes, threshold.unwrap_or(self.config.threshold));
        groups.retain(|g| g.len() >= min_cluster_size);
        Ok(groups)
    }

    /// Batch-hashes the sources and returns the successes in input order.
    fn hash_all<S>(
        &self,
        sources: impl IntoIterator<Item = S>,
        on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<Vec<ImageHash>>
    where
        S: Into<ImageSource>,
    {
        info!("Hashing images...");
        let mut results = self
            .hasher
            .hash_batch(sources, self.config.workers, self.config.chunk_size, on_progress)?;
        results.sort_by_key(|r| r.index);

        let bits = self.hasher.bit_width();
        let algorithm = self.hasher.algorithm();
        Ok(results
            .into_iter()
            .filter_map(|r: BatchResult| {
                let value = r.hash_value.filter(|_| r.success)?;
                Some(ImageHash::new(r.source, value, bits, algorithm))
            })
            .collect())
    }

    /// Single-linkage clustering: every pair within `threshold` is joined,
    /// transitively. Brute force over all pairs.
    ///
    /// A group's `max_distance` is not bounded by `threshold`: `a-b` and `b-c`
    /// may each be close while `a-c` is not.
    pub fn cluster_hashes(&self, hashes: &[ImageHash], threshold: u32) -> Vec<DuplicateGroup> {
        let n = hashes.len();
        if n < 2 {
            return Vec::new();
        }

        info!("Finding duplicates among {} images...", n);
        let start = Instant::now();
        let mut uf = UnionFind::new(n);
        let mut comparisons = 0u64;
        for i in 0..n {
            for j in (i + 1)..n {
                if hamming_distance(hashes[i].hash_value, hashes[j].hash_value) <= threshold {
                    uf.union(i, j);
                }
                comparisons += 1;
            }
        }
        info!("Performed {} comparisons in {:.2?}", comparisons, start.elapsed());

        let bits = self.config.bit_width();
        let mut groups: Vec<DuplicateGroup> = uf
            .groups()
            .into_iter()
            .filter(|members| members.len() >= 2)
            .map(|members| {
                let images: Vec<ImageHash> = members.iter().map(|&i| hashes[i].clone()).collect();
                let max_distance = max_pairwise_distance(&images);
                DuplicateGroup {
                    reference_hash: images[0].hash_hex.clone(),
                    images,
                    max_distance,
                    confidence: similarity_from_distance(max_distance, bits),
                }
            })
            .collect();

        // Ascending max distance == descending confidence
        groups.sort_by_key(|g| g.max_distance);
        info!("Found {} duplicate groups", groups.len());
        groups
    }
}

fn max_pairwise_distance(images: &[ImageHash]) -> u32 {
    let mut max = 0;
    for (i, a) in images.iter().enumerate() {
        for b in &images[i + 1..] {
            max = max.max(hamming_distance(a.hash_value, b.hash_value));
        }
    }
    max
}
