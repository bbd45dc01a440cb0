use std::time::Instant;

use image::DynamicImage;
use log::debug;

use crate::algorithm::{HashAlgorithm, HashKernel};
use crate::batch::{BatchIter, BatchResult, build_pool, spawn_batch};
use crate::codec::{HashRef, bit_width, hamming_distance, hash_to_hex, similarity_from_distance};
use crate::config::DetectorConfig;
use crate::error::{HashError, Result};
use crate::source::ImageSource;
use crate::types::ImageHash;

/// Hashes images with one fixed algorithm and grid size.
///
/// Cheap to clone; clones share the planned DCT.
#[derive(Debug, Clone)]
pub struct PerceptualHasher {
    kernel: HashKernel,
    hash_size: u32,
}

impl PerceptualHasher {
    pub fn new(algorithm: HashAlgorithm, hash_size: u32) -> Result<Self> {
        Ok(Self { kernel: HashKernel::new(algorithm, hash_size)?, hash_size })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        Self::new(config.algorithm, config.hash_size)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.kernel.algorithm()
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    pub fn bit_width(&self) -> u32 {
        bit_width(self.hash_size)
    }

    /// Hashes an image that is already decoded.
    pub fn hash_pixels(&self, id: impl Into<String>, img: &DynamicImage) -> ImageHash {
        let value = self.kernel.hash_image(img);
        ImageHash::new(id, value, self.bit_width(), self.algorithm())
    }

    pub fn hash_image(&self, source: impl Into<ImageSource>) -> Result<ImageHash> {
        let source = source.into();
        let img = source.decode()?;
        Ok(self.hash_pixels(source.identifier(), &img))
    }

    /// Starts hashing every source on a pool of `workers` threads and returns
    /// the results lazily, in the order workers finish them.
    pub fn hash_batch_iter<S>(&self, sources: impl IntoIterator<Item = S>, workers: usize) -> Result<BatchIter>
    where
        S: Into<ImageSource>,
    {
        let items: Vec<(String, ImageSource)> = sources
            .into_iter()
            .map(|s| {
                let src: ImageSource = s.into();
                (src.identifier(), src)
            })
            .collect();

        let pool = build_pool(workers)?;
        let kernel = self.kernel.clone();
        let bits = self.bit_width();

        Ok(spawn_batch(pool, items, move |index, id, src: ImageSource| {
            let start = Instant::now();
            match src.decode() {
                Ok(img) => {
                    let value = kernel.hash_image(&img);
                    BatchResult::hashed(index, id, value, hash_to_hex(value, bits), start.elapsed())
                }
                Err(e) => BatchResult::failed(index, id, e.to_string(), start.elapsed()),
            }
        }))
    }

    /// Hashes every source in parallel. Always returns one result per input;
    /// inputs that fail to decode come back with `success == false`.
    ///
    /// `on_progress(done, total)` fires after every `chunk_size` completions
    /// and once at the end.
    pub fn hash_batch<S>(
        &self,
        sources: impl IntoIterator<Item = S>,
        workers: usize,
        chunk_size: usize,
        on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<Vec<BatchResult>>
    where
        S: Into<ImageSource>,
    {
        if chunk_size == 0 {
            return Err(HashError::Configuration("chunk_size must be at least 1".to_string()));
        }

        let start = Instant::now();
        let iter = self.hash_batch_iter(sources, workers)?;
        let total = iter.total();
        let results = iter.collect_with_progress(chunk_size, on_progress);

        let failed = results.iter().filter(|r| !r.success).count();
        debug!(
            "Hashed {} images ({} failed) with {} in {:.2?}",
            total,
            failed,
            self.algorithm(),
            start.elapsed()
        );
        Ok(results)
    }

    /// Bit distance between two hashes given in any accepted form.
    pub fn hamming_distance<'a, 'b>(&self, a: impl Into<HashRef<'a>>, b: impl Into<HashRef<'b>>) -> Result<u32> {
        let bits = self.bit_width();
        let a = a.into().normalize(bits)?;
        let b = b.into().normalize(bits)?;
        Ok(hamming_distance(a, b))
    }

    pub fn similarity<'a, 'b>(&self, a: impl Into<HashRef<'a>>, b: impl Into<HashRef<'b>>) -> Result<f64> {
        let d = self.hamming_distance(a, b)?;
        Ok(similarity_from_distance(d, self.bit_width()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::test_images::*;

    fn red_source(id: &str) -> ImageSource {
        ImageSource::memory(id, png_bytes(&square(100, RED)))
    }

    #[test]
    fn test_hash_image_matches_hash_pixels() {
        let hasher = PerceptualHasher::new(HashAlgorithm::PHash, 8).unwrap();
        let from_bytes = hasher.hash_image(red_source("red")).unwrap();
        let from_pixels = hasher.hash_pixels("red", &DynamicImage::ImageRgb8(square(100, RED)));
        assert_eq!(from_bytes, from_pixels);
        assert_eq!(from_bytes.source, "red");
        assert_eq!(from_bytes.hash_hex.len(), 16);
        assert_eq!(from_bytes.algorithm, HashAlgorithm::PHash);
    }

    #[test]
    fn test_hash_image_decode_error() {
        let hasher = PerceptualHasher::new(HashAlgorithm::AHash, 8).unwrap();
        let err = hasher.hash_image(ImageSource::memory("bad", vec![0u8; 32])).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_batch_partial_failure() {
        let hasher = PerceptualHasher::new(HashAlgorithm::PHash, 8).unwrap();
        let mut sources: Vec<ImageSource> = (0..6).map(|i| red_source(&format!("red{}", i))).collect();
        sources.insert(2, ImageSource::memory("corrupt", b"GIF89a-but-not-really".to_vec()));

        let results = hasher.hash_batch(sources, 3, 2, None).unwrap();
        assert_eq!(results.len(), 7);

        let failures: Vec<&BatchResult> = results.iter().filter(|r| !r.success).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, "corrupt");
        assert_eq!(failures[0].index, 2);
        assert!(failures[0].error.is_some());
        assert!(failures[0].hash_value.is_none());

        let expected = hasher.hash_image(red_source("x")).unwrap().hash_value;
        for r in results.iter().filter(|r| r.success) {
            assert_eq!(r.hash_value, Some(expected));
            assert_eq!(r.hash_hex.as_deref(), Some(hash_to_hex(expected, 64).as_str()));
        }
    }

    #[test]
    fn test_batch_progress_reaches_total() {
        let hasher = PerceptualHasher::new(HashAlgorithm::DHash, 8).unwrap();
        let sources: Vec<ImageSource> = (0..5).map(|i| red_source(&format!("r{}", i))).collect();
        let mut last = (0, 0);
        let mut calls = 0;
        let mut cb = |done: usize, total: usize| {
            calls += 1;
            last = (done, total);
        };
        let results = hasher.hash_batch(sources, 2, 2, Some(&mut cb)).unwrap();
        assert_eq!(results.len(), 5);
        // 2, 4, final
        assert_eq!(calls, 3);
        assert_eq!(last, (5, 5));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let hasher = PerceptualHasher::new(HashAlgorithm::PHash, 8).unwrap();
        let err = hasher.hash_batch(vec![red_source("a")], 1, 0, None).unwrap_err();
        assert!(matches!(err, HashError::Configuration(_)));
    }

    #[test]
    fn test_lazy_batch_yields_every_input() {
        let hasher = PerceptualHasher::new(HashAlgorithm::AHash, 8).unwrap();
        let sources: Vec<ImageSource> = (0..4).map(|i| red_source(&format!("r{}", i))).collect();
        let mut indices: Vec<usize> = hasher.hash_batch_iter(sources, 2).unwrap().map(|r| r.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_distance_accepts_any_form() {
        let hasher = PerceptualHasher::new(HashAlgorithm::PHash, 8).unwrap();
        let h = hasher.hash_image(red_source("red")).unwrap();

        assert_eq!(hasher.hamming_distance(&h, &h).unwrap(), 0);
        assert_eq!(hasher.similarity(&h, h.hash_value).unwrap(), 1.0);
        assert_eq!(hasher.hamming_distance(&h.hash_hex, h.hash_value ^ 0b111).unwrap(), 3);
        assert_eq!(hasher.hamming_distance("0000000000000000", "ffffffffffffffff").unwrap(), 64);
    }

    #[test]
    fn test_incompatible_widths_are_configuration_errors() {
        let hasher = PerceptualHasher::new(HashAlgorithm::PHash, 8).unwrap();
        let small = PerceptualHasher::new(HashAlgorithm::PHash, 4).unwrap();
        let h16 = small.hash_image(red_source("red")).unwrap();
        assert_eq!(h16.hash_hex.len(), 4);

        let err = hasher.hamming_distance(&h16, 0u64).unwrap_err();
        assert!(matches!(err, HashError::Configuration(_)));
        assert!(small.hamming_distance(&h16, &h16).is_ok());
        assert_eq!(small.similarity(&h16, h16.hash_value ^ 0xF).unwrap(), 0.75);
    }
}
