use image::GrayImage;

use crate::algorithm::{Fingerprint, pack_bits, resize_gray};

/// Difference hash: sign of the horizontal gradient, row-major.
#[derive(Debug, Clone, Copy)]
pub struct DifferenceHash {
    hash_size: u32,
}

impl DifferenceHash {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl Fingerprint for DifferenceHash {
    fn hash_size(&self) -> u32 {
        self.hash_size
    }

    fn compute(&self, gray: &GrayImage) -> u64 {
        // One extra column so every row yields hash_size comparisons.
        let width = self.hash_size + 1;
        let small = resize_gray(gray, width, self.hash_size);
        let rows = small.as_raw().chunks_exact(width as usize);
        pack_bits(rows.flat_map(|row| row.windows(2).map(|w| w[0] > w[1])))
    }
}
