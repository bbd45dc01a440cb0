use image::GrayImage;

use crate::algorithm::{Fingerprint, pack_bits, resize_gray};

/// Average hash: each pixel of the downscaled image against the mean.
#[derive(Debug, Clone, Copy)]
pub struct AverageHash {
    hash_size: u32,
}

impl AverageHash {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl Fingerprint for AverageHash {
    fn hash_size(&self) -> u32 {
        self.hash_size
    }

    fn compute(&self, gray: &GrayImage) -> u64 {
        let small = resize_gray(gray, self.hash_size, self.hash_size);
        let pixels = small.as_raw();
        let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
        pack_bits(pixels.iter().map(|&p| p as f64 >= mean))
    }
}
