//     This program is free software: you can redistribute it and/or modify it under the terms of the
//     GNU General Public License as published by the Free Software Foundation, either version 3 of
//     the License, or (at your option) any later version.
//     This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
//     without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See
//     the GNU General Public License for more details.
//     You should have received a copy of the GNU General Public License along with this program.
//     If not, see <https://www.gnu.org/licenses/>.

use image::GrayImage;
use rustdct::{DctPlanner, TransformType2And3};
use std::sync::Arc;

use crate::algorithm::{Fingerprint, pack_bits, resize_gray};

/// The DCT runs on a grid this many times larger than the hash grid
/// (8x8 hash -> 32x32 DCT).
pub const HIGHFREQ_FACTOR: u32 = 4;

/// DCT-based perceptual hash.
#[derive(Clone)]
pub struct DctPhash {
    hash_size: usize,
    dct_size: usize,
    dct: Arc<dyn TransformType2And3<f64>>,
    scratch_len: usize,
}

impl DctPhash {
    /// Plans the `hash_size * HIGHFREQ_FACTOR` point DCT once; the plan is
    /// shared by clones.
    pub fn new(hash_size: u32) -> Self {
        let hash_size = hash_size as usize;
        let dct_size = hash_size * HIGHFREQ_FACTOR as usize;

        let mut planner = DctPlanner::new();
        let dct = planner.plan_dct2(dct_size);
        let scratch_len = std::cmp::max(dct.get_scratch_len(), dct_size);

        Self { hash_size, dct_size, dct, scratch_len }
    }

    /// 2-D DCT coefficients of the resized image, row-major.
    pub fn coefficients(&self, gray: &GrayImage) -> Vec<f64> {
        let n = self.dct_size as u32;
        let small = resize_gray(gray, n, n);
        let mut pixels: Vec<f64> = small.as_raw().iter().map(|&b| b as f64).collect();
        self.perform_dct_2d(&mut pixels);
        pixels
    }

    /// Orthonormal 2-D DCT-II in place (rows, then columns).
    fn perform_dct_2d(&self, buffer: &mut Vec<f64>) {
        let n = self.dct_size;
        let mut scratch = vec![0.0f64; self.scratch_len];

        for row in buffer.chunks_mut(n) {
            self.dct.process_dct2_with_scratch(row, &mut scratch);
            orthonormalize(row);
        }

        let mut transposed = vec![0.0f64; n * n];
        transpose::transpose(buffer, &mut transposed, n, n);

        for row in transposed.chunks_mut(n) {
            self.dct.process_dct2_with_scratch(row, &mut scratch);
            orthonormalize(row);
        }

        transpose::transpose(&transposed, buffer, n, n);
    }

    /// Top-left `hash_size x hash_size` block: the lowest frequencies.
    fn crop_low(&self, full: &[f64]) -> Vec<f64> {
        let mut crop = Vec::with_capacity(self.hash_size * self.hash_size);
        for y in 0..self.hash_size {
            let start = y * self.dct_size;
            crop.extend_from_slice(&full[start..start + self.hash_size]);
        }
        crop
    }
}

impl Fingerprint for DctPhash {
    fn hash_size(&self) -> u32 {
        self.hash_size as u32
    }

    fn compute(&self, gray: &GrayImage) -> u64 {
        let full = self.coefficients(gray);
        let low_freqs = self.crop_low(&full);

        // DC (index 0) is flat luminance; it is hashed but kept out of the median.
        let threshold = median(&low_freqs[1..]);

        pack_bits(low_freqs.iter().map(|&c| c > threshold))
    }
}

/// Scales an unnormalized DCT-II row so the transform is orthonormal.
fn orthonormalize(row: &mut [f64]) {
    let n = row.len() as f64;
    let dc = (1.0 / n).sqrt();
    let ac = (2.0 / n).sqrt();
    for (k, v) in row.iter_mut().enumerate() {
        *v *= if k == 0 { dc } else { ac };
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
