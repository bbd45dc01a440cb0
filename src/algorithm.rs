use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::ahash::AverageHash;
use crate::codec::check_hash_size;
use crate::dhash::DifferenceHash;
use crate::error::{HashError, Result};
use crate::phash::DctPhash;

/// Resampling filter used by every algorithm. Changing it changes every
/// fingerprint, so stored hashes are only comparable with the same filter.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// DCT-based, most robust to resize and recompression.
    #[default]
    PHash,
    /// Mean threshold, cheapest, brightness sensitive.
    AHash,
    /// Horizontal gradient sign.
    DHash,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [HashAlgorithm::PHash, HashAlgorithm::AHash, HashAlgorithm::DHash];

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::PHash => "phash",
            HashAlgorithm::AHash => "ahash",
            HashAlgorithm::DHash => "dhash",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "phash" => Ok(HashAlgorithm::PHash),
            "ahash" => Ok(HashAlgorithm::AHash),
            "dhash" => Ok(HashAlgorithm::DHash),
            other => Err(HashError::Configuration(format!(
                "unknown algorithm '{}'. Use one of: phash, ahash, dhash",
                other
            ))),
        }
    }
}

/// A fingerprint function over a grayscale pixel grid.
pub trait Fingerprint {
    fn hash_size(&self) -> u32;

    /// Returns `hash_size²` bits packed MSB-first.
    fn compute(&self, gray: &GrayImage) -> u64;
}

/// The three supported fingerprint functions, ready to run.
#[derive(Clone)]
pub enum HashKernel {
    PHash(DctPhash),
    AHash(AverageHash),
    DHash(DifferenceHash),
}

impl HashKernel {
    pub fn new(algorithm: HashAlgorithm, hash_size: u32) -> Result<Self> {
        check_hash_size(hash_size)?;
        Ok(match algorithm {
            HashAlgorithm::PHash => HashKernel::PHash(DctPhash::new(hash_size)),
            HashAlgorithm::AHash => HashKernel::AHash(AverageHash::new(hash_size)),
            HashAlgorithm::DHash => HashKernel::DHash(DifferenceHash::new(hash_size)),
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            HashKernel::PHash(_) => HashAlgorithm::PHash,
            HashKernel::AHash(_) => HashAlgorithm::AHash,
            HashKernel::DHash(_) => HashAlgorithm::DHash,
        }
    }

    pub fn hash_gray(&self, gray: &GrayImage) -> u64 {
        match self {
            HashKernel::PHash(k) => k.compute(gray),
            HashKernel::AHash(k) => k.compute(gray),
            HashKernel::DHash(k) => k.compute(gray),
        }
    }

    pub fn hash_image(&self, img: &DynamicImage) -> u64 {
        self.hash_gray(&img.to_luma8())
    }
}

impl fmt::Debug for HashKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HashKernel").field(&self.algorithm()).finish()
    }
}

/// One-shot hash of a decoded image.
pub fn compute_hash(img: &DynamicImage, algorithm: HashAlgorithm, hash_size: u32) -> Result<u64> {
    Ok(HashKernel::new(algorithm, hash_size)?.hash_image(img))
}

pub(crate) fn resize_gray(gray: &GrayImage, width: u32, height: u32) -> GrayImage {
    imageops::resize(gray, width, height, RESAMPLE_FILTER)
}

/// Packs bits into an integer, first bit most significant.
pub(crate) fn pack_bits(bits: impl IntoIterator<Item = bool>) -> u64 {
    bits.into_iter().fold(0u64, |acc, bit| (acc << 1) | bit as u64)
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
    pub const RED_VARIANT: Rgb<u8> = Rgb([0xff, 0x11, 0x11]);
    pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    /// A filled square in the upper-left part of a white canvas.
    pub fn square(size: u32, color: Rgb<u8>) -> RgbImage {
        square_between(size, color, size / 10, size * 6 / 10)
    }

    /// The same square reflected through the centre (lower-right).
    pub fn square_lower_right(size: u32, color: Rgb<u8>) -> RgbImage {
        square_between(size, color, size * 4 / 10, size * 9 / 10)
    }

    fn square_between(size: u32, color: Rgb<u8>, lo: u32, hi: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) { color } else { WHITE }
        })
    }

    pub fn gradient(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            let v = ((x * 255) / size.max(1)) as u8;
            Rgb([v, v.wrapping_add((y % 7) as u8), v])
        })
    }

    pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }
}
