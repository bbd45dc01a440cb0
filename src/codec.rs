use crate::error::{HashError, Result};
use crate::types::ImageHash;

/// Largest grid size whose hash still fits into a u64 (8x8 = 64 bits).
pub const MAX_HASH_SIZE: u32 = 8;
pub const DEFAULT_HASH_BITS: u32 = 64;

/// Number of bits produced for a `hash_size x hash_size` grid.
#[inline]
pub fn bit_width(hash_size: u32) -> u32 {
    hash_size * hash_size
}

/// Number of hex digits needed to print `bits` bits.
#[inline]
pub fn hex_width(bits: u32) -> usize {
    bits.div_ceil(4) as usize
}

pub fn check_hash_size(hash_size: u32) -> Result<()> {
    if !(2..=MAX_HASH_SIZE).contains(&hash_size) {
        return Err(HashError::Configuration(format!(
            "hash_size must be 2-{}. Got {}.",
            MAX_HASH_SIZE, hash_size
        )));
    }
    Ok(())
}

#[inline]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Lowercase, zero-padded hex of a `bits`-wide hash.
pub fn hash_to_hex(value: u64, bits: u32) -> String {
    format!("{:0width$x}", value, width = hex_width(bits))
}

pub fn hex_to_hash(hex: &str) -> Result<u64> {
    let hex = hex.trim();
    if hex.is_empty() || hex.len() > 16 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(HashError::MalformedHash(format!("'{}' is not a 1-16 digit hex string", hex)));
    }
    u64::from_str_radix(hex, 16).map_err(|e| HashError::MalformedHash(format!("'{}': {}", hex, e)))
}

/// 1.0 for identical hashes, 0.0 when every bit differs.
pub fn similarity_from_distance(distance: u32, bits: u32) -> f64 {
    if bits == 0 {
        return 0.0;
    }
    1.0 - (distance.min(bits) as f64 / bits as f64)
}

/// Any of the accepted hash representations.
#[derive(Debug, Clone, Copy)]
pub enum HashRef<'a> {
    Value(u64),
    Hex(&'a str),
    Image(&'a ImageHash),
}

impl From<u64> for HashRef<'_> {
    fn from(v: u64) -> Self {
        HashRef::Value(v)
    }
}

impl<'a> From<&'a str> for HashRef<'a> {
    fn from(s: &'a str) -> Self {
        HashRef::Hex(s)
    }
}

impl<'a> From<&'a String> for HashRef<'a> {
    fn from(s: &'a String) -> Self {
        HashRef::Hex(s.as_str())
    }
}

impl<'a> From<&'a ImageHash> for HashRef<'a> {
    fn from(h: &'a ImageHash) -> Self {
        HashRef::Image(h)
    }
}

impl HashRef<'_> {
    /// Resolves to an integer, checking that the representation is `bits` wide.
    ///
    /// Hex inputs must carry exactly the expected number of digits; plain
    /// integers must not have bits set above the width.
    pub fn normalize(&self, bits: u32) -> Result<u64> {
        let expected_digits = hex_width(bits);
        let (value, digits) = match self {
            HashRef::Value(v) => (*v, None),
            HashRef::Hex(s) => (hex_to_hash(s)?, Some(s.trim().len())),
            HashRef::Image(h) => (h.hash_value, Some(h.hash_hex.len())),
        };

        if let Some(d) = digits
            && d != expected_digits
        {
            return Err(HashError::Configuration(format!(
                "incompatible hash width: {} hex digits, expected {} ({} bits)",
                d, expected_digits, bits
            )));
        }
        if bits < 64 && value >> bits != 0 {
            return Err(HashError::Configuration(format!(
                "hash {:x} does not fit into {} bits",
                value, bits
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::HashAlgorithm;
    use rand::prelude::*;

    #[test]
    fn test_hex_roundtrip() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let h: u64 = rng.random();
            let hex = hash_to_hex(h, 64);
            assert_eq!(hex.len(), 16);
            assert_eq!(hex_to_hash(&hex).unwrap(), h);
        }
        assert_eq!(hash_to_hex(0, 64), "0000000000000000");
        assert_eq!(hash_to_hex(u64::MAX, 64), "ffffffffffffffff");
        assert_eq!(hex_to_hash("ffffffffffffffff").unwrap(), u64::MAX);
    }

    #[test]
    fn test_hex_width_scales_with_hash_size() {
        assert_eq!(hash_to_hex(0xF, bit_width(4)), "000f");
        // 7x7 = 49 bits -> 13 digits
        assert_eq!(hash_to_hex(1, bit_width(7)).len(), 13);
    }

    #[test]
    fn test_malformed_hex() {
        assert!(matches!(hex_to_hash("xyz"), Err(HashError::MalformedHash(_))));
        assert!(matches!(hex_to_hash(""), Err(HashError::MalformedHash(_))));
        assert!(matches!(hex_to_hash("00000000000000000"), Err(HashError::MalformedHash(_))));
        // from_str_radix alone would take a leading sign
        assert!(matches!(hex_to_hash("+fff"), Err(HashError::MalformedHash(_))));
        assert!(matches!(hex_to_hash("-1"), Err(HashError::MalformedHash(_))));
        assert!(matches!(hex_to_hash("0x1f"), Err(HashError::MalformedHash(_))));
        assert_eq!(hex_to_hash(" 0aF ").unwrap(), 0xAF);
    }

    #[test]
    fn test_distance_symmetry_and_bounds() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let a: u64 = rng.random();
            let b: u64 = rng.random();
            let d = hamming_distance(a, b);
            assert_eq!(d, hamming_distance(b, a));
            assert!(d <= 64);
            assert_eq!(hamming_distance(a, a), 0);
        }
        assert_eq!(hamming_distance(0, u64::MAX), 64);
        assert_eq!(hamming_distance(0, 0xFFF), 12);
    }

    #[test]
    fn test_similarity_is_width_normalised() {
        assert_eq!(similarity_from_distance(0, 64), 1.0);
        assert_eq!(similarity_from_distance(64, 64), 0.0);
        assert_eq!(similarity_from_distance(16, 64), 0.75);
        assert_eq!(similarity_from_distance(4, 16), 0.75);
        assert!(similarity_from_distance(3, 64) > similarity_from_distance(4, 64));
    }

    #[test]
    fn test_normalize_checks_width() {
        assert_eq!(HashRef::from("00ff").normalize(16).unwrap(), 0xFF);
        assert!(matches!(
            HashRef::from("00ff").normalize(64),
            Err(HashError::Configuration(_))
        ));
        assert!(matches!(
            HashRef::from(0x1_0000u64).normalize(16),
            Err(HashError::Configuration(_))
        ));
        let img = ImageHash::new("a", 0xABCD, 64, HashAlgorithm::PHash);
        assert_eq!(HashRef::from(&img).normalize(64).unwrap(), 0xABCD);
        assert!(HashRef::from(&img).normalize(16).is_err());
    }
}
