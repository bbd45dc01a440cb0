//! Perceptual hashing (pHash, aHash, dHash) and near-duplicate detection.
//!
//! ```no_run
//! use logodupes::{DetectorConfig, DuplicateDetector};
//!
//! # fn main() -> logodupes::Result<()> {
//! let detector = DuplicateDetector::new(DetectorConfig::default())?;
//! let groups = detector.find_duplicates(["a.png", "b.png", "c.png"], None)?;
//! for g in &groups {
//!     println!("{} images, max distance {}", g.len(), g.max_distance);
//! }
//! # Ok(())
//! # }
//! ```

pub mod ahash;
pub mod algorithm;
pub mod batch;
pub mod bucket;
pub mod codec;
pub mod config;
pub mod detector;
pub mod dhash;
pub mod error;
pub mod hasher;
pub mod phash;
pub mod source;
pub mod store;
pub mod types;
pub mod unionfind;

pub use algorithm::{HashAlgorithm, RESAMPLE_FILTER, compute_hash};
pub use batch::{BatchIter, BatchResult};
pub use codec::{HashRef, hamming_distance, hash_to_hex, hex_to_hash, similarity_from_distance};
pub use config::DetectorConfig;
pub use detector::DuplicateDetector;
pub use error::{HashError, Result};
pub use hasher::PerceptualHasher;
pub use source::ImageSource;
pub use types::{DuplicateGroup, DuplicateMatch, ImageHash};
