use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::HashAlgorithm;
use crate::bucket::DEFAULT_BUCKET_BITS;
use crate::codec::{bit_width, check_hash_size};
use crate::error::{HashError, Result};

pub const CONFIG_FILE_NAME: &str = "logodupes.toml";

/// Loaded sets larger than this are searched through the bucket index.
pub const DEFAULT_BUCKET_MIN_CORPUS: usize = 1000;

/// Settings shared by the hasher and the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub algorithm: HashAlgorithm,
    pub hash_size: u32,
    /// Largest Hamming distance still counted as a duplicate.
    pub threshold: u32,
    /// 0 = one per CPU.
    pub workers: usize,
    /// Progress is reported every `chunk_size` completed images.
    pub chunk_size: usize,
    /// Prefix width of the bucket index. Unset means 8, or the whole hash
    /// when it is narrower than that.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_bits: Option<u32>,
    pub bucket_min_corpus: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::PHash,
            hash_size: 8,
            threshold: 10,
            workers: 4,
            chunk_size: 100,
            bucket_bits: None,
            bucket_min_corpus: DEFAULT_BUCKET_MIN_CORPUS,
        }
    }
}

impl DetectorConfig {
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_hash_size(mut self, hash_size: u32) -> Self {
        self.hash_size = hash_size;
        self
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_bucket_bits(mut self, bucket_bits: u32) -> Self {
        self.bucket_bits = Some(bucket_bits);
        self
    }

    pub fn with_bucket_min_corpus(mut self, bucket_min_corpus: usize) -> Self {
        self.bucket_min_corpus = bucket_min_corpus;
        self
    }

    pub fn bit_width(&self) -> u32 {
        bit_width(self.hash_size)
    }

    pub fn effective_bucket_bits(&self) -> u32 {
        self.bucket_bits.unwrap_or_else(|| DEFAULT_BUCKET_BITS.min(self.bit_width()))
    }

    pub fn validate(&self) -> Result<()> {
        check_hash_size(self.hash_size)?;
        if self.chunk_size == 0 {
            return Err(HashError::Configuration("chunk_size must be at least 1".to_string()));
        }
        let bits = self.bit_width();
        if let Some(bucket_bits) = self.bucket_bits
            && (bucket_bits == 0 || bucket_bits > bits)
        {
            return Err(HashError::Configuration(format!(
                "bucket_bits must be 1-{} for hash_size {}. Got {}.",
                bits, self.hash_size, bucket_bits
            )));
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: DetectorConfig = toml::from_str(content).map_err(|e| HashError::Serialization(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Explicit path if given, else `logodupes.toml` in the user config dir
    /// when it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).map_err(|e| HashError::Serialization(e.to_string()))?;
        fs::write(path, toml_str)?;
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = DetectorConfig::default();
        assert_eq!(cfg.algorithm, HashAlgorithm::PHash);
        assert_eq!(cfg.hash_size, 8);
        assert_eq!(cfg.threshold, 10);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.chunk_size, 100);
        assert_eq!(cfg.bucket_bits, None);
        assert_eq!(cfg.effective_bucket_bits(), 8);
        assert_eq!(cfg.bucket_min_corpus, 1000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let cfg = DetectorConfig::from_toml_str("algorithm = \"dhash\"\nthreshold = 6\n").unwrap();
        assert_eq!(cfg.algorithm, HashAlgorithm::DHash);
        assert_eq!(cfg.threshold, 6);
        assert_eq!(cfg.hash_size, 8);
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            DetectorConfig::from_toml_str("algorithm = \"whash\""),
            Err(HashError::Serialization(_))
        ));
        assert!(matches!(
            DetectorConfig::from_toml_str("hash_size = 16"),
            Err(HashError::Configuration(_))
        ));
        assert!(DetectorConfig::default().with_chunk_size(0).validate().is_err());
        // 4x4 hashes only have 16 bits to bucket on
        assert!(DetectorConfig::default().with_hash_size(4).with_bucket_bits(17).validate().is_err());
        assert!(DetectorConfig::default().with_hash_size(4).validate().is_ok());
    }

    #[test]
    fn test_default_bucket_bits_follow_hash_width() {
        // 2x2 hashes have 4 bits, fewer than the default prefix
        let tiny = DetectorConfig::default().with_hash_size(2);
        assert!(tiny.validate().is_ok());
        assert_eq!(tiny.effective_bucket_bits(), 4);
        assert_eq!(DetectorConfig::default().with_hash_size(3).effective_bucket_bits(), 8);

        // An explicit value is taken as given
        assert!(tiny.clone().with_bucket_bits(5).validate().is_err());
        assert_eq!(tiny.with_bucket_bits(3).effective_bucket_bits(), 3);

        let cfg = DetectorConfig::from_toml_str("hash_size = 2\nbucket_bits = 4\n").unwrap();
        assert_eq!(cfg.bucket_bits, Some(4));
        assert!(DetectorConfig::from_toml_str("hash_size = 2\nbucket_bits = 8\n").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let cfg = DetectorConfig::default()
            .with_algorithm(HashAlgorithm::AHash)
            .with_workers(0)
            .with_threshold(3);
        cfg.save(&path).unwrap();

        let loaded = DetectorConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_missing_explicit_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = DetectorConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, HashError::Io(_)));
    }
}
