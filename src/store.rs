//! Hash index persisted as JSON lines, one record per image:
//!
//! ```text
//! {"hash":"c3c3e1e1f0f0f8f8","algorithm":"phash","source":"logos/acme.png"}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::algorithm::HashAlgorithm;
use crate::codec::hex_to_hash;
use crate::error::{HashError, Result};
use crate::types::ImageHash;

#[derive(Debug, Serialize, Deserialize)]
struct HashRecord {
    hash: String,
    algorithm: HashAlgorithm,
    source: String,
}

pub fn write_hashes<'a, W: Write>(out: W, hashes: impl IntoIterator<Item = &'a ImageHash>) -> Result<usize> {
    let mut out = BufWriter::new(out);
    let mut count = 0;
    for h in hashes {
        let record = HashRecord {
            hash: h.hash_hex.clone(),
            algorithm: h.algorithm,
            source: h.source.clone(),
        };
        let line = serde_json::to_string(&record).map_err(|e| HashError::Serialization(e.to_string()))?;
        writeln!(out, "{}", line)?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

/// Blank lines are skipped; any other unreadable line fails the whole read.
pub fn read_hashes<R: Read>(input: R) -> Result<Vec<ImageHash>> {
    let reader = BufReader::new(input);
    let mut hashes = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: HashRecord = serde_json::from_str(&line)
            .map_err(|e| HashError::Serialization(format!("line {}: {}", i + 1, e)))?;
        let hash_value = hex_to_hash(&record.hash)
            .map_err(|e| HashError::Serialization(format!("line {}: {}", i + 1, e)))?;
        hashes.push(ImageHash {
            source: record.source,
            hash_value,
            hash_hex: record.hash.trim().to_lowercase(),
            algorithm: record.algorithm,
        });
    }
    Ok(hashes)
}

pub fn save(path: &Path, hashes: &[ImageHash]) -> Result<()> {
    let count = write_hashes(File::create(path)?, hashes)?;
    info!("Wrote {} hashes to {}", count, path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<ImageHash>> {
    let hashes = read_hashes(File::open(path)?)?;
    info!("Read {} hashes from {}", hashes.len(), path.display());
    Ok(hashes)
}
