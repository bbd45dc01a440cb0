use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use walkdir::WalkDir;

use logodupes::codec::{MAX_HASH_SIZE, bit_width};
use logodupes::source::is_image_ext;
use logodupes::{
    BatchIter, BatchResult, DetectorConfig, DuplicateDetector, HashAlgorithm, ImageHash, PerceptualHasher, store,
};

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about = "Perceptual hashing and near-duplicate detection for logo images.", long_about = None)]
struct Cli {
    /// Config file (default: logodupes.toml in the user config dir, if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// phash, ahash or dhash
    #[arg(long, global = true)]
    algorithm: Option<String>,

    /// Hash grid size; hashes are hash_size² bits
    #[arg(long, global = true)]
    hash_size: Option<u32>,

    /// Worker threads, 0 = one per CPU
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the hash of every image (directories are searched recursively)
    Hash {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Distance and similarity between two images
    Compare { a: PathBuf, b: PathBuf },
    /// Group near-duplicate images
    Dupes {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        threshold: Option<u32>,
        #[arg(long, default_value_t = 2)]
        min_cluster_size: usize,
    },
    /// Hash images into a JSON-lines index file
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Look up an image in an index file
    Match {
        query: PathBuf,
        #[arg(long, value_name = "FILE")]
        index: PathBuf,
        #[arg(long)]
        threshold: Option<u32>,
    },
}

impl Cli {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref alg) = self.algorithm {
            alg.parse::<HashAlgorithm>().map_err(|e| e.to_string())?;
        }

        if let Some(hs) = self.hash_size
            && !(2..=MAX_HASH_SIZE).contains(&hs)
        {
            return Err(format!("Hash size must be 2-{}. Got {}.", MAX_HASH_SIZE, hs));
        }

        let level = self.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!("Invalid log level '{}'. Use one of: {}", self.log_level, LOG_LEVELS.join(", ")));
        }

        let threshold = match &self.command {
            Command::Dupes { threshold, min_cluster_size, .. } => {
                if *min_cluster_size < 2 {
                    return Err(format!("Minimum cluster size must be at least 2. Got {}.", min_cluster_size));
                }
                *threshold
            }
            Command::Match { query, index, threshold } => {
                if !query.is_file() {
                    return Err(format!("Query image does not exist: {:?}", query));
                }
                if !index.is_file() {
                    return Err(format!("Index file does not exist: {:?}", index));
                }
                *threshold
            }
            Command::Compare { a, b } => {
                for p in [a, b] {
                    if !p.is_file() {
                        return Err(format!("Image does not exist: {:?}", p));
                    }
                }
                None
            }
            _ => None,
        };

        let bits = bit_width(self.hash_size.unwrap_or(MAX_HASH_SIZE));
        if let Some(t) = threshold
            && t > bits
        {
            return Err(format!("Threshold must be 0-{}. Got {}.", bits, t));
        }

        Ok(())
    }

    fn detector_config(&self) -> Result<DetectorConfig> {
        let mut cfg = DetectorConfig::load(self.config.as_deref()).context("Failed to load config")?;
        if let Some(ref alg) = self.algorithm {
            cfg.algorithm = alg.parse()?;
        }
        if let Some(hs) = self.hash_size {
            cfg.hash_size = hs;
        }
        if let Some(w) = self.workers {
            cfg.workers = w;
        }
        cfg.validate()?;
        debug!("Effective config: {:?}", cfg);
        Ok(cfg)
    }
}

/// Expands directories into the image files below them, sorted by path.
fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && is_image_ext(e.path()))
                    .map(|e| e.into_path()),
            );
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
        .progress_chars("#>-");
    Ok(ProgressBar::new(len as u64).with_style(style))
}

/// Drains a batch while ticking a progress bar; results come back in input order.
fn drain_with_progress(iter: BatchIter) -> Result<Vec<BatchResult>> {
    let pb = progress_bar(iter.total())?;
    let mut results: Vec<BatchResult> = iter.inspect(|_| pb.inc(1)).collect();
    pb.finish_and_clear();
    results.sort_by_key(|r| r.index);
    Ok(results)
}

fn hash_files(hasher: &PerceptualHasher, cfg: &DetectorConfig, paths: &[PathBuf]) -> Result<Vec<BatchResult>> {
    let files = collect_images(paths);
    if files.is_empty() {
        bail!("No images found in {:?}", paths);
    }
    let results = drain_with_progress(hasher.hash_batch_iter(files, cfg.workers)?)?;
    for r in results.iter().filter(|r| !r.success) {
        warn!("{}: {}", r.source, r.error.as_deref().unwrap_or("unknown error"));
    }
    Ok(results)
}

fn successes(hasher: &PerceptualHasher, results: Vec<BatchResult>) -> Vec<ImageHash> {
    results
        .into_iter()
        .filter_map(|r| {
            let value = r.hash_value.filter(|_| r.success)?;
            Some(ImageHash::new(r.source, value, hasher.bit_width(), hasher.algorithm()))
        })
        .collect()
}

fn cmd_hash(cfg: &DetectorConfig, paths: &[PathBuf]) -> Result<()> {
    let hasher = PerceptualHasher::from_config(cfg)?;
    let results = hash_files(&hasher, cfg, paths)?;
    let mut failed = 0;
    for r in &results {
        match &r.hash_hex {
            Some(hex) if r.success => println!("{}  {}", hex, r.source),
            _ => {
                failed += 1;
                eprintln!("FAILED  {}: {}", r.source, r.error.as_deref().unwrap_or("unknown error"));
            }
        }
    }
    if failed > 0 {
        eprintln!("{} of {} images could not be hashed", failed, results.len());
    }
    Ok(())
}

fn cmd_compare(cfg: &DetectorConfig, a: &Path, b: &Path) -> Result<()> {
    let hasher = PerceptualHasher::from_config(cfg)?;
    let ha = hasher.hash_image(a).with_context(|| format!("Failed to hash {:?}", a))?;
    let hb = hasher.hash_image(b).with_context(|| format!("Failed to hash {:?}", b))?;
    let distance = hasher.hamming_distance(&ha, &hb)?;
    let similarity = hasher.similarity(&ha, &hb)?;

    println!("{}  {}", ha.hash_hex, ha.source);
    println!("{}  {}", hb.hash_hex, hb.source);
    println!(
        "{}: distance {}/{} similarity {:.1}%",
        hasher.algorithm(),
        distance,
        hasher.bit_width(),
        similarity * 100.0
    );
    Ok(())
}

fn cmd_dupes(mut cfg: DetectorConfig, paths: &[PathBuf], threshold: Option<u32>, min_cluster_size: usize) -> Result<()> {
    if let Some(t) = threshold {
        cfg.threshold = t;
    }
    let files = collect_images(paths);
    if files.is_empty() {
        bail!("No images found in {:?}", paths);
    }

    let detector = DuplicateDetector::new(cfg)?;
    let pb = progress_bar(files.len())?;
    let mut on_progress = |done: usize, _total: usize| pb.set_position(done as u64);
    let mut groups = detector.find_duplicates(files, Some(&mut on_progress))?;
    pb.finish_and_clear();
    groups.retain(|g| g.len() >= min_cluster_size);

    if groups.is_empty() {
        println!("No duplicates found.");
        return Ok(());
    }
    for (i, g) in groups.iter().enumerate() {
        println!(
            "Group {} ({} images, max distance {}, confidence {:.1}%)",
            i + 1,
            g.len(),
            g.max_distance,
            g.confidence * 100.0
        );
        for h in &g.images {
            println!("  {}  {}", h.hash_hex, h.source);
        }
    }
    Ok(())
}

fn cmd_index(cfg: &DetectorConfig, paths: &[PathBuf], out: &Path) -> Result<()> {
    let hasher = PerceptualHasher::from_config(cfg)?;
    let results = hash_files(&hasher, cfg, paths)?;
    let total = results.len();
    let hashes = successes(&hasher, results);
    store::save(out, &hashes).with_context(|| format!("Failed to write index {:?}", out))?;
    println!("Indexed {} of {} images into {}", hashes.len(), total, out.display());
    Ok(())
}

fn cmd_match(cfg: DetectorConfig, query: &Path, index: &Path, threshold: Option<u32>) -> Result<()> {
    let hashes = store::load(index).with_context(|| format!("Failed to read index {:?}", index))?;
    let mut detector = DuplicateDetector::new(cfg)?;
    detector
        .load_hashes(hashes)
        .with_context(|| format!("Index {:?} does not fit the configured hash size", index))?;

    let matches = detector
        .find_matches(query, threshold)
        .with_context(|| format!("Failed to hash {:?}", query))?;
    if matches.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for m in &matches {
        println!("{:>3}  {:.3}  {}  {}", m.distance, m.similarity, m.hash_hex, m.source);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Builder::from_env(Env::default().default_filter_or(args.log_level.to_lowercase())).init();

    let cfg = args.detector_config()?;
    match &args.command {
        Command::Hash { paths } => cmd_hash(&cfg, paths),
        Command::Compare { a, b } => cmd_compare(&cfg, a, b),
        Command::Dupes { paths, threshold, min_cluster_size } => cmd_dupes(cfg, paths, *threshold, *min_cluster_size),
        Command::Index { paths, out } => cmd_index(&cfg, paths, out),
        Command::Match { query, index, threshold } => cmd_match(cfg, query, index, *threshold),
    }
}
