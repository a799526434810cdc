//! Parsing many files matched by a glob pattern.
//!
//! ```no_run
//! use linepipe::config::ParseConfig;
//! use linepipe::io::glob::parse_glob;
//!
//! # fn main() -> anyhow::Result<()> {
//! for file in parse_glob("exports/2024-*/people*.csv.gz", &ParseConfig::default())? {
//!     println!("{}: {} records", file.path.display(), file.records.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ParseConfig;
use crate::driver::{LinePipeline, ParseSummary};
use crate::record::FakeName;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::{Path, PathBuf};

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Supports standard glob patterns: `*`, `?`, `**`, `[abc]` and `[!abc]`.
/// Directories are skipped. No match is an empty vector, not an error.
///
/// # Errors
/// Returns an error if the pattern is invalid or a directory cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Like [`expand_glob`], but no match is an error.
///
/// # Errors
/// Returns an error if the pattern is invalid or matches no file.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {pattern}");
    }
    Ok(files)
}

/// Records and summary of one file parsed by [`parse_glob`].
#[derive(Debug, Clone)]
pub struct FileParse {
    pub path: PathBuf,
    pub records: Vec<FakeName>,
    pub summary: ParseSummary,
}

fn parse_one(path: &Path, config: &ParseConfig) -> Result<FileParse> {
    let mut records = Vec::new();
    let summary = LinePipeline::open(path, config.clone())?.run(&mut records)?;
    Ok(FileParse {
        path: path.to_path_buf(),
        records,
        summary,
    })
}

/// Parse every file matching `pattern`, each with its own pipeline.
///
/// With the `parallel-io` feature files are parsed concurrently, at most one per
/// CPU. Results are in sorted path order either way.
///
/// # Errors
/// Returns an error if the pattern matches nothing, or the first error of any
/// file.
pub fn parse_glob(pattern: &str, config: &ParseConfig) -> Result<Vec<FileParse>> {
    let files = expand_glob_required(pattern)?;
    log::debug!("{pattern}: {} files", files.len());
    parse_files(&files, config)
}

#[cfg(feature = "parallel-io")]
fn parse_files(files: &[PathBuf], config: &ParseConfig) -> Result<Vec<FileParse>> {
    use rayon::prelude::*;

    let threads = num_cpus::get().clamp(1, files.len().max(1));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("linepipe-glob-{i}"))
        .build()
        .context("build parse thread pool")?;
    pool.install(|| {
        files
            .par_iter()
            .map(|path| parse_one(path, config))
            .collect()
    })
}

#[cfg(not(feature = "parallel-io"))]
fn parse_files(files: &[PathBuf], config: &ParseConfig) -> Result<Vec<FileParse>> {
    files.iter().map(|path| parse_one(path, config)).collect()
}
